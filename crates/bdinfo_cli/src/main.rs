/*
    bdinfo-rs
    https://github.com/bdinfo-rs/bdinfo

    Copyright 2025 the bdinfo-rs authors

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------
*/

mod args;

use std::{
    io::Write,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{Context, Result};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let params = args::params().run();
    let settings = params.settings();

    let disc = bdinfo::scan(&params.input, &settings)
        .with_context(|| format!("scanning {}", params.input.display()))?;
    log::info!(
        "scan complete: {} playlist(s), {} stream file(s), {} error(s)",
        disc.playlists.len(),
        disc.stream_files.len(),
        disc.file_errors.len()
    );

    let report = bdinfo::render(&disc, &settings);

    let name = settings
        .report_file_name
        .clone()
        .unwrap_or_else(|| format!("BDInfo_{}.bdinfo", disc.label));
    if name == "-" {
        std::io::stdout().write_all(report.as_bytes())?;
        return Ok(());
    }

    let name = name.replace("{0}", &disc.label);
    let target = params.output_dir.join(name);
    backup_existing(&target)?;
    std::fs::write(&target, report).with_context(|| format!("writing {}", target.display()))?;
    println!("{}", target.display());
    Ok(())
}

/// An existing report is renamed to `<name>.<unix-seconds>` before the new
/// one is written.
fn backup_existing(target: &Path) -> Result<()> {
    if !target.exists() {
        return Ok(());
    }
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let mut backup = PathBuf::from(target);
    backup.set_file_name(format!(
        "{}.{}",
        target.file_name().unwrap_or_default().to_string_lossy(),
        seconds
    ));
    log::info!("renaming existing report to {}", backup.display());
    std::fs::rename(target, &backup)
        .with_context(|| format!("backing up {}", target.display()))?;
    Ok(())
}
