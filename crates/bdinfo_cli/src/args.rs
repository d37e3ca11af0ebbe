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

use std::path::PathBuf;

use bdinfo::ScanSettings;
use bpaf::*;

#[derive(Debug, Clone)]
pub struct Params {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub report_name: Option<String>,
    pub extended_diagnostics: bool,
    pub no_diagnostics: bool,
    pub no_ssif: bool,
    pub keep_looping: bool,
    pub keep_short: bool,
    pub short_threshold: u32,
    pub keep_stream_order: bool,
    pub no_summary: bool,
    pub no_version: bool,
    pub group_by_time: bool,
    pub main_only: bool,
    pub summary_only: bool,
    pub forums_only: bool,
    pub full_scan: bool,
}

impl Params {
    pub fn settings(&self) -> ScanSettings {
        let mut settings = ScanSettings::default();
        settings.generate_stream_diagnostics = !self.no_diagnostics;
        settings.extended_stream_diagnostics = self.extended_diagnostics;
        settings.enable_ssif = !self.no_ssif;
        settings.filter_looping_playlists = !self.keep_looping;
        settings.filter_short_playlists = !self.keep_short;
        settings.filter_short_playlists_val = self.short_threshold;
        settings.keep_stream_order = self.keep_stream_order;
        settings.generate_text_summary = !self.no_summary;
        settings.include_version_and_notes = !self.no_version;
        settings.group_by_time = self.group_by_time;
        settings.main_playlist_only = self.main_only;
        settings.summary_only = self.summary_only;
        settings.forums_only = self.forums_only;
        settings.scan_full = self.full_scan;
        settings.report_file_name = self.report_name.clone();
        settings
    }
}

pub fn params() -> OptionParser<Params> {
    let input = positional::<PathBuf>("PATH").help("Disc folder or .iso image to scan");
    let output_dir = long("dir")
        .short('d')
        .help("Directory the report is written into")
        .argument::<PathBuf>("DIR")
        .fallback(PathBuf::from("."));
    let report_name = long("output")
        .short('o')
        .help("Report file name ({0} expands to the volume label, '-' writes to stdout)")
        .argument::<String>("NAME")
        .optional();
    let extended_diagnostics = long("extended-diagnostics")
        .help("Include HEVC extended metadata in the diagnostics")
        .switch();
    let no_diagnostics = long("no-diagnostics")
        .help("Skip the STREAM DIAGNOSTICS table")
        .switch();
    let no_ssif = long("no-ssif")
        .help("Demux the M2TS even when an SSIF interleave exists")
        .switch();
    let keep_looping = long("keep-looping")
        .help("Keep playlists whose clip sequence loops")
        .switch();
    let keep_short = long("keep-short")
        .help("Keep playlists below the short-playlist threshold")
        .switch();
    let short_threshold = long("short-threshold")
        .help("Drop playlists shorter than this many seconds")
        .argument::<u32>("SECONDS")
        .fallback(20);
    let keep_stream_order = long("keep-stream-order")
        .help("Report streams in declaration order instead of the ranked sort")
        .switch();
    let no_summary = long("no-summary").help("Skip the QUICK SUMMARY block").switch();
    let no_version = long("no-version")
        .help("Skip the tool version line in the disc header")
        .switch();
    let group_by_time = long("group-by-time")
        .help("Order playlists by total length instead of name")
        .switch();
    let main_only = long("main").help("Report only the main playlist").switch();
    let summary_only = long("summary-only")
        .help("Emit only the QUICK SUMMARY blocks")
        .switch();
    let forums_only = long("forums-only")
        .help("Emit only the forum paste blocks")
        .switch();
    let full_scan = long("full-scan")
        .help("Demux every stream file a second time for full diagnostics")
        .switch();

    construct!(Params {
        output_dir,
        report_name,
        extended_diagnostics,
        no_diagnostics,
        no_ssif,
        keep_looping,
        keep_short,
        short_threshold,
        keep_stream_order,
        no_summary,
        no_version,
        group_by_time,
        main_only,
        summary_only,
        forums_only,
        full_scan,
        input,
    })
    .to_options()
    .descr("Scan a Blu-ray disc or image and produce a BDInfo-style report")
    .version(env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_map_to_settings() {
        let parsed = params().run_inner(&["/discs/MOVIE"]).unwrap();
        let settings = parsed.settings();
        assert!(settings.generate_stream_diagnostics);
        assert!(settings.enable_ssif);
        assert!(settings.filter_short_playlists);
        assert_eq!(settings.filter_short_playlists_val, 20);
        assert!(settings.report_file_name.is_none());
    }

    #[test]
    fn test_flags() {
        let parsed = params()
            .run_inner(&[
                "--no-ssif",
                "--keep-stream-order",
                "--short-threshold",
                "45",
                "-o",
                "-",
                "/discs/MOVIE.iso",
            ])
            .unwrap();
        let settings = parsed.settings();
        assert!(!settings.enable_ssif);
        assert!(settings.keep_stream_order);
        assert_eq!(settings.filter_short_playlists_val, 45);
        assert_eq!(settings.report_file_name.as_deref(), Some("-"));
    }
}
