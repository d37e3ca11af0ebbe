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

//! The disc aggregate: BDMV discovery, file classification, and feature-flag
//! detection.

use std::{collections::BTreeMap, io::Read};

use bitflags::bitflags;
use once_cell::sync::Lazy;
use quick_xml::{events::Event, Reader};
use regex::Regex;

use crate::{
    clipinfo::StreamClipFile,
    filesystem::BdFileSystem,
    playlist::PlaylistFile,
    streamfile::StreamFile,
    BdInfoError,
};

/// How deep below the scan root a `BDMV` directory is searched for.
const BDMV_SEARCH_DEPTH: usize = 4;

static PLAYLIST_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\d{5}\.mpls$").expect("playlist name pattern"));
static CLIPINF_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\d{5}\.clpi$").expect("clip info name pattern"));
static STREAM_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\d{5}\.m2ts$").expect("stream name pattern"));
static SSIF_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\d{5}\.ssif$").expect("ssif name pattern"));

bitflags! {
    /// Disc-level feature flags surfaced in the report header.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct DiscFlags: u32 {
        const UHD      = 0b0000_0001;
        const THREE_D  = 0b0000_0010;
        const BD_JAVA  = 0b0000_0100;
        const AACS     = 0b0000_1000;
        const AACS2    = 0b0001_0000;
        const BD_PLUS  = 0b0010_0000;
        const PSP      = 0b0100_0000;
        const DBOX     = 0b1000_0000;
        const HZ50     = 0b1_0000_0000;
    }
}

/// A file discovered under the BDMV tree, before parsing.
#[derive(Debug, Clone)]
pub struct DiscFile {
    pub name: String,
    pub path: String,
    pub size: u64,
}

/// The top-level aggregate owning the whole scan graph.
#[derive(Debug, Default)]
pub struct Disc {
    pub label: String,
    /// Title from `bdmt_eng.xml`, when the metadata document exists.
    pub title: Option<String>,
    /// Total bytes under the scan root.
    pub size: u64,
    pub flags: DiscFlags,
    /// Path of the directory holding `BDMV`, relative to the filesystem root.
    pub base_path: String,
    pub playlist_files: BTreeMap<String, DiscFile>,
    pub clipinf_files: BTreeMap<String, DiscFile>,
    pub stream_file_entries: BTreeMap<String, DiscFile>,
    pub interleaved_entries: BTreeMap<String, DiscFile>,
    /// Parsed structures, filled by the scan phases.
    pub playlists: BTreeMap<String, PlaylistFile>,
    pub clip_files: BTreeMap<String, StreamClipFile>,
    pub stream_files: BTreeMap<String, StreamFile>,
    /// Per-file scan errors, keyed by file name.
    pub file_errors: BTreeMap<String, String>,
}

impl Disc {
    /// Locate the BDMV tree, classify its files, and detect feature flags.
    /// Fails with [`BdInfoError::NotBluray`] when no playlist and clip-info
    /// directories exist.
    pub fn discover(fs: &dyn BdFileSystem, label: String) -> Result<Disc, BdInfoError> {
        let base_path = find_bdmv_root(fs).ok_or(BdInfoError::NotBluray)?;
        log::info!(
            "BDMV structure found at '{}'",
            if base_path.is_empty() { "/" } else { &base_path }
        );

        let mut disc = Disc {
            label,
            base_path: base_path.clone(),
            ..Default::default()
        };

        let join = |a: &str, b: &str| -> String {
            if a.is_empty() {
                b.to_string()
            } else {
                format!("{}/{}", a, b)
            }
        };
        let bdmv = join(&base_path, "BDMV");

        for entry in fs.list_dir(&join(&bdmv, "PLAYLIST"))? {
            if !entry.is_dir && PLAYLIST_NAME.is_match(&entry.name) {
                let name = entry.name.to_uppercase();
                let path = join(&bdmv, &format!("PLAYLIST/{}", entry.name));
                disc.playlist_files.insert(name.clone(), DiscFile { name, path, size: entry.size });
            }
        }
        for entry in fs.list_dir(&join(&bdmv, "CLIPINF"))? {
            if !entry.is_dir && CLIPINF_NAME.is_match(&entry.name) {
                let name = entry.name.to_uppercase();
                let path = join(&bdmv, &format!("CLIPINF/{}", entry.name));
                disc.clipinf_files.insert(name.clone(), DiscFile { name, path, size: entry.size });
            }
        }
        if let Ok(entries) = fs.list_dir(&join(&bdmv, "STREAM")) {
            for entry in entries {
                if !entry.is_dir && STREAM_NAME.is_match(&entry.name) {
                    let name = entry.name.to_uppercase();
                    let path = join(&bdmv, &format!("STREAM/{}", entry.name));
                    disc.stream_file_entries
                        .insert(name.clone(), DiscFile { name, path, size: entry.size });
                }
            }
        }
        if let Ok(entries) = fs.list_dir(&join(&bdmv, "STREAM/SSIF")) {
            for entry in entries {
                if !entry.is_dir && SSIF_NAME.is_match(&entry.name) {
                    let name = entry.name.to_uppercase();
                    let path = join(&bdmv, &format!("STREAM/SSIF/{}", entry.name));
                    disc.interleaved_entries
                        .insert(name.clone(), DiscFile { name, path, size: entry.size });
                    disc.flags |= DiscFlags::THREE_D;
                }
            }
        }

        disc.size = tree_size(fs, &base_path, 0);
        disc.detect_features(fs, &base_path, &bdmv);
        disc.title = read_disc_title(fs, &bdmv);
        Ok(disc)
    }

    fn detect_features(&mut self, fs: &dyn BdFileSystem, base: &str, bdmv: &str) {
        let join = |a: &str, b: &str| -> String {
            if a.is_empty() {
                b.to_string()
            } else {
                format!("{}/{}", a, b)
            }
        };

        if let Ok(mut reader) = fs.open_read(&join(bdmv, "index.bdmv")) {
            let mut magic = [0u8; 8];
            if reader.read_exact(&mut magic).is_ok() && &magic == b"INDX0300" {
                self.flags |= DiscFlags::UHD;
            }
        }

        if fs
            .list_dir(&join(bdmv, "BDJO"))
            .map(|entries| !entries.is_empty())
            .unwrap_or(false)
        {
            self.flags |= DiscFlags::BD_JAVA;
        }

        let aacs = join(base, "AACS");
        let has_aacs = fs.stat_file(&join(&aacs, "Unit_Key_RO.inf")).is_ok()
            || fs.stat_file(&join(&aacs, "MKB_RO.inf")).is_ok();
        if has_aacs {
            self.flags |= if self.flags.contains(DiscFlags::UHD) {
                DiscFlags::AACS2
            } else {
                DiscFlags::AACS
            };
        }

        for marker in ["BDSVM", "SLYVM", "ANYVM"] {
            if fs.dir_exists(&join(base, marker)) {
                self.flags |= DiscFlags::BD_PLUS;
                break;
            }
        }

        if let Ok(entries) = fs.list_dir(&join(base, "SNP")) {
            if entries.iter().any(|e| e.name.to_lowercase().ends_with(".mnv")) {
                self.flags |= DiscFlags::PSP;
            }
        }

        if fs.stat_file(&join(base, "FilmIndex.xml")).is_ok() {
            self.flags |= DiscFlags::DBOX;
        }
    }

    /// The protection string for the report header.
    pub fn protection(&self) -> &'static str {
        if self.flags.contains(DiscFlags::AACS2) {
            "AACS2"
        } else if self.flags.contains(DiscFlags::BD_PLUS) {
            "BD+"
        } else if self.flags.contains(DiscFlags::AACS) {
            "AACS"
        } else {
            ""
        }
    }

    /// Extras summary: the feature flags beyond protection.
    pub fn extras(&self) -> Vec<&'static str> {
        let mut extras = Vec::new();
        if self.flags.contains(DiscFlags::UHD) {
            extras.push("Ultra HD");
        }
        if self.flags.contains(DiscFlags::BD_JAVA) {
            extras.push("BD-Java");
        }
        if self.flags.contains(DiscFlags::THREE_D) {
            extras.push("BD-3D");
        }
        if self.flags.contains(DiscFlags::DBOX) {
            extras.push("D-BOX");
        }
        if self.flags.contains(DiscFlags::PSP) {
            extras.push("PSP Digital Copy");
        }
        if self.flags.contains(DiscFlags::HZ50) {
            extras.push("50Hz Content");
        }
        extras
    }
}

/// Breadth-first probe for a directory containing `BDMV/PLAYLIST` and
/// `BDMV/CLIPINF`. Returns the path holding `BDMV`, or `None`.
fn find_bdmv_root(fs: &dyn BdFileSystem) -> Option<String> {
    let mut frontier: Vec<String> = vec![String::new()];
    for _depth in 0..=BDMV_SEARCH_DEPTH {
        let mut next = Vec::new();
        for dir in frontier {
            let playlist = if dir.is_empty() {
                "BDMV/PLAYLIST".to_string()
            } else {
                format!("{}/BDMV/PLAYLIST", dir)
            };
            let clipinf = if dir.is_empty() {
                "BDMV/CLIPINF".to_string()
            } else {
                format!("{}/BDMV/CLIPINF", dir)
            };
            if fs.dir_exists(&playlist) && fs.dir_exists(&clipinf) {
                return Some(dir);
            }
            if let Ok(entries) = fs.list_dir(&dir) {
                for entry in entries.iter().filter(|e| e.is_dir) {
                    next.push(if dir.is_empty() {
                        entry.name.clone()
                    } else {
                        format!("{}/{}", dir, entry.name)
                    });
                }
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }
    None
}

fn tree_size(fs: &dyn BdFileSystem, path: &str, depth: usize) -> u64 {
    if depth > 6 {
        return 0;
    }
    let Ok(entries) = fs.list_dir(path) else {
        return 0;
    };
    entries
        .iter()
        .map(|e| {
            if e.is_dir {
                let child = if path.is_empty() {
                    e.name.clone()
                } else {
                    format!("{}/{}", path, e.name)
                };
                tree_size(fs, &child, depth + 1)
            } else {
                e.size
            }
        })
        .sum()
}

/// Pull the disc title out of `META/**/bdmt_eng.xml`: the text of the first
/// `name` element.
fn read_disc_title(fs: &dyn BdFileSystem, bdmv: &str) -> Option<String> {
    let meta = format!("{}/META", bdmv);
    let path = find_file(fs, &meta, "bdmt_eng.xml", 0)?;
    let data = fs.read_file(&path).ok()?;

    let mut reader = Reader::from_reader(data.as_slice());
    let mut in_name = false;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let local = e.local_name();
                in_name = local.as_ref() == b"name";
            }
            Ok(Event::Text(t)) if in_name => {
                let title = t.unescape().ok()?.trim().to_string();
                if !title.is_empty() {
                    log::debug!("disc title: {}", title);
                    return Some(title);
                }
            }
            Ok(Event::End(_)) => in_name = false,
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}

fn find_file(fs: &dyn BdFileSystem, dir: &str, name: &str, depth: usize) -> Option<String> {
    if depth > 3 {
        return None;
    }
    let entries = fs.list_dir(dir).ok()?;
    for entry in entries.iter() {
        if !entry.is_dir && entry.name.eq_ignore_ascii_case(name) {
            return Some(format!("{}/{}", dir, entry.name));
        }
    }
    for entry in entries.iter().filter(|e| e.is_dir) {
        if let Some(found) = find_file(fs, &format!("{}/{}", dir, entry.name), name, depth + 1) {
            return Some(found);
        }
    }
    None
}
