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

//! # bdinfo
//!
//! bdinfo is a Rust library for scanning Blu-ray discs - either a folder tree
//! containing a `BDMV/` hierarchy or a UDF 2.50 disc image - and producing the
//! classic BDInfo plain-text report: per-playlist summaries of codecs,
//! bitrates, chapters, files, and diagnostic statistics.
//!
//! A scan never writes to the disc. The library mounts disc images through its
//! own read-only UDF reader, parses `.mpls` playlists and `.clpi` clip-info
//! files into a graph of playlists, clips, and elementary streams, then walks
//! every referenced `.m2ts` transport stream to derive per-stream bitrates,
//! codec parameters, HDR metadata, and durations.
//!
//! The main entry point is [`scan::scan`], which returns a fully populated
//! [`Disc`]. Hand the result to [`report::render`] to produce the text report.

pub mod clipinfo;
pub mod codec;
pub mod disc;
pub mod filesystem;
pub mod language;
pub mod playlist;
pub mod report;
pub mod scan;
pub mod settings;
pub mod stream;
pub mod streamfile;
pub mod util;

use thiserror::Error;

/// Transport packets on a BD-ROM are 192 bytes: a 4-byte arrival timestamp
/// followed by a standard 188-byte TS packet.
pub const BDAV_PACKET_SIZE: usize = 192;
pub const TS_PACKET_SIZE: usize = 188;

/// The 45 kHz clock used by MPLS in/out times and chapter marks.
pub const PLAYLIST_CLOCK: f64 = 45_000.0;
/// The 90 kHz clock used by PES presentation and decode timestamps.
pub const PES_CLOCK: f64 = 90_000.0;

#[derive(Debug, Error)]
pub enum BdInfoError {
    #[error("No BDMV/PLAYLIST or BDMV/CLIPINF directory was found under the scan root")]
    NotBluray,
    #[error("The file does not carry a UDF volume recognition sequence")]
    NotUdf,
    #[error("The UDF volume structure is inconsistent: {0}")]
    InvalidUdf(String),
    #[error("Unrecognized header magic in {0}")]
    BadMagic(String),
    #[error("A record was shorter than its declared length")]
    TruncatedRecord,
    #[error("Playlist references clip info {0} which is not present on the disc")]
    MissingClip(String),
    #[error("The first transport packet is not aligned to a sync byte")]
    BadSync,
    #[error("An IO error occurred reading the disc: {0}")]
    IoError(String),
}

// Manually implement `From<io::Error>` so scan tasks can use `?` on reads.
impl From<std::io::Error> for BdInfoError {
    fn from(err: std::io::Error) -> Self {
        BdInfoError::IoError(err.to_string())
    }
}

// Manually implement `From<binrw::Error>` for the UDF descriptor parsers.
impl From<binrw::Error> for BdInfoError {
    fn from(err: binrw::Error) -> Self {
        BdInfoError::IoError(err.to_string())
    }
}

pub use crate::{
    disc::{Disc, DiscFlags},
    playlist::{PlaylistFile, StreamClip},
    report::render,
    scan::scan,
    settings::ScanSettings,
    stream::{StreamInfo, StreamType},
    streamfile::StreamFile,
};
