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

/// Options controlling what is scanned and what the report contains.
///
/// The defaults match the behavior of the legacy tool with no switches given.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    /// Include the per-file STREAM DIAGNOSTICS table.
    pub generate_stream_diagnostics: bool,
    /// Include HEVC extended metadata strings in the diagnostics.
    pub extended_stream_diagnostics: bool,
    /// Demux the interleaved SSIF image instead of the M2TS on stereoscopic
    /// titles.
    pub enable_ssif: bool,
    /// Drop playlists whose clip sequence reuses a `(name, time-in)` pair.
    pub filter_looping_playlists: bool,
    /// Drop playlists shorter than [`filter_short_playlists_val`] seconds.
    ///
    /// [`filter_short_playlists_val`]: ScanSettings::filter_short_playlists_val
    pub filter_short_playlists: bool,
    pub filter_short_playlists_val: u32,
    /// Skip the category-specific stream sort and report streams in the order
    /// they were declared.
    pub keep_stream_order: bool,
    /// Append the QUICK SUMMARY block.
    pub generate_text_summary: bool,
    /// Include tool version and notes in the disc header.
    pub include_version_and_notes: bool,
    /// Group playlists whose total lengths agree within five seconds.
    pub group_by_time: bool,
    /// Report only the main (longest, then largest) playlist group.
    pub main_playlist_only: bool,
    /// Retain only QUICK SUMMARY blocks in the output.
    pub summary_only: bool,
    /// Retain only the forum paste blocks in the output.
    pub forums_only: bool,
    /// Re-demux every stream file a second time for full diagnostics.
    pub scan_full: bool,
    /// Report path template. `{0}` expands to the volume label; `-` writes to
    /// standard output; `None` selects `BDInfo_<volume>.bdinfo`.
    pub report_file_name: Option<String>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            generate_stream_diagnostics: true,
            extended_stream_diagnostics: false,
            enable_ssif: true,
            filter_looping_playlists: true,
            filter_short_playlists: true,
            filter_short_playlists_val: 20,
            keep_stream_order: false,
            generate_text_summary: true,
            include_version_and_notes: true,
            group_by_time: false,
            main_playlist_only: false,
            summary_only: false,
            forums_only: false,
            scan_full: false,
            report_file_name: None,
        }
    }
}
