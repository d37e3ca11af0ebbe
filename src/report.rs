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

//! The plain-text report renderer.
//!
//! Output mirrors the legacy BDInfo layout: per-playlist forum paste blocks
//! bounded by the BEGIN/END markers, followed by FILES, CHAPTERS with rolling
//! peak bitrates, optional STREAM DIAGNOSTICS, and an optional QUICK SUMMARY.

use std::collections::VecDeque;
use std::fmt::Write;

use crate::{
    disc::Disc,
    playlist::PlaylistFile,
    settings::ScanSettings,
    stream::StreamInfo,
    util::{format_duration, format_thousands},
};

pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

const FORUMS_BEGIN: &str = "<--- BEGIN FORUMS PASTE --->";
const FORUMS_END: &str = "<---- END FORUMS PASTE ---->";

/// Peak-rate windows of the CHAPTERS table, in seconds.
const CHAPTER_WINDOWS: [f64; 3] = [1.0, 5.0, 10.0];

/// Playlists whose lengths agree within this tolerance fall into one group
/// under `GroupByTime`.
const GROUP_TIME_TOLERANCE_SECONDS: f64 = 5.0;

/// Render the whole report.
pub fn render(disc: &Disc, settings: &ScanSettings) -> String {
    let mut out = String::new();

    if !settings.forums_only && !settings.summary_only && !disc.file_errors.is_empty() {
        writeln!(out, "WARNING: File errors were encountered during the scan:").ok();
        writeln!(out).ok();
        for (name, error) in disc.file_errors.iter() {
            writeln!(out, "{}: {}", name, error).ok();
        }
        writeln!(out).ok();
    }

    let groups = playlist_groups(disc, settings);
    for (index, group) in groups.iter().enumerate() {
        if settings.group_by_time && !settings.forums_only && !settings.summary_only {
            let longest = group
                .iter()
                .map(|p| p.total_length())
                .fold(0.0f64, f64::max);
            writeln!(
                out,
                "PLAYLIST GROUP {}: {} ({} playlist{})",
                index + 1,
                format_duration(longest),
                group.len(),
                if group.len() == 1 { "" } else { "s" }
            )
            .ok();
            writeln!(out).ok();
        }
        for playlist in group.iter() {
            render_playlist(&mut out, disc, playlist, settings);
        }
    }

    out
}

/// Valid playlists in reporting order, honoring the grouping and
/// main-playlist switches.
///
/// Without `GroupByTime` every playlist is its own group, in name order.
/// With it, playlists cluster into runs whose consecutive lengths agree
/// within the five-second tolerance: sorted longest first, a playlist joins
/// the open group while it stays within tolerance of the previous length,
/// and group members list in name order. `MainPlaylistOnly` keeps only the
/// group holding the longest (then largest) playlist.
fn playlist_groups<'a>(disc: &'a Disc, settings: &ScanSettings) -> Vec<Vec<&'a PlaylistFile>> {
    let mut playlists: Vec<&PlaylistFile> = disc
        .playlists
        .values()
        .filter(|p| p.is_valid(settings))
        .collect();

    let mut groups: Vec<Vec<&PlaylistFile>> = Vec::new();
    if settings.group_by_time {
        playlists.sort_by(|a, b| {
            b.total_length()
                .partial_cmp(&a.total_length())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        let mut previous_length = f64::NEG_INFINITY;
        for playlist in playlists {
            let length = playlist.total_length();
            match groups.last_mut() {
                Some(group) if previous_length - length <= GROUP_TIME_TOLERANCE_SECONDS => {
                    group.push(playlist);
                }
                _ => groups.push(vec![playlist]),
            }
            previous_length = length;
        }
        for group in groups.iter_mut() {
            group.sort_by(|a, b| a.name.cmp(&b.name));
        }
    } else {
        playlists.sort_by(|a, b| a.name.cmp(&b.name));
        groups = playlists.into_iter().map(|p| vec![p]).collect();
    }

    if settings.main_playlist_only {
        groups = groups
            .into_iter()
            .max_by(|a, b| {
                let best = |g: &Vec<&PlaylistFile>| {
                    g.iter()
                        .map(|p| (p.total_length(), p.total_size()))
                        .fold((0.0f64, 0u64), |acc, v| {
                            if v.0 > acc.0 || (v.0 == acc.0 && v.1 > acc.1) {
                                v
                            } else {
                                acc
                            }
                        })
                };
                let (al, asz) = best(a);
                let (bl, bsz) = best(b);
                al.partial_cmp(&bl)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| asz.cmp(&bsz))
            })
            .into_iter()
            .collect();
    }
    groups
}

fn render_playlist(out: &mut String, disc: &Disc, playlist: &PlaylistFile, settings: &ScanSettings) {
    if !settings.summary_only {
        writeln!(out, "{}", FORUMS_BEGIN).ok();
        writeln!(out, "[code]").ok();
        writeln!(out).ok();
        render_disc_info(out, disc, settings);
        render_playlist_report(out, playlist);
        render_stream_tables(out, playlist);
        writeln!(out, "[/code]").ok();
        writeln!(out, "{}", FORUMS_END).ok();
        writeln!(out).ok();
    }

    if !settings.forums_only && !settings.summary_only {
        render_files(out, playlist);
        render_chapters(out, disc, playlist);
        if settings.generate_stream_diagnostics {
            render_diagnostics(out, disc, playlist, settings);
        }
    }

    if settings.generate_text_summary && !settings.forums_only {
        render_quick_summary(out, disc, playlist);
    }
}

fn render_disc_info(out: &mut String, disc: &Disc, settings: &ScanSettings) {
    writeln!(out, "DISC INFO:").ok();
    writeln!(out).ok();
    let title = disc.title.clone().unwrap_or_else(|| disc.label.clone());
    writeln!(out, "{:<16}{}", "Disc Title:", title).ok();
    writeln!(out, "{:<16}{}", "Disc Label:", disc.label).ok();
    writeln!(out, "{:<16}{} bytes", "Disc Size:", format_thousands(disc.size)).ok();
    writeln!(out, "{:<16}{}", "Protection:", disc.protection()).ok();
    let extras = disc.extras();
    if !extras.is_empty() {
        writeln!(out, "{:<16}{}", "Extras:", extras.join(", ")).ok();
    }
    if settings.include_version_and_notes {
        writeln!(out, "{:<16}{}", "BDInfo:", TOOL_VERSION).ok();
    }
    writeln!(out).ok();
}

fn render_playlist_report(out: &mut String, playlist: &PlaylistFile) {
    writeln!(out, "PLAYLIST REPORT:").ok();
    writeln!(out).ok();
    writeln!(out, "{:<24}{}", "Name:", playlist.name).ok();
    writeln!(
        out,
        "{:<24}{} (h:m:s.ms)",
        "Length:",
        format_duration(playlist.total_length())
    )
    .ok();
    writeln!(
        out,
        "{:<24}{} bytes",
        "Size:",
        format_thousands(playlist.total_size())
    )
    .ok();
    writeln!(out, "{:<24}{}", "Total Bitrate:", format_mbps(playlist.total_bit_rate())).ok();
    if playlist.angle_count > 0 {
        writeln!(out, "{:<24}{}", "Angles:", playlist.angle_count + 1).ok();
        writeln!(
            out,
            "{:<24}{} (h:m:s.ms)",
            "Angle Length:",
            format_duration(playlist.total_angle_length())
        )
        .ok();
        writeln!(
            out,
            "{:<24}{} bytes",
            "Angle Size:",
            format_thousands(playlist.total_angle_size())
        )
        .ok();
    }
    writeln!(out).ok();
}

fn render_stream_tables(out: &mut String, playlist: &PlaylistFile) {
    writeln!(out, "VIDEO:").ok();
    writeln!(out).ok();
    writeln!(out, "{:<24}{:<20}{}", "Codec", "Bitrate", "Description").ok();
    writeln!(out, "{:<24}{:<20}{}", "-----", "-------", "-----------").ok();
    for info in playlist.video_streams() {
        writeln!(
            out,
            "{:<24}{:<20}{}",
            info.codec_label(),
            format!("{} kbps", info.base().bit_rate / 1000),
            info.description()
        )
        .ok();
    }
    writeln!(out).ok();

    writeln!(out, "AUDIO:").ok();
    writeln!(out).ok();
    writeln!(
        out,
        "{:<32}{:<16}{:<16}{}",
        "Codec", "Language", "Bitrate", "Description"
    )
    .ok();
    writeln!(
        out,
        "{:<32}{:<16}{:<16}{}",
        "-----", "--------", "-------", "-----------"
    )
    .ok();
    for info in playlist.audio_streams() {
        writeln!(
            out,
            "{:<32}{:<16}{:<16}{}",
            hidden_prefix(info) + &info.codec_label(),
            info.base().language_name(),
            format!("{} kbps", info.base().bit_rate / 1000),
            info.description()
        )
        .ok();
    }
    writeln!(out).ok();

    writeln!(out, "SUBTITLES:").ok();
    writeln!(out).ok();
    writeln!(
        out,
        "{:<32}{:<16}{:<16}{}",
        "Codec", "Language", "Bitrate", "Description"
    )
    .ok();
    writeln!(
        out,
        "{:<32}{:<16}{:<16}{}",
        "-----", "--------", "-------", "-----------"
    )
    .ok();
    for info in playlist.graphics_streams() {
        writeln!(
            out,
            "{:<32}{:<16}{:<16}{}",
            hidden_prefix(info) + &info.codec_label(),
            info.base().language_name(),
            format_graphics_kbps(info.base().bit_rate),
            info.description()
        )
        .ok();
    }
    writeln!(out).ok();

    if playlist.text_pids.is_empty() {
        return;
    }
    writeln!(out, "TEXT:").ok();
    writeln!(out).ok();
    writeln!(out, "{:<32}{:<16}{}", "Codec", "Language", "Description").ok();
    writeln!(out, "{:<32}{:<16}{}", "-----", "--------", "-----------").ok();
    for info in playlist.text_streams() {
        writeln!(
            out,
            "{:<32}{:<16}{}",
            hidden_prefix(info) + &info.codec_label(),
            info.base().language_name(),
            info.description()
        )
        .ok();
    }
    writeln!(out).ok();
}

fn render_files(out: &mut String, playlist: &PlaylistFile) {
    writeln!(out, "FILES:").ok();
    writeln!(out).ok();
    writeln!(
        out,
        "{:<16}{:<8}{:<16}{:<16}{:<16}{}",
        "Name", "Angle", "Time In", "Length", "Size", "Total Bitrate"
    )
    .ok();
    writeln!(
        out,
        "{:<16}{:<8}{:<16}{:<16}{:<16}{}",
        "----", "-----", "-------", "------", "----", "-------------"
    )
    .ok();
    for clip in playlist.stream_clips.iter() {
        let bitrate = if clip.length > 0.0 {
            (clip.file_size as f64 * 8.0 / clip.length / 1000.0).round() as u64
        } else {
            0
        };
        writeln!(
            out,
            "{:<16}{:<8}{:<16}{:<16}{:<16}{}",
            clip.name,
            if clip.angle_index > 0 {
                clip.angle_index.to_string()
            } else {
                String::new()
            },
            format_duration(clip.relative_time_in),
            format_duration(clip.length),
            format_thousands(clip.file_size),
            format_thousands(bitrate)
        )
        .ok();
    }
    writeln!(out).ok();
}

/// One `(time, bytes)` point of the playlist's video payload timeline.
fn video_timeline(disc: &Disc, playlist: &PlaylistFile) -> Vec<(f64, u64)> {
    let Some(&video_pid) = playlist.video_pids.first() else {
        return Vec::new();
    };
    let mut points = Vec::new();
    for clip in playlist.stream_clips.iter().filter(|c| c.angle_index == 0) {
        let Some(file) = clip.stream_file.as_ref().and_then(|n| disc.stream_files.get(n)) else {
            continue;
        };
        let Some(samples) = file.diagnostics.get(&video_pid) else {
            continue;
        };
        for sample in samples {
            if sample.marker >= clip.time_in && sample.marker <= clip.time_out {
                points.push((sample.marker - clip.time_in + clip.relative_time_in, sample.bytes));
            }
        }
    }
    points.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    points
}

fn render_chapters(out: &mut String, disc: &Disc, playlist: &PlaylistFile) {
    writeln!(out, "CHAPTERS:").ok();
    writeln!(out).ok();
    write!(out, "{:<8}{:<16}{:<16}{:<16}", "Number", "Time In", "Length", "Avg Video Rate").ok();
    for window in ["1-Sec", "5-Sec", "10Sec"] {
        write!(out, "{:<16}{:<16}", format!("Max {} Rate", window), format!("Max {} Time", window))
            .ok();
    }
    writeln!(out).ok();
    write!(out, "{:<8}{:<16}{:<16}{:<16}", "------", "-------", "------", "--------------").ok();
    for _ in 0..CHAPTER_WINDOWS.len() {
        write!(out, "{:<16}{:<16}", "--------------", "--------------").ok();
    }
    writeln!(out).ok();

    let timeline = video_timeline(disc, playlist);
    let total = playlist.total_length();
    // The chapter list is never empty for rendering purposes: a playlist
    // without marks still reports one chapter covering the whole length.
    let mut starts = playlist.chapters.clone();
    if starts.is_empty() {
        starts.push(0.0);
    }

    for (index, &start) in starts.iter().enumerate() {
        let end = starts.get(index + 1).copied().unwrap_or(total);
        let points: Vec<(f64, u64)> = timeline
            .iter()
            .filter(|(t, _)| *t >= start && *t < end)
            .copied()
            .collect();
        let chapter_bytes: u64 = points.iter().map(|(_, b)| b).sum();
        let avg = if end > start {
            (chapter_bytes as f64 * 8.0 / (end - start) / 1000.0).round() as u64
        } else {
            0
        };

        write!(
            out,
            "{:<8}{:<16}{:<16}{:<16}",
            index + 1,
            format_duration(start),
            format_duration(end - start),
            format!("{} kbps", format_thousands(avg))
        )
        .ok();
        for window in CHAPTER_WINDOWS {
            let (rate, time) = peak_rate(&points, window);
            write!(
                out,
                "{:<16}{:<16}",
                format!("{} kbps", format_thousands(rate)),
                format_duration(time)
            )
            .ok();
        }
        writeln!(out).ok();
    }
    writeln!(out).ok();
}

/// Maximum windowed rate over the points via a sliding-window queue.
/// Returns `(kbps, window end time)`.
fn peak_rate(points: &[(f64, u64)], window: f64) -> (u64, f64) {
    let mut queue: VecDeque<(f64, u64)> = VecDeque::new();
    let mut sum = 0u64;
    let mut best = (0u64, 0.0f64);
    for &(time, bytes) in points {
        queue.push_back((time, bytes));
        sum += bytes;
        while let Some(&(front, front_bytes)) = queue.front() {
            if time - front > window {
                queue.pop_front();
                sum -= front_bytes;
            } else {
                break;
            }
        }
        let rate = (sum as f64 * 8.0 / window / 1000.0).round() as u64;
        if rate > best.0 {
            best = (rate, time);
        }
    }
    best
}

fn render_diagnostics(
    out: &mut String,
    disc: &Disc,
    playlist: &PlaylistFile,
    settings: &ScanSettings,
) {
    writeln!(out, "STREAM DIAGNOSTICS:").ok();
    writeln!(out).ok();
    writeln!(
        out,
        "{:<16}{:<16}{:<8}{:<28}{:<12}{:<16}{:<16}{:<16}{}",
        "File", "PID", "Type", "Codec", "Language", "Seconds", "Bitrate", "Bytes", "Packets"
    )
    .ok();
    writeln!(
        out,
        "{:<16}{:<16}{:<8}{:<28}{:<12}{:<16}{:<16}{:<16}{}",
        "----", "---", "----", "-----", "--------", "-------", "-------", "-----", "-------"
    )
    .ok();

    for clip in playlist.stream_clips.iter().filter(|c| c.angle_index == 0) {
        let Some(file) = clip.stream_file.as_ref().and_then(|n| disc.stream_files.get(n)) else {
            continue;
        };
        for &pid in file.stream_order.iter() {
            let Some(info) = file.streams.get(&pid) else {
                continue;
            };
            let base = info.base();
            let seconds: f64 = file
                .diagnostics
                .get(&pid)
                .map(|samples| samples.iter().map(|s| s.interval).sum())
                .unwrap_or(0.0);
            writeln!(
                out,
                "{:<16}{:<16}{:<8}{:<28}{:<12}{:<16}{:<16}{:<16}{}",
                file.name,
                format!("{} (0x{:04X})", pid, pid),
                format!("0x{:02X}", base.stream_type.code()),
                info.codec_label(),
                base.language_name(),
                format!("{:.3}", seconds),
                format!("{} kbps", format_thousands(base.active_bit_rate / 1000)),
                format_thousands(base.payload_bytes),
                format_thousands(base.packet_count)
            )
            .ok();
            if settings.extended_stream_diagnostics {
                if let Some(extended) = info.as_video().and_then(|v| v.extended.as_ref()) {
                    if let Some(md) = &extended.master_display {
                        writeln!(out, "{:<16}Mastering display: {}", "", md).ok();
                    }
                    if let Some(cl) = &extended.content_light {
                        writeln!(out, "{:<16}Content light level: {}", "", cl).ok();
                    }
                }
            }
        }
    }
    writeln!(out).ok();
}

fn render_quick_summary(out: &mut String, disc: &Disc, playlist: &PlaylistFile) {
    writeln!(out, "QUICK SUMMARY:").ok();
    writeln!(out).ok();
    let title = disc.title.clone().unwrap_or_else(|| disc.label.clone());
    writeln!(out, "Disc Title: {}", title).ok();
    writeln!(out, "Disc Label: {}", disc.label).ok();
    writeln!(out, "Disc Size: {} bytes", format_thousands(disc.size)).ok();
    writeln!(out, "Protection: {}", disc.protection()).ok();
    writeln!(out, "Playlist: {}", playlist.name).ok();
    writeln!(out, "Size: {} bytes", format_thousands(playlist.total_size())).ok();
    writeln!(out, "Length: {}", format_duration(playlist.total_length())).ok();
    writeln!(out, "Total Bitrate: {}", format_mbps(playlist.total_bit_rate())).ok();
    for info in playlist.video_streams() {
        writeln!(
            out,
            "Video: {} / {} kbps / {}",
            info.codec_label(),
            info.base().bit_rate / 1000,
            info.description()
        )
        .ok();
    }
    for info in playlist.audio_streams() {
        writeln!(
            out,
            "Audio: {} / {} / {}",
            info.base().language_name(),
            info.codec_label(),
            info.description()
        )
        .ok();
    }
    for info in playlist.graphics_streams() {
        writeln!(
            out,
            "Subtitle: {} / {}",
            info.base().language_name(),
            format_graphics_kbps(info.base().bit_rate)
        )
        .ok();
    }
    writeln!(out).ok();
}

fn hidden_prefix(info: &StreamInfo) -> String {
    if info.base().is_hidden {
        "* ".to_string()
    } else {
        String::new()
    }
}

fn format_mbps(bits_per_second: u64) -> String {
    format!("{:.2} Mbps", bits_per_second as f64 / 1_000_000.0)
}

/// Graphics rates are fractions of a kbps; three decimals keeps them visible.
fn format_graphics_kbps(bits_per_second: u64) -> String {
    format!("{:.3} kbps", bits_per_second as f64 / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{StreamInfo, StreamType};

    fn minimal_disc() -> (Disc, ScanSettings) {
        let mut disc = Disc {
            label: "TEST_DISC".to_string(),
            size: 1_000_000,
            ..Default::default()
        };
        let mut playlist = PlaylistFile {
            name: "00001.MPLS".to_string(),
            ..Default::default()
        };
        playlist.stream_clips.push(crate::playlist::StreamClip {
            name: "00001.M2TS".to_string(),
            length: 120.0,
            time_out: 120.0,
            file_size: 90_000_000,
            ..Default::default()
        });
        let mut video = StreamInfo::new(0x1011, StreamType::AvcVideo);
        video.base_mut().bit_rate = 25_000_000;
        playlist.streams.insert(0x1011, video);
        let mut audio = StreamInfo::new(0x1100, StreamType::Ac3Audio);
        audio.base_mut().bit_rate = 640_000;
        audio.base_mut().language_code = "eng".to_string();
        playlist.streams.insert(0x1100, audio);
        playlist.rebuild_category_views(&ScanSettings::default());
        disc.playlists.insert(playlist.name.clone(), playlist);
        (disc, ScanSettings::default())
    }

    fn add_playlist(disc: &mut Disc, name: &str, seconds: f64) {
        let mut playlist = PlaylistFile {
            name: name.to_string(),
            ..Default::default()
        };
        playlist.stream_clips.push(crate::playlist::StreamClip {
            name: "00001.M2TS".to_string(),
            length: seconds,
            time_out: seconds,
            file_size: 1_000_000,
            ..Default::default()
        });
        playlist
            .streams
            .insert(0x1011, StreamInfo::new(0x1011, StreamType::AvcVideo));
        playlist.rebuild_category_views(&ScanSettings::default());
        disc.playlists.insert(playlist.name.clone(), playlist);
    }

    #[test]
    fn test_report_sections_present() {
        let (disc, settings) = minimal_disc();
        let report = render(&disc, &settings);
        assert!(report.contains(FORUMS_BEGIN));
        assert!(report.contains(FORUMS_END));
        assert!(report.contains("[code]"));
        assert!(report.contains("DISC INFO:"));
        assert!(report.contains("PLAYLIST REPORT:"));
        assert!(report.contains("VIDEO:"));
        assert!(report.contains("AUDIO:"));
        assert!(report.contains("SUBTITLES:"));
        assert!(report.contains("FILES:"));
        assert!(report.contains("CHAPTERS:"));
        assert!(report.contains("STREAM DIAGNOSTICS:"));
        assert!(report.contains("QUICK SUMMARY:"));
        assert!(report.contains("Disc Label:     TEST_DISC"));
        assert!(report.contains("MPEG-4 AVC Video"));
        assert!(report.contains("English"));
    }

    #[test]
    fn test_chapters_table_present_when_empty() {
        let (disc, settings) = minimal_disc();
        let report = render(&disc, &settings);
        // No chapter marks: a single whole-length chapter row renders.
        let chapters = report.split("CHAPTERS:").nth(1).unwrap();
        assert!(chapters.contains("0:02:00.000"));
    }

    #[test]
    fn test_forums_only_filter() {
        let (disc, mut settings) = minimal_disc();
        settings.forums_only = true;
        let report = render(&disc, &settings);
        assert!(report.contains(FORUMS_BEGIN));
        assert!(!report.contains("FILES:"));
        assert!(!report.contains("QUICK SUMMARY:"));
    }

    #[test]
    fn test_summary_only_filter() {
        let (disc, mut settings) = minimal_disc();
        settings.summary_only = true;
        let report = render(&disc, &settings);
        assert!(!report.contains(FORUMS_BEGIN));
        assert!(report.contains("QUICK SUMMARY:"));
    }

    #[test]
    fn test_group_by_time_clusters_within_tolerance() {
        let mut disc = Disc {
            label: "TEST_DISC".to_string(),
            ..Default::default()
        };
        // 200s and 195s agree within 5s; 189s is 6s off the open group and
        // starts a new one; 60s stands alone.
        add_playlist(&mut disc, "00004.MPLS", 60.0);
        add_playlist(&mut disc, "00002.MPLS", 195.0);
        add_playlist(&mut disc, "00003.MPLS", 189.0);
        add_playlist(&mut disc, "00001.MPLS", 200.0);

        let mut settings = ScanSettings::default();
        settings.group_by_time = true;
        let groups = playlist_groups(&disc, &settings);
        let names: Vec<Vec<&str>> = groups
            .iter()
            .map(|g| g.iter().map(|p| p.name.as_str()).collect())
            .collect();
        assert_eq!(
            names,
            vec![
                vec!["00001.MPLS", "00002.MPLS"],
                vec!["00003.MPLS"],
                vec!["00004.MPLS"],
            ]
        );

        // Without the switch, every playlist is its own group in name order.
        settings.group_by_time = false;
        let groups = playlist_groups(&disc, &settings);
        assert_eq!(groups.len(), 4);
        assert_eq!(groups[0][0].name, "00001.MPLS");
        assert!(groups.iter().all(|g| g.len() == 1));
    }

    #[test]
    fn test_group_by_time_render_headers() {
        let mut disc = Disc {
            label: "TEST_DISC".to_string(),
            ..Default::default()
        };
        add_playlist(&mut disc, "00001.MPLS", 200.0);
        add_playlist(&mut disc, "00002.MPLS", 198.0);
        add_playlist(&mut disc, "00003.MPLS", 60.0);

        let mut settings = ScanSettings::default();
        settings.group_by_time = true;
        let report = render(&disc, &settings);
        assert!(report.contains("PLAYLIST GROUP 1: 0:03:20.000 (2 playlists)"));
        assert!(report.contains("PLAYLIST GROUP 2: 0:01:00.000 (1 playlist)"));
        // The longer group renders first.
        assert!(
            report.find("PLAYLIST GROUP 1").unwrap() < report.find("00001.MPLS").unwrap()
        );
        assert!(
            report.find("00002.MPLS").unwrap() < report.find("PLAYLIST GROUP 2").unwrap()
        );

        settings.group_by_time = false;
        let report = render(&disc, &settings);
        assert!(!report.contains("PLAYLIST GROUP"));
    }

    #[test]
    fn test_main_playlist_only_keeps_the_main_group() {
        let mut disc = Disc {
            label: "TEST_DISC".to_string(),
            ..Default::default()
        };
        add_playlist(&mut disc, "00001.MPLS", 200.0);
        add_playlist(&mut disc, "00002.MPLS", 198.0);
        add_playlist(&mut disc, "00003.MPLS", 60.0);

        let mut settings = ScanSettings::default();
        settings.group_by_time = true;
        settings.main_playlist_only = true;
        let groups = playlist_groups(&disc, &settings);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);

        // Without grouping, only the single longest playlist remains.
        settings.group_by_time = false;
        let groups = playlist_groups(&disc, &settings);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 1);
        assert_eq!(groups[0][0].name, "00001.MPLS");
    }

    #[test]
    fn test_peak_rate_sliding_window() {
        // 1 MB every half second; the 1-second window holds ~2-3 samples.
        let points: Vec<(f64, u64)> = (0..10).map(|i| (i as f64 * 0.5, 1_000_000)).collect();
        let (rate, _) = peak_rate(&points, 1.0);
        assert_eq!(rate, 24_000); // 3 MB * 8 / 1 s / 1000
    }

    #[test]
    fn test_file_errors_warning() {
        let (mut disc, settings) = minimal_disc();
        disc.file_errors
            .insert("00009.MPLS".to_string(), "bad magic".to_string());
        let report = render(&disc, &settings);
        assert!(report.starts_with("WARNING: File errors"));
        assert!(report.contains("00009.MPLS: bad magic"));
    }
}
