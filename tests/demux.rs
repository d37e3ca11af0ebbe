mod common;

use bdinfo::{scan, ScanSettings};
use common::*;
use std::path::Path;

fn write(path: &Path, data: &[u8]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, data).unwrap();
}

/// A complete one-playlist disc with a real (synthetic) stream file. The
/// stream's clock runs from 1s to `seconds + 1`s, so the clip selects the
/// matching interval.
fn demo_disc(dir: &Path, seconds: u32) {
    let clpi = build_clpi(&[(0x1B, 0x1011, ""), (0x81, 0x1100, "eng")]);
    let mpls = build_mpls(
        &[MplsItem {
            clip: "00001",
            in_ticks: 45_000,
            out_ticks: (seconds + 1) * 45_000,
            streams: vec![(0x1B, 0x1011, ""), (0x81, 0x1100, "eng")],
            angles: vec![],
        }],
        &[MplsChapter { item: 0, ticks: 45_000 }],
        0,
    );
    write(&dir.join("BDMV/CLIPINF/00001.clpi"), &clpi);
    write(&dir.join("BDMV/PLAYLIST/00001.mpls"), &mpls);
    write(&dir.join("BDMV/STREAM/00001.m2ts"), &build_m2ts(0x1011, seconds));
}

#[test]
fn test_demux_fills_bitrates_and_duration() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    demo_disc(dir.path(), 30);

    let disc = scan(dir.path(), &ScanSettings::default()).unwrap();
    assert!(disc.file_errors.is_empty(), "{:?}", disc.file_errors);

    let file = &disc.stream_files["00001.M2TS"];
    assert!((file.length - 30.0).abs() < 1e-6);

    let playlist = &disc.playlists["00001.MPLS"];
    let clip = &playlist.stream_clips[0];
    assert!(clip.payload_bytes > 0);
    assert!(clip.packet_count > 0);
    assert!((clip.packet_seconds - 30.0).abs() < 1e-6);

    let video = &playlist.streams[&0x1011];
    assert!(video.base().payload_bytes > 0);
    assert!(video.base().active_bit_rate > 0);
    assert!(video.base().is_initialized);
    // The SPS in the stream carried the profile string.
    assert_eq!(
        video.as_video().unwrap().encoding_profile,
        "High Profile 4.1"
    );
}

#[test]
fn test_diagnostic_markers_stay_in_bounds() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    demo_disc(dir.path(), 20);

    let disc = scan(dir.path(), &ScanSettings::default()).unwrap();
    let file = &disc.stream_files["00001.M2TS"];
    let playlist = &disc.playlists["00001.MPLS"];
    let min_time_in = playlist
        .stream_clips
        .iter()
        .map(|c| c.time_in)
        .fold(f64::INFINITY, f64::min);

    for samples in file.diagnostics.values() {
        for sample in samples {
            assert!(sample.marker >= min_time_in);
            assert!(sample.marker <= min_time_in + file.length + 1e-6);
        }
    }

    // Frame tags came from the access-unit delimiters in the stream.
    let video_samples = &file.diagnostics[&0x1011];
    assert!(video_samples.iter().any(|s| s.tag.as_deref() == Some("I")));
}

#[test]
fn test_stream_order_covers_each_pid_once() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    demo_disc(dir.path(), 10);

    let disc = scan(dir.path(), &ScanSettings::default()).unwrap();
    let file = &disc.stream_files["00001.M2TS"];
    for pid in file.streams.keys() {
        assert_eq!(
            file.stream_order.iter().filter(|p| *p == pid).count(),
            1,
            "PID {:04X} order entries",
            pid
        );
    }
}

#[test]
fn test_report_is_idempotent() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    demo_disc(dir.path(), 15);

    let settings = ScanSettings::default();
    let first = bdinfo::render(&scan(dir.path(), &settings).unwrap(), &settings);
    let second = bdinfo::render(&scan(dir.path(), &settings).unwrap(), &settings);
    assert_eq!(sha1_hex(first.as_bytes()), sha1_hex(second.as_bytes()));
}

#[test]
fn test_full_pass_never_lowers_bitrates() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    demo_disc(dir.path(), 15);

    let summary = scan(dir.path(), &ScanSettings::default()).unwrap();
    let quick_rates: Vec<u64> = summary.playlists["00001.MPLS"]
        .streams
        .values()
        .map(|s| s.base().bit_rate)
        .collect();

    let mut settings = ScanSettings::default();
    settings.scan_full = true;
    let full = scan(dir.path(), &settings).unwrap();
    let full_rates: Vec<u64> = full.playlists["00001.MPLS"]
        .streams
        .values()
        .map(|s| s.base().bit_rate)
        .collect();

    for (quick, full) in quick_rates.iter().zip(full_rates.iter()) {
        assert!(full >= quick, "full pass lowered a bitrate: {} < {}", full, quick);
    }
}

#[test]
fn test_truncated_stream_is_a_per_file_error() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    demo_disc(dir.path(), 10);
    // Garbage where the stream should be: sync never found.
    write(&dir.path().join("BDMV/STREAM/00001.m2ts"), &[0u8; 4096]);

    let disc = scan(dir.path(), &ScanSettings::default()).unwrap();
    assert!(disc.file_errors.contains_key("00001.M2TS"));
    // The playlist itself still stands.
    assert!(disc.playlists.contains_key("00001.MPLS"));
}
