mod common;

use bdinfo::{playlist::PlaylistFile, scan, ScanSettings};
use common::*;
use std::path::Path;

fn write(path: &Path, data: &[u8]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, data).unwrap();
}

fn single_clip_disc(dir: &Path, out_ticks: u32) {
    let clpi = build_clpi(&[
        (0x1B, 0x1011, ""),
        (0x86, 0x1100, "eng"),
        (0x90, 0x1200, "eng"),
    ]);
    let mpls = build_mpls(
        &[MplsItem {
            clip: "00001",
            in_ticks: 0,
            out_ticks,
            streams: vec![
                (0x1B, 0x1011, ""),
                (0x86, 0x1100, "eng"),
                (0x90, 0x1200, "eng"),
            ],
            angles: vec![],
        }],
        &[],
        0,
    );
    write(&dir.join("BDMV/CLIPINF/00001.clpi"), &clpi);
    write(&dir.join("BDMV/PLAYLIST/00001.mpls"), &mpls);
}

#[test]
fn test_playlist_reparse_yields_identical_graph() {
    init_logging();
    let mpls = build_mpls(
        &[
            MplsItem {
                clip: "00001",
                in_ticks: 45_000,
                out_ticks: 450_000,
                streams: vec![(0x1B, 0x1011, ""), (0x81, 0x1100, "eng")],
                angles: vec!["00002"],
            },
            MplsItem {
                clip: "00003",
                in_ticks: 0,
                out_ticks: 90_000,
                streams: vec![(0x1B, 0x1011, "")],
                angles: vec![],
            },
        ],
        &[MplsChapter { item: 0, ticks: 90_000 }],
        0x10,
    );

    let first = PlaylistFile::parse("00001.MPLS", &mpls).unwrap();
    let second = PlaylistFile::parse("00001.MPLS", &mpls).unwrap();

    assert!(first.mvc_base_view_r);
    assert_eq!(first.stream_clips.len(), 3); // main + angle + second item
    assert_eq!(first.stream_clips.len(), second.stream_clips.len());
    for (a, b) in first.stream_clips.iter().zip(second.stream_clips.iter()) {
        assert_eq!(a.name, b.name);
        assert_eq!(a.angle_index, b.angle_index);
        assert_eq!(a.time_in, b.time_in);
        assert_eq!(a.time_out, b.time_out);
        assert_eq!(a.relative_time_in, b.relative_time_in);
    }
    assert_eq!(
        first.declared_streams.iter().map(|s| s.pid()).collect::<Vec<_>>(),
        second.declared_streams.iter().map(|s| s.pid()).collect::<Vec<_>>()
    );

    // The angle clip shares the main clip's bounds but not its angle index.
    let angle = &first.stream_clips[1];
    assert_eq!(angle.name, "00002.M2TS");
    assert_eq!(angle.angle_index, 1);
    assert_eq!(angle.time_in, first.stream_clips[0].time_in);
    // Only the main path contributes to the total.
    assert!((first.total_length() - (9.0 + 2.0)).abs() < 1e-6);
    assert!((first.total_angle_length() - (9.0 + 9.0 + 2.0)).abs() < 1e-6);
}

#[test]
fn test_scan_links_playlist_to_clips() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    single_clip_disc(dir.path(), 1_350_000); // 30 seconds

    let disc = scan(dir.path(), &ScanSettings::default()).unwrap();
    assert!(disc.file_errors.is_empty(), "{:?}", disc.file_errors);
    let playlist = &disc.playlists["00001.MPLS"];
    assert_eq!(playlist.stream_clips.len(), 1);
    assert_eq!(playlist.streams.len(), 3);
    assert!((playlist.total_length() - 30.0).abs() < 1e-6);

    // Clip lengths of the main path sum to the total length.
    let sum: f64 = playlist
        .stream_clips
        .iter()
        .filter(|c| c.angle_index == 0)
        .map(|c| c.length)
        .sum();
    assert!((sum - playlist.total_length()).abs() < 1e-6);

    // The missing stream file is soft: the clip still carries time bounds.
    assert!(playlist.stream_clips[0].stream_file.is_none());
    assert!((playlist.stream_clips[0].time_out - 30.0).abs() < 1e-6);
}

#[test]
fn test_missing_clip_info_excludes_playlist() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    single_clip_disc(dir.path(), 1_350_000);
    // A second playlist referencing a clip with no CLPI.
    let mpls = build_mpls(
        &[MplsItem {
            clip: "00099",
            in_ticks: 0,
            out_ticks: 1_350_000,
            streams: vec![(0x1B, 0x1011, "")],
            angles: vec![],
        }],
        &[],
        0,
    );
    write(&dir.path().join("BDMV/PLAYLIST/00002.mpls"), &mpls);

    let disc = scan(dir.path(), &ScanSettings::default()).unwrap();
    assert!(disc.playlists.contains_key("00001.MPLS"));
    assert!(!disc.playlists.contains_key("00002.MPLS"));
    assert!(disc.file_errors.contains_key("00002.MPLS"));
}

#[test]
fn test_chapter_near_end_is_discarded() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    // Item 0: 10 seconds from zero. Item 1: 0.5 seconds starting at 1.0s.
    // Total length 10.5s; a chapter 1.0s into item 1 lands at relative
    // 10.0s, within one second of the end, and is dropped.
    let clpi = build_clpi(&[(0x1B, 0x1011, "")]);
    let mpls = build_mpls(
        &[
            MplsItem {
                clip: "00001",
                in_ticks: 0,
                out_ticks: 450_000,
                streams: vec![(0x1B, 0x1011, "")],
                angles: vec![],
            },
            MplsItem {
                clip: "00002",
                in_ticks: 45_000,
                out_ticks: 67_500,
                streams: vec![(0x1B, 0x1011, "")],
                angles: vec![],
            },
        ],
        &[
            MplsChapter { item: 0, ticks: 0 },
            MplsChapter { item: 1, ticks: 45_000 },
        ],
        0,
    );
    write(&dir.path().join("BDMV/CLIPINF/00001.clpi"), &clpi);
    write(&dir.path().join("BDMV/CLIPINF/00002.clpi"), &clpi);
    write(&dir.path().join("BDMV/PLAYLIST/00001.mpls"), &mpls);

    let disc = scan(dir.path(), &ScanSettings::default()).unwrap();
    let playlist = &disc.playlists["00001.MPLS"];
    assert!((playlist.total_length() - 10.5).abs() < 1e-6);
    assert_eq!(playlist.chapters, vec![0.0]);
}

#[test]
fn test_two_english_tracks_sort_by_pid() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let clpi = build_clpi(&[
        (0x1B, 0x1011, ""),
        (0x81, 3000, "eng"),
        (0x81, 2000, "eng"),
    ]);
    let mpls = build_mpls(
        &[MplsItem {
            clip: "00001",
            in_ticks: 0,
            out_ticks: 1_350_000,
            streams: vec![
                (0x1B, 0x1011, ""),
                (0x81, 3000, "eng"),
                (0x81, 2000, "eng"),
            ],
            angles: vec![],
        }],
        &[],
        0,
    );
    write(&dir.path().join("BDMV/CLIPINF/00001.clpi"), &clpi);
    write(&dir.path().join("BDMV/PLAYLIST/00001.mpls"), &mpls);

    let disc = scan(dir.path(), &ScanSettings::default()).unwrap();
    let playlist = &disc.playlists["00001.MPLS"];
    assert_eq!(playlist.audio_pids, vec![2000, 3000]);

    // KeepStreamOrder leaves the map order untouched.
    let mut keep = ScanSettings::default();
    keep.keep_stream_order = true;
    let disc = scan(dir.path(), &keep).unwrap();
    let playlist = &disc.playlists["00001.MPLS"];
    assert_eq!(playlist.audio_pids, vec![2000, 3000]); // BTreeMap order here
}

#[test]
fn test_short_playlists_filtered_from_report() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    single_clip_disc(dir.path(), 450_000); // 10 seconds

    let mut settings = ScanSettings::default();
    settings.filter_short_playlists = true;
    settings.filter_short_playlists_val = 20;
    let disc = scan(dir.path(), &settings).unwrap();
    let playlist = &disc.playlists["00001.MPLS"];
    assert!(!playlist.is_valid(&settings));
    let report = bdinfo::render(&disc, &settings);
    assert!(!report.contains("PLAYLIST REPORT"));

    settings.filter_short_playlists_val = 5;
    assert!(playlist.is_valid(&settings));
}
