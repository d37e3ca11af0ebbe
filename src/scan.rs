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

//! The scan orchestrator.
//!
//! Phases run strictly in sequence; the work inside each phase is dispatched
//! to a bounded worker pool. Structure files parse in parallel under a tuned
//! limit; stream demuxing is single-threaded by default because sequential
//! reads beat parallel reads on both spinning media and image files. A scan
//! error on an individual file is recorded and the scan continues; only a
//! missing BDMV structure or a bad image mount is fatal.

use std::{
    collections::BTreeMap,
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use crate::{
    clipinfo::StreamClipFile,
    disc::{Disc, DiscFlags},
    filesystem::{native::NativeFileSystem, udf::UdfFileSystem, BdFileSystem},
    playlist::PlaylistFile,
    settings::ScanSettings,
    stream::{StreamInfo, StreamType},
    streamfile::{DemuxTarget, StreamFile},
    util::round_half_even,
    BdInfoError,
};

/// The environment override for every phase's worker limit.
const WORKERS_ENV: &str = "WORKERS";

/// Scan a disc folder or a `.iso` image into a fully populated [`Disc`].
pub fn scan(root: &Path, settings: &ScanSettings) -> Result<Disc, BdInfoError> {
    let cancel = AtomicBool::new(false);
    scan_with_cancel(root, settings, &cancel)
}

/// As [`scan`], checking the cancellation flag between phases. In-flight
/// tasks always run to completion so per-file state is never half-updated.
pub fn scan_with_cancel(
    root: &Path,
    settings: &ScanSettings,
    cancel: &AtomicBool,
) -> Result<Disc, BdInfoError> {
    if root.is_file() {
        let fs = UdfFileSystem::open(root)?;
        let label = fs.label();
        scan_filesystem(&fs, label, settings, cancel)
    } else {
        let fs = NativeFileSystem::new(root);
        let label = fs.label();
        scan_filesystem(&fs, label, settings, cancel)
    }
}

pub fn scan_filesystem(
    fs: &dyn BdFileSystem,
    label: String,
    settings: &ScanSettings,
    cancel: &AtomicBool,
) -> Result<Disc, BdInfoError> {
    let mut disc = Disc::discover(fs, label)?;

    parse_clip_files(fs, &mut disc);
    link_interleaved_files(&mut disc);
    if cancel.load(Ordering::Relaxed) {
        return Ok(disc);
    }

    parse_playlists(fs, &mut disc, settings);
    if cancel.load(Ordering::Relaxed) {
        return Ok(disc);
    }

    demux_stream_files(fs, &mut disc, settings);
    initialize_playlists(&mut disc, settings);

    if settings.scan_full && !cancel.load(Ordering::Relaxed) {
        log::info!("running full-diagnostics pass");
        reset_accumulators(&mut disc);
        demux_stream_files(fs, &mut disc, settings);
    }

    finalize_bitrates(&mut disc);
    Ok(disc)
}

/// Phase 1: parse every clip-info file.
fn parse_clip_files(fs: &dyn BdFileSystem, disc: &mut Disc) {
    let jobs: Vec<_> = disc.clipinf_files.values().cloned().collect();
    let total_bytes: u64 = jobs.iter().map(|j| j.size).sum();
    let workers = scan_worker_limit(jobs.len(), total_bytes);
    log::debug!("parsing {} clip-info file(s) with {} worker(s)", jobs.len(), workers);

    let results = run_parallel(jobs, workers, |job| {
        let parsed = fs
            .read_file(&job.path)
            .and_then(|data| StreamClipFile::parse(&job.name, &data));
        (job.name, parsed)
    });
    for (name, result) in results {
        match result {
            Ok(clip) => {
                disc.clip_files.insert(name, clip);
            }
            Err(e) => {
                log::warn!("{}: {}", name, e);
                disc.file_errors.insert(name, e.to_string());
            }
        }
    }
}

/// Phase 2: build stream-file shells, link SSIF counterparts by name, and
/// seed each file's stream map from its clip info.
fn link_interleaved_files(disc: &mut Disc) {
    for entry in disc.stream_file_entries.clone().values() {
        let mut file = StreamFile::new(&entry.name, &entry.path, entry.size);
        let ssif_name = entry.name.replace(".M2TS", ".SSIF");
        if let Some(ssif) = disc.interleaved_entries.get(&ssif_name) {
            file.interleaved_file = Some(ssif.name.clone());
            file.interleaved_path = Some(ssif.path.clone());
            file.interleaved_size = ssif.size;
        }
        let clip_name = entry.name.replace(".M2TS", ".CLPI");
        if let Some(clip) = disc.clip_files.get(&clip_name) {
            file.streams = clip.streams.clone();
        }
        disc.stream_files.insert(entry.name.clone(), file);
    }
}

/// Phase 3: parse every playlist and cross-link it to clips and stream
/// files. A playlist that references a missing clip-info file is excluded.
fn parse_playlists(fs: &dyn BdFileSystem, disc: &mut Disc, settings: &ScanSettings) {
    let jobs: Vec<_> = disc.playlist_files.values().cloned().collect();
    let total_bytes: u64 = jobs.iter().map(|j| j.size).sum();
    let workers = scan_worker_limit(jobs.len(), total_bytes);
    log::debug!("parsing {} playlist(s) with {} worker(s)", jobs.len(), workers);

    let results = run_parallel(jobs, workers, |job| {
        let parsed = fs
            .read_file(&job.path)
            .and_then(|data| PlaylistFile::parse(&job.name, &data));
        (job.name, parsed)
    });
    for (name, result) in results {
        match result {
            Ok(mut playlist) => {
                match playlist.link_clips(&disc.stream_files, &disc.clip_files, settings) {
                    Ok(()) => {
                        disc.playlists.insert(name, playlist);
                    }
                    Err(e) => {
                        log::warn!("{}: {}", name, e);
                        disc.file_errors.insert(name, e.to_string());
                    }
                }
            }
            Err(e) => {
                log::warn!("{}: {}", name, e);
                disc.file_errors.insert(name, e.to_string());
            }
        }
    }
}

/// Phase 4: demux every stream file at least one playlist references.
fn demux_stream_files(fs: &dyn BdFileSystem, disc: &mut Disc, settings: &ScanSettings) {
    // Index StreamFile -> referencing clip intervals. Orphan files are left
    // unscanned; their declared info still reaches the report.
    let mut target_index: BTreeMap<String, Vec<DemuxTarget>> = BTreeMap::new();
    for (playlist_name, playlist) in disc.playlists.iter() {
        for (clip_index, clip) in playlist.stream_clips.iter().enumerate() {
            if let Some(file_name) = &clip.stream_file {
                target_index
                    .entry(file_name.clone())
                    .or_default()
                    .push(DemuxTarget::new(
                        playlist_name,
                        clip_index,
                        clip.time_in,
                        clip.time_out,
                    ));
            }
        }
    }

    let mut jobs = Vec::new();
    for (file_name, targets) in target_index {
        let Some(file) = disc.stream_files.remove(&file_name) else {
            continue;
        };
        let clpi_order = disc
            .clip_files
            .get(&file_name.replace(".M2TS", ".CLPI"))
            .map(|c| c.stream_order.clone())
            .unwrap_or_default();
        jobs.push((file, targets, clpi_order));
    }

    let total_bytes: u64 = jobs.iter().map(|(f, _, _)| f.size).sum();
    let workers = stream_worker_limit(total_bytes);
    log::debug!("demuxing {} stream file(s) with {} worker(s)", jobs.len(), workers);

    let results = run_parallel(jobs, workers, |(mut file, mut targets, clpi_order)| {
        let result = file.scan(fs, &mut targets, &clpi_order, settings);
        (file, targets, result)
    });

    for (file, targets, result) in results {
        if let Err(e) = result {
            log::warn!("{}: {}", file.name, e);
            disc.file_errors.insert(file.name.clone(), e.to_string());
        }
        for target in targets {
            apply_target(disc, target, &file);
        }
        disc.stream_files.insert(file.name.clone(), file);
    }
}

/// Fold one clip interval's accumulators back onto its playlist.
fn apply_target(disc: &mut Disc, target: DemuxTarget, file: &StreamFile) {
    let Some(playlist) = disc.playlists.get_mut(&target.playlist) else {
        return;
    };
    if let Some(clip) = playlist.stream_clips.get_mut(target.clip_index) {
        clip.payload_bytes += target.clip_bytes;
        clip.packet_count += target.clip_packets;
        clip.packet_seconds += target.clip_seconds;
    }
    for (pid, accum) in target.streams {
        if let Some(info) = playlist.streams.get_mut(&pid) {
            let is_video = info.stream_type().is_video();
            let base = info.base_mut();
            base.payload_bytes += accum.payload_bytes;
            base.packet_count += accum.packet_count;
            base.packet_seconds += accum.packet_seconds;
            if accum.active_bit_rate > 0 {
                base.active_bit_rate = accum.active_bit_rate;
                // Observed video rates raise the declared one, never lower it.
                if is_video && accum.active_bit_rate > base.bit_rate {
                    base.bit_rate = accum.active_bit_rate;
                }
            }
        }
    }
    for (pid, scanned) in file.streams.iter() {
        if let Some(info) = playlist.streams.get_mut(pid) {
            info.absorb(scanned);
        }
    }
}

/// Phase 5: per-playlist initialization after demuxing.
fn initialize_playlists(disc: &mut Disc, settings: &ScanSettings) {
    let mut any_50hz = false;
    let mut any_mvc = false;
    for playlist in disc.playlists.values_mut() {
        playlist.detect_loops();

        let has_mvc = playlist
            .streams
            .values()
            .any(|s| s.stream_type() == StreamType::MvcVideo);
        any_mvc |= has_mvc;
        let base_view_r = playlist.mvc_base_view_r;
        for info in playlist.streams.values_mut() {
            if let StreamInfo::Video(video) = info {
                if video.frame_rate.is_50hz() {
                    any_50hz = true;
                }
                if has_mvc {
                    video.is_base_view = match video.base.stream_type {
                        StreamType::MvcVideo => base_view_r,
                        _ => !base_view_r,
                    };
                }
            }
        }
        // Channel counts and languages may have improved during demux.
        playlist.rebuild_category_views(settings);
    }
    if any_50hz {
        disc.flags |= DiscFlags::HZ50;
    }
    if any_mvc {
        disc.flags |= DiscFlags::THREE_D;
    }
}

/// Clear bitrate accumulators before the full-diagnostics pass. Bit rates
/// themselves are kept: a rescan may only raise them.
fn reset_accumulators(disc: &mut Disc) {
    for playlist in disc.playlists.values_mut() {
        for clip in playlist.stream_clips.iter_mut() {
            clip.payload_bytes = 0;
            clip.packet_count = 0;
            clip.packet_seconds = 0.0;
        }
        for info in playlist.streams.values_mut() {
            let base = info.base_mut();
            base.payload_bytes = 0;
            base.packet_count = 0;
            base.packet_seconds = 0.0;
            base.active_bit_rate = 0;
        }
    }
    for file in disc.stream_files.values_mut() {
        file.diagnostics.clear();
        for info in file.streams.values_mut() {
            let base = info.base_mut();
            base.payload_bytes = 0;
            base.packet_count = 0;
            base.packet_seconds = 0.0;
            base.active_bit_rate = 0;
        }
    }
}

/// Final pass: VBR streams get their playlist-level bit rate from the
/// aggregated payload bytes and packet seconds, rounded half to even.
fn finalize_bitrates(disc: &mut Disc) {
    for playlist in disc.playlists.values_mut() {
        let clip_seconds: f64 = playlist
            .stream_clips
            .iter()
            .filter(|c| c.angle_index == 0)
            .map(|c| c.packet_seconds)
            .sum();
        for info in playlist.streams.values_mut() {
            let is_video = info.stream_type().is_video();
            let base = info.base_mut();
            if !base.is_vbr || base.payload_bytes == 0 {
                continue;
            }
            let seconds = if is_video && base.packet_seconds > 0.0 {
                base.packet_seconds
            } else {
                clip_seconds
            };
            if seconds > 0.0 {
                let computed = round_half_even(base.payload_bytes as f64 * 8.0 / seconds);
                if computed > base.bit_rate {
                    base.bit_rate = computed;
                }
            }
        }
    }
}

/// The per-phase worker limit.
///
/// The `WORKERS` environment override wins when it parses as a positive
/// integer. Otherwise the limit is tuned from the item count and scaled up
/// by aggregate-size thresholds, and always capped by the hardware limit.
pub fn scan_worker_limit(total_items: usize, total_bytes: u64) -> usize {
    let cap = hardware_cap();
    if let Some(n) = env_workers() {
        return n.clamp(1, cap);
    }
    let by_items = match total_items {
        0..=1 => 1,
        2..=4 => 2,
        5..=8 => 3,
        _ => 4,
    };
    const GIB: u64 = 1 << 30;
    let by_bytes = if total_bytes > 80 * GIB {
        4
    } else if total_bytes > 50 * GIB {
        3
    } else if total_bytes > 20 * GIB {
        2
    } else {
        1
    };
    by_items.max(by_bytes).clamp(1, cap)
}

/// Stream scans with any input always run single-threaded: sequential reads
/// outperform parallel reads on both spinning media and image files. The
/// environment override still wins.
pub fn stream_worker_limit(total_bytes: u64) -> usize {
    if let Some(n) = env_workers() {
        return n.clamp(1, hardware_cap());
    }
    let _ = total_bytes;
    1
}

fn env_workers() -> Option<usize> {
    let raw = std::env::var(WORKERS_ENV).ok()?;
    match raw.parse::<usize>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            log::debug!("ignoring unparseable {}={}", WORKERS_ENV, raw);
            None
        }
    }
}

fn hardware_cap() -> usize {
    let parallelism = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    parallelism.saturating_sub(1).clamp(1, 8)
}

/// Run tasks over a bounded pool of scoped workers, preserving input order
/// in the results.
fn run_parallel<T, R, F>(items: Vec<T>, workers: usize, task: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync,
{
    if workers <= 1 || items.len() <= 1 {
        return items.into_iter().map(task).collect();
    }

    let count = items.len();
    let (sender, receiver) = crossbeam_channel::bounded(count);
    for pair in items.into_iter().enumerate() {
        sender.send(pair).expect("queue sized to item count");
    }
    drop(sender);

    let results: Mutex<Vec<Option<R>>> = Mutex::new((0..count).map(|_| None).collect());
    std::thread::scope(|scope| {
        for _ in 0..workers.min(count) {
            scope.spawn(|| {
                while let Ok((index, item)) = receiver.recv() {
                    let result = task(item);
                    results.lock().expect("result lock")[index] = Some(result);
                }
            });
        }
    });
    results
        .into_inner()
        .expect("result lock")
        .into_iter()
        .map(|r| r.expect("every task ran"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIB: u64 = 1 << 30;

    // Serialize the tests that touch the WORKERS environment variable.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_worker_limit_tuning() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var(WORKERS_ENV);
        let cap = hardware_cap();
        assert_eq!(scan_worker_limit(1, 0), 1);
        assert_eq!(scan_worker_limit(3, 0), 2.min(cap));
        assert_eq!(scan_worker_limit(8, 0), 3.min(cap));
        assert_eq!(scan_worker_limit(20, 0), 4.min(cap));
        assert_eq!(scan_worker_limit(2, 90 * GIB), 4.min(cap));
        assert_eq!(scan_worker_limit(2, 30 * GIB), 2.min(cap));
    }

    #[test]
    fn test_workers_env_override() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var(WORKERS_ENV, "3");
        assert_eq!(scan_worker_limit(8, 90 * GIB), 3.min(hardware_cap()));
        assert_eq!(stream_worker_limit(90 * GIB), 3.min(hardware_cap()));
        std::env::set_var(WORKERS_ENV, "bogus");
        assert_eq!(stream_worker_limit(90 * GIB), 1);
        std::env::remove_var(WORKERS_ENV);
    }

    #[test]
    fn test_stream_scans_are_sequential() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var(WORKERS_ENV);
        assert_eq!(stream_worker_limit(500 * GIB), 1);
        assert_eq!(stream_worker_limit(0), 1);
    }

    #[test]
    fn test_run_parallel_preserves_order() {
        let items: Vec<u32> = (0..64).collect();
        let doubled = run_parallel(items, 4, |n| n * 2);
        assert_eq!(doubled, (0..64).map(|n| n * 2).collect::<Vec<_>>());
    }
}
