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

//! `.m2ts` transport-stream demuxing.
//!
//! A stream file is walked packet by packet. Per-PID state machines follow
//! the PES framing to extract timestamps and elementary bytes; on each video
//! timestamp the accumulated per-PID windows are distributed across the clip
//! intervals that cover the current stream time, producing per-clip byte and
//! packet totals, per-stream active bitrates, and the diagnostic samples the
//! report's chapter and diagnostics tables are built from.

use std::{
    collections::{BTreeMap, HashMap},
    io::Read,
};

use crate::{
    codec,
    codec::hevc::HevcTagParser,
    filesystem::BdFileSystem,
    settings::ScanSettings,
    stream::{StreamInfo, StreamType},
    util::round_half_even,
    BdInfoError, PES_CLOCK,
};

/// Target chunk size for stream reads; rounded down to a whole number of
/// packets before use.
const CHUNK_TARGET: usize = 5 * 1024 * 1024;

/// PAT/PMT collection stops after this many chunks.
const PSI_CHUNK_LIMIT: usize = 32;

/// Cap on the bytes fed to the non-HEVC frame-tag scanners per window.
const TAG_WINDOW_CAPACITY: usize = 64 * 1024;

const PAT_PID: u16 = 0x0000;
const NULL_PID: u16 = 0x1FFF;

/// One diagnostics row: the state of a PID's window at a bitrate flush.
#[derive(Debug, Clone)]
pub struct DiagSample {
    /// Stream time of the flush, seconds.
    pub marker: f64,
    /// Seconds covered by the window.
    pub interval: f64,
    pub bytes: u64,
    pub packets: u64,
    pub tag: Option<String>,
}

/// Accumulators for one stream of one clip interval, filled during demux and
/// applied to the owning playlist afterwards.
#[derive(Debug, Clone, Default)]
pub struct StreamAccum {
    pub payload_bytes: u64,
    pub packet_count: u64,
    pub packet_seconds: f64,
    pub active_bit_rate: u64,
}

/// One clip interval of one playlist that references this stream file.
#[derive(Debug, Clone)]
pub struct DemuxTarget {
    pub playlist: String,
    pub clip_index: usize,
    pub time_in: f64,
    pub time_out: f64,
    pub clip_bytes: u64,
    pub clip_packets: u64,
    pub clip_seconds: f64,
    pub streams: HashMap<u16, StreamAccum>,
}

impl DemuxTarget {
    pub fn new(playlist: &str, clip_index: usize, time_in: f64, time_out: f64) -> Self {
        DemuxTarget {
            playlist: playlist.to_string(),
            clip_index,
            time_in,
            time_out,
            clip_bytes: 0,
            clip_packets: 0,
            clip_seconds: 0.0,
            streams: HashMap::new(),
        }
    }

}

/// An in-memory `.m2ts`, populated by [`StreamFile::scan`].
#[derive(Debug, Clone, Default)]
pub struct StreamFile {
    /// Upper-case file name, e.g. `00001.M2TS`.
    pub name: String,
    /// Filesystem path of the stream file.
    pub path: String,
    pub size: u64,
    /// Upper-case name and path of the interleaved SSIF counterpart.
    pub interleaved_file: Option<String>,
    pub interleaved_path: Option<String>,
    pub interleaved_size: u64,
    pub streams: BTreeMap<u16, StreamInfo>,
    /// Final stream order: PMT declaration, then observed appearance, then
    /// clip-info declaration, then any stragglers ascending.
    pub stream_order: Vec<u16>,
    pub diagnostics: BTreeMap<u16, Vec<DiagSample>>,
    /// Derived duration, seconds.
    pub length: f64,
}

/// Per-PID PES parse state.
#[derive(Debug, Default)]
struct PacketState {
    stream_type: StreamType,
    /// Bytes of PES header still to collect; 0 when in payload.
    header_remaining: usize,
    header: Vec<u8>,
    /// The 9-byte prefix has been decoded (length budget, extension size).
    prefix_done: bool,
    /// The whole header, extension included, has been consumed.
    header_done: bool,
    /// Payload bytes remaining in a bounded PES packet; `None` when
    /// unbounded, `Some(0)` once a bounded packet closed.
    packet_remaining: Option<u64>,
    in_pes: bool,
    pes_starts: u32,
    bounded_closed: bool,
    window_bytes: u64,
    window_packets: u64,
    /// Latest timestamp (DTS, or PTS on PTS-only transfers) that drove a
    /// flush decision.
    dts_prev: Option<u64>,
    /// Elementary capture for the codec probe.
    capture: Vec<u8>,
    capture_capacity: usize,
    /// Window bytes fed to the non-HEVC frame-tag scanners.
    tag_window: Vec<u8>,
    tag: Option<String>,
    /// Current PES transfer, fed to the HEVC tag machine at transfer end.
    hevc_transfer: Vec<u8>,
    hevc_tags: Option<HevcTagParser>,
}

impl PacketState {
    fn new(stream_type: StreamType) -> Self {
        let capture_capacity = codec::buffer_capacity(stream_type);
        PacketState {
            stream_type,
            capture: codec::acquire_buffer(capture_capacity),
            capture_capacity,
            hevc_tags: (stream_type == StreamType::HevcVideo).then(HevcTagParser::new),
            ..Default::default()
        }
    }

    /// True once the capture holds at least one complete PES transfer.
    fn capture_complete(&self) -> bool {
        self.pes_starts >= 2 || self.bounded_closed
    }
}

/// Advances through clip targets as stream time rises. Targets are sorted by
/// time-in; the started frontier only moves forward and closed intervals are
/// pruned, so a monotonic scan is O(1) amortized per flush.
struct ClipCursor {
    order: Vec<usize>,
    started: usize,
    active: Vec<usize>,
    last_time: f64,
}

impl ClipCursor {
    fn new(targets: &[DemuxTarget]) -> Self {
        let mut order: Vec<usize> = (0..targets.len()).collect();
        order.sort_by(|a, b| {
            targets[*a]
                .time_in
                .partial_cmp(&targets[*b].time_in)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ClipCursor {
            order,
            started: 0,
            active: Vec::new(),
            last_time: f64::NEG_INFINITY,
        }
    }

    fn active_at(&mut self, targets: &[DemuxTarget], time: f64) -> &[usize] {
        if time < self.last_time {
            // Backwards jumps are not expected in normal operation; rescan.
            self.started = 0;
            self.active.clear();
        }
        self.last_time = time;
        while self.started < self.order.len() && targets[self.order[self.started]].time_in <= time {
            self.active.push(self.order[self.started]);
            self.started += 1;
        }
        self.active.retain(|i| targets[*i].time_out >= time);
        self.active.as_slice()
    }
}

impl StreamFile {
    pub fn new(name: &str, path: &str, size: u64) -> StreamFile {
        StreamFile {
            name: name.to_string(),
            path: path.to_string(),
            size,
            ..Default::default()
        }
    }

    /// Demux the file (or its SSIF interleave), updating this file's stream
    /// map and diagnostics and filling the per-clip accumulators in
    /// `targets`.
    pub fn scan(
        &mut self,
        fs: &dyn BdFileSystem,
        targets: &mut [DemuxTarget],
        clpi_order: &[u16],
        settings: &ScanSettings,
    ) -> Result<(), BdInfoError> {
        let path = match (&self.interleaved_path, settings.enable_ssif) {
            (Some(ssif), true) => ssif.clone(),
            _ => self.path.clone(),
        };
        log::debug!("{}: demuxing {}", self.name, path);
        let mut reader = fs.open_read(&path)?;

        // Packet framing: a leading 0x47 means plain 188-byte packets, a
        // 0x47 at offset 4 means 192-byte BDAV packets.
        let mut probe = [0u8; 192];
        let mut probed = 0usize;
        while probed < probe.len() {
            let n = reader.read(&mut probe[probed..])?;
            if n == 0 {
                break;
            }
            probed += n;
        }
        let (packet_size, sync_offset) = if probed > 0 && probe[0] == 0x47 {
            (188usize, 0usize)
        } else if probed > 4 && probe[4] == 0x47 {
            (192usize, 4usize)
        } else {
            return Err(BdInfoError::BadSync);
        };

        let chunk_size = (CHUNK_TARGET / packet_size) * packet_size;
        let mut chunk = vec![0u8; chunk_size];
        let mut carry = probe[..probed].to_vec();

        let mut demux = Demux {
            file: self,
            targets,
            cursor: None,
            states: HashMap::new(),
            observed: Vec::new(),
            pmt_order: Vec::new(),
            pmt_pids: Vec::new(),
            first_dts: None,
            last_dts: None,
            sync_offset,
        };
        demux.cursor = Some(ClipCursor::new(demux.targets));

        let mut chunk_index = 0usize;
        loop {
            let mut filled = carry.len();
            chunk[..filled].copy_from_slice(&carry);
            carry.clear();
            while filled < chunk.len() {
                let n = reader.read(&mut chunk[filled..])?;
                if n == 0 {
                    break;
                }
                filled += n;
            }
            if filled == 0 {
                break;
            }
            let whole = (filled / packet_size) * packet_size;
            for packet in chunk[..whole].chunks_exact(packet_size) {
                demux.process_packet(packet, chunk_index < PSI_CHUNK_LIMIT);
            }
            carry.extend_from_slice(&chunk[whole..filled]);
            chunk_index += 1;
            if whole == 0 && filled < packet_size {
                break;
            }
        }

        demux.finish(clpi_order);
        Ok(())
    }
}

/// The working state of one scan; borrows the file and targets so the
/// per-packet path stays free of lookups into `self`.
struct Demux<'a> {
    file: &'a mut StreamFile,
    targets: &'a mut [DemuxTarget],
    cursor: Option<ClipCursor>,
    states: HashMap<u16, PacketState>,
    observed: Vec<u16>,
    pmt_order: Vec<u16>,
    pmt_pids: Vec<u16>,
    first_dts: Option<u64>,
    last_dts: Option<u64>,
    sync_offset: usize,
}

impl<'a> Demux<'a> {
    fn process_packet(&mut self, packet: &[u8], collect_psi: bool) {
        let ts = &packet[self.sync_offset..];
        if ts.len() < 4 || ts[0] != 0x47 {
            return;
        }
        let pid = ((ts[1] as u16 & 0x1F) << 8) | ts[2] as u16;
        let payload_unit_start = ts[1] & 0x40 != 0;
        let adaptation = (ts[3] >> 4) & 0x03;

        let payload = match adaptation {
            1 => &ts[4..],
            3 => {
                let af_length = ts[4] as usize;
                if 5 + af_length >= ts.len() {
                    return;
                }
                &ts[5 + af_length..]
            }
            _ => return, // no payload
        };

        if pid == PAT_PID {
            if collect_psi && payload_unit_start {
                self.parse_pat(payload);
            }
            return;
        }
        if self.pmt_pids.contains(&pid) {
            if collect_psi && payload_unit_start {
                self.parse_pmt(payload);
            }
            return;
        }
        if pid == NULL_PID {
            return;
        }

        if !self.states.contains_key(&pid) {
            let stream_type = self
                .file
                .streams
                .get(&pid)
                .map(|s| s.stream_type())
                .unwrap_or(StreamType::Unknown);
            self.states.insert(pid, PacketState::new(stream_type));
            self.observed.push(pid);
        }

        let mut timestamps: Option<(Option<u64>, Option<u64>)> = None;
        {
            let state = self.states.get_mut(&pid).expect("state just inserted");
            state.window_bytes += payload.len() as u64;
            state.window_packets += 1;

            let mut payload = payload;
            if payload_unit_start && is_pes_start(payload, state.stream_type) {
                // A new transfer: hand the finished one to the HEVC tagger.
                if let Some(tags) = state.hevc_tags.as_mut() {
                    if !state.hevc_transfer.is_empty() {
                        tags.feed(&state.hevc_transfer);
                        if let Some(tag) = tags.take_tag() {
                            state.tag = Some(tag.to_string());
                        }
                        state.hevc_transfer.clear();
                    }
                }
                state.in_pes = true;
                state.pes_starts += 1;
                state.header_remaining = 9;
                state.header.clear();
                state.prefix_done = false;
                state.header_done = false;
                state.packet_remaining = None;
            }
            if !state.in_pes {
                return;
            }

            // Collect header bytes, possibly across packet boundaries.
            while state.header_remaining > 0 && !payload.is_empty() {
                let take = state.header_remaining.min(payload.len());
                state.header.extend_from_slice(&payload[..take]);
                payload = &payload[take..];
                state.header_remaining -= take;
                if state.header_remaining > 0 {
                    continue;
                }
                if !state.prefix_done {
                    state.prefix_done = true;
                    let header_extra = state.header[8] as usize;
                    let pes_length =
                        u16::from_be_bytes([state.header[4], state.header[5]]) as u64;
                    state.packet_remaining = if pes_length > 0 {
                        Some(pes_length.saturating_sub(3 + header_extra as u64))
                    } else {
                        None
                    };
                    if header_extra > 0 {
                        state.header_remaining = header_extra;
                    } else {
                        state.header_done = true;
                    }
                } else {
                    // Extension complete: pull the timestamps once.
                    state.header_done = true;
                    let flags = state.header[7] >> 6;
                    timestamps = Some(parse_timestamps(&state.header, flags));
                }
            }

            // Payload bytes past the header feed the captures.
            if state.header_done && !payload.is_empty() {
                let room = state.capture_capacity.saturating_sub(state.capture.len());
                state.capture.extend_from_slice(&payload[..room.min(payload.len())]);

                if state.hevc_tags.is_some() {
                    let room =
                        codec::VIDEO_BUFFER_CAPACITY.saturating_sub(state.hevc_transfer.len());
                    state
                        .hevc_transfer
                        .extend_from_slice(&payload[..room.min(payload.len())]);
                } else if state.stream_type.is_video() {
                    let room = TAG_WINDOW_CAPACITY.saturating_sub(state.tag_window.len());
                    state
                        .tag_window
                        .extend_from_slice(&payload[..room.min(payload.len())]);
                }

                if let Some(remaining) = state.packet_remaining.as_mut() {
                    *remaining = remaining.saturating_sub(payload.len() as u64);
                    if *remaining == 0 {
                        state.bounded_closed = true;
                        state.in_pes = false;
                    }
                }
            }
        }

        if let Some((pts, dts)) = timestamps {
            if let Some((current, previous)) = self.register_timestamps(pid, pts, dts) {
                self.flush_windows(current, previous);
            }
        }
    }

    /// Record PTS/DTS for one PES header. Returns `(current, previous)` when
    /// a video timestamp advanced past the previous one and the windows
    /// should flush.
    fn register_timestamps(
        &mut self,
        pid: u16,
        pts: Option<u64>,
        dts: Option<u64>,
    ) -> Option<(u64, u64)> {
        let state = self.states.get_mut(&pid)?;
        if let Some(dts) = dts {
            // The first DTS only seeds the baseline; it never extends the
            // derived length.
            if self.first_dts.is_none() {
                self.first_dts = Some(dts);
            } else if dts > self.first_dts.unwrap_or(0) {
                self.last_dts = Some(self.last_dts.map_or(dts, |l| l.max(dts)));
            }
        }
        if !state.stream_type.is_video() {
            return None;
        }
        let current = dts.or(pts)?;
        match state.dts_prev {
            None => {
                state.dts_prev = Some(current);
                None
            }
            Some(previous) if current > previous => {
                state.dts_prev = Some(current);
                Some((current, previous))
            }
            _ => None,
        }
    }

    /// Distribute every PID's window over the clip targets covering the
    /// current stream time, emit diagnostics, and reset the windows.
    fn flush_windows(&mut self, current: u64, previous: u64) {
        let stream_time = current as f64 / PES_CLOCK;
        let stream_interval = (current - previous) as f64 / PES_CLOCK;
        let cursor = self.cursor.as_mut().expect("cursor initialized in scan");
        let active = cursor.active_at(self.targets, stream_time).to_vec();

        for (&pid, state) in self.states.iter_mut() {
            if state.window_packets == 0 {
                continue;
            }
            let is_video = state.stream_type.is_video();
            let is_truehd = state.stream_type == StreamType::Ac3TrueHdAudio;

            // Non-HEVC video derives its tag from the window bytes; HEVC
            // tags were derived at transfer boundaries.
            if is_video && state.hevc_tags.is_none() {
                if let Some(tag) = window_frame_tag(state) {
                    state.tag = Some(tag.to_string());
                }
            }

            for &index in active.iter() {
                let target = &mut self.targets[index];
                target.clip_bytes += state.window_bytes;
                target.clip_packets += state.window_packets;
                if is_video {
                    target.clip_seconds += stream_interval;
                }
                let accum = target.streams.entry(pid).or_default();
                accum.payload_bytes += state.window_bytes;
                accum.packet_count += state.window_packets;
                if is_video {
                    accum.packet_seconds += stream_interval;
                    accum.active_bit_rate =
                        round_half_even(accum.payload_bytes as f64 * 8.0 / accum.packet_seconds);
                }
                if is_truehd {
                    // The AC-3 core rides the same PID; its constant rate is
                    // carved out of the TrueHD active rate.
                    let core_rate = self
                        .file
                        .streams
                        .get(&pid)
                        .and_then(|s| s.as_audio())
                        .and_then(|a| a.core.as_ref())
                        .map(|c| c.base.bit_rate)
                        .unwrap_or(0);
                    accum.active_bit_rate = accum.active_bit_rate.saturating_sub(core_rate);
                }
            }

            // File-level accumulation mirrors the per-clip one.
            if let Some(info) = self.file.streams.get_mut(&pid) {
                let base = info.base_mut();
                base.payload_bytes += state.window_bytes;
                base.packet_count += state.window_packets;
                if is_video {
                    base.packet_seconds += stream_interval;
                    base.active_bit_rate =
                        round_half_even(base.payload_bytes as f64 * 8.0 / base.packet_seconds);
                }
            }

            self.file.diagnostics.entry(pid).or_default().push(DiagSample {
                marker: stream_time,
                interval: stream_interval,
                bytes: state.window_bytes,
                packets: state.window_packets,
                tag: state.tag.take(),
            });

            state.window_bytes = 0;
            state.window_packets = 0;
            if is_video && state.hevc_tags.is_none() {
                state.tag_window.clear();
            }
        }
    }

    fn parse_pat(&mut self, payload: &[u8]) {
        let Some(section) = psi_section(payload) else {
            return;
        };
        // Program entries follow the 5 fixed section bytes, trailing CRC.
        let entries = &section[5..section.len().saturating_sub(4)];
        for entry in entries.chunks_exact(4) {
            let program = u16::from_be_bytes([entry[0], entry[1]]);
            let pid = ((entry[2] as u16 & 0x1F) << 8) | entry[3] as u16;
            if program != 0 && !self.pmt_pids.contains(&pid) {
                log::trace!("{}: PAT maps program {} to PID {:04X}", self.file.name, program, pid);
                self.pmt_pids.push(pid);
            }
        }
    }

    fn parse_pmt(&mut self, payload: &[u8]) {
        let Some(section) = psi_section(payload) else {
            return;
        };
        if section.len() < 9 {
            return;
        }
        let program_info_length =
            (u16::from_be_bytes([section[7], section[8]]) & 0x0FFF) as usize;
        let mut offset = 9 + program_info_length;
        let end = section.len().saturating_sub(4);
        while offset + 5 <= end {
            let stream_type = section[offset];
            let pid = ((section[offset + 1] as u16 & 0x1F) << 8) | section[offset + 2] as u16;
            let es_info_length =
                (u16::from_be_bytes([section[offset + 3], section[offset + 4]]) & 0x0FFF) as usize;
            offset += 5 + es_info_length;
            if !self.pmt_order.contains(&pid) {
                self.pmt_order.push(pid);
                // PMT is the only source of a coding type for PIDs the clip
                // info does not declare.
                self.file
                    .streams
                    .entry(pid)
                    .or_insert_with(|| StreamInfo::new(pid, StreamType::from_code(stream_type)));
            }
        }
    }

    /// Final passes: derived length, codec probes, stream-order merge.
    fn finish(&mut self, clpi_order: &[u16]) {
        if let (Some(first), Some(last)) = (self.first_dts, self.last_dts) {
            self.file.length = (last.saturating_sub(first)) as f64 / PES_CLOCK;
        }

        for (pid, state) in self.states.drain() {
            let complete = state.capture_complete();
            if complete {
                if let Some(info) = self.file.streams.get_mut(&pid) {
                    codec::probe_stream(&state.capture, info);
                }
            }
            codec::release_buffer(state.capture);
        }

        // StreamOrder: PMT order, then observed order, then CLPI order, then
        // any remaining PIDs ascending - each PID exactly once.
        let mut order: Vec<u16> = Vec::new();
        for pid in self
            .pmt_order
            .iter()
            .chain(self.observed.iter())
            .chain(clpi_order.iter())
        {
            if self.file.streams.contains_key(pid) && !order.contains(pid) {
                order.push(*pid);
            }
        }
        for pid in self.file.streams.keys() {
            if !order.contains(pid) {
                order.push(*pid);
            }
        }
        self.file.stream_order = order;
    }
}

/// A payload is a PES start only when it opens with the packet-start prefix,
/// and for video the stream id must be a video or extended id.
fn is_pes_start(payload: &[u8], stream_type: StreamType) -> bool {
    if payload.len() < 4 || payload[0] != 0 || payload[1] != 0 || payload[2] != 1 {
        return false;
    }
    if stream_type.is_video() {
        let stream_id = payload[3];
        return stream_id == 0xFD || (0xE0..=0xEF).contains(&stream_id);
    }
    true
}

/// Decode the 33-bit timestamps out of a completed PES header extension.
/// Zero-valued timestamps are treated as absent.
fn parse_timestamps(header: &[u8], flags: u8) -> (Option<u64>, Option<u64>) {
    let read33 = |bytes: &[u8]| -> Option<u64> {
        if bytes.len() < 5 {
            return None;
        }
        let value = ((bytes[0] as u64 >> 1) & 0x07) << 30
            | (bytes[1] as u64) << 22
            | ((bytes[2] as u64) >> 1) << 15
            | (bytes[3] as u64) << 7
            | (bytes[4] as u64) >> 1;
        (value != 0).then_some(value)
    };
    match flags {
        0b10 => (header.get(9..14).and_then(read33), None),
        0b11 => (
            header.get(9..14).and_then(read33),
            header.get(14..19).and_then(read33),
        ),
        _ => (None, None),
    }
}

/// Strip the pointer field and return the section bytes.
fn psi_section(payload: &[u8]) -> Option<&[u8]> {
    let pointer = *payload.first()? as usize;
    let section = payload.get(1 + pointer..)?;
    if section.len() < 3 {
        return None;
    }
    let length = (u16::from_be_bytes([section[1], section[2]]) & 0x0FFF) as usize;
    section.get(3..3 + length)
}

fn window_frame_tag(state: &PacketState) -> Option<&'static str> {
    match state.stream_type {
        StreamType::AvcVideo | StreamType::MvcVideo => codec::avc::frame_type(&state.tag_window),
        StreamType::Vc1Video => codec::vc1::frame_type(&state.tag_window, false),
        StreamType::Mpeg1Video | StreamType::Mpeg2Video => {
            codec::mpeg2::frame_type(&state.tag_window)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::{BdFileSystem, DirEntry};
    use std::collections::HashMap as StdHashMap;

    /// A filesystem over an in-memory file map.
    struct MemFs {
        files: StdHashMap<String, Vec<u8>>,
    }

    impl BdFileSystem for MemFs {
        fn open_read(&self, path: &str) -> Result<Box<dyn std::io::Read + Send>, BdInfoError> {
            self.files
                .get(path)
                .map(|d| Box::new(std::io::Cursor::new(d.clone())) as Box<dyn std::io::Read + Send>)
                .ok_or_else(|| BdInfoError::IoError(format!("{} missing", path)))
        }
        fn list_dir(&self, _path: &str) -> Result<Vec<DirEntry>, BdInfoError> {
            Ok(Vec::new())
        }
        fn stat_file(&self, path: &str) -> Result<u64, BdInfoError> {
            Ok(self.files.get(path).map(|d| d.len() as u64).unwrap_or(0))
        }
    }

    fn ts33(value: u64, marker: u8) -> [u8; 5] {
        [
            (marker << 4) | (((value >> 30) as u8 & 0x07) << 1) | 1,
            (value >> 22) as u8,
            (((value >> 15) as u8) << 1) | 1,
            (value >> 7) as u8,
            ((value as u8) << 1) | 1,
        ]
    }

    /// Build one 192-byte BDAV packet with a PES start carrying timestamps.
    fn pes_packet(pid: u16, pts: Option<u64>, dts: Option<u64>, payload: &[u8]) -> Vec<u8> {
        let mut ts = vec![0u8; 4]; // arrival timestamp
        ts.push(0x47);
        ts.push(0x40 | (pid >> 8) as u8);
        ts.push(pid as u8);
        ts.push(0x10); // payload only
        let mut pes = vec![0x00, 0x00, 0x01, 0xE0];
        let flags: u8 = match (pts, dts) {
            (Some(_), Some(_)) => 0b11,
            (Some(_), None) => 0b10,
            _ => 0,
        };
        let extra: usize = match flags {
            0b11 => 10,
            0b10 => 5,
            _ => 0,
        };
        let pes_length = (3 + extra + payload.len()) as u16;
        pes.extend_from_slice(&pes_length.to_be_bytes());
        pes.push(0x80);
        pes.push(flags << 6);
        pes.push(extra as u8);
        if let Some(p) = pts {
            pes.extend_from_slice(&ts33(p, if flags == 0b11 { 0b0011 } else { 0b0010 }));
        }
        if let Some(d) = dts {
            pes.extend_from_slice(&ts33(d, 0b0001));
        }
        pes.extend_from_slice(payload);
        ts.extend_from_slice(&pes);
        ts.resize(192, 0xFF);
        ts
    }

    fn file_with(packets: &[Vec<u8>]) -> (MemFs, StreamFile) {
        let data: Vec<u8> = packets.iter().flatten().copied().collect();
        let mut files = StdHashMap::new();
        files.insert("BDMV/STREAM/00001.M2TS".to_string(), data.clone());
        let mut file = StreamFile::new("00001.M2TS", "BDMV/STREAM/00001.M2TS", data.len() as u64);
        file.streams
            .insert(0x1011, StreamInfo::new(0x1011, StreamType::AvcVideo));
        (MemFs { files }, file)
    }

    #[test]
    fn test_duration_needs_two_dts() {
        // One DTS seeds the baseline; a later PTS-only timestamp must not
        // extend the duration.
        let packets = vec![
            pes_packet(0x1011, Some(2000), Some(2000), &[0u8; 32]),
            pes_packet(0x1011, Some(3000), None, &[0u8; 32]),
        ];
        let (fs, mut file) = file_with(&packets);
        let mut targets = vec![DemuxTarget::new("00001.MPLS", 0, 0.0, 600.0)];
        file.scan(&fs, &mut targets, &[], &ScanSettings::default())
            .unwrap();
        assert_eq!(file.length, 0.0);
    }

    #[test]
    fn test_duration_from_dts_pair() {
        let packets = vec![
            pes_packet(0x1011, Some(90_000), Some(90_000), &[0u8; 32]),
            pes_packet(0x1011, Some(270_000), Some(270_000), &[0u8; 32]),
        ];
        let (fs, mut file) = file_with(&packets);
        let mut targets = vec![DemuxTarget::new("00001.MPLS", 0, 0.0, 600.0)];
        file.scan(&fs, &mut targets, &[], &ScanSettings::default())
            .unwrap();
        assert!((file.length - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_flush_accumulates_into_covering_clip() {
        let packets = vec![
            pes_packet(0x1011, Some(90_000), Some(90_000), &[0u8; 32]),
            pes_packet(0x1011, Some(180_000), Some(180_000), &[0u8; 32]),
        ];
        let (fs, mut file) = file_with(&packets);
        let mut targets = vec![
            DemuxTarget::new("A.MPLS", 0, 0.0, 600.0),
            DemuxTarget::new("B.MPLS", 0, 500.0, 900.0), // not covering t=2
        ];
        file.scan(&fs, &mut targets, &[], &ScanSettings::default())
            .unwrap();
        assert!(targets[0].clip_bytes > 0);
        assert_eq!(targets[0].clip_packets, 2);
        assert!((targets[0].clip_seconds - 1.0).abs() < 1e-9);
        assert_eq!(targets[1].clip_bytes, 0);
        let accum = &targets[0].streams[&0x1011];
        assert!(accum.active_bit_rate > 0);
        // Diagnostics recorded one sample at the flush.
        assert_eq!(file.diagnostics[&0x1011].len(), 1);
        let sample = &file.diagnostics[&0x1011][0];
        assert!((sample.marker - 2.0).abs() < 1e-9);
        assert!((sample.interval - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_open_transfer_never_probes() {
        // One unbounded PES transfer that never closes: the capture is not
        // complete, so the codec probe must not run even though the payload
        // carries a perfectly good SPS.
        let sps = [0u8, 0, 1, 0x67, 100, 0x00, 41];
        let mut packet = pes_packet(0x1011, Some(90_000), Some(90_000), &sps);
        packet[12] = 0; // pes_packet_length = 0 marks the transfer unbounded
        packet[13] = 0;
        let (fs, mut file) = file_with(&[packet]);
        let mut targets = vec![DemuxTarget::new("00001.MPLS", 0, 0.0, 600.0)];
        file.scan(&fs, &mut targets, &[], &ScanSettings::default())
            .unwrap();
        assert!(!file.streams[&0x1011].base().is_initialized);
    }

    #[test]
    fn test_bad_sync_detected() {
        let mut files = StdHashMap::new();
        files.insert("BDMV/STREAM/00001.M2TS".to_string(), vec![0u8; 384]);
        let fs = MemFs { files };
        let mut file = StreamFile::new("00001.M2TS", "BDMV/STREAM/00001.M2TS", 384);
        let err = file
            .scan(&fs, &mut [], &[], &ScanSettings::default())
            .unwrap_err();
        assert!(matches!(err, BdInfoError::BadSync));
    }

    #[test]
    fn test_pat_pmt_order_leads_stream_order() {
        // PAT maps program 1 -> PMT PID 0x100; PMT declares 0x1100 before
        // 0x1011 even though 0x1011 appears first in the stream.
        let mut pat_section = vec![0x00u8]; // pointer
        pat_section.extend_from_slice(&[0x00, 0xB0, 0x0D]); // table id + length 13
        pat_section.extend_from_slice(&[0x00, 0x01, 0xC1, 0x00, 0x00]);
        pat_section.extend_from_slice(&[0x00, 0x01, 0xE1, 0x00]); // program 1 -> 0x100
        pat_section.extend_from_slice(&[0, 0, 0, 0]); // crc

        let mut pat = vec![0u8; 4];
        pat.push(0x47);
        pat.push(0x40);
        pat.push(0x00);
        pat.push(0x10);
        pat.extend_from_slice(&pat_section);
        pat.resize(192, 0xFF);

        let mut pmt_section = vec![0x00u8];
        pmt_section.extend_from_slice(&[0x02, 0xB0, 0x17]); // table id + length 23
        pmt_section.extend_from_slice(&[0x00, 0x01, 0xC1, 0x00, 0x00]);
        pmt_section.extend_from_slice(&[0xE1, 0x11, 0xF0, 0x00]); // pcr pid + no program info
        pmt_section.extend_from_slice(&[0x86, 0xF1, 0x00, 0xF0, 0x00]); // DTS-HD MA on 0x1100
        pmt_section.extend_from_slice(&[0x1B, 0xF0, 0x11, 0xF0, 0x00]); // AVC on 0x1011
        pmt_section.extend_from_slice(&[0, 0, 0, 0]); // crc

        let mut pmt = vec![0u8; 4];
        pmt.push(0x47);
        pmt.push(0x41);
        pmt.push(0x00);
        pmt.push(0x10);
        pmt.extend_from_slice(&pmt_section);
        pmt.resize(192, 0xFF);

        let packets = vec![
            pat,
            pmt,
            pes_packet(0x1011, Some(90_000), Some(90_000), &[0u8; 16]),
            pes_packet(0x1011, Some(180_000), Some(180_000), &[0u8; 16]),
        ];
        let (fs, mut file) = file_with(&packets);
        let mut targets = vec![DemuxTarget::new("A.MPLS", 0, 0.0, 600.0)];
        file.scan(&fs, &mut targets, &[], &ScanSettings::default())
            .unwrap();
        assert_eq!(file.stream_order, vec![0x1100, 0x1011]);
        // Every PID in the stream map appears exactly once.
        for pid in file.streams.keys() {
            assert_eq!(file.stream_order.iter().filter(|p| *p == pid).count(), 1);
        }
    }
}
