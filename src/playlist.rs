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

//! `.mpls` playlist parsing and cross-linking.
//!
//! A playlist sequences stream clips into one logical playback, carries
//! chapter marks, and declares which elementary streams are selectable. After
//! parsing, [`PlaylistFile::link_clips`] resolves each play item against the
//! disc's clip-info and stream-file maps and seeds the playlist's canonical
//! stream map from its reference clip.

use std::collections::{BTreeMap, HashSet};

use crate::{
    clipinfo::StreamClipFile,
    settings::ScanSettings,
    stream::{
        sample_rate_from_code, AspectRatio, AudioInfo, ChannelLayout, FrameRate, StreamInfo,
        StreamType, VideoFormat,
    },
    streamfile::StreamFile,
    util::BeReader,
    BdInfoError, PLAYLIST_CLOCK,
};

const MPLS_MAGICS: [&[u8; 8]; 3] = [b"MPLS0100", b"MPLS0200", b"MPLS0300"];

/// The MVC dependent-view video stream rides on this PID inside SSIF
/// interleaves.
pub const MVC_DEPENDENT_PID: u16 = 4114;

/// Chapters this close to the end of the playlist are dropped.
const CHAPTER_END_GUARD_SECONDS: f64 = 1.0;

/// An interval selector into a stream file: one play item (or one angle of
/// one play item) of a playlist.
#[derive(Debug, Clone, Default)]
pub struct StreamClip {
    /// Upper-case stream file name, e.g. `00001.M2TS`.
    pub name: String,
    /// Upper-case clip-info name, e.g. `00001.CLPI`.
    pub clip_name: String,
    /// Key into the disc's stream-file map; `None` when the M2TS is absent
    /// (the clip still carries its time bounds).
    pub stream_file: Option<String>,
    /// 0 = main path, >0 = alternate angle.
    pub angle_index: usize,
    pub time_in: f64,
    pub time_out: f64,
    pub relative_time_in: f64,
    pub length: f64,
    /// Size of the backing stream file, filled in during cross-linking.
    pub file_size: u64,
    pub interleaved_file_size: u64,
    /// Demux accumulators for this clip's interval.
    pub payload_bytes: u64,
    pub packet_count: u64,
    pub packet_seconds: f64,
}

impl StreamClip {
    pub fn relative_time_out(&self) -> f64 {
        self.relative_time_in + self.length
    }

    /// Observed packet bitrate over the clip interval, bits per second.
    pub fn packet_bit_rate(&self) -> u64 {
        if self.packet_seconds > 0.0 {
            crate::util::round_half_even(self.payload_bytes as f64 * 8.0 / self.packet_seconds)
        } else {
            0
        }
    }
}

/// An in-memory `.mpls` file and, after linking, its slice of the stream
/// graph.
#[derive(Debug, Clone, Default)]
pub struct PlaylistFile {
    /// Upper-case file name, e.g. `00001.MPLS`.
    pub name: String,
    pub size: u64,
    pub mvc_base_view_r: bool,
    pub has_hidden_tracks: bool,
    pub has_loops: bool,
    /// Number of alternate angles beyond the main path.
    pub angle_count: usize,
    pub stream_clips: Vec<StreamClip>,
    /// Chapter positions in seconds, relative to the playlist start.
    pub chapters: Vec<f64>,
    /// Canonical per-PID stream map (always clones, never shared).
    pub streams: BTreeMap<u16, StreamInfo>,
    /// Streams declared by the playlist's stream-number table, in declared
    /// order. Used to seed hidden-track detection during linking.
    pub declared_streams: Vec<StreamInfo>,
    /// Per-category ordered views into `streams`.
    pub video_pids: Vec<u16>,
    pub audio_pids: Vec<u16>,
    pub graphics_pids: Vec<u16>,
    pub text_pids: Vec<u16>,
    /// Raw chapter records kept until linking computes relative times.
    pub(crate) chapter_marks: Vec<(u16, f64)>,
}

impl PlaylistFile {
    pub fn parse(name: &str, data: &[u8]) -> Result<PlaylistFile, BdInfoError> {
        if data.len() < 0x40 || !MPLS_MAGICS.iter().any(|m| &data[..8] == &m[..]) {
            return Err(BdInfoError::BadMagic(name.to_string()));
        }

        let mut playlist = PlaylistFile {
            name: name.to_string(),
            size: data.len() as u64,
            ..Default::default()
        };

        let mut r = BeReader::new(data);
        r.seek(8)?;
        let playlist_offset = r.u32()? as usize;
        let chapters_offset = r.u32()? as usize;

        playlist.mvc_base_view_r = data[0x38] & 0x10 != 0;

        r.seek(playlist_offset)?;
        let _list_length = r.u32()?;
        r.skip(2)?;
        let item_count = r.u16()?;

        let mut relative_time = 0.0f64;
        for _ in 0..item_count {
            let item_start = r.pos();
            let item_length = r.u16()? as usize;
            let item_name = r.string(5)?;
            let _item_type = r.string(4)?;

            r.skip(1)?;
            let packed = r.u8()?;
            let multi_angle = packed & 0x10 != 0;
            r.skip(1)?;

            // In/out times are 45 kHz ticks stored as signed 32-bit values;
            // negative values have the sign bit cleared and parsing continues.
            let time_in = clock_seconds(r.i32()?);
            let time_out = clock_seconds(r.i32()?);
            r.skip(12)?;

            let mut clip = StreamClip {
                name: format!("{}.M2TS", item_name.to_uppercase()),
                clip_name: format!("{}.CLPI", item_name.to_uppercase()),
                angle_index: 0,
                time_in,
                time_out,
                relative_time_in: relative_time,
                length: time_out - time_in,
                ..Default::default()
            };
            relative_time += clip.length;
            playlist.stream_clips.push(clip.clone());

            if multi_angle {
                let angles = r.u8()? as usize;
                r.skip(1)?;
                for angle in 1..angles {
                    let angle_name = r.string(5)?;
                    let _angle_type = r.string(4)?;
                    r.skip(1)?;
                    clip.name = format!("{}.M2TS", angle_name.to_uppercase());
                    clip.clip_name = format!("{}.CLPI", angle_name.to_uppercase());
                    clip.angle_index = angle;
                    playlist.stream_clips.push(clip.clone());
                }
                if angles > 0 {
                    playlist.angle_count = playlist.angle_count.max(angles - 1);
                }
            }

            let _stream_info_length = r.u16()?;
            r.skip(2)?;
            let mut counts = [0u8; 7];
            for c in counts.iter_mut() {
                *c = r.u8()?;
            }
            r.skip(5)?;

            for &count in counts.iter() {
                for _ in 0..count {
                    if let Some(info) = parse_playlist_stream(&mut r)? {
                        playlist.declared_streams.push(info);
                    }
                }
            }

            r.seek(item_start + item_length + 2)?;
        }

        // Chapter records are retained raw until linking, but the offsets are
        // validated now so a bad chapter block fails the parse.
        r.seek(chapters_offset + 4)?;
        let chapter_count = r.u16()?;
        for _ in 0..chapter_count {
            let record = r.take(14)?;
            let mark_type = record[1];
            if mark_type != 1 {
                continue;
            }
            let item_index = u16::from_be_bytes([record[2], record[3]]);
            let ticks = i32::from_be_bytes([record[4], record[5], record[6], record[7]]);
            playlist
                .chapter_marks
                .push((item_index, clock_seconds(ticks)));
        }

        Ok(playlist)
    }

    /// Resolve play items against the disc maps, seed the canonical stream
    /// map from the reference clip, and normalize chapters.
    ///
    /// A play item whose clip-info file is missing fails the whole playlist;
    /// a missing stream file leaves the clip stream-less but timed.
    pub fn link_clips(
        &mut self,
        stream_files: &BTreeMap<String, StreamFile>,
        clip_files: &BTreeMap<String, StreamClipFile>,
        settings: &ScanSettings,
    ) -> Result<(), BdInfoError> {
        for clip in self.stream_clips.iter_mut() {
            if !clip_files.contains_key(&clip.clip_name) {
                return Err(BdInfoError::MissingClip(clip.clip_name.clone()));
            }
            match stream_files.get(&clip.name) {
                Some(file) => {
                    clip.stream_file = Some(clip.name.clone());
                    clip.file_size = file.size;
                    clip.interleaved_file_size = file.interleaved_size;
                }
                None => {
                    log::warn!(
                        "{}: stream file {} is missing, clip keeps time bounds only",
                        self.name,
                        clip.name
                    );
                    clip.stream_file = None;
                }
            }
        }

        // The reference clip is the one declaring the most streams, provided
        // it covers more than 1% of the playlist.
        let total_length = self.total_length();
        let mut reference: Option<&StreamClip> = None;
        let mut reference_count = 0usize;
        for clip in self.stream_clips.iter().filter(|c| c.angle_index == 0) {
            let clip_file = &clip_files[&clip.clip_name];
            let share = if total_length > 0.0 {
                clip.length / total_length
            } else {
                0.0
            };
            if clip_file.streams.len() > reference_count && share > 0.01 {
                reference_count = clip_file.streams.len();
                reference = Some(clip);
            }
        }
        let reference = reference.or_else(|| self.stream_clips.first());

        self.streams.clear();
        if let Some(reference) = reference {
            let clip_file = &clip_files[&reference.clip_name];
            for (pid, info) in clip_file.streams.iter() {
                self.streams.insert(*pid, info.clone());
            }

            if settings.enable_ssif {
                if let Some(file) = reference.stream_file.as_ref().and_then(|n| stream_files.get(n))
                {
                    if file.interleaved_file.is_some() {
                        if let Some(mvc) = clip_file.streams.get(&MVC_DEPENDENT_PID) {
                            self.streams.insert(MVC_DEPENDENT_PID, mvc.clone());
                        }
                    }
                }
            }
        }

        // Playlist-declared streams the reference clip does not carry are
        // selectable but invisible to the demuxer: mark them hidden.
        for declared in self.declared_streams.clone() {
            let pid = declared.pid();
            match self.streams.get_mut(&pid) {
                Some(existing) => {
                    if existing.base().language_code.is_empty()
                        && !declared.base().language_code.is_empty()
                    {
                        existing.base_mut().language_code =
                            declared.base().language_code.clone();
                    }
                }
                None => {
                    let mut hidden = declared.clone();
                    hidden.base_mut().is_hidden = true;
                    self.has_hidden_tracks = true;
                    self.streams.insert(pid, hidden);
                }
            }
        }

        self.rebuild_category_views(settings);
        self.normalize_chapters();
        Ok(())
    }

    /// Mark the playlist as looping when two clips share `(name, time-in)`.
    pub fn detect_loops(&mut self) {
        let mut seen: HashSet<(String, u64)> = HashSet::new();
        for clip in self.stream_clips.iter().filter(|c| c.angle_index == 0) {
            let key = (clip.name.clone(), clip.time_in.to_bits());
            if !seen.insert(key) {
                self.has_loops = true;
                return;
            }
        }
    }

    /// Convert chapter marks to playlist-relative seconds and drop marks
    /// within one second of the playlist end.
    fn normalize_chapters(&mut self) {
        let total = self.total_length();
        let clips: Vec<&StreamClip> = self
            .stream_clips
            .iter()
            .filter(|c| c.angle_index == 0)
            .collect();
        self.chapters.clear();
        for &(item_index, seconds) in self.chapter_marks.iter() {
            let Some(clip) = clips.get(item_index as usize) else {
                continue;
            };
            let relative = seconds - clip.time_in + clip.relative_time_in;
            if relative > total - CHAPTER_END_GUARD_SECONDS {
                continue;
            }
            self.chapters.push(relative);
        }
        self.chapters
            .sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    }

    /// Seconds of main-path playback.
    pub fn total_length(&self) -> f64 {
        self.stream_clips
            .iter()
            .filter(|c| c.angle_index == 0)
            .map(|c| c.length)
            .sum()
    }

    /// Seconds of playback including alternate angles.
    pub fn total_angle_length(&self) -> f64 {
        self.stream_clips.iter().map(|c| c.length).sum()
    }

    pub fn total_size(&self) -> u64 {
        self.stream_clips
            .iter()
            .filter(|c| c.angle_index == 0)
            .map(|c| c.file_size)
            .sum()
    }

    pub fn total_angle_size(&self) -> u64 {
        self.stream_clips.iter().map(|c| c.file_size).sum()
    }

    /// Mean bitrate over the whole playlist, bits per second.
    pub fn total_bit_rate(&self) -> u64 {
        let length = self.total_length();
        if length > 0.0 {
            crate::util::round_half_even(self.total_size() as f64 * 8.0 / length)
        } else {
            0
        }
    }

    pub fn is_valid(&self, settings: &ScanSettings) -> bool {
        if self.stream_clips.is_empty() || self.streams.is_empty() {
            return false;
        }
        if settings.filter_short_playlists
            && self.total_length() < settings.filter_short_playlists_val as f64
        {
            return false;
        }
        if settings.filter_looping_playlists && self.has_loops {
            return false;
        }
        true
    }

    pub fn video_streams(&self) -> impl Iterator<Item = &StreamInfo> {
        self.video_pids.iter().filter_map(|pid| self.streams.get(pid))
    }

    pub fn audio_streams(&self) -> impl Iterator<Item = &StreamInfo> {
        self.audio_pids.iter().filter_map(|pid| self.streams.get(pid))
    }

    pub fn graphics_streams(&self) -> impl Iterator<Item = &StreamInfo> {
        self.graphics_pids.iter().filter_map(|pid| self.streams.get(pid))
    }

    pub fn text_streams(&self) -> impl Iterator<Item = &StreamInfo> {
        self.text_pids.iter().filter_map(|pid| self.streams.get(pid))
    }

    /// Rebuild the ordered per-category views, applying the report sort
    /// unless the caller asked to keep declaration order.
    pub fn rebuild_category_views(&mut self, settings: &ScanSettings) {
        self.video_pids.clear();
        self.audio_pids.clear();
        self.graphics_pids.clear();
        self.text_pids.clear();

        for (pid, info) in self.streams.iter() {
            match info {
                StreamInfo::Video(_) => self.video_pids.push(*pid),
                StreamInfo::Audio(_) => self.audio_pids.push(*pid),
                StreamInfo::Graphics(_) => self.graphics_pids.push(*pid),
                StreamInfo::Text(_) => self.text_pids.push(*pid),
                StreamInfo::Unknown(_) => {}
            }
        }

        if settings.keep_stream_order {
            return;
        }

        let streams = &self.streams;
        self.audio_pids.sort_by(|a, b| {
            let (a, b) = (&streams[a], &streams[b]);
            compare_audio(a.as_audio().unwrap(), b.as_audio().unwrap())
        });
        let by_language = |a: &u16, b: &u16| {
            let (a, b) = (&streams[a], &streams[b]);
            language_rank(a.base().language_code.as_str())
                .cmp(&language_rank(b.base().language_code.as_str()))
                .then_with(|| a.base().language_name().cmp(b.base().language_name()))
                .then_with(|| a.pid().cmp(&b.pid()))
        };
        self.graphics_pids.sort_by(by_language);
        self.text_pids.sort_by(by_language);
    }
}

fn clock_seconds(raw: i32) -> f64 {
    let ticks = if raw < 0 { raw as u32 & 0x7FFF_FFFF } else { raw as u32 };
    ticks as f64 / PLAYLIST_CLOCK
}

/// English sorts before every other language.
fn language_rank(code: &str) -> u8 {
    if code == "eng" {
        0
    } else {
        1
    }
}

/// The audio sort: more channels first, then codec preference, then English
/// streams by ascending PID, then language name, then PID.
fn compare_audio(a: &AudioInfo, b: &AudioInfo) -> std::cmp::Ordering {
    let channels = |s: &AudioInfo| s.channel_count + s.lfe;
    channels(b)
        .cmp(&channels(a))
        .then_with(|| audio_type_rank(b.base.stream_type).cmp(&audio_type_rank(a.base.stream_type)))
        .then_with(|| {
            language_rank(&a.base.language_code).cmp(&language_rank(&b.base.language_code))
        })
        .then_with(|| {
            if a.base.language_code == b.base.language_code {
                std::cmp::Ordering::Equal
            } else {
                a.base.language_name().cmp(b.base.language_name())
            }
        })
        .then_with(|| a.base.pid.cmp(&b.base.pid))
}

/// Relative codec preference used by the audio sort; higher is better.
fn audio_type_rank(stream_type: StreamType) -> u8 {
    match stream_type {
        StreamType::DtsHdMasterAudio => 12,
        StreamType::Ac3TrueHdAudio => 11,
        StreamType::LpcmAudio => 10,
        StreamType::DtsHdAudio => 9,
        StreamType::DtsAudio => 8,
        StreamType::Ac3PlusAudio => 7,
        StreamType::Ac3Audio => 6,
        StreamType::Mpeg4AacAudio => 5,
        StreamType::Mpeg2AacAudio => 4,
        StreamType::Mpeg2Audio => 3,
        StreamType::Mpeg1Audio => 2,
        StreamType::Ac3PlusSecondaryAudio | StreamType::DtsHdSecondaryAudio => 1,
        _ => 0,
    }
}

/// Read one stream-number-table entry. The header encodes the PID one of four
/// ways; the attribute block mirrors the clip-info layout.
fn parse_playlist_stream(r: &mut BeReader) -> Result<Option<StreamInfo>, BdInfoError> {
    let header_length = r.u8()? as usize;
    let header_start = r.pos();
    let header_type = r.u8()?;
    let pid = match header_type {
        1 => r.u16()?,
        2 => {
            r.skip(2)?;
            r.u16()?
        }
        3 => {
            r.skip(1)?;
            r.u16()?
        }
        4 => {
            r.skip(2)?;
            r.u16()?
        }
        other => {
            log::debug!("unknown stream entry header type {}", other);
            r.seek(header_start + header_length)?;
            // The attribute block still has to be consumed.
            let attr_length = r.u8()? as usize;
            r.skip(attr_length)?;
            return Ok(None);
        }
    };
    r.seek(header_start + header_length)?;

    let attr_length = r.u8()? as usize;
    let attr_start = r.pos();
    let stream_type = StreamType::from_code(r.u8()?);
    let mut info = StreamInfo::new(pid, stream_type);

    if stream_type.is_video() {
        let packed = r.u8()?;
        let format = VideoFormat::from_code(packed >> 4);
        let video = info.as_video_mut().expect("video arm");
        video.height = format.height();
        video.is_interlaced = format.is_interlaced();
        video.frame_rate = FrameRate::from_code(packed & 0x0F);
        let (num, den) = video.frame_rate.fraction();
        video.frame_rate_enumerator = num;
        video.frame_rate_denominator = den;
    } else if stream_type.is_audio() {
        let packed = r.u8()?;
        let language = r.string(3)?;
        let audio = info.as_audio_mut().expect("audio arm");
        audio.channel_layout = ChannelLayout::from_code(packed >> 4);
        audio.sample_rate = sample_rate_from_code(packed & 0x0F);
        audio.base.language_code = language;
    } else if stream_type.is_graphics() {
        info.base_mut().language_code = r.string(3)?;
    } else if stream_type.is_text() {
        let character_code = r.u8()?;
        let language = r.string(3)?;
        if let StreamInfo::Text(text) = &mut info {
            text.character_code = character_code;
            text.base.language_code = language;
        }
    }

    r.seek(attr_start + attr_length)?;
    Ok(Some(info))
}
