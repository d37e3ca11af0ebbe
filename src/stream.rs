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

//! The elementary-stream model.
//!
//! Every PID on the disc is described by a [`StreamInfo`]: a tagged enum whose
//! arm carries category-specific parameters on top of a shared [`StreamBase`].
//! Clip-info files declare a first approximation; the demuxer and codec probes
//! refine it; playlists hold their own clones so per-playlist bitrate state
//! never leaks between playlists.

use std::collections::BTreeSet;

use strum::Display;

use crate::language;

/// Elementary stream coding types as carried in CLPI/MPLS stream attributes
/// and PMT entries.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum StreamType {
    #[default]
    #[strum(serialize = "Unknown")]
    Unknown,
    #[strum(serialize = "MPEG-1 Video")]
    Mpeg1Video,
    #[strum(serialize = "MPEG-2 Video")]
    Mpeg2Video,
    #[strum(serialize = "MPEG-4 AVC Video")]
    AvcVideo,
    #[strum(serialize = "MPEG-4 MVC Video")]
    MvcVideo,
    #[strum(serialize = "MPEG-H HEVC Video")]
    HevcVideo,
    #[strum(serialize = "VC-1 Video")]
    Vc1Video,
    #[strum(serialize = "MPEG-1 Audio")]
    Mpeg1Audio,
    #[strum(serialize = "MPEG-2 Audio")]
    Mpeg2Audio,
    #[strum(serialize = "MPEG-2 AAC Audio")]
    Mpeg2AacAudio,
    #[strum(serialize = "MPEG-4 AAC Audio")]
    Mpeg4AacAudio,
    #[strum(serialize = "LPCM Audio")]
    LpcmAudio,
    #[strum(serialize = "Dolby Digital Audio")]
    Ac3Audio,
    #[strum(serialize = "Dolby Digital Plus Audio")]
    Ac3PlusAudio,
    #[strum(serialize = "Dolby Digital Plus Audio")]
    Ac3PlusSecondaryAudio,
    #[strum(serialize = "Dolby TrueHD Audio")]
    Ac3TrueHdAudio,
    #[strum(serialize = "DTS Audio")]
    DtsAudio,
    #[strum(serialize = "DTS-HD High-Res Audio")]
    DtsHdAudio,
    #[strum(serialize = "DTS Express")]
    DtsHdSecondaryAudio,
    #[strum(serialize = "DTS-HD Master Audio")]
    DtsHdMasterAudio,
    #[strum(serialize = "Presentation Graphics")]
    PresentationGraphics,
    #[strum(serialize = "Interactive Graphics")]
    InteractiveGraphics,
    #[strum(serialize = "Subtitle")]
    SubtitleText,
}

impl StreamType {
    pub fn from_code(code: u8) -> StreamType {
        match code {
            0x01 => StreamType::Mpeg1Video,
            0x02 => StreamType::Mpeg2Video,
            0x1B => StreamType::AvcVideo,
            0x20 => StreamType::MvcVideo,
            0x24 => StreamType::HevcVideo,
            0xEA => StreamType::Vc1Video,
            0x03 => StreamType::Mpeg1Audio,
            0x04 => StreamType::Mpeg2Audio,
            0x0F => StreamType::Mpeg2AacAudio,
            0x11 => StreamType::Mpeg4AacAudio,
            0x80 => StreamType::LpcmAudio,
            0x81 => StreamType::Ac3Audio,
            0x84 => StreamType::Ac3PlusAudio,
            0xA1 => StreamType::Ac3PlusSecondaryAudio,
            0x83 => StreamType::Ac3TrueHdAudio,
            0x82 => StreamType::DtsAudio,
            0x85 => StreamType::DtsHdAudio,
            0xA2 => StreamType::DtsHdSecondaryAudio,
            0x86 => StreamType::DtsHdMasterAudio,
            0x90 => StreamType::PresentationGraphics,
            0x91 => StreamType::InteractiveGraphics,
            0x92 => StreamType::SubtitleText,
            _ => StreamType::Unknown,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            StreamType::Unknown => 0x00,
            StreamType::Mpeg1Video => 0x01,
            StreamType::Mpeg2Video => 0x02,
            StreamType::AvcVideo => 0x1B,
            StreamType::MvcVideo => 0x20,
            StreamType::HevcVideo => 0x24,
            StreamType::Vc1Video => 0xEA,
            StreamType::Mpeg1Audio => 0x03,
            StreamType::Mpeg2Audio => 0x04,
            StreamType::Mpeg2AacAudio => 0x0F,
            StreamType::Mpeg4AacAudio => 0x11,
            StreamType::LpcmAudio => 0x80,
            StreamType::Ac3Audio => 0x81,
            StreamType::Ac3PlusAudio => 0x84,
            StreamType::Ac3PlusSecondaryAudio => 0xA1,
            StreamType::Ac3TrueHdAudio => 0x83,
            StreamType::DtsAudio => 0x82,
            StreamType::DtsHdAudio => 0x85,
            StreamType::DtsHdSecondaryAudio => 0xA2,
            StreamType::DtsHdMasterAudio => 0x86,
            StreamType::PresentationGraphics => 0x90,
            StreamType::InteractiveGraphics => 0x91,
            StreamType::SubtitleText => 0x92,
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(
            self,
            StreamType::Mpeg1Video
                | StreamType::Mpeg2Video
                | StreamType::AvcVideo
                | StreamType::MvcVideo
                | StreamType::HevcVideo
                | StreamType::Vc1Video
        )
    }

    pub fn is_audio(&self) -> bool {
        matches!(
            self,
            StreamType::Mpeg1Audio
                | StreamType::Mpeg2Audio
                | StreamType::Mpeg2AacAudio
                | StreamType::Mpeg4AacAudio
                | StreamType::LpcmAudio
                | StreamType::Ac3Audio
                | StreamType::Ac3PlusAudio
                | StreamType::Ac3PlusSecondaryAudio
                | StreamType::Ac3TrueHdAudio
                | StreamType::DtsAudio
                | StreamType::DtsHdAudio
                | StreamType::DtsHdSecondaryAudio
                | StreamType::DtsHdMasterAudio
        )
    }

    pub fn is_graphics(&self) -> bool {
        matches!(
            self,
            StreamType::PresentationGraphics | StreamType::InteractiveGraphics
        )
    }

    pub fn is_text(&self) -> bool {
        matches!(self, StreamType::SubtitleText)
    }
}

/// Video frame rates as encoded in the 4-bit CLPI/MPLS frame-rate field.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Display)]
pub enum FrameRate {
    #[default]
    #[strum(serialize = "0")]
    Unknown,
    #[strum(serialize = "23.976")]
    F23_976,
    #[strum(serialize = "24")]
    F24,
    #[strum(serialize = "25")]
    F25,
    #[strum(serialize = "29.97")]
    F29_97,
    #[strum(serialize = "50")]
    F50,
    #[strum(serialize = "59.94")]
    F59_94,
}

impl FrameRate {
    pub fn from_code(code: u8) -> FrameRate {
        match code {
            1 => FrameRate::F23_976,
            2 => FrameRate::F24,
            3 => FrameRate::F25,
            4 => FrameRate::F29_97,
            6 => FrameRate::F50,
            7 => FrameRate::F59_94,
            _ => FrameRate::Unknown,
        }
    }

    /// `(enumerator, denominator)` of the exact rate.
    pub fn fraction(&self) -> (u32, u32) {
        match self {
            FrameRate::Unknown => (0, 1),
            FrameRate::F23_976 => (24_000, 1001),
            FrameRate::F24 => (24, 1),
            FrameRate::F25 => (25, 1),
            FrameRate::F29_97 => (30_000, 1001),
            FrameRate::F50 => (50, 1),
            FrameRate::F59_94 => (60_000, 1001),
        }
    }

    pub fn fps(&self) -> f64 {
        let (num, den) = self.fraction();
        num as f64 / den as f64
    }

    /// True for the PAL-derived rates that mark a 50 Hz disc.
    pub fn is_50hz(&self) -> bool {
        matches!(self, FrameRate::F25 | FrameRate::F50)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Display)]
pub enum AspectRatio {
    #[default]
    #[strum(serialize = "")]
    Unknown,
    #[strum(serialize = "4:3")]
    Ratio4x3,
    #[strum(serialize = "16:9")]
    Ratio16x9,
}

impl AspectRatio {
    pub fn from_code(code: u8) -> AspectRatio {
        match code {
            2 => AspectRatio::Ratio4x3,
            3 => AspectRatio::Ratio16x9,
            _ => AspectRatio::Unknown,
        }
    }
}

/// Video formats as encoded in the 4-bit CLPI/MPLS video-format field.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum VideoFormat {
    #[default]
    Unknown,
    I480,
    I576,
    P480,
    I1080,
    P720,
    P1080,
    P576,
    P2160,
}

impl VideoFormat {
    pub fn from_code(code: u8) -> VideoFormat {
        match code {
            1 => VideoFormat::I480,
            2 => VideoFormat::I576,
            3 => VideoFormat::P480,
            4 => VideoFormat::I1080,
            5 => VideoFormat::P720,
            6 => VideoFormat::P1080,
            7 => VideoFormat::P576,
            8 => VideoFormat::P2160,
            _ => VideoFormat::Unknown,
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            VideoFormat::Unknown => 0,
            VideoFormat::I480 | VideoFormat::P480 => 480,
            VideoFormat::I576 | VideoFormat::P576 => 576,
            VideoFormat::P720 => 720,
            VideoFormat::I1080 | VideoFormat::P1080 => 1080,
            VideoFormat::P2160 => 2160,
        }
    }

    pub fn is_interlaced(&self) -> bool {
        matches!(self, VideoFormat::I480 | VideoFormat::I576 | VideoFormat::I1080)
    }
}

/// The 4-bit CLPI channel-layout field.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    #[default]
    Unknown,
    Mono,
    Stereo,
    Multi,
    Combo,
}

impl ChannelLayout {
    pub fn from_code(code: u8) -> ChannelLayout {
        match code {
            1 => ChannelLayout::Mono,
            3 => ChannelLayout::Stereo,
            6 => ChannelLayout::Multi,
            12 => ChannelLayout::Combo,
            _ => ChannelLayout::Unknown,
        }
    }
}

/// The 4-bit CLPI sample-rate field.
pub fn sample_rate_from_code(code: u8) -> u32 {
    match code {
        1 => 48_000,
        4 => 96_000,
        5 => 192_000,
        12 => 192_000,
        14 => 96_000,
        _ => 0,
    }
}

/// Audio presentation mode derived by the codec probes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum AudioMode {
    #[default]
    Unknown,
    Mono,
    DualMono,
    Stereo,
    Surround,
    Extended,
    JointStereo,
}

/// HDR classification for HEVC streams, derived from VUI colour description
/// and SEI payloads.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Display)]
pub enum HdrFormat {
    #[default]
    #[strum(serialize = "SDR")]
    Sdr,
    #[strum(serialize = "HDR10")]
    Hdr10,
    #[strum(serialize = "HDR10+")]
    Hdr10Plus,
    #[strum(serialize = "Dolby Vision")]
    DolbyVision,
}

/// Fields shared by every stream category.
#[derive(Debug, Clone, Default)]
pub struct StreamBase {
    pub pid: u16,
    pub stream_type: StreamType,
    /// Declared or highest observed bit rate, bits per second.
    pub bit_rate: u64,
    /// Instantaneous bit rate computed from the payload accumulators.
    pub active_bit_rate: u64,
    pub is_vbr: bool,
    /// Set by the codec probe once the elementary header has been parsed.
    pub is_initialized: bool,
    pub is_hidden: bool,
    pub language_code: String,
    pub angle_index: usize,
    pub payload_bytes: u64,
    pub packet_count: u64,
    pub packet_seconds: f64,
}

impl StreamBase {
    pub fn new(pid: u16, stream_type: StreamType) -> Self {
        Self {
            pid,
            stream_type,
            ..Default::default()
        }
    }

    pub fn language_name(&self) -> &str {
        language::name_for_code(&self.language_code)
    }
}

#[derive(Debug, Clone, Default)]
pub struct VideoInfo {
    pub base: StreamBase,
    pub width: u32,
    pub height: u32,
    pub is_interlaced: bool,
    /// Set during playlist initialization on stereoscopic titles.
    pub is_base_view: bool,
    pub frame_rate: FrameRate,
    pub frame_rate_enumerator: u32,
    pub frame_rate_denominator: u32,
    pub aspect_ratio: AspectRatio,
    /// e.g. "High Profile 4.1" or "Main 10 @ Level 5.1 @ High".
    pub encoding_profile: String,
    pub extended: Option<HevcExtendedData>,
}

/// Extended metadata present only on HEVC streams.
#[derive(Debug, Clone, Default)]
pub struct HevcExtendedData {
    /// 0..3 = 4:0:0, 4:2:0, 4:2:2, 4:4:4
    pub chroma_format_idc: u8,
    pub bit_depth: u8,
    pub colour_primaries: u8,
    pub transfer_characteristics: u8,
    pub matrix_coeffs: u8,
    pub hdr_format: HdrFormat,
    pub master_display: Option<String>,
    pub content_light: Option<String>,
}

impl HevcExtendedData {
    pub fn chroma_format_label(&self) -> &'static str {
        match self.chroma_format_idc {
            0 => "4:0:0",
            1 => "4:2:0",
            2 => "4:2:2",
            3 => "4:4:4",
            _ => "",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AudioInfo {
    pub base: StreamBase,
    pub sample_rate: u32,
    pub channel_count: u8,
    pub lfe: u8,
    pub bit_depth: u8,
    pub dial_norm: i16,
    /// Atmos, DTS:X, EX/ES - set by the codec probes.
    pub has_extensions: bool,
    pub audio_mode: AudioMode,
    pub channel_layout: ChannelLayout,
    /// The embedded compatibility core: AC-3 under TrueHD/E-AC-3, the DTS
    /// core under DTS-HD.
    pub core: Option<Box<AudioInfo>>,
}

impl AudioInfo {
    /// "5.1", "2.0", "7.1" style channel label.
    pub fn channel_label(&self) -> String {
        format!("{}.{}", self.channel_count, self.lfe)
    }

    /// The codec name with extension qualifiers applied, e.g.
    /// "Dolby TrueHD/Atmos Audio" or "DTS-HD Master Audio".
    pub fn codec_label(&self) -> String {
        match self.base.stream_type {
            StreamType::Ac3Audio if self.has_extensions => "Dolby Digital EX Audio".to_string(),
            StreamType::Ac3PlusAudio | StreamType::Ac3PlusSecondaryAudio if self.has_extensions => {
                "Dolby Digital Plus/Atmos Audio".to_string()
            }
            StreamType::Ac3TrueHdAudio if self.has_extensions => {
                "Dolby TrueHD/Atmos Audio".to_string()
            }
            StreamType::DtsAudio if self.has_extensions => "DTS-ES Audio".to_string(),
            StreamType::DtsHdMasterAudio if self.has_extensions => {
                "DTS:X Master Audio".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GraphicsInfo {
    pub base: StreamBase,
    pub width: u32,
    pub height: u32,
    pub caption_count: u32,
    pub forced_caption_count: u32,
    pub caption_ids: BTreeSet<u16>,
}

#[derive(Debug, Clone, Default)]
pub struct TextInfo {
    pub base: StreamBase,
    pub character_code: u8,
}

/// A stream of any category. The arm determines which parameters exist; the
/// shared base is reachable through [`StreamInfo::base`].
#[derive(Debug, Clone)]
pub enum StreamInfo {
    Video(VideoInfo),
    Audio(AudioInfo),
    Graphics(GraphicsInfo),
    Text(TextInfo),
    Unknown(StreamBase),
}

impl StreamInfo {
    /// Construct the right arm for a coding type.
    pub fn new(pid: u16, stream_type: StreamType) -> StreamInfo {
        let base = StreamBase::new(pid, stream_type);
        if stream_type.is_video() {
            StreamInfo::Video(VideoInfo {
                base,
                ..Default::default()
            })
        } else if stream_type.is_audio() {
            StreamInfo::Audio(AudioInfo {
                base,
                ..Default::default()
            })
        } else if stream_type.is_graphics() {
            StreamInfo::Graphics(GraphicsInfo {
                base,
                ..Default::default()
            })
        } else if stream_type.is_text() {
            StreamInfo::Text(TextInfo {
                base,
                ..Default::default()
            })
        } else {
            StreamInfo::Unknown(base)
        }
    }

    pub fn base(&self) -> &StreamBase {
        match self {
            StreamInfo::Video(v) => &v.base,
            StreamInfo::Audio(a) => &a.base,
            StreamInfo::Graphics(g) => &g.base,
            StreamInfo::Text(t) => &t.base,
            StreamInfo::Unknown(b) => b,
        }
    }

    pub fn base_mut(&mut self) -> &mut StreamBase {
        match self {
            StreamInfo::Video(v) => &mut v.base,
            StreamInfo::Audio(a) => &mut a.base,
            StreamInfo::Graphics(g) => &mut g.base,
            StreamInfo::Text(t) => &mut t.base,
            StreamInfo::Unknown(b) => b,
        }
    }

    pub fn pid(&self) -> u16 {
        self.base().pid
    }

    pub fn stream_type(&self) -> StreamType {
        self.base().stream_type
    }

    pub fn as_video(&self) -> Option<&VideoInfo> {
        match self {
            StreamInfo::Video(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_video_mut(&mut self) -> Option<&mut VideoInfo> {
        match self {
            StreamInfo::Video(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_audio(&self) -> Option<&AudioInfo> {
        match self {
            StreamInfo::Audio(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_audio_mut(&mut self) -> Option<&mut AudioInfo> {
        match self {
            StreamInfo::Audio(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_graphics_mut(&mut self) -> Option<&mut GraphicsInfo> {
        match self {
            StreamInfo::Graphics(g) => Some(g),
            _ => None,
        }
    }

    /// Fold demux and probe results from a scanned file-level stream into
    /// this playlist-level clone. Codec parameters replace the declared
    /// approximations; the bit rate is only ever raised.
    pub fn absorb(&mut self, scanned: &StreamInfo) {
        if !scanned.base().is_initialized {
            return;
        }
        {
            let scanned_base = scanned.base();
            let base = self.base_mut();
            base.is_initialized = true;
            base.is_vbr |= scanned_base.is_vbr;
            if scanned_base.bit_rate > base.bit_rate {
                base.bit_rate = scanned_base.bit_rate;
            }
        }
        match (self, scanned) {
            (StreamInfo::Video(mine), StreamInfo::Video(theirs)) => {
                if theirs.width > 0 {
                    mine.width = theirs.width;
                    mine.height = theirs.height;
                }
                if !theirs.encoding_profile.is_empty() {
                    mine.encoding_profile = theirs.encoding_profile.clone();
                }
                if theirs.extended.is_some() {
                    mine.extended = theirs.extended.clone();
                }
            }
            (StreamInfo::Audio(mine), StreamInfo::Audio(theirs)) => {
                if theirs.sample_rate > 0 {
                    mine.sample_rate = theirs.sample_rate;
                }
                if theirs.channel_count > 0 {
                    mine.channel_count = theirs.channel_count;
                    mine.lfe = theirs.lfe;
                }
                if theirs.bit_depth > 0 {
                    mine.bit_depth = theirs.bit_depth;
                }
                mine.dial_norm = theirs.dial_norm;
                mine.has_extensions |= theirs.has_extensions;
                if theirs.audio_mode != AudioMode::Unknown {
                    mine.audio_mode = theirs.audio_mode;
                }
                if theirs.core.is_some() {
                    mine.core = theirs.core.clone();
                }
            }
            (StreamInfo::Graphics(mine), StreamInfo::Graphics(theirs)) => {
                mine.width = theirs.width;
                mine.height = theirs.height;
                mine.caption_count = theirs.caption_count;
                mine.forced_caption_count = theirs.forced_caption_count;
                mine.caption_ids = theirs.caption_ids.clone();
            }
            _ => {}
        }
    }

    /// The codec column of the report tables.
    pub fn codec_label(&self) -> String {
        match self {
            StreamInfo::Audio(a) => a.codec_label(),
            other => other.stream_type().to_string(),
        }
    }

    /// The description column of the report tables.
    pub fn description(&self) -> String {
        match self {
            StreamInfo::Video(v) => {
                let mut parts: Vec<String> = Vec::new();
                if v.height > 0 {
                    parts.push(format!(
                        "{}{}",
                        v.height,
                        if v.is_interlaced { "i" } else { "p" }
                    ));
                }
                if v.frame_rate != FrameRate::Unknown {
                    parts.push(format!("{} fps", v.frame_rate));
                }
                if v.aspect_ratio != AspectRatio::Unknown {
                    parts.push(v.aspect_ratio.to_string());
                }
                if !v.encoding_profile.is_empty() {
                    parts.push(v.encoding_profile.clone());
                }
                if let Some(ext) = &v.extended {
                    if ext.hdr_format != HdrFormat::Sdr {
                        parts.push(ext.hdr_format.to_string());
                    }
                }
                parts.join(" / ")
            }
            StreamInfo::Audio(a) => {
                let mut parts: Vec<String> = Vec::new();
                if a.channel_count > 0 {
                    if a.audio_mode == AudioMode::Surround {
                        parts.push(format!("{} (Dolby Surround)", a.channel_label()));
                    } else {
                        parts.push(a.channel_label());
                    }
                }
                if a.sample_rate > 0 {
                    parts.push(format!("{} kHz", a.sample_rate / 1000));
                }
                if a.base.bit_rate > 0 {
                    parts.push(format!("{} kbps", a.base.bit_rate / 1000));
                }
                if a.bit_depth > 0 {
                    parts.push(format!("{}-bit", a.bit_depth));
                }
                let mut out = parts.join(" / ");
                if let Some(core) = &a.core {
                    let core_desc = StreamInfo::Audio((**core).clone()).description();
                    if !core_desc.is_empty() {
                        let kind = match core.base.stream_type {
                            StreamType::DtsAudio => "DTS Core:",
                            _ => "AC3 Core:",
                        };
                        out.push_str(&format!(" ({} {})", kind, core_desc));
                    }
                }
                out
            }
            StreamInfo::Graphics(g) => {
                if g.caption_count > 0 {
                    if g.forced_caption_count > 0 {
                        format!(
                            "{} captions ({} forced)",
                            g.caption_count, g.forced_caption_count
                        )
                    } else {
                        format!("{} captions", g.caption_count)
                    }
                } else {
                    String::new()
                }
            }
            StreamInfo::Text(_) | StreamInfo::Unknown(_) => String::new(),
        }
    }
}
