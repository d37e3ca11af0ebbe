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

//! `.clpi` clip-information parsing.
//!
//! A clip-info file is the per-stream-file sidecar declaring stream coding
//! types, language codes, and basic format metadata. Only the program-info
//! stream table is needed for the report; the rest of the file is skipped.

use std::collections::BTreeMap;

use crate::{
    stream::{
        sample_rate_from_code, AspectRatio, ChannelLayout, FrameRate, StreamInfo, StreamType,
        VideoFormat,
    },
    util::BeReader,
    BdInfoError,
};

const CLPI_MAGICS: [&[u8; 8]; 3] = [b"HDMV0100", b"HDMV0200", b"HDMV0300"];

/// An in-memory `.clpi` file: the stream table declared by clip info.
#[derive(Debug, Clone, Default)]
pub struct StreamClipFile {
    /// Upper-case file name, e.g. `00001.CLPI`.
    pub name: String,
    pub size: u64,
    pub streams: BTreeMap<u16, StreamInfo>,
    /// PIDs in declaration order; one of the stream-order merge sources.
    pub stream_order: Vec<u16>,
}

impl StreamClipFile {
    pub fn parse(name: &str, data: &[u8]) -> Result<StreamClipFile, BdInfoError> {
        if data.len() < 16 || !CLPI_MAGICS.iter().any(|m| &data[..8] == &m[..]) {
            return Err(BdInfoError::BadMagic(name.to_string()));
        }

        let mut clip = StreamClipFile {
            name: name.to_string(),
            size: data.len() as u64,
            ..Default::default()
        };

        let mut r = BeReader::new(data);
        r.seek(12)?;
        let section_start = r.u32()? as usize;
        r.seek(section_start)?;
        let section_length = r.u32()? as usize;
        if section_length == 0 {
            return Ok(clip);
        }

        r.seek(section_start + 8)?;
        let stream_count = r.u8()?;
        r.seek(section_start + 10)?;

        for index in 0..stream_count {
            let entry_start = r.pos();
            match parse_stream_entry(&mut r) {
                Ok(Some(info)) => {
                    log::trace!(
                        "{}: stream {} PID {:04X} type {}",
                        name,
                        index,
                        info.pid(),
                        info.stream_type()
                    );
                    if !clip.streams.contains_key(&info.pid()) {
                        clip.stream_order.push(info.pid());
                    }
                    clip.streams.insert(info.pid(), info);
                }
                Ok(None) => {}
                Err(BdInfoError::TruncatedRecord) => {
                    // A short entry is skipped; everything before it stands.
                    log::warn!("{}: stream entry {} truncated, skipping", name, index);
                }
                Err(e) => return Err(e),
            }
            // Entries advance by PID + length byte + declared payload length.
            let declared = data
                .get(entry_start + 2)
                .copied()
                .ok_or(BdInfoError::TruncatedRecord)? as usize;
            if r.seek(entry_start + 3 + declared).is_err() {
                break;
            }
        }

        Ok(clip)
    }
}

/// Read one program-info stream entry. The payload layout depends on the
/// coding type; entries of unknown types still contribute a PID so the report
/// can show them as unknown streams.
fn parse_stream_entry(r: &mut BeReader) -> Result<Option<StreamInfo>, BdInfoError> {
    let pid = r.u16()?;
    let _sub_length = r.u8()?;
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
        video.aspect_ratio = AspectRatio::from_code(r.u8()? >> 4);
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

    Ok(Some(info))
}
