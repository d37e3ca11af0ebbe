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

//! Dolby TrueHD (MLP FBA) probing.
//!
//! A TrueHD PID interleaves the lossless substreams with a plain AC-3
//! compatibility core; the core is parsed out of the same buffer and attached
//! as the stream's core info.

use crate::{
    codec::{ac3, bits::BitReader},
    stream::{AudioInfo, StreamType},
};

const MAJOR_SYNC: [u8; 4] = [0xF8, 0x72, 0x6F, 0xBA];

/// Channel counts contributed by each flag of the 13-bit 8-channel
/// presentation assignment. Flags 2 and 12 are the LFE pair.
const ASSIGNMENT_CHANNELS: [u8; 13] = [2, 1, 1, 2, 2, 2, 2, 1, 1, 2, 2, 1, 1];

pub fn probe(buffer: &[u8], info: &mut AudioInfo) {
    if let Some(offset) = find_major_sync(buffer) {
        parse_major_sync(&buffer[offset..], info);
    }

    // The embedded AC-3 core shares the PID; its bitrate is subtracted from
    // the TrueHD active rate during demux.
    if ac3::find_sync(buffer).is_some() {
        let mut core = AudioInfo::default();
        core.base.pid = info.base.pid;
        core.base.stream_type = StreamType::Ac3Audio;
        core.base.language_code = info.base.language_code.clone();
        ac3::probe(buffer, &mut core);
        if core.base.is_initialized {
            if info.channel_count == 0 {
                info.channel_count = core.channel_count;
                info.lfe = core.lfe;
            }
            info.core = Some(Box::new(core));
        }
    }
}

fn parse_major_sync(frame: &[u8], info: &mut AudioInfo) {
    if frame.len() < 20 {
        return;
    }
    let mut r = BitReader::new(&frame[4..]);
    let sample_rate_code = r.read(4);
    info.sample_rate = match sample_rate_code {
        0 => 48_000,
        1 => 96_000,
        2 => 192_000,
        8 => 44_100,
        9 => 88_200,
        10 => 176_400,
        _ => 0,
    };
    r.skip(4); // multichannel type + reserved
    r.skip(2); // 2ch presentation modifier
    r.skip(2); // 6ch presentation modifier
    r.skip(5); // 6ch presentation assignment
    r.skip(2); // 8ch presentation modifier

    let assignment = r.read(13);
    let mut channels = 0u8;
    let mut lfe = 0u8;
    for (index, width) in ASSIGNMENT_CHANNELS.iter().enumerate() {
        if assignment & (1 << index) != 0 {
            channels += width;
            if index == 2 || index == 12 {
                lfe += 1;
            }
        }
    }
    if channels > 0 {
        info.channel_count = channels - lfe;
        info.lfe = lfe;
    }

    r.skip(16); // signature
    r.skip(16); // flags
    r.skip(16); // reserved
    let _variable_rate = r.flag();
    let peak_data_rate = r.read(15) as u64;
    let substreams = r.read(4);
    if r.exhausted() || info.sample_rate == 0 {
        return;
    }

    info.base.bit_rate = (peak_data_rate * info.sample_rate as u64) >> 4;
    info.bit_depth = if info.base.bit_rate / info.sample_rate as u64 > 14 {
        24
    } else {
        16
    };
    // Four substreams carry the 16-channel (Atmos) presentation.
    if substreams >= 4 {
        info.has_extensions = true;
    }
    info.base.is_vbr = true;
    info.base.is_initialized = true;
}

fn find_major_sync(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == MAJOR_SYNC)
}
