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

//! DTS core-stream probing.

use crate::{
    codec::bits::BitReader,
    stream::{AudioInfo, AudioMode},
};

pub const DTS_SYNC: [u8; 4] = [0x7F, 0xFE, 0x80, 0x01];

/// Channel counts by AMODE; values past 9 are encoder-specific.
const AMODE_CHANNELS: [u8; 10] = [1, 2, 2, 2, 2, 3, 3, 4, 4, 5];

const SAMPLE_RATES: [u32; 16] = [
    0, 8_000, 16_000, 32_000, 0, 0, 11_025, 22_050, 44_100, 0, 0, 12_000, 24_000, 48_000, 96_000,
    192_000,
];

/// Bitrates in kbps; indices 29..31 are open / variable / lossless.
const BIT_RATES: [u32; 29] = [
    32, 56, 64, 96, 112, 128, 192, 224, 256, 320, 384, 448, 512, 576, 640, 768, 960, 1024, 1152,
    1280, 1344, 1408, 1411, 1472, 1536, 1920, 2048, 3072, 3840,
];

pub fn probe(buffer: &[u8], info: &mut AudioInfo) {
    let Some(offset) = find_sync(buffer) else {
        return;
    };
    let frame = &buffer[offset + 4..];
    if frame.len() < 12 {
        return;
    }
    let mut r = BitReader::new(frame);
    let _frame_type = r.flag();
    let _deficit_samples = r.read(5);
    let crc_present = r.flag();
    let _pcm_blocks = r.read(7);
    let _frame_size = r.read(14);
    let amode = r.read(6) as usize;
    let sample_rate_idx = r.read(4) as usize;
    let bit_rate_idx = r.read(5) as usize;
    r.skip(1); // embedded downmix
    r.skip(1); // dynamic range
    r.skip(1); // timestamp
    r.skip(1); // auxiliary data
    r.skip(1); // hdcd
    let _ext_audio_descriptor = r.read(3);
    let _ext_coding = r.flag();
    let _aspf = r.flag();
    let lff = r.read(2);
    let _predictor_history = r.flag();
    if crc_present {
        r.skip(16);
    }
    let _multirate_interpolator = r.flag();
    let _encoder_version = r.read(4);
    let _copy_history = r.read(2);
    let source_pcm_resolution = r.read(3);
    let _front_sum = r.flag();
    let _surround_sum = r.flag();
    let dialnorm = r.read(4);
    if r.exhausted() {
        return;
    }

    info.sample_rate = SAMPLE_RATES[sample_rate_idx];
    info.channel_count = AMODE_CHANNELS.get(amode).copied().unwrap_or(0);
    info.lfe = if lff == 1 || lff == 2 { 1 } else { 0 };
    match bit_rate_idx {
        29 | 30 | 31 => info.base.is_vbr = true,
        idx => info.base.bit_rate = BIT_RATES[idx] as u64 * 1000,
    }
    // The low bit of the source resolution marks DTS-ES extended surround.
    info.bit_depth = match source_pcm_resolution >> 1 {
        0 => 16,
        1 => 20,
        3 => 24,
        _ => 24,
    };
    if source_pcm_resolution & 0x01 != 0 {
        info.has_extensions = true;
        info.audio_mode = AudioMode::Extended;
    }
    info.dial_norm = -(dialnorm as i16);
    info.base.is_initialized = true;
}

pub(crate) fn find_sync(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == DTS_SYNC)
}
