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

//! BD-ROM LPCM probing: the four-byte header at the head of each PES payload.

use crate::stream::AudioInfo;

/// `(channels, lfe)` by channel-assignment code.
const CHANNEL_ASSIGNMENTS: [(u8, u8); 12] = [
    (0, 0),
    (1, 0), // mono
    (0, 0),
    (2, 0), // stereo
    (3, 0),
    (3, 0),
    (4, 0),
    (4, 0),
    (5, 0),
    (5, 1), // 5.1
    (7, 0),
    (7, 1), // 7.1
];

pub fn probe(buffer: &[u8], info: &mut AudioInfo) {
    if buffer.len() < 4 {
        return;
    }
    let channel_assignment = (buffer[2] >> 4) as usize;
    let sample_rate_code = buffer[2] & 0x0F;
    let bits_code = buffer[3] >> 6;

    let Some(&(channels, lfe)) = CHANNEL_ASSIGNMENTS.get(channel_assignment) else {
        return;
    };
    if channels == 0 {
        return;
    }
    info.channel_count = channels;
    info.lfe = lfe;
    info.sample_rate = match sample_rate_code {
        1 => 48_000,
        4 => 96_000,
        5 => 192_000,
        _ => return,
    };
    info.bit_depth = match bits_code {
        1 => 16,
        2 => 20,
        3 => 24,
        _ => return,
    };
    info.base.bit_rate =
        info.sample_rate as u64 * info.bit_depth as u64 * (channels + lfe) as u64;
    info.base.is_initialized = true;
}
