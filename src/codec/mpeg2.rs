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

//! MPEG-1/MPEG-2 video probing.

use crate::stream::VideoInfo;

const SEQUENCE_HEADER: u32 = 0x0000_01B3;
const PICTURE_START: u32 = 0x0000_0100;

/// Parse the sequence header for dimensions and the declared bitrate.
pub fn probe(buffer: &[u8], info: &mut VideoInfo) {
    let Some(offset) = find_start_code(buffer, SEQUENCE_HEADER) else {
        return;
    };
    let Some(header) = buffer.get(offset + 4..offset + 12) else {
        return;
    };
    let width = ((header[0] as u32) << 4) | (header[1] as u32 >> 4);
    let height = ((header[1] as u32 & 0x0F) << 8) | header[2] as u32;
    let bit_rate_value = ((header[4] as u32) << 10) | ((header[5] as u32) << 2) | (header[6] as u32 >> 6);

    if width > 0 && height > 0 {
        info.width = width;
        info.height = height;
    }
    // 0x3FFFF marks variable rate; otherwise units of 400 bits/second.
    if bit_rate_value != 0x3_FFFF && info.base.bit_rate == 0 {
        info.base.bit_rate = bit_rate_value as u64 * 400;
    }
    info.base.is_initialized = true;
}

/// Frame tag for the diagnostics table, from the picture-coding type of the
/// latest picture header in the window.
pub fn frame_type(payload: &[u8]) -> Option<&'static str> {
    let offset = find_start_code(payload, PICTURE_START)?;
    let bits = payload.get(offset + 5)?;
    // temporal_reference(10), picture_coding_type(3)
    match (bits >> 3) & 0x07 {
        1 => Some("I"),
        2 => Some("P"),
        3 => Some("B"),
        _ => None,
    }
}

pub(crate) fn find_start_code(data: &[u8], code: u32) -> Option<usize> {
    let target = code.to_be_bytes();
    data.windows(4).position(|w| w == target)
}
