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

//! VC-1 probing: profile and level from the sequence header, frame tags from
//! frame headers.

use crate::{codec::bits::BitReader, stream::VideoInfo};

const SEQUENCE_START: [u8; 4] = [0x00, 0x00, 0x01, 0x0F];
const FRAME_START: [u8; 4] = [0x00, 0x00, 0x01, 0x0D];

pub fn probe(buffer: &[u8], info: &mut VideoInfo) {
    let Some(offset) = find(buffer, &SEQUENCE_START) else {
        return;
    };
    let Some(header) = buffer.get(offset + 4..offset + 8) else {
        return;
    };
    let mut r = BitReader::new(header);
    let profile = r.read(2);
    let level = r.read(3);
    let _colordiff_format = r.read(2);
    if profile == 3 {
        info.encoding_profile = format!("Advanced Profile {}", level);
        info.base.is_initialized = true;
    }
}

/// Frame tag from the picture type of the latest frame header. The picture
/// type is a variable-length code at the head of the frame data.
pub fn frame_type(payload: &[u8], interlaced: bool) -> Option<&'static str> {
    let offset = find(payload, &FRAME_START)?;
    let data = payload.get(offset + 4..offset + 8)?;
    let mut r = BitReader::new(data);
    if interlaced {
        // fcm: 0 = progressive, else one more bit distinguishes field/frame.
        if r.flag() {
            r.skip(1);
        }
    }
    Some(if !r.flag() {
        "P"
    } else if !r.flag() {
        "B"
    } else if !r.flag() {
        "I"
    } else if !r.flag() {
        "BI"
    } else {
        "P" // skipped frame is coded as P
    })
}

fn find(data: &[u8], pattern: &[u8; 4]) -> Option<usize> {
    data.windows(4).position(|w| w == pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_advanced_profile() {
        let mut buffer = SEQUENCE_START.to_vec();
        // profile=3 (2 bits), level=3 (3 bits)
        buffer.push(0b1101_1000);
        buffer.extend_from_slice(&[0, 0, 0]);
        let mut info = VideoInfo::default();
        probe(&buffer, &mut info);
        assert!(info.base.is_initialized);
        assert_eq!(info.encoding_profile, "Advanced Profile 3");
    }

    #[test]
    fn test_frame_type_codes() {
        let mut payload = FRAME_START.to_vec();
        payload.extend_from_slice(&[0b0000_0000, 0, 0, 0]);
        assert_eq!(frame_type(&payload, false), Some("P"));
        payload[4] = 0b1000_0000;
        assert_eq!(frame_type(&payload, false), Some("B"));
        payload[4] = 0b1100_0000;
        assert_eq!(frame_type(&payload, false), Some("I"));
    }
}
