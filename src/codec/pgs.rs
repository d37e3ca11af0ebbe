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

//! Presentation Graphics (PGS) probing: counts captions and forced captions
//! from the presentation-composition segments in the capture buffer.

use crate::stream::GraphicsInfo;

const SEGMENT_PCS: u8 = 0x16;
const KNOWN_SEGMENTS: [u8; 5] = [0x14, 0x15, 0x16, 0x17, 0x80];

pub fn probe(buffer: &[u8], info: &mut GraphicsInfo) {
    let mut offset = 0usize;
    while offset + 3 <= buffer.len() {
        let segment_type = buffer[offset];
        if !KNOWN_SEGMENTS.contains(&segment_type) {
            // Lost sync inside the capture window; rescan byte-by-byte.
            offset += 1;
            continue;
        }
        let length = u16::from_be_bytes([buffer[offset + 1], buffer[offset + 2]]) as usize;
        let Some(payload) = buffer.get(offset + 3..offset + 3 + length) else {
            break;
        };
        if segment_type == SEGMENT_PCS && payload.len() >= 11 {
            parse_composition(payload, info);
        }
        info.base.is_initialized = true;
        offset += 3 + length;
    }
}

fn parse_composition(payload: &[u8], info: &mut GraphicsInfo) {
    let width = u16::from_be_bytes([payload[0], payload[1]]) as u32;
    let height = u16::from_be_bytes([payload[2], payload[3]]) as u32;
    let composition_number = u16::from_be_bytes([payload[5], payload[6]]);
    let composition_state = payload[7];

    if width > 0 {
        info.width = width;
        info.height = height;
    }
    // Epoch start opens a new caption.
    if composition_state & 0x80 != 0 && info.caption_ids.insert(composition_number) {
        info.caption_count += 1;
    }

    let object_count = payload[9] as usize;
    let mut cursor = 10;
    for _ in 0..object_count {
        let Some(object) = payload.get(cursor..cursor + 8) else {
            break;
        };
        let flags = object[3];
        if flags & 0x40 != 0 {
            info.forced_caption_count += 1;
        }
        // A cropped object carries an extra 8-byte crop rectangle.
        cursor += if flags & 0x80 != 0 { 16 } else { 8 };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcs_segment(composition: u16, state: u8, forced: bool) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&1920u16.to_be_bytes());
        payload.extend_from_slice(&1080u16.to_be_bytes());
        payload.push(0x10); // frame rate
        payload.extend_from_slice(&composition.to_be_bytes());
        payload.push(state);
        payload.push(0); // palette update
        payload.push(1); // one composition object
        payload.extend_from_slice(&0u16.to_be_bytes()); // object id
        payload.push(0); // window id
        payload.push(if forced { 0x40 } else { 0 });
        payload.extend_from_slice(&[0, 0, 0, 0]); // position
        let mut segment = vec![SEGMENT_PCS];
        segment.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        segment.extend_from_slice(&payload);
        segment
    }

    #[test]
    fn test_counts_epoch_starts_and_forced() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&pcs_segment(1, 0x80, false));
        buffer.extend_from_slice(&pcs_segment(1, 0x00, false)); // same epoch
        buffer.extend_from_slice(&pcs_segment(2, 0x80, true));
        let mut info = GraphicsInfo::default();
        probe(&buffer, &mut info);
        assert!(info.base.is_initialized);
        assert_eq!(info.width, 1920);
        assert_eq!(info.caption_count, 2);
        assert_eq!(info.forced_caption_count, 1);
        assert_eq!(info.caption_ids.len(), 2);
    }
}
