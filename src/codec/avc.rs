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

//! H.264/AVC probing: profile and level from the sequence parameter set,
//! frame tags from access-unit delimiters.

use crate::stream::VideoInfo;

/// Extract `"<Profile> Profile <Level>"` from the first SPS in the buffer.
pub fn probe(buffer: &[u8], info: &mut VideoInfo) {
    for i in 0..buffer.len().saturating_sub(4) {
        if buffer[i..i + 3] != [0, 0, 1] {
            continue;
        }
        // nal_ref_idc 1 or 3, nal_unit_type 7
        if buffer[i + 3] != 0x27 && buffer[i + 3] != 0x67 {
            continue;
        }
        let Some(sps) = buffer.get(i + 4..i + 7) else {
            continue;
        };
        let profile_idc = sps[0];
        let constraint_set3 = sps[1] & 0x10 != 0;
        let level_idc = sps[2];

        let profile = match profile_idc {
            66 => "Baseline",
            77 => "Main",
            88 => "Extended",
            100 => "High",
            110 => "High 10",
            122 => "High 4:2:2",
            144 => "High 4:4:4",
            _ => continue,
        };
        let level = if level_idc == 11 && constraint_set3 {
            "1b".to_string()
        } else {
            format!("{}.{}", level_idc / 10, level_idc % 10)
        };
        info.encoding_profile = format!("{} Profile {}", profile, level);
        info.base.is_initialized = true;
        return;
    }
}

/// Frame tag from the latest access-unit delimiter in the window.
pub fn frame_type(payload: &[u8]) -> Option<&'static str> {
    for (i, window) in payload.windows(4).enumerate() {
        if window == [0x00, 0x00, 0x01, 0x09] {
            let primary_pic_type = payload.get(i + 4)? >> 5;
            return match primary_pic_type {
                0 => Some("I"),
                1 => Some("P"),
                2 => Some("B"),
                _ => None,
            };
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_high_41() {
        let mut buffer = vec![0u8, 0, 1, 0x67];
        buffer.extend_from_slice(&[100, 0x00, 41]);
        let mut info = VideoInfo::default();
        probe(&buffer, &mut info);
        assert!(info.base.is_initialized);
        assert_eq!(info.encoding_profile, "High Profile 4.1");
    }

    #[test]
    fn test_probe_level_1b() {
        let mut buffer = vec![0u8, 0, 1, 0x27];
        buffer.extend_from_slice(&[66, 0x10, 11]);
        let mut info = VideoInfo::default();
        probe(&buffer, &mut info);
        assert_eq!(info.encoding_profile, "Baseline Profile 1b");
    }

    #[test]
    fn test_frame_type_from_aud() {
        let payload = [0x00, 0x00, 0x01, 0x09, 0b0100_0000];
        assert_eq!(frame_type(&payload), Some("B"));
        let payload = [0x00, 0x00, 0x01, 0x09, 0b0000_0000];
        assert_eq!(frame_type(&payload), Some("I"));
    }
}
