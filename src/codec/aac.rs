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

//! AAC probing via the ADTS frame header.

use crate::stream::AudioInfo;

const ADTS_SAMPLE_RATES: [u32; 13] = [
    96_000, 88_200, 64_000, 48_000, 44_100, 32_000, 24_000, 22_050, 16_000, 12_000, 11_025, 8_000,
    7_350,
];

pub fn probe(buffer: &[u8], info: &mut AudioInfo) {
    for i in 0..buffer.len().saturating_sub(4) {
        // 12-bit syncword
        if buffer[i] != 0xFF || buffer[i + 1] & 0xF0 != 0xF0 {
            continue;
        }
        let sample_rate_idx = ((buffer[i + 2] >> 2) & 0x0F) as usize;
        let channel_config =
            ((buffer[i + 2] & 0x01) << 2 | (buffer[i + 3] >> 6)) as u8;
        let Some(&rate) = ADTS_SAMPLE_RATES.get(sample_rate_idx) else {
            continue;
        };
        if channel_config == 0 {
            continue;
        }
        info.sample_rate = rate;
        // Configuration 7 is the 7.1 layout.
        if channel_config == 7 {
            info.channel_count = 7;
            info.lfe = 1;
        } else {
            info.channel_count = channel_config;
            info.lfe = if channel_config == 6 { 1 } else { 0 };
            if channel_config == 6 {
                info.channel_count = 5;
            }
        }
        info.base.is_initialized = true;
        return;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adts_header() {
        // 48 kHz (idx 3), channel configuration 6 -> 5.1
        let header = [0xFF, 0xF1, 0b0100_1101, 0b1000_0000, 0, 0];
        let mut info = AudioInfo::default();
        probe(&header, &mut info);
        assert!(info.base.is_initialized);
        assert_eq!(info.sample_rate, 48_000);
        assert_eq!(info.channel_count, 5);
        assert_eq!(info.lfe, 1);
    }
}
