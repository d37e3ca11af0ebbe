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

//! DTS-HD extension-substream probing.
//!
//! The substream header carries the asset table; the first asset declares bit
//! resolution, sample rate, and the speaker-activity mask. Fields the
//! extension leaves unset are filled from the DTS core when one shares the
//! buffer, and the buffer is scanned for the DTS:X marker sequences.

use crate::{
    codec::{bits::BitReader, dts},
    stream::{AudioInfo, StreamType},
};

pub const DTSHD_SYNC: [u8; 4] = [0x64, 0x58, 0x20, 0x25];

const DTSX_MARKERS: [[u8; 4]; 2] = [[0x41, 0xA2, 0x95, 0x47], [0x65, 0x5E, 0x31, 0x5E]];
const DTSX_TAG: [u8; 4] = [0x02, 0x00, 0x08, 0x50];

const HD_SAMPLE_RATES: [u32; 16] = [
    8_000, 16_000, 32_000, 64_000, 128_000, 22_050, 44_100, 88_200, 176_400, 352_800, 12_000,
    24_000, 48_000, 96_000, 192_000, 384_000,
];

pub fn probe(buffer: &[u8], info: &mut AudioInfo) {
    if let Some(offset) = find_sync(buffer) {
        parse_extension_substream(&buffer[offset + 4..], info);
    }

    if scan_for_dtsx(buffer) {
        info.has_extensions = true;
    }

    // The extension rides on top of a plain DTS core; parse it for the core
    // info block and to fill anything the extension header left at zero.
    if dts::find_sync(buffer).is_some() {
        let mut core = AudioInfo::default();
        core.base.pid = info.base.pid;
        core.base.stream_type = StreamType::DtsAudio;
        core.base.language_code = info.base.language_code.clone();
        dts::probe(buffer, &mut core);
        if core.base.is_initialized {
            if info.sample_rate == 0 {
                info.sample_rate = core.sample_rate;
            }
            if info.channel_count == 0 {
                info.channel_count = core.channel_count;
                info.lfe = core.lfe;
            }
            if info.bit_depth == 0 {
                info.bit_depth = core.bit_depth;
            }
            info.dial_norm = core.dial_norm;
            info.core = Some(Box::new(core));
        }
    }

    if info.base.stream_type == StreamType::DtsHdMasterAudio {
        info.base.is_vbr = true;
    }
}

fn parse_extension_substream(frame: &[u8], info: &mut AudioInfo) {
    let mut r = BitReader::new(frame);
    r.skip(8); // user defined
    r.skip(2); // extension substream index
    let wide_header = r.flag();
    let (_header_size, _substream_size) = if wide_header {
        (r.read(12) + 1, r.read(20) + 1)
    } else {
        (r.read(8) + 1, r.read(16) + 1)
    };

    let static_fields = r.flag();
    let mut asset_count = 1u32;
    if static_fields {
        r.skip(2); // reference clock code
        r.skip(3); // frame duration code
        if r.flag() {
            r.skip(36); // timestamp
        }
        let audio_presentations = r.read(3) + 1;
        asset_count = r.read(3) + 1;
        // Active-asset masks, one per presentation.
        for _ in 0..audio_presentations {
            r.skip(4);
        }
        // No mixing metadata on BD-ROM assets; the enable flag tells us.
        if r.flag() {
            // mixing metadata adjustment level + bits4mixoutmask + configs
            r.skip(2);
            let speaker_mask_bits = (r.read(2) + 1) << 2;
            let mix_configs = r.read(2) + 1;
            for _ in 0..mix_configs {
                r.skip(speaker_mask_bits as usize);
            }
        }
    }

    // First asset descriptor.
    r.skip(9); // descriptor size
    r.skip(3); // asset index
    if static_fields {
        if r.flag() {
            r.skip(4); // asset type descriptor
        }
        if r.flag() {
            r.skip(24); // language descriptor
        }
        if r.flag() {
            let text_length = r.read(10) + 1;
            r.skip(text_length as usize * 8);
        }
        let bit_resolution = r.read(5) + 1;
        let sample_rate_idx = r.read(4) as usize;
        let total_channels = r.read(8) + 1;
        if r.exhausted() {
            return;
        }
        info.bit_depth = bit_resolution as u8;
        info.sample_rate = HD_SAMPLE_RATES[sample_rate_idx];
        info.channel_count = total_channels as u8;

        if r.flag() {
            // one-to-one channel/speaker mapping
            if total_channels > 2 {
                r.skip(1); // embedded stereo
            }
            if total_channels > 6 {
                r.skip(1); // embedded six-channel
            }
            if r.flag() {
                let mask_bits = (r.read(2) + 1) << 2;
                let speaker_mask = r.read(mask_bits as usize);
                if !r.exhausted() {
                    // Mask bits 3 and 12 are LFE1/LFE2.
                    let lfe = (speaker_mask >> 3 & 1) + (speaker_mask >> 12 & 1);
                    info.lfe = lfe as u8;
                    info.channel_count = total_channels as u8 - info.lfe;
                }
            }
        }
    }
    let _ = asset_count;
    info.base.is_initialized = true;
}

/// DTS:X is announced by a marker word followed by its tag sequence.
fn scan_for_dtsx(buffer: &[u8]) -> bool {
    for i in 0..buffer.len().saturating_sub(8) {
        let word = &buffer[i..i + 4];
        if DTSX_MARKERS.iter().any(|m| word == m) && buffer[i + 4..i + 8] == DTSX_TAG {
            return true;
        }
    }
    false
}

fn find_sync(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == DTSHD_SYNC)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BitWriter {
        bits: Vec<bool>,
    }

    impl BitWriter {
        fn new() -> Self {
            Self { bits: Vec::new() }
        }
        fn push(&mut self, value: u64, width: usize) {
            for i in (0..width).rev() {
                self.bits.push(value >> i & 1 != 0);
            }
        }
        fn finish(self) -> Vec<u8> {
            let mut out = vec![0u8; self.bits.len().div_ceil(8)];
            for (i, bit) in self.bits.iter().enumerate() {
                if *bit {
                    out[i / 8] |= 1 << (7 - i % 8);
                }
            }
            out
        }
    }

    fn hd_frame() -> Vec<u8> {
        let mut w = BitWriter::new();
        w.push(0, 8); // user defined
        w.push(0, 2); // substream index
        w.push(0, 1); // narrow header
        w.push(10, 8); // header size - 1
        w.push(100, 16); // substream size - 1
        w.push(1, 1); // static fields present
        w.push(0, 2); // clock code
        w.push(0, 3); // duration code
        w.push(0, 1); // no timestamp
        w.push(0, 3); // 1 presentation
        w.push(0, 3); // 1 asset
        w.push(1, 4); // active mask
        w.push(0, 1); // no mixing metadata
        w.push(0, 9); // descriptor size
        w.push(0, 3); // asset index
        w.push(0, 1); // no asset type
        w.push(0, 1); // no language
        w.push(0, 1); // no info text
        w.push(23, 5); // bit resolution - 1 -> 24
        w.push(13, 4); // sample rate idx -> 96 kHz
        w.push(6, 8); // total channels - 1 -> 7
        w.push(1, 1); // one-to-one mapping
        w.push(0, 1); // no embedded stereo (7 > 2)
        w.push(0, 1); // no embedded 6ch (7 > 6)
        w.push(1, 1); // speaker mask enabled
        w.push(3, 2); // mask bits: (3+1)<<2 = 16
        w.push(0b0000_0000_0000_1000, 16); // mask: LFE1 only
        w.push(0, 8);
        let mut frame = DTSHD_SYNC.to_vec();
        frame.extend_from_slice(&w.finish());
        frame
    }

    #[test]
    fn test_extension_substream() {
        let mut info = AudioInfo::default();
        info.base.stream_type = StreamType::DtsHdMasterAudio;
        probe(&hd_frame(), &mut info);
        assert!(info.base.is_initialized);
        assert_eq!(info.bit_depth, 24);
        assert_eq!(info.sample_rate, 96_000);
        assert_eq!(info.lfe, 1);
        assert_eq!(info.channel_count, 6);
        assert!(info.base.is_vbr);
        assert!(!info.has_extensions);
    }

    #[test]
    fn test_dtsx_marker() {
        let mut buffer = hd_frame();
        buffer.extend_from_slice(&DTSX_MARKERS[0]);
        buffer.extend_from_slice(&DTSX_TAG);
        let mut info = AudioInfo::default();
        info.base.stream_type = StreamType::DtsHdMasterAudio;
        probe(&buffer, &mut info);
        assert!(info.has_extensions);
    }
}
