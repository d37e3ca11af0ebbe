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

//! AC-3 and E-AC-3 probing.
//!
//! Both share the `0B 77` syncword; the bitstream ID at the fifth byte picks
//! the branch. E-AC-3 streams are additionally scanned for an EMDF container
//! carrying joint-object-coding (Atmos) metadata.

use crate::{
    codec::bits::BitReader,
    stream::{AudioInfo, AudioMode},
};

pub const AC3_SYNC: [u8; 2] = [0x0B, 0x77];
const EMDF_SYNC: u16 = 0x5838;

/// Bitrates in kbps by frame-size code (the low bit selects the 44.1 kHz
/// padding variant of the same rate).
const FRMSIZECOD_BITRATES: [u32; 19] = [
    32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, 448, 512, 576, 640,
];

const ACMOD_CHANNELS: [u8; 8] = [2, 1, 2, 3, 3, 4, 4, 5];

pub fn probe(buffer: &[u8], info: &mut AudioInfo) {
    let Some(offset) = find_sync(buffer) else {
        return;
    };
    let frame = &buffer[offset..];
    if frame.len() < 8 {
        return;
    }
    let bsid = frame[5] >> 3;
    if bsid <= 10 {
        parse_ac3(frame, info);
    } else {
        parse_eac3(frame, info);
        if scan_emdf_for_joc(buffer) {
            info.has_extensions = true;
        }
    }
}

fn parse_ac3(frame: &[u8], info: &mut AudioInfo) {
    // Skip sync (2) and CRC1 (2).
    let mut r = BitReader::new(&frame[4..]);
    let fscod = r.read(2);
    let frmsizecod = r.read(6) as usize;
    let _bsid = r.read(5);
    let bsmod = r.read(3);
    let acmod = r.read(3) as usize;

    if acmod & 0x01 != 0 && acmod != 1 {
        r.skip(2); // cmixlev
    }
    if acmod & 0x04 != 0 {
        r.skip(2); // surmixlev
    }
    let mut surround = false;
    if acmod == 2 {
        surround = r.read(2) == 2; // dsurmod
    }
    let lfeon = r.flag();
    let dialnorm = r.read(5);
    if r.exhausted() {
        return;
    }

    info.sample_rate = match fscod {
        0 => 48_000,
        1 => 44_100,
        2 => 32_000,
        _ => return,
    };
    if let Some(kbps) = FRMSIZECOD_BITRATES.get(frmsizecod >> 1) {
        info.base.bit_rate = *kbps as u64 * 1000;
    }
    info.channel_count = ACMOD_CHANNELS[acmod & 0x07];
    info.lfe = lfeon as u8;
    info.dial_norm = -(dialnorm as i16);
    info.audio_mode = match acmod {
        0 => AudioMode::DualMono,
        2 if surround => AudioMode::Surround,
        2 => AudioMode::Stereo,
        _ => AudioMode::Unknown,
    };
    let _ = bsmod;
    info.base.is_initialized = true;
}

fn parse_eac3(frame: &[u8], info: &mut AudioInfo) {
    let mut r = BitReader::new(&frame[2..]);
    let _strmtyp = r.read(2);
    let _substreamid = r.read(3);
    let frmsiz = r.read(11);
    let fscod = r.read(2);
    let (sample_rate, blocks) = if fscod == 3 {
        let fscod2 = r.read(2);
        let rate = match fscod2 {
            0 => 24_000,
            1 => 22_050,
            2 => 16_000,
            _ => return,
        };
        (rate, 6u32)
    } else {
        let rate = match fscod {
            0 => 48_000,
            1 => 44_100,
            2 => 32_000,
            _ => return,
        };
        let numblkscod = r.read(2);
        (rate, [1u32, 2, 3, 6][numblkscod as usize])
    };
    let acmod = r.read(3) as usize;
    let lfeon = r.flag();
    let _bsid = r.read(5);
    let dialnorm = r.read(5);
    if r.exhausted() {
        return;
    }

    let frame_bytes = (frmsiz as u64 + 1) * 2;
    info.sample_rate = sample_rate;
    // One syncframe carries `blocks * 256` samples.
    info.base.bit_rate =
        frame_bytes * 8 * sample_rate as u64 / (blocks as u64 * 256);
    info.channel_count = ACMOD_CHANNELS[acmod & 0x07];
    info.lfe = lfeon as u8;
    info.dial_norm = -(dialnorm as i16);
    info.audio_mode = match acmod {
        0 => AudioMode::DualMono,
        2 => AudioMode::Stereo,
        _ => AudioMode::Unknown,
    };
    info.base.is_initialized = true;
}

/// Look for an EMDF container whose payload carries JOC objects.
fn scan_emdf_for_joc(buffer: &[u8]) -> bool {
    for i in 0..buffer.len().saturating_sub(8) {
        let sync = u16::from_be_bytes([buffer[i], buffer[i + 1]]);
        if sync != EMDF_SYNC {
            continue;
        }
        let mut r = BitReader::new(&buffer[i + 2..]);
        let _container_size = r.read(16);
        let version = r.read(2);
        let key_id = r.read(3);
        if version != 0 || key_id != 0 {
            continue;
        }
        let payload_id = r.read(5);
        // Payload 14 is object audio metadata; a non-zero object count marks
        // the stream as carrying Atmos.
        if payload_id != 14 {
            continue;
        }
        if r.flag() {
            r.skip(12); // smploffst + reserved
        }
        if r.flag() {
            r.skip(11); // duration
        }
        if r.flag() {
            r.skip(2); // groupid
        }
        if r.flag() {
            r.skip(8); // codecdata
        }
        let _discard_unknown = r.flag();
        let joc_num_objects = r.read(6);
        if !r.exhausted() && joc_num_objects > 0 {
            return true;
        }
    }
    false
}

pub(crate) fn find_sync(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == AC3_SYNC)
}
