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

//! A most-significant-bit-first reader with the Exp-Golomb decodes the AVC
//! and HEVC parameter-set parsers need. Reads past the end return zero and
//! latch an exhausted flag, so a truncated header degrades instead of
//! panicking.

pub struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
    exhausted: bool,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            bit_pos: 0,
            exhausted: false,
        }
    }

    pub fn exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn bits_left(&self) -> usize {
        self.data.len() * 8 - self.bit_pos.min(self.data.len() * 8)
    }

    pub fn read(&mut self, count: usize) -> u32 {
        debug_assert!(count <= 32);
        let mut value = 0u32;
        for _ in 0..count {
            match self.data.get(self.bit_pos / 8) {
                Some(byte) => {
                    let bit = (byte >> (7 - self.bit_pos % 8)) & 1;
                    value = (value << 1) | bit as u32;
                }
                None => {
                    self.exhausted = true;
                    value <<= 1;
                }
            }
            self.bit_pos += 1;
        }
        value
    }

    pub fn read64(&mut self, count: usize) -> u64 {
        let high = if count > 32 { self.read(count - 32) as u64 } else { 0 };
        let low = self.read(count.min(32)) as u64;
        (high << count.min(32)) | low
    }

    pub fn flag(&mut self) -> bool {
        self.read(1) != 0
    }

    pub fn skip(&mut self, count: usize) {
        self.bit_pos += count;
        if self.bit_pos > self.data.len() * 8 {
            self.exhausted = true;
        }
    }

    /// Unsigned Exp-Golomb.
    pub fn ue(&mut self) -> u32 {
        let mut leading_zeros = 0usize;
        loop {
            if self.exhausted || leading_zeros > 31 {
                self.exhausted = true;
                return 0;
            }
            if self.read(1) != 0 {
                break;
            }
            leading_zeros += 1;
        }
        if leading_zeros == 0 {
            return 0;
        }
        (1u32 << leading_zeros) - 1 + self.read(leading_zeros)
    }

    /// Signed Exp-Golomb.
    pub fn se(&mut self) -> i32 {
        let code = self.ue();
        let magnitude = code.div_ceil(2) as i32;
        if code % 2 == 1 {
            magnitude
        } else {
            -magnitude
        }
    }
}

/// Strip NAL emulation-prevention bytes (`00 00 03` becomes `00 00`).
pub fn unescape_nal(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut zeros = 0usize;
    for &byte in data {
        if zeros >= 2 && byte == 0x03 {
            zeros = 0;
            continue;
        }
        if byte == 0 {
            zeros += 1;
        } else {
            zeros = 0;
        }
        out.push(byte);
    }
    out
}

/// Yield `(offset, length)` of every Annex-B unit in the buffer: the bytes
/// between one `00 00 01` start code and the next.
pub fn start_code_units(data: &[u8]) -> Vec<(usize, usize)> {
    let mut units = Vec::new();
    let mut search = 0usize;
    let mut current: Option<usize> = None;
    while search + 3 <= data.len() {
        if data[search] == 0 && data[search + 1] == 0 && data[search + 2] == 1 {
            if let Some(start) = current {
                let end = if search > 0 && data[search - 1] == 0 {
                    search - 1
                } else {
                    search
                };
                units.push((start, end.saturating_sub(start)));
            }
            current = Some(search + 3);
            search += 3;
        } else {
            search += 1;
        }
    }
    if let Some(start) = current {
        units.push((start, data.len() - start));
    }
    units
}
