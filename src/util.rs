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

//! The `util` module provides formatting helpers and a big-endian slice
//! reader shared by the offset-driven binary parsers.

use crate::BdInfoError;

/// Format an integer with comma thousands separators, e.g. `48846512128`
/// becomes `"48,846,512,128"`.
pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Format a duration in seconds as `h:mm:ss.mmm`, the layout used throughout
/// the report tables.
pub fn format_duration(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let s = (total_ms / 1000) % 60;
    let m = (total_ms / 60_000) % 60;
    let h = total_ms / 3_600_000;
    format!("{}:{:02}:{:02}.{:03}", h, m, s, ms)
}

/// Round half to even (banker's rounding). VBR bitrates are computed this way
/// so repeated scans agree with the legacy tool to the last digit.
pub fn round_half_even(value: f64) -> u64 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    let floor = value.floor();
    let frac = value - floor;
    let below = floor as u64;
    if frac > 0.5 {
        below + 1
    } else if frac < 0.5 {
        below
    } else if below % 2 == 0 {
        below
    } else {
        below + 1
    }
}

/// A bounds-checked big-endian reader over a byte slice.
///
/// MPLS, CLPI, and the PSI tables are all offset-driven big-endian formats;
/// every read returns `TruncatedRecord` past the end so callers can either
/// propagate the error or skip the short entry and continue.
pub struct BeReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BeReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn seek(&mut self, pos: usize) -> Result<(), BdInfoError> {
        if pos > self.data.len() {
            return Err(BdInfoError::TruncatedRecord);
        }
        self.pos = pos;
        Ok(())
    }

    pub fn skip(&mut self, count: usize) -> Result<(), BdInfoError> {
        self.seek(self.pos + count)
    }

    pub fn u8(&mut self) -> Result<u8, BdInfoError> {
        let b = *self.data.get(self.pos).ok_or(BdInfoError::TruncatedRecord)?;
        self.pos += 1;
        Ok(b)
    }

    pub fn u16(&mut self) -> Result<u16, BdInfoError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> Result<u32, BdInfoError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn i32(&mut self) -> Result<i32, BdInfoError> {
        Ok(self.u32()? as i32)
    }

    pub fn take(&mut self, count: usize) -> Result<&'a [u8], BdInfoError> {
        let end = self.pos.checked_add(count).ok_or(BdInfoError::TruncatedRecord)?;
        if end > self.data.len() {
            return Err(BdInfoError::TruncatedRecord);
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Read `count` bytes as an ASCII string. Non-printable bytes are dropped,
    /// matching how clip and codec identifiers are stored.
    pub fn string(&mut self, count: usize) -> Result<String, BdInfoError> {
        let bytes = self.take(count)?;
        Ok(bytes
            .iter()
            .filter(|b| b.is_ascii() && **b >= 32)
            .map(|b| *b as char)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(1000), "1,000");
        assert_eq!(format_thousands(48_846_512_128), "48,846,512,128");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "0:00:00.000");
        assert_eq!(format_duration(6911.904), "1:55:11.904");
        assert_eq!(format_duration(59.9995), "0:01:00.000");
    }

    #[test]
    fn test_round_half_even() {
        assert_eq!(round_half_even(2.5), 2);
        assert_eq!(round_half_even(3.5), 4);
        assert_eq!(round_half_even(3.2), 3);
        assert_eq!(round_half_even(3.7), 4);
        assert_eq!(round_half_even(-1.0), 0);
    }

    #[test]
    fn test_be_reader_bounds() {
        let data = [0x12, 0x34, 0x56, 0x78];
        let mut r = BeReader::new(&data);
        assert_eq!(r.u16().unwrap(), 0x1234);
        assert_eq!(r.u16().unwrap(), 0x5678);
        assert!(matches!(r.u8(), Err(BdInfoError::TruncatedRecord)));
    }
}
