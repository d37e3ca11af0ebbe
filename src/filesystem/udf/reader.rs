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

//! A sequential reader stitched over a file's allocation extents.
//!
//! Extents need not be contiguous on the image; the reader advances through
//! them in order using positional reads against the shared descriptor, and
//! clamps the total to the file's information length.

use std::{io, io::Read, sync::Arc};

use crate::filesystem::ReadAt;

pub struct ExtentReader {
    source: Arc<dyn ReadAt>,
    /// `(byte offset on the image, byte length)` per extent.
    extents: Vec<(u64, u64)>,
    extent_index: usize,
    /// Position within the current extent.
    extent_pos: u64,
    remaining: u64,
}

impl ExtentReader {
    pub fn new(source: Arc<dyn ReadAt>, extents: Vec<(u64, u64)>, information_length: u64) -> Self {
        ExtentReader {
            source,
            extents,
            extent_index: 0,
            extent_pos: 0,
            remaining: information_length,
        }
    }
}

impl Read for ExtentReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.remaining > 0 {
            let Some(&(offset, length)) = self.extents.get(self.extent_index) else {
                break;
            };
            if self.extent_pos >= length {
                self.extent_index += 1;
                self.extent_pos = 0;
                continue;
            }
            let available = (length - self.extent_pos)
                .min(self.remaining)
                .min(buf.len() as u64) as usize;
            if available == 0 {
                break;
            }
            let n = self
                .source
                .read_at(&mut buf[..available], offset + self.extent_pos)?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "extent read past end of image",
                ));
            }
            self.extent_pos += n as u64;
            self.remaining -= n as u64;
            return Ok(n);
        }
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stitches_non_contiguous_extents() {
        let mut image = vec![0u8; 64];
        image[10..14].copy_from_slice(b"abcd");
        image[30..34].copy_from_slice(b"efgh");
        let source: Arc<dyn ReadAt> = Arc::new(image);

        let mut reader = ExtentReader::new(source, vec![(10, 4), (30, 4)], 7);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        // Information length clamps the final extent.
        assert_eq!(out, b"abcdefg");
    }
}
