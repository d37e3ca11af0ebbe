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

//! The read-only filesystem abstraction the scanner runs against.
//!
//! Two backends implement the same capability set: [`native::NativeFileSystem`]
//! wraps a directory tree on the host filesystem, [`udf::UdfFileSystem`]
//! mounts a UDF 2.50 disc image. Both honor a single positional-read
//! contract so one underlying descriptor can be shared across readers.

pub mod native;
pub mod udf;

use std::{fs::File, io, io::Read};

use crate::BdInfoError;

/// Positional reads over a shared descriptor. Implementations must not move
/// any shared cursor, so concurrent readers stay independent.
pub trait ReadAt: Send + Sync {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        let mut filled = 0usize;
        while filled < buf.len() {
            match self.read_at(&mut buf[filled..], offset + filled as u64)? {
                0 => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "read past end of source",
                    ))
                }
                n => filled += n,
            }
        }
        Ok(())
    }

    fn len(&self) -> io::Result<u64>;
}

#[cfg(unix)]
impl ReadAt for File {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::unix::fs::FileExt::read_at(self, buf, offset)
    }

    fn len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }
}

#[cfg(windows)]
impl ReadAt for File {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::windows::fs::FileExt::seek_read(self, buf, offset)
    }

    fn len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }
}

// In-memory images; used by the test fixtures.
impl ReadAt for Vec<u8> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let start = (offset as usize).min(self.len());
        let end = (start + buf.len()).min(self.len());
        buf[..end - start].copy_from_slice(&self[start..end]);
        Ok(end - start)
    }

    fn len(&self) -> io::Result<u64> {
        Ok(Vec::len(self) as u64)
    }
}

/// One directory listing entry.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
}

/// The capability set the scanner needs. Paths are `/`-separated and matched
/// case-insensitively, rooted at the BDMV parent.
pub trait BdFileSystem: Send + Sync {
    fn open_read(&self, path: &str) -> Result<Box<dyn Read + Send>, BdInfoError>;

    fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>, BdInfoError>;

    fn stat_file(&self, path: &str) -> Result<u64, BdInfoError>;

    /// True when the path names an existing directory.
    fn dir_exists(&self, path: &str) -> bool {
        self.list_dir(path).is_ok()
    }

    /// Read a whole file into memory. Only used for the small structure
    /// files; stream files are always streamed.
    fn read_file(&self, path: &str) -> Result<Vec<u8>, BdInfoError> {
        let mut reader = self.open_read(path)?;
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(data)
    }
}
