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

//! The disk-folder backend: a `BDMV/` tree somewhere on the host filesystem.
//!
//! Blu-ray trees authored on case-insensitive filesystems show up with mixed
//! case once copied to disk, so every path component is matched
//! case-insensitively against the real directory listing.

use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};

use crate::{
    filesystem::{BdFileSystem, DirEntry},
    BdInfoError,
};

pub struct NativeFileSystem {
    root: PathBuf,
}

impl NativeFileSystem {
    pub fn new<P: AsRef<Path>>(root: P) -> NativeFileSystem {
        NativeFileSystem {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// The label reported for disc folders: the root directory's name.
    pub fn label(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, BdInfoError> {
        let mut current = self.root.clone();
        for component in path.split('/').filter(|c| !c.is_empty()) {
            let direct = current.join(component);
            if direct.exists() {
                current = direct;
                continue;
            }
            let mut matched = None;
            for entry in std::fs::read_dir(&current)? {
                let entry = entry?;
                if entry.file_name().to_string_lossy().eq_ignore_ascii_case(component) {
                    matched = Some(entry.path());
                    break;
                }
            }
            current = matched.ok_or_else(|| {
                BdInfoError::IoError(format!("{} not found under {}", component, current.display()))
            })?;
        }
        Ok(current)
    }
}

impl BdFileSystem for NativeFileSystem {
    fn open_read(&self, path: &str) -> Result<Box<dyn Read + Send>, BdInfoError> {
        let resolved = self.resolve(path)?;
        Ok(Box::new(File::open(resolved)?))
    }

    fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>, BdInfoError> {
        let resolved = self.resolve(path)?;
        if !resolved.is_dir() {
            return Err(BdInfoError::IoError(format!(
                "{} is not a directory",
                resolved.display()
            )));
        }
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(resolved)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                size: if metadata.is_file() { metadata.len() } else { 0 },
                is_dir: metadata.is_dir(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn stat_file(&self, path: &str) -> Result<u64, BdInfoError> {
        let resolved = self.resolve(path)?;
        Ok(std::fs::metadata(resolved)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_resolution() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("BDMV/PLAYLIST")).unwrap();
        std::fs::write(dir.path().join("BDMV/PLAYLIST/00001.mpls"), b"x").unwrap();

        let fs = NativeFileSystem::new(dir.path());
        assert_eq!(fs.stat_file("bdmv/playlist/00001.MPLS").unwrap(), 1);
        assert!(fs.dir_exists("BDMV/playlist"));
        let listing = fs.list_dir("BDMV/PLAYLIST").unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].name, "00001.mpls");
    }
}
