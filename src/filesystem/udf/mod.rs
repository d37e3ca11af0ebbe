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

//! A read-only UDF 2.50 filesystem over a disc image.
//!
//! The mount sequence follows ECMA-167: verify the Volume Recognition
//! Sequence, probe the anchor sectors for the volume descriptor pointer, walk
//! the descriptor sequence for the primary volume, partition, and logical
//! volume descriptors, then resolve the file-set descriptor to the root
//! directory ICB. BD-ROM images put the directory hierarchy behind a
//! metadata partition; its allocation is resolved lazily and cached.

pub mod descriptor;
pub mod reader;

use std::{
    collections::BTreeMap,
    fs::File,
    io::Read,
    path::Path,
    sync::{Arc, Mutex},
};

use crate::{
    filesystem::{BdFileSystem, DirEntry, ReadAt},
    BdInfoError,
};
use descriptor::{
    decode_dstring, parse_allocation_descriptors, AllocationExtent, DescriptorTag, FileEntry,
    FileIdentifier, LongAd, ICB_ALLOC_EMBEDDED, TAG_ANCHOR_POINTER, TAG_FILE_SET,
    TAG_LOGICAL_VOLUME, TAG_PARTITION, TAG_PRIMARY_VOLUME, TAG_TERMINATING,
};
use reader::ExtentReader;

const SECTOR_SIZE: u64 = 2048;
const VRS_START_SECTOR: u64 = 16;
const METADATA_PARTITION_ID: &[u8] = b"*UDF Metadata Partition";

#[derive(Debug, Clone)]
enum PartitionMap {
    /// Type 1: a direct binding to a physical partition number.
    Physical { partition_number: u16 },
    /// Type 2 metadata partition: logical blocks indirect through the
    /// metadata file's allocation. The metadata file itself lives in the
    /// main physical partition.
    Metadata {
        /// Logical block of the metadata file ICB within the main partition.
        icb_location: u32,
    },
}

/// A mounted image. One shared descriptor serves all readers through
/// positional reads.
pub struct UdfFileSystem {
    source: Arc<dyn ReadAt>,
    block_size: u64,
    volume_label: String,
    /// Physical partition number to starting sector.
    partition_starts: BTreeMap<u16, u32>,
    partition_maps: Vec<PartitionMap>,
    root_icb: LongAd,
    /// Metadata-file extents, `(first file block, block count, partition lbn)`,
    /// filled on first metadata resolution.
    metadata_extents: Mutex<Option<Vec<(u32, u32, u32)>>>,
}

impl UdfFileSystem {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<UdfFileSystem, BdInfoError> {
        let file = File::open(path)?;
        Self::mount(Arc::new(file))
    }

    /// Mount any positional-read source carrying a UDF volume.
    pub fn mount(source: Arc<dyn ReadAt>) -> Result<UdfFileSystem, BdInfoError> {
        check_recognition_sequence(source.as_ref())?;

        let total_sectors = ReadAt::len(source.as_ref())? / SECTOR_SIZE;
        let anchor = locate_anchor(source.as_ref(), total_sectors)?;

        let mut fs = UdfFileSystem {
            source,
            block_size: SECTOR_SIZE,
            volume_label: String::new(),
            partition_starts: BTreeMap::new(),
            partition_maps: Vec::new(),
            root_icb: LongAd::default(),
            metadata_extents: Mutex::new(None),
        };

        let fsd_location = fs.read_descriptor_sequence(anchor)?;
        fs.resolve_root(fsd_location)?;
        log::debug!(
            "mounted UDF volume '{}', {} partition map(s)",
            fs.volume_label,
            fs.partition_maps.len()
        );
        Ok(fs)
    }

    pub fn label(&self) -> String {
        self.volume_label.clone()
    }

    fn read_sector(&self, sector: u64) -> Result<Vec<u8>, BdInfoError> {
        let mut buf = vec![0u8; self.block_size as usize];
        self.source.read_exact_at(&mut buf, sector * self.block_size)?;
        Ok(buf)
    }

    /// Walk the main volume descriptor sequence, capturing the volume label,
    /// partition layout, and the file-set descriptor location.
    fn read_descriptor_sequence(&mut self, extent: (u32, u32)) -> Result<LongAd, BdInfoError> {
        let (location, length) = extent;
        let sector_count = (length as u64).div_ceil(SECTOR_SIZE);
        let mut fsd_location = None;

        for index in 0..sector_count {
            let data = self.read_sector(location as u64 + index)?;
            let tag = DescriptorTag::read_from(&data)?;
            match tag.tag_identifier {
                TAG_PRIMARY_VOLUME => {
                    self.volume_label = decode_dstring(&data[24..56])?;
                    log::trace!("primary volume descriptor: label '{}'", self.volume_label);
                }
                TAG_PARTITION => {
                    let number = u16::from_le_bytes([data[22], data[23]]);
                    let start = u32::from_le_bytes([data[188], data[189], data[190], data[191]]);
                    log::trace!("partition {} starts at sector {}", number, start);
                    self.partition_starts.insert(number, start);
                }
                TAG_LOGICAL_VOLUME => {
                    self.block_size =
                        u32::from_le_bytes([data[212], data[213], data[214], data[215]]) as u64;
                    fsd_location = Some(LongAd::read_from(&data[248..264])?);
                    let map_count =
                        u32::from_le_bytes([data[268], data[269], data[270], data[271]]);
                    self.parse_partition_maps(&data[440..], map_count)?;
                }
                TAG_TERMINATING => break,
                other => {
                    log::trace!("skipping descriptor tag {}", other);
                }
            }
        }

        fsd_location.ok_or_else(|| {
            BdInfoError::InvalidUdf("no logical volume descriptor in sequence".to_string())
        })
    }

    fn parse_partition_maps(&mut self, table: &[u8], count: u32) -> Result<(), BdInfoError> {
        let mut offset = 0usize;
        for _ in 0..count {
            if offset + 2 > table.len() {
                return Err(BdInfoError::InvalidUdf("partition map table truncated".to_string()));
            }
            let map_type = table[offset];
            let map_length = table[offset + 1] as usize;
            if map_length == 0 || offset + map_length > table.len() {
                return Err(BdInfoError::InvalidUdf("partition map length invalid".to_string()));
            }
            let map = &table[offset..offset + map_length];
            match map_type {
                1 => {
                    let partition_number = u16::from_le_bytes([map[4], map[5]]);
                    self.partition_maps
                        .push(PartitionMap::Physical { partition_number });
                }
                2 => {
                    let identifier = &map[5..28];
                    if identifier == METADATA_PARTITION_ID {
                        // Extent-ad at offset 36 of the map; a length of one
                        // marks the location field as a plain LBN.
                        let extent_length =
                            u32::from_le_bytes([map[36], map[37], map[38], map[39]]);
                        let location = u32::from_le_bytes([map[40], map[41], map[42], map[43]]);
                        if extent_length != 1 {
                            log::trace!(
                                "metadata file extent length {} (location {})",
                                extent_length,
                                location
                            );
                        }
                        self.partition_maps
                            .push(PartitionMap::Metadata { icb_location: location });
                    } else {
                        log::warn!("ignoring unrecognized type-2 partition map");
                        self.partition_maps.push(PartitionMap::Physical {
                            partition_number: u16::from_le_bytes([map[38], map[39]]),
                        });
                    }
                }
                other => {
                    return Err(BdInfoError::InvalidUdf(format!(
                        "unsupported partition map type {}",
                        other
                    )))
                }
            }
            offset += map_length;
        }
        Ok(())
    }

    /// Map `(partition reference, logical block)` to a physical sector.
    fn resolve_lba(&self, partition_ref: u16, logical_block: u32) -> Result<u64, BdInfoError> {
        let map = self.partition_maps.get(partition_ref as usize).ok_or_else(|| {
            BdInfoError::InvalidUdf(format!("partition reference {} out of range", partition_ref))
        })?;
        match map {
            PartitionMap::Physical { partition_number } => {
                let start = self.partition_start(*partition_number)?;
                Ok(start as u64 + logical_block as u64)
            }
            PartitionMap::Metadata { icb_location } => {
                let partition_number = self.main_partition_number()?;
                let start = self.partition_start(partition_number)?;
                let extents = self.metadata_extents(partition_number, *icb_location)?;
                for (first_block, block_count, partition_lbn) in extents {
                    if logical_block >= first_block && logical_block < first_block + block_count {
                        let mapped = partition_lbn + (logical_block - first_block);
                        return Ok(start as u64 + mapped as u64);
                    }
                }
                Err(BdInfoError::InvalidUdf(format!(
                    "metadata block {} outside the metadata file",
                    logical_block
                )))
            }
        }
    }

    fn main_partition_number(&self) -> Result<u16, BdInfoError> {
        self.partition_starts.keys().next().copied().ok_or_else(|| {
            BdInfoError::InvalidUdf("no physical partition descriptor".to_string())
        })
    }

    fn partition_start(&self, partition_number: u16) -> Result<u32, BdInfoError> {
        self.partition_starts.get(&partition_number).copied().ok_or_else(|| {
            BdInfoError::InvalidUdf(format!("partition {} has no descriptor", partition_number))
        })
    }

    /// Load (once) the metadata file's allocation. The metadata file itself
    /// lives in the physical partition, so its ICB resolves directly.
    fn metadata_extents(
        &self,
        partition_number: u16,
        icb_location: u32,
    ) -> Result<Vec<(u32, u32, u32)>, BdInfoError> {
        let mut guard = self.metadata_extents.lock().expect("metadata extent lock");
        if let Some(cached) = guard.as_ref() {
            return Ok(cached.clone());
        }

        let start = self.partition_start(partition_number)?;
        let sector = start as u64 + icb_location as u64;
        let data = self.read_sector(sector)?;
        let entry = FileEntry::parse(&data)?;
        let ads = &data[entry.data_offset..entry.data_offset + entry.ad_length];
        let raw = parse_allocation_descriptors(ads, entry.allocation_type, 0)?;

        let mut extents = Vec::new();
        let mut file_block = 0u32;
        for extent in raw {
            let blocks = (extent.length as u64).div_ceil(self.block_size) as u32;
            extents.push((file_block, blocks, extent.logical_block));
            file_block += blocks;
        }
        log::debug!("metadata partition file spans {} extent(s)", extents.len());
        *guard = Some(extents.clone());
        Ok(extents)
    }

    fn resolve_root(&mut self, fsd_location: LongAd) -> Result<(), BdInfoError> {
        let sector = self.resolve_lba(fsd_location.partition, fsd_location.location)?;
        let data = self.read_sector(sector)?;
        let tag = DescriptorTag::read_from(&data)?;
        if tag.tag_identifier != TAG_FILE_SET {
            return Err(BdInfoError::InvalidUdf(format!(
                "expected file set descriptor, found tag {}",
                tag.tag_identifier
            )));
        }
        self.root_icb = LongAd::read_from(&data[400..416])?;
        Ok(())
    }

    fn read_file_entry(&self, icb: &LongAd) -> Result<(FileEntry, Vec<u8>), BdInfoError> {
        let sector = self.resolve_lba(icb.partition, icb.location)?;
        let data = self.read_sector(sector)?;
        Ok((FileEntry::parse(&data)?, data))
    }

    /// Collect a file's recorded byte extents as `(byte offset, byte length)`
    /// pairs, clamped to the information length by the caller.
    fn file_extents(
        &self,
        entry: &FileEntry,
        entry_data: &[u8],
        icb: &LongAd,
    ) -> Result<Vec<(u64, u64)>, BdInfoError> {
        let ads = entry_data
            .get(entry.data_offset..entry.data_offset + entry.ad_length)
            .ok_or(BdInfoError::TruncatedRecord)?;
        let raw = parse_allocation_descriptors(ads, entry.allocation_type, icb.partition)?;
        let mut extents = Vec::with_capacity(raw.len());
        for AllocationExtent {
            partition,
            logical_block,
            length,
        } in raw
        {
            let sector = self.resolve_lba(partition, logical_block)?;
            extents.push((sector * self.block_size, length as u64));
        }
        Ok(extents)
    }

    /// Read a whole directory's data, either embedded in the ICB or through
    /// its allocation extents.
    fn read_directory_data(&self, entry: &FileEntry, entry_data: &[u8], icb: &LongAd) -> Result<Vec<u8>, BdInfoError> {
        if entry.allocation_type == ICB_ALLOC_EMBEDDED {
            let end = entry.data_offset + entry.information_length as usize;
            return entry_data
                .get(entry.data_offset..end)
                .map(|d| d.to_vec())
                .ok_or(BdInfoError::TruncatedRecord);
        }
        let extents = self.file_extents(entry, entry_data, icb)?;
        let mut data = Vec::with_capacity(entry.information_length as usize);
        for (offset, length) in extents {
            let mut chunk = vec![0u8; length as usize];
            self.source.read_exact_at(&mut chunk, offset)?;
            data.extend_from_slice(&chunk);
        }
        data.truncate(entry.information_length as usize);
        Ok(data)
    }

    fn directory_entries(&self, icb: &LongAd) -> Result<Vec<FileIdentifier>, BdInfoError> {
        let (entry, entry_data) = self.read_file_entry(icb)?;
        if !entry.is_directory() {
            return Err(BdInfoError::InvalidUdf("not a directory".to_string()));
        }
        let data = self.read_directory_data(&entry, &entry_data, icb)?;
        let mut identifiers = Vec::new();
        let mut offset = 0usize;
        while offset + 38 <= data.len() {
            let fid = FileIdentifier::parse(&data[offset..])?;
            offset += fid.record_length;
            if fid.is_parent || fid.is_deleted {
                continue;
            }
            identifiers.push(fid);
        }
        Ok(identifiers)
    }

    /// Walk from the root, matching each component case-insensitively.
    fn find(&self, path: &str) -> Result<FileIdentifier, BdInfoError> {
        let mut current = FileIdentifier {
            name: String::new(),
            icb: self.root_icb,
            is_directory: true,
            is_deleted: false,
            is_parent: false,
            record_length: 0,
        };
        for component in path.split('/').filter(|c| !c.is_empty()) {
            let entries = self.directory_entries(&current.icb)?;
            current = entries
                .into_iter()
                .find(|e| e.name.eq_ignore_ascii_case(component))
                .ok_or_else(|| BdInfoError::IoError(format!("{} not found in image", path)))?;
        }
        Ok(current)
    }
}

impl BdFileSystem for UdfFileSystem {
    fn open_read(&self, path: &str) -> Result<Box<dyn Read + Send>, BdInfoError> {
        let fid = self.find(path)?;
        let (entry, entry_data) = self.read_file_entry(&fid.icb)?;
        if entry.allocation_type == ICB_ALLOC_EMBEDDED {
            let end = entry.data_offset + entry.information_length as usize;
            let data = entry_data
                .get(entry.data_offset..end)
                .map(|d| d.to_vec())
                .ok_or(BdInfoError::TruncatedRecord)?;
            return Ok(Box::new(std::io::Cursor::new(data)));
        }
        let extents = self.file_extents(&entry, &entry_data, &fid.icb)?;
        Ok(Box::new(ExtentReader::new(
            Arc::clone(&self.source),
            extents,
            entry.information_length,
        )))
    }

    fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>, BdInfoError> {
        let fid = self.find(path)?;
        if !fid.is_directory && !path.is_empty() {
            return Err(BdInfoError::IoError(format!("{} is not a directory", path)));
        }
        let mut entries = Vec::new();
        for child in self.directory_entries(&fid.icb)? {
            let size = if child.is_directory {
                0
            } else {
                self.read_file_entry(&child.icb)?.0.information_length
            };
            entries.push(DirEntry {
                name: child.name,
                size,
                is_dir: child.is_directory,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn stat_file(&self, path: &str) -> Result<u64, BdInfoError> {
        let fid = self.find(path)?;
        Ok(self.read_file_entry(&fid.icb)?.0.information_length)
    }
}

/// The Volume Recognition Sequence starts at sector 16: a `BEA01` descriptor,
/// an `NSR02` or `NSR03` descriptor somewhere before the closing `TEA01`.
fn check_recognition_sequence(source: &dyn ReadAt) -> Result<(), BdInfoError> {
    let mut found_bea = false;
    let mut found_nsr = false;
    for index in 0..16u64 {
        let mut descriptor = [0u8; 8];
        let offset = (VRS_START_SECTOR + index) * SECTOR_SIZE;
        if source.read_exact_at(&mut descriptor, offset).is_err() {
            break;
        }
        let identifier = &descriptor[1..6];
        match identifier {
            b"BEA01" => found_bea = true,
            b"NSR02" | b"NSR03" => found_nsr = true,
            b"TEA01" => break,
            _ => {
                if !found_bea {
                    break;
                }
            }
        }
    }
    if found_nsr {
        Ok(())
    } else {
        Err(BdInfoError::NotUdf)
    }
}

/// Probe the anchor sectors for the volume descriptor pointer and return the
/// main volume descriptor sequence extent `(location, length)`.
fn locate_anchor(source: &dyn ReadAt, total_sectors: u64) -> Result<(u32, u32), BdInfoError> {
    let candidates = [
        256,
        512,
        total_sectors.saturating_sub(256),
        total_sectors.saturating_sub(1),
    ];
    for sector in candidates {
        let mut data = vec![0u8; SECTOR_SIZE as usize];
        if source.read_exact_at(&mut data, sector * SECTOR_SIZE).is_err() {
            continue;
        }
        let Ok(tag) = DescriptorTag::read_from(&data) else {
            continue;
        };
        if tag.tag_identifier == TAG_ANCHOR_POINTER {
            let length = u32::from_le_bytes([data[16], data[17], data[18], data[19]]);
            let location = u32::from_le_bytes([data[20], data[21], data[22], data[23]]);
            log::trace!("anchor at sector {}: main VDS at {} (+{})", sector, location, length);
            return Ok((location, length));
        }
    }
    Err(BdInfoError::InvalidUdf("no anchor volume descriptor pointer".to_string()))
}
