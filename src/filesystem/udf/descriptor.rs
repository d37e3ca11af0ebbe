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

//! ECMA-167 / UDF descriptor layouts.
//!
//! Everything on a UDF volume is little-endian with a 16-byte descriptor tag
//! up front. The fixed-layout structures are binrw structs; variable-layout
//! descriptors (logical volume, file identifiers) are decoded with explicit
//! offsets over the sector buffer.

use binrw::{binread, BinRead};
use std::io::Cursor;

use crate::BdInfoError;

// Descriptor tag identifiers (ECMA-167 3/7.2.1 and 4/7.2.1).
pub const TAG_PRIMARY_VOLUME: u16 = 1;
pub const TAG_ANCHOR_POINTER: u16 = 2;
pub const TAG_PARTITION: u16 = 5;
pub const TAG_LOGICAL_VOLUME: u16 = 6;
pub const TAG_TERMINATING: u16 = 8;
pub const TAG_FILE_SET: u16 = 256;
pub const TAG_FILE_IDENTIFIER: u16 = 257;
pub const TAG_FILE_ENTRY: u16 = 261;
pub const TAG_EXTENDED_FILE_ENTRY: u16 = 266;

/// ICB allocation-descriptor types (low three bits of the ICB flags).
pub const ICB_ALLOC_SHORT: u16 = 0;
pub const ICB_ALLOC_LONG: u16 = 1;
pub const ICB_ALLOC_EXTENDED: u16 = 2;
pub const ICB_ALLOC_EMBEDDED: u16 = 3;

/// ICB file types.
pub const ICB_FILE_TYPE_DIRECTORY: u8 = 4;

#[binread]
#[br(little)]
#[derive(Debug, Clone)]
pub struct DescriptorTag {
    pub tag_identifier: u16,
    pub descriptor_version: u16,
    pub tag_checksum: u8,
    pub reserved: u8,
    pub tag_serial_number: u16,
    pub descriptor_crc: u16,
    pub descriptor_crc_length: u16,
    pub tag_location: u32,
}

impl DescriptorTag {
    pub fn read_from(data: &[u8]) -> Result<DescriptorTag, BdInfoError> {
        Ok(DescriptorTag::read(&mut Cursor::new(data))?)
    }
}

#[binread]
#[br(little)]
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtentAd {
    pub length: u32,
    pub location: u32,
}

#[binread]
#[br(little)]
#[derive(Debug, Clone, Copy, Default)]
pub struct LongAd {
    pub length: u32,
    pub location: u32,
    pub partition: u16,
    pub implementation_use: [u8; 6],
}

impl LongAd {
    pub fn read_from(data: &[u8]) -> Result<LongAd, BdInfoError> {
        Ok(LongAd::read(&mut Cursor::new(data))?)
    }
}

#[binread]
#[br(little)]
#[derive(Debug, Clone)]
pub struct IcbTag {
    pub prior_recorded_entries: u32,
    pub strategy_type: u16,
    pub strategy_parameter: [u8; 2],
    pub maximum_entries: u16,
    pub reserved: u8,
    pub file_type: u8,
    pub parent_icb_location: [u8; 6],
    pub flags: u16,
}

impl IcbTag {
    pub fn allocation_type(&self) -> u16 {
        self.flags & 0x0007
    }
}

/// The fixed 176-byte head of a File Entry (tag 261). Allocation descriptors
/// or embedded data follow at `176 + ea_length`.
#[binread]
#[br(little)]
#[derive(Debug, Clone)]
pub struct FileEntryHeader {
    pub tag: DescriptorTag,
    pub icb_tag: IcbTag,
    pub uid: u32,
    pub gid: u32,
    pub permissions: u32,
    pub file_link_count: u16,
    pub record_format: u8,
    pub record_display_attributes: u8,
    pub record_length: u32,
    pub information_length: u64,
    pub logical_blocks_recorded: u64,
    pub access_time: [u8; 12],
    pub modification_time: [u8; 12],
    pub attribute_time: [u8; 12],
    pub checkpoint: u32,
    pub extended_attribute_icb: LongAd,
    pub implementation_identifier: [u8; 32],
    pub unique_id: u64,
    pub ea_length: u32,
    pub ad_length: u32,
}

pub const FILE_ENTRY_HEADER_LEN: usize = 176;

/// The fixed 216-byte head of an Extended File Entry (tag 266).
#[binread]
#[br(little)]
#[derive(Debug, Clone)]
pub struct ExtendedFileEntryHeader {
    pub tag: DescriptorTag,
    pub icb_tag: IcbTag,
    pub uid: u32,
    pub gid: u32,
    pub permissions: u32,
    pub file_link_count: u16,
    pub record_format: u8,
    pub record_display_attributes: u8,
    pub record_length: u32,
    pub information_length: u64,
    pub object_size: u64,
    pub logical_blocks_recorded: u64,
    pub access_time: [u8; 12],
    pub modification_time: [u8; 12],
    pub creation_time: [u8; 12],
    pub attribute_time: [u8; 12],
    pub checkpoint: u32,
    pub reserved: u32,
    pub extended_attribute_icb: LongAd,
    pub stream_directory_icb: LongAd,
    pub implementation_identifier: [u8; 32],
    pub unique_id: u64,
    pub ea_length: u32,
    pub ad_length: u32,
}

pub const EXTENDED_FILE_ENTRY_HEADER_LEN: usize = 216;

/// A normalized view of either File Entry flavor.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub file_type: u8,
    pub allocation_type: u16,
    pub information_length: u64,
    /// Offset of allocation descriptors (or embedded data) within the entry.
    pub data_offset: usize,
    pub ad_length: usize,
}

impl FileEntry {
    /// Decode a File Entry or Extended File Entry out of an ICB sector.
    pub fn parse(data: &[u8]) -> Result<FileEntry, BdInfoError> {
        let tag = DescriptorTag::read_from(data)?;
        match tag.tag_identifier {
            TAG_FILE_ENTRY => {
                let header = FileEntryHeader::read(&mut Cursor::new(data))?;
                Ok(FileEntry {
                    file_type: header.icb_tag.file_type,
                    allocation_type: header.icb_tag.allocation_type(),
                    information_length: header.information_length,
                    data_offset: FILE_ENTRY_HEADER_LEN + header.ea_length as usize,
                    ad_length: header.ad_length as usize,
                })
            }
            TAG_EXTENDED_FILE_ENTRY => {
                let header = ExtendedFileEntryHeader::read(&mut Cursor::new(data))?;
                Ok(FileEntry {
                    file_type: header.icb_tag.file_type,
                    allocation_type: header.icb_tag.allocation_type(),
                    information_length: header.information_length,
                    data_offset: EXTENDED_FILE_ENTRY_HEADER_LEN + header.ea_length as usize,
                    ad_length: header.ad_length as usize,
                })
            }
            other => Err(BdInfoError::InvalidUdf(format!(
                "expected a file entry, found tag {}",
                other
            ))),
        }
    }

    pub fn is_directory(&self) -> bool {
        self.file_type == ICB_FILE_TYPE_DIRECTORY
    }
}

/// One recorded allocation extent, still in logical terms.
#[derive(Debug, Clone, Copy)]
pub struct AllocationExtent {
    pub partition: u16,
    pub logical_block: u32,
    pub length: u32,
}

/// Walk short (8-byte) or long (16-byte) allocation descriptors.
///
/// The top two bits of each extent length carry the extent type; only
/// recorded-and-allocated extents (type 0) contribute data. A chained
/// continuation extent is a structure this reader does not support.
pub fn parse_allocation_descriptors(
    data: &[u8],
    allocation_type: u16,
    default_partition: u16,
) -> Result<Vec<AllocationExtent>, BdInfoError> {
    let mut extents = Vec::new();
    let stride = match allocation_type {
        ICB_ALLOC_SHORT => 8,
        ICB_ALLOC_LONG => 16,
        other => {
            return Err(BdInfoError::InvalidUdf(format!(
                "unsupported allocation descriptor type {}",
                other
            )))
        }
    };
    for chunk in data.chunks_exact(stride) {
        let raw_length = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        let extent_type = raw_length >> 30;
        let length = raw_length & 0x3FFF_FFFF;
        if length == 0 {
            break;
        }
        if extent_type == 3 {
            return Err(BdInfoError::InvalidUdf(
                "chained allocation descriptor extents are not supported".to_string(),
            ));
        }
        if extent_type != 0 {
            // Allocated-but-unrecorded extents read back as zeroes and never
            // appear in BD-ROM images.
            continue;
        }
        let logical_block = u32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]);
        let partition = if stride == 16 {
            u16::from_le_bytes([chunk[8], chunk[9]])
        } else {
            default_partition
        };
        extents.push(AllocationExtent {
            partition,
            logical_block,
            length,
        });
    }
    Ok(extents)
}

/// One parsed File Identifier Descriptor out of a directory's data.
#[derive(Debug, Clone)]
pub struct FileIdentifier {
    pub name: String,
    pub icb: LongAd,
    pub is_directory: bool,
    pub is_deleted: bool,
    pub is_parent: bool,
    /// Total record length including the 4-byte-boundary padding.
    pub record_length: usize,
}

impl FileIdentifier {
    pub fn parse(data: &[u8]) -> Result<FileIdentifier, BdInfoError> {
        if data.len() < 38 {
            return Err(BdInfoError::TruncatedRecord);
        }
        let tag = DescriptorTag::read_from(data)?;
        if tag.tag_identifier != TAG_FILE_IDENTIFIER {
            return Err(BdInfoError::InvalidUdf(format!(
                "expected a file identifier, found tag {}",
                tag.tag_identifier
            )));
        }
        let characteristics = data[18];
        let id_length = data[19] as usize;
        let icb = LongAd::read_from(&data[20..36])?;
        let iu_length = u16::from_le_bytes([data[36], data[37]]) as usize;
        let id_start = 38 + iu_length;
        if data.len() < id_start + id_length {
            return Err(BdInfoError::TruncatedRecord);
        }
        let name = decode_cs0(&data[id_start..id_start + id_length])?;
        // Records are rounded up to a 4-byte boundary.
        let record_length = (id_start + id_length).div_ceil(4) * 4;
        Ok(FileIdentifier {
            name,
            icb,
            is_directory: characteristics & 0x02 != 0,
            is_deleted: characteristics & 0x04 != 0,
            is_parent: characteristics & 0x08 != 0,
            record_length,
        })
    }
}

/// Decode an OSTA CS0 compressed identifier: compression ID 8 is Latin-1
/// stopping at NUL, compression ID 16 is UCS-2 big-endian stopping at 0x0000.
/// Any other compression ID marks the volume structure as inconsistent.
pub fn decode_cs0(bytes: &[u8]) -> Result<String, BdInfoError> {
    if bytes.is_empty() {
        return Ok(String::new());
    }
    match bytes[0] {
        8 => Ok(bytes[1..]
            .iter()
            .take_while(|b| **b != 0)
            .map(|b| *b as char)
            .collect()),
        16 => {
            let mut out = String::new();
            for pair in bytes[1..].chunks_exact(2) {
                let code = u16::from_be_bytes([pair[0], pair[1]]);
                if code == 0 {
                    break;
                }
                out.push(char::from_u32(code as u32).unwrap_or('?'));
            }
            Ok(out)
        }
        other => Err(BdInfoError::InvalidUdf(format!(
            "unsupported OSTA CS0 compression id {}",
            other
        ))),
    }
}

/// Decode a fixed-size dstring field: the final byte holds the significant
/// length (compression ID included).
pub fn decode_dstring(bytes: &[u8]) -> Result<String, BdInfoError> {
    if bytes.is_empty() {
        return Ok(String::new());
    }
    let length = (*bytes.last().unwrap() as usize).min(bytes.len() - 1);
    decode_cs0(&bytes[..length])
}
