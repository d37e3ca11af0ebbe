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

    tests/common/mod.rs

    Fixture builders: synthetic MPLS, CLPI, M2TS, and UDF volumes assembled
    in memory for the integration suites.
*/

#![allow(dead_code)]

use hex::encode;
use sha1::{Digest, Sha1};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn sha1_hex(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// MPLS
// ---------------------------------------------------------------------------

pub struct MplsItem {
    pub clip: &'static str,
    pub in_ticks: u32,
    pub out_ticks: u32,
    /// `(coding type, pid, language)` of the declared streams.
    pub streams: Vec<(u8, u16, &'static str)>,
    /// Alternate-angle clip names.
    pub angles: Vec<&'static str>,
}

pub struct MplsChapter {
    pub item: u16,
    pub ticks: u32,
}

/// Assemble an `.mpls` the way the structure parser reads it.
pub fn build_mpls(items: &[MplsItem], chapters: &[MplsChapter], flags_0x38: u8) -> Vec<u8> {
    let mut items_block = Vec::new();
    items_block.extend_from_slice(&0u32.to_be_bytes()); // list length (unused)
    items_block.extend_from_slice(&0u16.to_be_bytes());
    items_block.extend_from_slice(&(items.len() as u16).to_be_bytes());

    for item in items {
        let mut body = Vec::new();
        body.extend_from_slice(item.clip.as_bytes()); // 5-char name
        body.extend_from_slice(b"M2TS"); // 4-char type
        body.push(0); // reserved
        body.push(if item.angles.is_empty() { 0x00 } else { 0x10 });
        body.push(0); // STC id
        body.extend_from_slice(&item.in_ticks.to_be_bytes());
        body.extend_from_slice(&item.out_ticks.to_be_bytes());
        body.extend_from_slice(&[0u8; 12]); // UO mask, flags, still
        if !item.angles.is_empty() {
            body.push((item.angles.len() + 1) as u8);
            body.push(0);
            for angle in item.angles.iter() {
                body.extend_from_slice(angle.as_bytes());
                body.extend_from_slice(b"M2TS");
                body.push(0);
            }
        }

        let mut stn = Vec::new();
        stn.extend_from_slice(&[0, 0]); // reserved
        let video: Vec<_> = item.streams.iter().filter(|(t, _, _)| *t == 0x1B || *t == 0x24 || *t == 0x02 || *t == 0x20 || *t == 0xEA).collect();
        let audio: Vec<_> = item.streams.iter().filter(|(t, _, _)| (0x80..=0x86).contains(t) || *t == 0xA1 || *t == 0xA2 || *t == 0x03 || *t == 0x04 || *t == 0x0F || *t == 0x11).collect();
        let graphics: Vec<_> = item.streams.iter().filter(|(t, _, _)| *t == 0x90 || *t == 0x91).collect();
        let text: Vec<_> = item.streams.iter().filter(|(t, _, _)| *t == 0x92).collect();
        stn.push(video.len() as u8);
        stn.push(audio.len() as u8);
        stn.push(graphics.len() as u8);
        stn.push(0); // IG
        stn.push(0); // secondary audio
        stn.push(0); // secondary video
        stn.push(text.len() as u8); // PIP group reused for text entries
        stn.extend_from_slice(&[0u8; 5]);
        for group in [&video, &audio, &graphics, &text] {
            for (coding, pid, lang) in group.iter() {
                stn.extend_from_slice(&stream_entry(*coding, *pid, lang));
            }
        }
        body.extend_from_slice(&(stn.len() as u16).to_be_bytes());
        body.extend_from_slice(&stn);

        items_block.extend_from_slice(&(body.len() as u16).to_be_bytes());
        items_block.extend_from_slice(&body);
    }

    let mut chapter_block = Vec::new();
    chapter_block.extend_from_slice(&0u32.to_be_bytes()); // length (unused)
    chapter_block.extend_from_slice(&(chapters.len() as u16).to_be_bytes());
    for chapter in chapters {
        let mut record = [0u8; 14];
        record[1] = 1; // play-item chapter
        record[2..4].copy_from_slice(&chapter.item.to_be_bytes());
        record[4..8].copy_from_slice(&chapter.ticks.to_be_bytes());
        chapter_block.extend_from_slice(&record);
    }

    let playlist_offset = 0x40u32;
    let chapters_offset = playlist_offset + items_block.len() as u32;
    let mut out = Vec::new();
    out.extend_from_slice(b"MPLS0200");
    out.extend_from_slice(&playlist_offset.to_be_bytes());
    out.extend_from_slice(&chapters_offset.to_be_bytes());
    out.resize(0x38, 0);
    out.push(flags_0x38);
    out.resize(playlist_offset as usize, 0);
    out.extend_from_slice(&items_block);
    out.extend_from_slice(&chapter_block);
    out
}

fn stream_entry(coding: u8, pid: u16, lang: &str) -> Vec<u8> {
    let mut entry = Vec::new();
    entry.push(3); // header length: type + pid
    entry.push(1); // direct PID header
    entry.extend_from_slice(&pid.to_be_bytes());

    let mut attrs = vec![coding];
    match coding {
        0x1B | 0x24 | 0x02 | 0x20 | 0xEA => attrs.push(0x61), // 1080p 23.976
        0x92 => {
            attrs.push(0x01); // character code
            attrs.extend_from_slice(lang.as_bytes());
        }
        0x90 | 0x91 => attrs.extend_from_slice(lang.as_bytes()),
        _ => {
            attrs.push(0x61); // multi-channel, 48 kHz
            attrs.extend_from_slice(lang.as_bytes());
        }
    }
    entry.push(attrs.len() as u8);
    entry.extend_from_slice(&attrs);
    entry
}

// ---------------------------------------------------------------------------
// CLPI
// ---------------------------------------------------------------------------

/// `(coding type, pid, language)`; video entries ignore the language.
pub fn build_clpi(streams: &[(u8, u16, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (coding, pid, lang) in streams {
        body.extend_from_slice(&pid.to_be_bytes());
        let mut payload = vec![*coding];
        match coding {
            0x1B | 0x24 | 0x02 | 0x20 | 0xEA => {
                payload.push(0x61); // 1080p, 23.976
                payload.push(0x30); // 16:9
            }
            0x92 => {
                payload.push(0x01);
                payload.extend_from_slice(lang.as_bytes());
            }
            0x90 | 0x91 => payload.extend_from_slice(lang.as_bytes()),
            _ => {
                payload.push(0x61); // multi, 48 kHz
                payload.extend_from_slice(lang.as_bytes());
            }
        }
        body.push(payload.len() as u8);
        body.extend_from_slice(&payload);
    }

    let mut out = Vec::new();
    out.extend_from_slice(b"HDMV0200");
    out.extend_from_slice(&0u32.to_be_bytes());
    out.extend_from_slice(&28u32.to_be_bytes()); // program info start
    out.resize(28, 0);
    out.extend_from_slice(&((6 + body.len()) as u32).to_be_bytes());
    out.extend_from_slice(&[0, 0, 0, 0]);
    out.push(streams.len() as u8);
    out.push(0);
    out.extend_from_slice(&body);
    out
}

// ---------------------------------------------------------------------------
// M2TS
// ---------------------------------------------------------------------------

fn ts33(value: u64, marker: u8) -> [u8; 5] {
    [
        (marker << 4) | (((value >> 30) as u8 & 0x07) << 1) | 1,
        (value >> 22) as u8,
        (((value >> 15) as u8) << 1) | 1,
        (value >> 7) as u8,
        ((value as u8) << 1) | 1,
    ]
}

/// One 192-byte BDAV packet opening a PES transfer with the given
/// timestamps and elementary payload.
pub fn pes_packet(pid: u16, pts: Option<u64>, dts: Option<u64>, payload: &[u8]) -> Vec<u8> {
    let mut ts = vec![0u8; 4];
    ts.push(0x47);
    ts.push(0x40 | (pid >> 8) as u8);
    ts.push(pid as u8);
    ts.push(0x10);
    let mut pes = vec![0x00, 0x00, 0x01, 0xE0];
    let flags: u8 = match (pts, dts) {
        (Some(_), Some(_)) => 0b11,
        (Some(_), None) => 0b10,
        _ => 0,
    };
    let extra: usize = match flags {
        0b11 => 10,
        0b10 => 5,
        _ => 0,
    };
    let pes_length = (3 + extra + payload.len()) as u16;
    pes.extend_from_slice(&pes_length.to_be_bytes());
    pes.push(0x80);
    pes.push(flags << 6);
    pes.push(extra as u8);
    if let Some(p) = pts {
        pes.extend_from_slice(&ts33(p, if flags == 0b11 { 0b0011 } else { 0b0010 }));
    }
    if let Some(d) = dts {
        pes.extend_from_slice(&ts33(d, 0b0001));
    }
    pes.extend_from_slice(payload);
    ts.extend_from_slice(&pes);
    ts.resize(192, 0xFF);
    ts
}

/// An M2TS carrying one AVC video PID with evenly spaced DTS-bearing frames.
/// Timestamps run from 1 second to `seconds + 1` (a zero-valued timestamp
/// reads as absent), so the derived length is `seconds` and playlists should
/// select the clip with `in_ticks = 45_000`. The first transfer carries an
/// SPS so the probe initializes.
pub fn build_m2ts(pid: u16, seconds: u32) -> Vec<u8> {
    let mut sps_payload = vec![0u8, 0, 1, 0x09, 0x10]; // AUD, I
    sps_payload.extend_from_slice(&[0, 0, 1, 0x67, 100, 0x00, 41]); // SPS High 4.1
    let mut data = Vec::new();
    for i in 1..=(seconds as u64 + 1) {
        let clock = i * 90_000;
        let payload: &[u8] = if i == 1 { &sps_payload } else { &[0u8; 64] };
        data.extend_from_slice(&pes_packet(pid, Some(clock), Some(clock), payload));
    }
    data
}

// ---------------------------------------------------------------------------
// UDF volume
// ---------------------------------------------------------------------------

const SECTOR: usize = 2048;
const PARTITION_START: u32 = 100;
/// Metadata file blocks map to partition blocks starting here.
const METADATA_BASE: u32 = 10;

/// A file or directory placed into the synthetic volume.
pub enum UdfNode {
    Dir(&'static str, Vec<UdfNode>),
    File(&'static str, Vec<u8>),
}

/// Assemble a UDF 2.50 image: VRS, anchor at 256, a VDS with PVD, partition,
/// and logical volume descriptors, a metadata partition map, and a directory
/// hierarchy under the metadata partition. Directory data is embedded in the
/// file entries (allocation type 3); file data lives in the physical
/// partition behind long allocation descriptors.
pub fn build_udf_image(label: &str, root_nodes: Vec<UdfNode>) -> Vec<u8> {
    let mut image = vec![0u8; 400 * SECTOR];

    // Volume recognition sequence.
    for (i, id) in [b"BEA01", b"NSR03", b"TEA01"].iter().enumerate() {
        let offset = (16 + i) * SECTOR;
        image[offset] = 0;
        image[offset + 1..offset + 6].copy_from_slice(*id);
        image[offset + 6] = 1;
    }

    // Anchor at 256: main VDS at sector 64, 8 sectors.
    let anchor = 256 * SECTOR;
    write_tag(&mut image, anchor, 2);
    image[anchor + 16..anchor + 20].copy_from_slice(&(8u32 * SECTOR as u32).to_le_bytes());
    image[anchor + 20..anchor + 24].copy_from_slice(&64u32.to_le_bytes());

    // Primary volume descriptor.
    let pvd = 64 * SECTOR;
    write_tag(&mut image, pvd, 1);
    let mut volume_id = [0u8; 32];
    volume_id[0] = 8;
    let label_bytes = label.as_bytes();
    volume_id[1..1 + label_bytes.len()].copy_from_slice(label_bytes);
    volume_id[31] = 1 + label_bytes.len() as u8;
    image[pvd + 24..pvd + 56].copy_from_slice(&volume_id);

    // Partition descriptor: partition 0 at PARTITION_START.
    let pd = 65 * SECTOR;
    write_tag(&mut image, pd, 5);
    image[pd + 22..pd + 24].copy_from_slice(&0u16.to_le_bytes());
    image[pd + 188..pd + 192].copy_from_slice(&PARTITION_START.to_le_bytes());
    image[pd + 192..pd + 196].copy_from_slice(&250u32.to_le_bytes());

    // Logical volume descriptor: block size, FSD location, partition maps.
    let lvd = 66 * SECTOR;
    write_tag(&mut image, lvd, 6);
    image[lvd + 212..lvd + 216].copy_from_slice(&(SECTOR as u32).to_le_bytes());
    // FSD at metadata partition (reference 1), block 0.
    let fsd_ad = long_ad(SECTOR as u32, 0, 1);
    image[lvd + 248..lvd + 264].copy_from_slice(&fsd_ad);
    image[lvd + 268..lvd + 272].copy_from_slice(&2u32.to_le_bytes()); // two maps
    let maps = lvd + 440;
    // Type 1 map -> partition 0.
    image[maps] = 1;
    image[maps + 1] = 6;
    image[maps + 4..maps + 6].copy_from_slice(&0u16.to_le_bytes());
    // Type 2 metadata map.
    let meta = maps + 6;
    image[meta] = 2;
    image[meta + 1] = 64;
    image[meta + 5..meta + 5 + 23].copy_from_slice(b"*UDF Metadata Partition");
    image[meta + 36..meta + 40].copy_from_slice(&1u32.to_le_bytes()); // extent length 1 = LBN
    image[meta + 40..meta + 44].copy_from_slice(&0u32.to_le_bytes()); // metadata ICB at lbn 0

    // Metadata file ICB at partition block 0: short ADs mapping metadata
    // blocks 0..40 to partition blocks METADATA_BASE..
    let meta_icb = (PARTITION_START as usize) * SECTOR;
    let mut ads = Vec::new();
    ads.extend_from_slice(&(40u32 * SECTOR as u32).to_le_bytes());
    ads.extend_from_slice(&METADATA_BASE.to_le_bytes());
    write_file_entry(&mut image, meta_icb, 0, 40 * SECTOR as u64, 0, &ads, None);

    // File set descriptor at metadata block 0.
    let fsd = ((PARTITION_START + METADATA_BASE) as usize) * SECTOR;
    write_tag(&mut image, fsd, 256);
    image[fsd + 400..fsd + 416].copy_from_slice(&long_ad(SECTOR as u32, 1, 1)); // root at meta block 1

    // Directory tree. Metadata blocks from 1 upward hold FEs; physical
    // partition blocks from 60 upward hold file data.
    let mut next_meta_block = 1u32;
    let mut next_data_block = 60u32;
    build_directory(
        &mut image,
        &root_nodes,
        &mut next_meta_block,
        &mut next_data_block,
    );

    image
}

/// Lay out one directory (and its children, depth-first) starting at the
/// current metadata block. Returns the directory's metadata block.
fn build_directory(
    image: &mut Vec<u8>,
    nodes: &[UdfNode],
    next_meta_block: &mut u32,
    next_data_block: &mut u32,
) -> u32 {
    let dir_block = *next_meta_block;
    *next_meta_block += 1;

    let mut children: Vec<(String, u32, bool)> = Vec::new();
    for node in nodes {
        match node {
            UdfNode::Dir(name, sub) => {
                let block = build_directory(image, sub, next_meta_block, next_data_block);
                children.push((name.to_string(), block, true));
            }
            UdfNode::File(name, data) => {
                let fe_block = *next_meta_block;
                *next_meta_block += 1;
                let sectors = data.len().div_ceil(SECTOR).max(1) as u32;
                let data_block = *next_data_block;
                *next_data_block += sectors;
                let offset = ((PARTITION_START + data_block) as usize) * SECTOR;
                image[offset..offset + data.len()].copy_from_slice(data);
                let ad = long_ad(data.len() as u32, data_block, 0);
                let fe_offset = ((PARTITION_START + METADATA_BASE + fe_block) as usize) * SECTOR;
                write_file_entry(image, fe_offset, 0, data.len() as u64, 1, &ad, None);
                children.push((name.to_string(), fe_block, false));
            }
        }
    }

    let mut fids = Vec::new();
    for (name, block, is_dir) in children {
        fids.extend_from_slice(&file_identifier(&name, block, is_dir));
    }
    let fe_offset = ((PARTITION_START + METADATA_BASE + dir_block) as usize) * SECTOR;
    write_file_entry(image, fe_offset, 4, fids.len() as u64, 3, &[], Some(&fids));
    dir_block
}

fn write_tag(image: &mut [u8], offset: usize, tag_id: u16) {
    image[offset..offset + 2].copy_from_slice(&tag_id.to_le_bytes());
    image[offset + 2..offset + 4].copy_from_slice(&3u16.to_le_bytes());
}

fn long_ad(length: u32, location: u32, partition: u16) -> [u8; 16] {
    let mut ad = [0u8; 16];
    ad[0..4].copy_from_slice(&length.to_le_bytes());
    ad[4..8].copy_from_slice(&location.to_le_bytes());
    ad[8..10].copy_from_slice(&partition.to_le_bytes());
    ad
}

/// Write a File Entry (tag 261). `alloc_type`: 0 short, 1 long, 3 embedded.
fn write_file_entry(
    image: &mut [u8],
    offset: usize,
    file_type: u8,
    information_length: u64,
    alloc_type: u16,
    ads: &[u8],
    embedded: Option<&[u8]>,
) {
    write_tag(image, offset, 261);
    // ICB tag at +16: file type at +27, flags at +34.
    image[offset + 27] = file_type;
    image[offset + 34..offset + 36].copy_from_slice(&alloc_type.to_le_bytes());
    image[offset + 56..offset + 64].copy_from_slice(&information_length.to_le_bytes());
    image[offset + 168..offset + 172].copy_from_slice(&0u32.to_le_bytes()); // ea length
    let data: &[u8] = embedded.unwrap_or(ads);
    image[offset + 172..offset + 176].copy_from_slice(&(data.len() as u32).to_le_bytes());
    image[offset + 176..offset + 176 + data.len()].copy_from_slice(data);
}

fn file_identifier(name: &str, fe_block: u32, _is_dir: bool) -> Vec<u8> {
    let mut fid = vec![0u8; 38];
    fid[0..2].copy_from_slice(&257u16.to_le_bytes());
    fid[2..4].copy_from_slice(&3u16.to_le_bytes());
    fid[18] = if _is_dir { 0x02 } else { 0x00 };
    let mut cs0 = vec![8u8];
    cs0.extend_from_slice(name.as_bytes());
    fid[19] = cs0.len() as u8;
    fid[20..36].copy_from_slice(&long_ad(SECTOR as u32, fe_block, 1)); // FE in metadata partition
    fid[36..38].copy_from_slice(&0u16.to_le_bytes());
    fid.extend_from_slice(&cs0);
    while fid.len() % 4 != 0 {
        fid.push(0);
    }
    fid
}
