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

//! HEVC probing: profile/tier/level and picture geometry from the SPS, HDR
//! metadata from the SEI payloads, frame tags from slice headers.

use std::collections::{HashMap, HashSet};

use crate::{
    codec::bits::{start_code_units, unescape_nal, BitReader},
    stream::{HdrFormat, HevcExtendedData, VideoInfo},
};

pub const NAL_SPS: u8 = 33;
pub const NAL_PPS: u8 = 34;
pub const NAL_SEI_PREFIX: u8 = 39;
pub const NAL_SEI_SUFFIX: u8 = 40;

/// Streams on PIDs at or above this carry the Dolby Vision enhancement layer.
const DOLBY_VISION_PID_FLOOR: u16 = 4117;

const SEI_USER_DATA_T35: u32 = 4;
const SEI_MASTERING_DISPLAY: u32 = 137;
const SEI_CONTENT_LIGHT: u32 = 144;
const SEI_ALT_TRANSFER: u32 = 147;

#[derive(Debug, Default)]
struct SpsInfo {
    profile_idc: u32,
    tier_high: bool,
    level_idc: u32,
    chroma_format_idc: u32,
    width: u32,
    height: u32,
    bit_depth: u32,
    colour_present: bool,
    colour_primaries: u32,
    transfer_characteristics: u32,
    matrix_coeffs: u32,
}

#[derive(Debug, Default)]
struct SeiInfo {
    master_display: Option<String>,
    content_light: Option<String>,
    preferred_transfer: Option<u32>,
    hdr10_plus: bool,
}

pub fn probe(buffer: &[u8], info: &mut VideoInfo) {
    let mut sps: Option<SpsInfo> = None;
    let mut sei = SeiInfo::default();

    for (offset, length) in start_code_units(buffer) {
        let Some(unit) = buffer.get(offset..offset + length) else {
            continue;
        };
        if unit.len() < 3 {
            continue;
        }
        match nal_type(unit) {
            NAL_SPS => {
                if sps.is_none() {
                    sps = parse_sps(unit);
                }
            }
            NAL_SEI_PREFIX | NAL_SEI_SUFFIX => parse_sei(unit, &mut sei),
            _ => {}
        }
    }

    let Some(sps) = sps else {
        return;
    };

    let profile = match sps.profile_idc {
        1 => "Main",
        2 => "Main 10",
        3 => "Main Still",
        _ => "Unknown",
    };
    let tier = if sps.tier_high { "High" } else { "Main" };
    info.encoding_profile = format!("{} @ Level {} @ {}", profile, format_level(sps.level_idc), tier);
    if sps.width > 0 {
        info.width = sps.width;
        info.height = sps.height;
    }

    let mut extended = HevcExtendedData {
        chroma_format_idc: sps.chroma_format_idc as u8,
        bit_depth: sps.bit_depth as u8,
        colour_primaries: sps.colour_primaries as u8,
        transfer_characteristics: sps.transfer_characteristics as u8,
        matrix_coeffs: sps.matrix_coeffs as u8,
        master_display: sei.master_display,
        content_light: sei.content_light,
        ..Default::default()
    };

    let hdr10_signaled = sps.bit_depth == 10
        && sps.chroma_format_idc == 1
        && sps.colour_present
        && sps.colour_primaries == 9
        && sps.transfer_characteristics == 16
        && (sps.matrix_coeffs == 9 || sps.matrix_coeffs == 10)
        && extended.master_display.is_some();
    extended.hdr_format = if info.base.pid >= DOLBY_VISION_PID_FLOOR {
        HdrFormat::DolbyVision
    } else if hdr10_signaled && sei.hdr10_plus {
        HdrFormat::Hdr10Plus
    } else if hdr10_signaled {
        HdrFormat::Hdr10
    } else {
        HdrFormat::Sdr
    };
    let _ = sei.preferred_transfer;

    info.extended = Some(extended);
    info.base.is_initialized = true;
}

fn nal_type(unit: &[u8]) -> u8 {
    (unit[0] >> 1) & 0x3F
}

fn format_level(level_idc: u32) -> String {
    if level_idc % 30 == 0 {
        format!("{}", level_idc / 30)
    } else {
        format!("{:.1}", level_idc as f64 / 30.0)
    }
}

fn parse_sps(unit: &[u8]) -> Option<SpsInfo> {
    let rbsp = unescape_nal(unit);
    let mut r = BitReader::new(&rbsp);
    r.skip(16); // NAL header
    r.skip(4); // sps_video_parameter_set_id
    let max_sub_layers = r.read(3);
    r.skip(1); // sps_temporal_id_nesting_flag

    // profile_tier_level
    r.skip(2); // general_profile_space
    let tier_high = r.flag();
    let profile_idc = r.read(5);
    r.skip(32); // compatibility flags
    r.skip(48); // source/constraint/reserved flags
    let level_idc = r.read(8);

    let mut profile_present = Vec::new();
    let mut level_present = Vec::new();
    for _ in 0..max_sub_layers {
        profile_present.push(r.flag());
        level_present.push(r.flag());
    }
    if max_sub_layers > 0 {
        for _ in max_sub_layers..8 {
            r.skip(2);
        }
    }
    for i in 0..max_sub_layers as usize {
        if profile_present[i] {
            r.skip(88);
        }
        if level_present[i] {
            r.skip(8);
        }
    }

    let _sps_id = r.ue();
    let chroma_format_idc = r.ue();
    if chroma_format_idc == 3 {
        r.skip(1); // separate_colour_plane_flag
    }
    let mut width = r.ue();
    let mut height = r.ue();
    if r.flag() {
        // Conformance window offsets are in chroma sampling units.
        let left = r.ue();
        let right = r.ue();
        let top = r.ue();
        let bottom = r.ue();
        let (sub_x, sub_y) = match chroma_format_idc {
            1 => (2, 2),
            2 => (2, 1),
            _ => (1, 1),
        };
        width = width.saturating_sub((left + right) * sub_x);
        height = height.saturating_sub((top + bottom) * sub_y);
    }
    let bit_depth = r.ue() + 8;
    let _bit_depth_chroma = r.ue() + 8;
    let log2_max_poc_lsb = r.ue() + 4;

    let ordering_present = r.flag();
    let start = if ordering_present { 0 } else { max_sub_layers };
    for _ in start..=max_sub_layers {
        r.ue(); // max_dec_pic_buffering_minus1
        r.ue(); // num_reorder_pics
        r.ue(); // max_latency_increase_plus1
    }

    r.ue(); // log2_min_luma_coding_block_size_minus3
    r.ue(); // log2_diff_max_min_luma_coding_block_size
    r.ue(); // log2_min_luma_transform_block_size_minus2
    r.ue(); // log2_diff_max_min_luma_transform_block_size
    r.ue(); // max_transform_hierarchy_depth_inter
    r.ue(); // max_transform_hierarchy_depth_intra

    if r.flag() {
        // scaling_list_enabled_flag
        if r.flag() {
            skip_scaling_list(&mut r);
        }
    }
    r.skip(1); // amp_enabled_flag
    r.skip(1); // sample_adaptive_offset_enabled_flag
    if r.flag() {
        // pcm_enabled_flag
        r.skip(8); // pcm bit depths
        r.ue();
        r.ue();
        r.skip(1);
    }

    let num_short_term_sets = r.ue();
    if num_short_term_sets > 64 {
        return None;
    }
    let mut num_delta_pocs: Vec<u32> = Vec::new();
    for idx in 0..num_short_term_sets {
        skip_short_term_ref_pic_set(&mut r, idx, &mut num_delta_pocs);
        if r.exhausted() {
            return None;
        }
    }

    if r.flag() {
        // long_term_ref_pics_present_flag
        let count = r.ue();
        for _ in 0..count.min(64) {
            r.skip(log2_max_poc_lsb as usize);
            r.skip(1);
        }
    }
    r.skip(1); // sps_temporal_mvp_enabled_flag
    r.skip(1); // strong_intra_smoothing_enabled_flag

    let mut colour_present = false;
    let mut colour_primaries = 0;
    let mut transfer = 0;
    let mut matrix = 0;
    if r.flag() {
        // vui_parameters_present_flag
        if r.flag() {
            // aspect_ratio_info_present_flag
            let idc = r.read(8);
            if idc == 255 {
                r.skip(32);
            }
        }
        if r.flag() {
            r.skip(1); // overscan_appropriate_flag
        }
        if r.flag() {
            // video_signal_type_present_flag
            r.skip(3); // video_format
            r.skip(1); // video_full_range_flag
            if r.flag() {
                colour_present = true;
                colour_primaries = r.read(8);
                transfer = r.read(8);
                matrix = r.read(8);
            }
        }
    }

    if r.exhausted() {
        return None;
    }
    Some(SpsInfo {
        profile_idc,
        tier_high,
        level_idc,
        chroma_format_idc,
        width,
        height,
        bit_depth,
        colour_present,
        colour_primaries,
        transfer_characteristics: transfer,
        matrix_coeffs: matrix,
    })
}

fn skip_scaling_list(r: &mut BitReader) {
    for size_id in 0..4u32 {
        let matrix_count = if size_id == 3 { 2 } else { 6 };
        for _ in 0..matrix_count {
            if !r.flag() {
                // scaling_list_pred_mode_flag == 0
                r.ue(); // scaling_list_pred_matrix_id_delta
            } else {
                let coef_count = 64u32.min(1 << (4 + (size_id << 1)));
                if size_id > 1 {
                    r.se(); // scaling_list_dc_coef_minus8
                }
                for _ in 0..coef_count {
                    r.se();
                }
            }
        }
    }
}

fn skip_short_term_ref_pic_set(r: &mut BitReader, idx: u32, num_delta_pocs: &mut Vec<u32>) {
    let inter_prediction = if idx != 0 { r.flag() } else { false };
    if inter_prediction {
        r.skip(1); // delta_rps_sign
        r.ue(); // abs_delta_rps_minus1
        let ref_deltas = num_delta_pocs.last().copied().unwrap_or(0);
        let mut carried = 0u32;
        for _ in 0..=ref_deltas {
            let used = r.flag();
            let use_delta = if !used { r.flag() } else { true };
            if used || use_delta {
                carried += 1;
            }
        }
        num_delta_pocs.push(carried);
    } else {
        let negative = r.ue();
        let positive = r.ue();
        if negative + positive > 64 {
            num_delta_pocs.push(0);
            return;
        }
        for _ in 0..negative + positive {
            r.ue(); // delta_poc_minus1
            r.skip(1); // used_by_curr_pic_flag
        }
        num_delta_pocs.push(negative + positive);
    }
}

fn parse_sei(unit: &[u8], sei: &mut SeiInfo) {
    let rbsp = unescape_nal(unit);
    let mut pos = 2usize; // NAL header
    while pos < rbsp.len() {
        let mut payload_type = 0u32;
        while pos < rbsp.len() && rbsp[pos] == 0xFF {
            payload_type += 255;
            pos += 1;
        }
        if pos >= rbsp.len() {
            break;
        }
        payload_type += rbsp[pos] as u32;
        pos += 1;

        let mut payload_size = 0usize;
        while pos < rbsp.len() && rbsp[pos] == 0xFF {
            payload_size += 255;
            pos += 1;
        }
        if pos >= rbsp.len() {
            break;
        }
        payload_size += rbsp[pos] as usize;
        pos += 1;

        let Some(payload) = rbsp.get(pos..pos + payload_size) else {
            break;
        };
        match payload_type {
            SEI_MASTERING_DISPLAY => parse_mastering_display(payload, sei),
            SEI_CONTENT_LIGHT => {
                if payload.len() >= 4 {
                    let max_cll = u16::from_be_bytes([payload[0], payload[1]]);
                    let max_fall = u16::from_be_bytes([payload[2], payload[3]]);
                    sei.content_light = Some(format!(
                        "MaxCLL: {} cd/m2, MaxFALL: {} cd/m2",
                        max_cll, max_fall
                    ));
                }
            }
            SEI_ALT_TRANSFER => {
                if !payload.is_empty() {
                    sei.preferred_transfer = Some(payload[0] as u32);
                }
            }
            SEI_USER_DATA_T35 => {
                if is_hdr10_plus(payload) {
                    sei.hdr10_plus = true;
                }
            }
            _ => {}
        }
        pos += payload_size;
    }
}

fn parse_mastering_display(payload: &[u8], sei: &mut SeiInfo) {
    if payload.len() < 24 {
        return;
    }
    let mut values = [0u16; 8];
    for (i, v) in values.iter_mut().enumerate() {
        *v = u16::from_be_bytes([payload[i * 2], payload[i * 2 + 1]]);
    }
    let max_luminance = u32::from_be_bytes([payload[16], payload[17], payload[18], payload[19]]);
    let min_luminance = u32::from_be_bytes([payload[20], payload[21], payload[22], payload[23]]);

    // Primaries are signaled in 0.00002 steps in G/B/R order.
    let primaries = match values[..6] {
        [8500, 39850, 6550, 2300, 35400, 14600] => "BT.2020".to_string(),
        [13250, 34500, 7500, 3000, 34000, 16000] => "Display P3".to_string(),
        _ => format!(
            "G({},{}) B({},{}) R({},{})",
            values[0], values[1], values[2], values[3], values[4], values[5]
        ),
    };
    sei.master_display = Some(format!(
        "{}, min: {:.4} cd/m2, max: {} cd/m2",
        primaries,
        min_luminance as f64 / 10_000.0,
        max_luminance / 10_000
    ));
}

/// HDR10+ dynamic metadata: an ITU-T T.35 payload from country 0xB5 with the
/// expected provider and a single processing window.
fn is_hdr10_plus(payload: &[u8]) -> bool {
    if payload.len() < 7 || payload[0] != 0xB5 {
        return false;
    }
    let provider = u16::from_be_bytes([payload[1], payload[2]]);
    let (application, version, windows_byte) = match provider {
        0x003C => {
            let oriented_code = u16::from_be_bytes([payload[3], payload[4]]);
            if oriented_code != 0x0001 {
                return false;
            }
            (payload[5], payload[6], payload.get(7))
        }
        0x0001 => (payload[3], payload[4], payload.get(5)),
        _ => return false,
    };
    let Some(&windows_byte) = windows_byte else {
        return false;
    };
    application == 4 && version <= 1 && (windows_byte >> 6) == 1
}

#[derive(Debug, Clone, Copy)]
struct PpsParams {
    dependent_slice_segments_enabled: bool,
    num_extra_slice_header_bits: u32,
    sps_id: u32,
}

/// Per-PID frame-tag state machine.
///
/// Tags are derived only at PES-transfer boundaries, so the state (valid SPS
/// ids, PPS params, pending tag) survives bitrate flushes.
#[derive(Debug, Default)]
pub struct HevcTagParser {
    valid_sps: HashSet<u32>,
    pps: HashMap<u32, PpsParams>,
    tag: Option<&'static str>,
}

impl HevcTagParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan one PES transfer's elementary bytes.
    pub fn feed(&mut self, payload: &[u8]) {
        for (offset, length) in start_code_units(payload) {
            let Some(unit) = payload.get(offset..offset + length) else {
                continue;
            };
            if unit.len() < 3 {
                continue;
            }
            match nal_type(unit) {
                NAL_SPS => {
                    // Only the id is needed; a full parse already happened in
                    // the probe.
                    if let Some(id) = sps_id(unit) {
                        self.valid_sps.insert(id);
                    }
                }
                NAL_PPS => self.parse_pps(unit),
                t if t <= 21 => self.parse_slice(unit, t),
                _ => {}
            }
        }
    }

    /// The tag for the transfer just fed, if a slice header produced one.
    pub fn take_tag(&mut self) -> Option<&'static str> {
        self.tag.take()
    }

    fn parse_pps(&mut self, unit: &[u8]) {
        let rbsp = unescape_nal(unit);
        let mut r = BitReader::new(&rbsp);
        r.skip(16);
        let pps_id = r.ue();
        let sps_id = r.ue();
        let dependent = r.flag();
        r.skip(1); // output_flag_present_flag
        let extra_bits = r.read(3);
        if r.exhausted() {
            return;
        }
        self.pps.insert(
            pps_id,
            PpsParams {
                dependent_slice_segments_enabled: dependent,
                num_extra_slice_header_bits: extra_bits,
                sps_id,
            },
        );
    }

    fn parse_slice(&mut self, unit: &[u8], nal: u8) {
        let rbsp = unescape_nal(unit);
        let mut r = BitReader::new(&rbsp);
        r.skip(16);
        let first_slice = r.flag();
        if !first_slice {
            // Dependent or later slices repeat the picture's type; the first
            // slice already tagged it.
            return;
        }
        if (16..=23).contains(&nal) {
            r.skip(1); // no_output_of_prior_pics_flag
        }
        let pps_id = r.ue();
        let Some(pps) = self.pps.get(&pps_id) else {
            return;
        };
        if !self.valid_sps.contains(&pps.sps_id) {
            return;
        }
        r.skip(pps.num_extra_slice_header_bits as usize);
        let slice_type = r.ue();
        if r.exhausted() {
            return;
        }
        self.tag = match slice_type {
            2 => Some("I"),
            0 => Some("P"),
            1 => Some("B"),
            _ => None,
        };
    }
}

fn sps_id(unit: &[u8]) -> Option<u32> {
    // The sps id sits deep past the profile_tier_level; reuse the full parse
    // path cheaply by reading just far enough.
    let rbsp = unescape_nal(unit);
    let mut r = BitReader::new(&rbsp);
    r.skip(16);
    r.skip(4);
    let max_sub_layers = r.read(3);
    r.skip(1);
    r.skip(2 + 1 + 5 + 32 + 48 + 8);
    let mut profile_present = Vec::new();
    let mut level_present = Vec::new();
    for _ in 0..max_sub_layers {
        profile_present.push(r.flag());
        level_present.push(r.flag());
    }
    if max_sub_layers > 0 {
        for _ in max_sub_layers..8 {
            r.skip(2);
        }
    }
    for i in 0..max_sub_layers as usize {
        if profile_present[i] {
            r.skip(88);
        }
        if level_present[i] {
            r.skip(8);
        }
    }
    let id = r.ue();
    if r.exhausted() {
        None
    } else {
        Some(id)
    }
}
