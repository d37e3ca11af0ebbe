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

//! Codec probes.
//!
//! During a demux each stream accumulates a bounded buffer of elementary data
//! taken from inside its PES transfers. Once a stream has captured at least
//! one complete transfer, the probe for its coding type parses that buffer to
//! fill in codec parameters the clip info cannot carry: profiles and levels,
//! channel layouts, HDR metadata, dialog normalization.

pub mod aac;
pub mod ac3;
pub mod avc;
pub mod bits;
pub mod dts;
pub mod dtshd;
pub mod hevc;
pub mod lpcm;
pub mod mpeg2;
pub mod pgs;
pub mod truehd;
pub mod vc1;

use std::sync::Mutex;

use once_cell::sync::Lazy;

use crate::stream::{StreamInfo, StreamType};

pub const VIDEO_BUFFER_CAPACITY: usize = 5 * 1024 * 1024;
pub const AUDIO_BUFFER_CAPACITY: usize = 256 * 1024;
pub const GRAPHICS_BUFFER_CAPACITY: usize = 128 * 1024;

/// The per-category codec-buffer capacity.
pub fn buffer_capacity(stream_type: StreamType) -> usize {
    if stream_type.is_video() {
        VIDEO_BUFFER_CAPACITY
    } else if stream_type.is_audio() {
        AUDIO_BUFFER_CAPACITY
    } else {
        GRAPHICS_BUFFER_CAPACITY
    }
}

/// A process-wide pool of codec buffers keyed by fixed capacity, so parallel
/// scans recycle their large allocations instead of churning the allocator.
struct BufferPool {
    tiers: [Mutex<Vec<Vec<u8>>>; 3],
}

static BUFFER_POOL: Lazy<BufferPool> = Lazy::new(|| BufferPool {
    tiers: [Mutex::new(Vec::new()), Mutex::new(Vec::new()), Mutex::new(Vec::new())],
});

fn tier_for(capacity: usize) -> Option<usize> {
    match capacity {
        VIDEO_BUFFER_CAPACITY => Some(0),
        AUDIO_BUFFER_CAPACITY => Some(1),
        GRAPHICS_BUFFER_CAPACITY => Some(2),
        _ => None,
    }
}

/// Take a length-zero buffer whose capacity matches one of the three tiers.
pub fn acquire_buffer(capacity: usize) -> Vec<u8> {
    if let Some(tier) = tier_for(capacity) {
        if let Some(mut buf) = BUFFER_POOL.tiers[tier].lock().expect("buffer pool").pop() {
            buf.clear();
            return buf;
        }
    }
    Vec::with_capacity(capacity)
}

/// Return a buffer to its tier. Buffers of foreign capacities are dropped.
pub fn release_buffer(buf: Vec<u8>) {
    if let Some(tier) = tier_for(buf.capacity()) {
        BUFFER_POOL.tiers[tier].lock().expect("buffer pool").push(buf);
    }
}

/// Run the probe matching the stream's coding type over its captured buffer.
pub fn probe_stream(buffer: &[u8], info: &mut StreamInfo) {
    if buffer.is_empty() {
        return;
    }
    match info.stream_type() {
        StreamType::AvcVideo | StreamType::MvcVideo => {
            if let Some(video) = info.as_video_mut() {
                avc::probe(buffer, video);
            }
        }
        StreamType::HevcVideo => {
            if let Some(video) = info.as_video_mut() {
                hevc::probe(buffer, video);
            }
        }
        StreamType::Vc1Video => {
            if let Some(video) = info.as_video_mut() {
                vc1::probe(buffer, video);
            }
        }
        StreamType::Mpeg1Video | StreamType::Mpeg2Video => {
            if let Some(video) = info.as_video_mut() {
                mpeg2::probe(buffer, video);
            }
        }
        StreamType::Ac3Audio | StreamType::Ac3PlusAudio | StreamType::Ac3PlusSecondaryAudio => {
            if let Some(audio) = info.as_audio_mut() {
                ac3::probe(buffer, audio);
            }
        }
        StreamType::Ac3TrueHdAudio => {
            if let Some(audio) = info.as_audio_mut() {
                truehd::probe(buffer, audio);
            }
        }
        StreamType::DtsAudio => {
            if let Some(audio) = info.as_audio_mut() {
                dts::probe(buffer, audio);
            }
        }
        StreamType::DtsHdAudio | StreamType::DtsHdMasterAudio | StreamType::DtsHdSecondaryAudio => {
            if let Some(audio) = info.as_audio_mut() {
                dtshd::probe(buffer, audio);
            }
        }
        StreamType::LpcmAudio => {
            if let Some(audio) = info.as_audio_mut() {
                lpcm::probe(buffer, audio);
            }
        }
        StreamType::Mpeg2AacAudio | StreamType::Mpeg4AacAudio => {
            if let Some(audio) = info.as_audio_mut() {
                aac::probe(buffer, audio);
            }
        }
        StreamType::PresentationGraphics | StreamType::InteractiveGraphics => {
            if let Some(graphics) = info.as_graphics_mut() {
                pgs::probe(buffer, graphics);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_pool_recycles_by_capacity() {
        let buf = acquire_buffer(AUDIO_BUFFER_CAPACITY);
        assert_eq!(buf.len(), 0);
        assert!(buf.capacity() >= AUDIO_BUFFER_CAPACITY);
        let capacity = buf.capacity();
        release_buffer(buf);
        let again = acquire_buffer(capacity);
        assert_eq!(again.len(), 0);
    }
}
