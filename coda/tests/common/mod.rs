// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared fixtures: a passthrough codec engine whose "compressed" packets
//! are already big-endian PCM, and an engine provider serving it.

use coda::core::codecs::{CodecEngine, CodecType, EngineProvider};
use coda::core::errors::Result;

/// An engine whose packets are raw interleaved big-endian samples.
pub struct PassthroughEngine {
    pub channels: usize,
    pub bytes_per_sample: usize,
    pub initialized: bool,
}

impl CodecEngine for PassthroughEngine {
    fn init(&mut self, _config: &[u8]) -> Result<()> {
        self.initialized = true;
        Ok(())
    }

    fn decode_packet(&mut self, packet: &[u8], out: &mut Vec<u8>) -> Result<usize> {
        assert!(self.initialized);
        out.extend_from_slice(packet);
        Ok(packet.len() / (self.channels * self.bytes_per_sample))
    }

    fn reset(&mut self) {}
}

/// Provides a stereo 16-bit passthrough engine for every codec.
pub struct PassthroughEngines;

impl EngineProvider for PassthroughEngines {
    fn make_engine(&self, _codec: CodecType) -> Result<Box<dyn CodecEngine>> {
        Ok(Box::new(PassthroughEngine { channels: 2, bytes_per_sample: 2, initialized: false }))
    }
}

/// Interleaved big-endian 16-bit stereo frames carrying their own frame
/// index: the left sample of frame `i` is `i`, the right is `!i`.
pub fn ramp_frames(start: usize, frames: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(frames * 4);
    for i in start..start + frames {
        out.extend_from_slice(&(i as i16).to_be_bytes());
        out.extend_from_slice(&(!(i as i16)).to_be_bytes());
    }
    out
}

/// The canonical left-channel value of frame `i` in a ramp stream.
pub fn ramp_value(i: usize) -> i32 {
    ((i as i16) as i32) << 16
}
