// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! MPEG audio (layers 1-3) packet-decoder adapter for Project Coda.
//!
//! MPEG audio carries its parameters in-band, so there is no configuration
//! blob to parse; the stream description comes from the container. The bit
//! reservoir lets a packet reference main data from several predecessors,
//! which sets the seek preroll depth.

use coda_core::audio::SampleFormat;
use coda_core::codecs::{
    AdapterDescriptor, CodecEngine, CodecType, PacketDecoder, CODEC_TYPE_MP1, CODEC_TYPE_MP2,
    CODEC_TYPE_MP3,
};
use coda_core::conv;
use coda_core::errors::{codec_init_error, decode_failed_error, Result};
use coda_core::formats::{PacketFeeder, StreamInfo};
use coda_core::support_adapter;
use log::warn;

/// Packets of preroll to re-fill the bit reservoir after a seek.
const RESERVOIR_DEPTH_PACKETS: u32 = 3;

fn default_frames_per_packet(codec: CodecType) -> u32 {
    // Layer 1 granules are 384 frames; layers 2 and 3 are 1152.
    if codec == CODEC_TYPE_MP1 {
        384
    }
    else {
        1152
    }
}

/// MPEG audio packet-decoder adapter around an external codec engine.
pub struct MpaDecoder {
    feeder: Box<dyn PacketFeeder>,
    engine: Box<dyn CodecEngine>,
    output: SampleFormat,
    packet: Vec<u8>,
    decoded: Vec<u8>,
    pending: Vec<i32>,
    pending_pos: usize,
}

impl MpaDecoder {
    fn decode_next_packet(&mut self) -> Result<bool> {
        if !self.feeder.feed(&mut self.packet)? {
            return Ok(false);
        }

        self.decoded.clear();
        let frames = self.engine.decode_packet(&self.packet, &mut self.decoded)?;

        if frames as u32 > self.output.frames_per_packet {
            return decode_failed_error("mpa: packet exceeds frame length");
        }

        let channels = self.output.channels as usize;

        self.pending.clear();
        self.pending_pos = 0;

        // Nothing may be produced while the bit reservoir fills.
        if frames > 0 {
            let samples = frames * channels;
            if self.decoded.is_empty() || self.decoded.len() % samples != 0 {
                return decode_failed_error("mpa: engine output does not match declared format");
            }
            let width = self.decoded.len() / samples;
            if width == 0 || width > 4 {
                return decode_failed_error("mpa: invalid engine sample width");
            }

            self.pending.resize(samples, 0);
            conv::widen_be_to_i32(&self.decoded, width, &mut self.pending);
        }

        Ok(true)
    }
}

impl PacketDecoder for MpaDecoder {
    fn try_new(
        info: &StreamInfo,
        feeder: Box<dyn PacketFeeder>,
        engine: Option<Box<dyn CodecEngine>>,
    ) -> Result<Self> {
        let mut engine = match engine {
            Some(engine) => engine,
            None => return codec_init_error("mpa: a codec engine is required"),
        };

        if !matches!(info.format.codec, CODEC_TYPE_MP1 | CODEC_TYPE_MP2 | CODEC_TYPE_MP3) {
            return codec_init_error("mpa: invalid codec type");
        }

        // There is no configuration blob; the stream parameters must come
        // from the container.
        if info.format.sample_rate == 0 {
            return codec_init_error("mpa: sample rate is required");
        }
        if info.format.channels < 1 || info.format.channels > 2 {
            return codec_init_error("mpa: unsupported channel count");
        }
        if let Some(cookie) = &info.codec_config {
            if !cookie.is_empty() {
                warn!("ignoring unexpected configuration blob ({} bytes)", cookie.len());
            }
        }

        let frames_per_packet = match info.format.frames_per_packet {
            0 => default_frames_per_packet(info.format.codec),
            n => n,
        };

        let output = SampleFormat {
            sample_rate: info.format.sample_rate,
            channels: info.format.channels,
            bits_per_channel: SampleFormat::CANONICAL_BITS,
            bytes_per_frame: info.format.channels * (SampleFormat::CANONICAL_BITS / 8),
            frames_per_packet,
            codec: info.format.codec,
        };

        engine.init(&[])?;

        Ok(MpaDecoder {
            feeder,
            engine,
            output,
            packet: Vec::new(),
            decoded: Vec::new(),
            pending: Vec::new(),
            pending_pos: 0,
        })
    }

    fn supported_codecs() -> &'static [AdapterDescriptor] {
        &[
            support_adapter!(CODEC_TYPE_MP1, "mp1", "MPEG Audio Layer 1", true),
            support_adapter!(CODEC_TYPE_MP2, "mp2", "MPEG Audio Layer 2", true),
            support_adapter!(CODEC_TYPE_MP3, "mp3", "MPEG Audio Layer 3", true),
        ]
    }

    fn sample_format(&self) -> SampleFormat {
        self.output
    }

    fn decode(&mut self, dest: &mut [i32], max_frames: usize) -> Result<usize> {
        let stride = self.output.channels as usize;
        let mut produced = 0;

        while produced < max_frames {
            if self.pending_pos == self.pending.len() && !self.decode_next_packet()? {
                break;
            }

            let avail = (self.pending.len() - self.pending_pos) / stride;
            let take = avail.min(max_frames - produced);
            if take == 0 {
                continue;
            }

            dest[produced * stride..(produced + take) * stride]
                .copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + take * stride]);
            self.pending_pos += take * stride;
            produced += take;
        }

        Ok(produced)
    }

    fn reset(&mut self) {
        self.engine.reset();
        self.pending.clear();
        self.pending_pos = 0;
    }

    fn max_frame_dependency(&self) -> u32 {
        RESERVOIR_DEPTH_PACKETS
    }

    fn decoder_delay(&self) -> u32 {
        self.engine.output_delay()
    }

    fn feeder_mut(&mut self) -> &mut dyn PacketFeeder {
        &mut *self.feeder
    }
}

#[cfg(test)]
mod tests {
    use super::MpaDecoder;
    use coda_core::audio::SampleFormat;
    use coda_core::codecs::{CodecEngine, PacketDecoder, CODEC_TYPE_MP1, CODEC_TYPE_MP3};
    use coda_core::errors::Result;
    use coda_core::formats::{PacketFeeder, StreamInfo};

    struct NullEngine;

    impl CodecEngine for NullEngine {
        fn init(&mut self, _config: &[u8]) -> Result<()> {
            Ok(())
        }

        fn decode_packet(&mut self, _packet: &[u8], _out: &mut Vec<u8>) -> Result<usize> {
            Ok(0)
        }

        fn reset(&mut self) {}

        fn output_delay(&self) -> u32 {
            529
        }
    }

    struct EmptyFeeder;

    impl PacketFeeder for EmptyFeeder {
        fn feed(&mut self, buf: &mut Vec<u8>) -> Result<bool> {
            buf.clear();
            Ok(false)
        }

        fn seek_packet(&mut self, _packet: u64) -> Result<()> {
            Ok(())
        }

        fn packet_index(&self) -> u64 {
            0
        }
    }

    fn stream_info(codec: coda_core::codecs::CodecType) -> StreamInfo {
        StreamInfo::new(SampleFormat {
            sample_rate: 44_100,
            channels: 2,
            bits_per_channel: 0,
            bytes_per_frame: 0,
            frames_per_packet: 0,
            codec,
        })
    }

    #[test]
    fn verify_defaults_and_seek_parameters() {
        let dec = MpaDecoder::try_new(
            &stream_info(CODEC_TYPE_MP3),
            Box::new(EmptyFeeder),
            Some(Box::new(NullEngine)),
        )
        .unwrap();

        assert_eq!(dec.sample_format().frames_per_packet, 1152);
        assert_eq!(dec.max_frame_dependency(), 3);
        assert_eq!(dec.decoder_delay(), 529);

        let dec = MpaDecoder::try_new(
            &stream_info(CODEC_TYPE_MP1),
            Box::new(EmptyFeeder),
            Some(Box::new(NullEngine)),
        )
        .unwrap();
        assert_eq!(dec.sample_format().frames_per_packet, 384);
    }

    #[test]
    fn verify_container_parameters_are_required() {
        let mut info = stream_info(CODEC_TYPE_MP3);
        info.format.sample_rate = 0;

        let result =
            MpaDecoder::try_new(&info, Box::new(EmptyFeeder), Some(Box::new(NullEngine)));
        assert!(result.is_err());
    }
}
