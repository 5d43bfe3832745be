// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! AAC packet-decoder adapter for Project Coda.
//!
//! The codec configuration blob is the MPEG-4 audio specific configuration.
//! AAC's overlap-add windowing makes a packet depend on its predecessor, so
//! the adapter declares a one-packet frame dependency; the output-timeline
//! delay is whatever the engine reports, never an assumed constant.

use coda_core::audio::SampleFormat;
use coda_core::codecs::{
    AdapterDescriptor, CodecEngine, PacketDecoder, CODEC_TYPE_AAC,
};
use coda_core::conv;
use coda_core::errors::{codec_init_error, decode_failed_error, Result};
use coda_core::formats::{PacketFeeder, StreamInfo};
use coda_core::support_adapter;
use log::warn;

/// Sampling frequencies selectable by index in the audio specific
/// configuration.
const SAMPLE_RATES: [u32; 13] = [
    96_000, 88_200, 64_000, 48_000, 44_100, 32_000, 24_000, 22_050, 16_000, 12_000, 11_025, 8_000,
    7_350,
];

/// A bit-granular cursor over the configuration blob.
struct BitCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BitCursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        BitCursor { buf, pos: 0 }
    }

    fn read_bits(&mut self, count: u32) -> Result<u32> {
        debug_assert!(count <= 24);

        let mut value = 0u32;
        for _ in 0..count {
            let byte = match self.buf.get(self.pos / 8) {
                Some(byte) => *byte,
                None => return codec_init_error("aac: configuration too short"),
            };
            let bit = (byte >> (7 - (self.pos % 8))) & 1;
            value = (value << 1) | u32::from(bit);
            self.pos += 1;
        }
        Ok(value)
    }
}

/// The parsed audio specific configuration.
#[derive(Debug)]
struct AudioSpecificConfig {
    sample_rate: u32,
    channels: u32,
    frame_length: u32,
}

impl AudioSpecificConfig {
    fn try_parse(buf: &[u8]) -> Result<AudioSpecificConfig> {
        let mut bits = BitCursor::new(buf);

        // Only the low-complexity object type is supported.
        let object_type = bits.read_bits(5)?;
        if object_type != 2 {
            return codec_init_error("aac: unsupported audio object type");
        }

        let freq_index = bits.read_bits(4)?;
        let sample_rate = if freq_index == 15 {
            // An index of 15 escapes to an explicit 24-bit rate.
            bits.read_bits(24)?
        }
        else {
            match SAMPLE_RATES.get(freq_index as usize) {
                Some(rate) => *rate,
                None => return codec_init_error("aac: invalid sampling frequency index"),
            }
        };

        if sample_rate == 0 {
            return codec_init_error("aac: invalid sample rate");
        }

        let channels = match bits.read_bits(4)? {
            config @ 1..=6 => config,
            7 => 8,
            _ => return codec_init_error("aac: unsupported channel configuration"),
        };

        // The first field of the low-complexity specific configuration
        // selects the short 960-frame transform.
        let frame_length = if bits.read_bits(1)? == 1 { 960 } else { 1024 };

        Ok(AudioSpecificConfig { sample_rate, channels, frame_length })
    }
}

/// AAC packet-decoder adapter around an external codec engine.
pub struct AacDecoder {
    feeder: Box<dyn PacketFeeder>,
    engine: Box<dyn CodecEngine>,
    config: AudioSpecificConfig,
    output: SampleFormat,
    packet: Vec<u8>,
    decoded: Vec<u8>,
    pending: Vec<i32>,
    pending_pos: usize,
}

impl AacDecoder {
    fn decode_next_packet(&mut self) -> Result<bool> {
        if !self.feeder.feed(&mut self.packet)? {
            return Ok(false);
        }

        self.decoded.clear();
        let frames = self.engine.decode_packet(&self.packet, &mut self.decoded)?;

        if frames as u32 > self.config.frame_length {
            return decode_failed_error("aac: packet exceeds frame length");
        }

        let channels = self.config.channels as usize;

        self.pending.clear();
        self.pending_pos = 0;

        // The engine may legitimately produce nothing while gathering its
        // look-ahead.
        if frames > 0 {
            // The engine's native sample width is implied by its output.
            let samples = frames * channels;
            if self.decoded.is_empty() || self.decoded.len() % samples != 0 {
                return decode_failed_error("aac: engine output does not match declared format");
            }
            let width = self.decoded.len() / samples;
            if width == 0 || width > 4 {
                return decode_failed_error("aac: invalid engine sample width");
            }

            self.pending.resize(samples, 0);
            conv::widen_be_to_i32(&self.decoded, width, &mut self.pending);
        }

        Ok(true)
    }
}

impl PacketDecoder for AacDecoder {
    fn try_new(
        info: &StreamInfo,
        feeder: Box<dyn PacketFeeder>,
        engine: Option<Box<dyn CodecEngine>>,
    ) -> Result<Self> {
        let mut engine = match engine {
            Some(engine) => engine,
            None => return codec_init_error("aac: a codec engine is required"),
        };

        let cookie = match &info.codec_config {
            Some(cookie) => cookie,
            None => return codec_init_error("aac: missing audio specific configuration"),
        };

        let config = AudioSpecificConfig::try_parse(cookie)?;

        if info.format.channels != 0 && info.format.channels != config.channels {
            return codec_init_error("aac: channel count differs from container");
        }
        if info.format.frames_per_packet != 0
            && info.format.frames_per_packet != config.frame_length
        {
            warn!(
                "container frames per packet ({}) differs from configuration ({})",
                info.format.frames_per_packet, config.frame_length
            );
        }

        let output = SampleFormat {
            sample_rate: config.sample_rate,
            channels: config.channels,
            bits_per_channel: SampleFormat::CANONICAL_BITS,
            bytes_per_frame: config.channels * (SampleFormat::CANONICAL_BITS / 8),
            frames_per_packet: config.frame_length,
            codec: CODEC_TYPE_AAC,
        };

        engine.init(cookie)?;

        Ok(AacDecoder {
            feeder,
            engine,
            config,
            output,
            packet: Vec::new(),
            decoded: Vec::new(),
            pending: Vec::new(),
            pending_pos: 0,
        })
    }

    fn supported_codecs() -> &'static [AdapterDescriptor] {
        &[support_adapter!(CODEC_TYPE_AAC, "aac", "Advanced Audio Coding", true)]
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
        // Overlap-add windowing reaches one packet back.
        1
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
    use super::{AacDecoder, AudioSpecificConfig};
    use coda_core::audio::SampleFormat;
    use coda_core::codecs::{CodecEngine, PacketDecoder, CODEC_TYPE_AAC};
    use coda_core::errors::Result;
    use coda_core::formats::{PacketFeeder, StreamInfo};

    /// Object type 2 (LC), 44.1 kHz by index, stereo, 1024-frame transform.
    const ASC_LC_44100_STEREO: [u8; 2] = [0x12, 0x10];

    #[test]
    fn verify_asc_parse() {
        let config = AudioSpecificConfig::try_parse(&ASC_LC_44100_STEREO).unwrap();
        assert_eq!(config.sample_rate, 44_100);
        assert_eq!(config.channels, 2);
        assert_eq!(config.frame_length, 1024);
    }

    #[test]
    fn verify_asc_explicit_rate() {
        // Object type 2, escape index 15, explicit rate 12345 Hz, mono.
        // 00010 1111 000000110000001110011001 0001 0...
        let mut value = 0u64;
        let mut bits = 0u32;
        for (field, width) in [(2u64, 5u32), (15, 4), (12_345, 24), (1, 4), (0, 1)] {
            value = (value << width) | field;
            bits += width;
        }
        value <<= 64 - bits;
        let buf = value.to_be_bytes();

        let config = AudioSpecificConfig::try_parse(&buf).unwrap();
        assert_eq!(config.sample_rate, 12_345);
        assert_eq!(config.channels, 1);
    }

    #[test]
    fn verify_asc_rejects_non_lc() {
        // Object type 1 (Main).
        let buf = [0x0a, 0x10];
        assert!(AudioSpecificConfig::try_parse(&buf).is_err());
        // Truncated.
        assert!(AudioSpecificConfig::try_parse(&[0x12]).is_err());
    }

    /// An engine that emits a fixed block of 16-bit frames per packet, and
    /// nothing for the very first packet, modelling start-up look-ahead.
    struct BlockEngine {
        fed: u32,
    }

    impl CodecEngine for BlockEngine {
        fn init(&mut self, _config: &[u8]) -> Result<()> {
            Ok(())
        }

        fn decode_packet(&mut self, _packet: &[u8], out: &mut Vec<u8>) -> Result<usize> {
            self.fed += 1;
            if self.fed == 1 {
                return Ok(0);
            }
            out.extend_from_slice(&[0u8; 1024 * 2 * 2]);
            Ok(1024)
        }

        fn reset(&mut self) {
            self.fed = 0;
        }

        fn output_delay(&self) -> u32 {
            2112
        }
    }

    struct CountingFeeder {
        cursor: u64,
        packets: u64,
    }

    impl PacketFeeder for CountingFeeder {
        fn feed(&mut self, buf: &mut Vec<u8>) -> Result<bool> {
            buf.clear();
            if self.cursor >= self.packets {
                return Ok(false);
            }
            buf.push(self.cursor as u8);
            self.cursor += 1;
            Ok(true)
        }

        fn seek_packet(&mut self, packet: u64) -> Result<()> {
            self.cursor = packet.min(self.packets);
            Ok(())
        }

        fn packet_index(&self) -> u64 {
            self.cursor
        }
    }

    fn stream_info() -> StreamInfo {
        let mut info = StreamInfo::new(SampleFormat {
            sample_rate: 44_100,
            channels: 2,
            bits_per_channel: 0,
            bytes_per_frame: 0,
            frames_per_packet: 1024,
            codec: CODEC_TYPE_AAC,
        });
        info.codec_config = Some(Box::new(ASC_LC_44100_STEREO));
        info
    }

    #[test]
    fn verify_delay_comes_from_engine() {
        let feeder = Box::new(CountingFeeder { cursor: 0, packets: 4 });
        let engine = Box::new(BlockEngine { fed: 0 });

        let dec = AacDecoder::try_new(&stream_info(), feeder, Some(engine)).unwrap();
        assert_eq!(dec.decoder_delay(), 2112);
        assert_eq!(dec.max_frame_dependency(), 1);
    }

    #[test]
    fn verify_empty_engine_output_is_tolerated() {
        let feeder = Box::new(CountingFeeder { cursor: 0, packets: 3 });
        let engine = Box::new(BlockEngine { fed: 0 });

        let mut dec = AacDecoder::try_new(&stream_info(), feeder, Some(engine)).unwrap();

        // The first packet produces nothing; decode keeps pulling until the
        // engine yields frames.
        let mut dest = vec![0i32; 1024 * 2];
        assert_eq!(dec.decode(&mut dest, 1024).unwrap(), 1024);
        assert_eq!(dec.decode(&mut dest, 1024).unwrap(), 1024);
        assert_eq!(dec.decode(&mut dest, 1024).unwrap(), 0);
    }
}
