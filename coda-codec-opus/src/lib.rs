// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Opus packet-decoder adapter for Project Coda.
//!
//! The codec configuration blob is the identification header. Its integer
//! fields are little-endian, unlike every other configuration blob this
//! project parses. Decoded output is always at 48 kHz regardless of the
//! input rate recorded in the header.

use coda_core::audio::SampleFormat;
use coda_core::codecs::{
    AdapterDescriptor, CodecEngine, PacketDecoder, CODEC_TYPE_OPUS,
};
use coda_core::conv;
use coda_core::errors::{codec_init_error, decode_failed_error, Result};
use coda_core::formats::{PacketFeeder, StreamInfo};
use coda_core::io::{BufReader, ReadBytes};
use coda_core::support_adapter;

/// The rate all Opus streams decode at.
const OPUS_SAMPLE_RATE: u32 = 48_000;

/// The preroll convention after a seek, in output frames (80 ms).
const PREROLL_FRAMES: u32 = 3840;

/// The default packet duration when the container does not declare one
/// (20 ms).
const DEFAULT_FRAMES_PER_PACKET: u32 = 960;

/// The parsed identification header.
#[derive(Debug)]
#[allow(dead_code)]
struct IdHeader {
    channels: u32,
    pre_skip: u16,
    input_sample_rate: u32,
    output_gain: i16,
    mapping_family: u8,
}

impl IdHeader {
    fn try_parse(buf: &[u8]) -> Result<IdHeader> {
        let mut reader = BufReader::new(buf);

        let mut magic = [0u8; 8];
        reader.read_buf_exact(&mut magic).or(codec_init_error("opus: header too short"))?;
        if magic != *b"OpusHead" {
            return codec_init_error("opus: missing identification header signature");
        }

        if reader.read_u8()? != 1 {
            return codec_init_error("opus: unsupported header version");
        }

        let channels = u32::from(reader.read_u8()?);
        if channels == 0 {
            return codec_init_error("opus: channel count cannot be 0");
        }

        let pre_skip = reader.read_u16()?;
        let input_sample_rate = reader.read_u32()?;
        let output_gain = reader.read_u16()? as i16;
        let mapping_family = reader.read_u8()?;

        match mapping_family {
            0 => {
                // Family 0 covers mono and stereo with no mapping table.
                if channels > 2 {
                    return codec_init_error("opus: too many channels for mapping family 0");
                }
            }
            1 => {
                if channels > 8 {
                    return codec_init_error("opus: too many channels for mapping family 1");
                }

                // A stream count, coupled count, and one mapping entry per
                // channel follow.
                let streams = u32::from(reader.read_u8()?);
                let coupled = u32::from(reader.read_u8()?);
                if streams == 0 || streams + coupled > 255 {
                    return codec_init_error("opus: invalid stream counts");
                }
                for _ in 0..channels {
                    if u32::from(reader.read_u8()?) >= streams + coupled {
                        return codec_init_error("opus: invalid channel mapping entry");
                    }
                }
            }
            _ => return codec_init_error("opus: unsupported channel mapping family"),
        }

        Ok(IdHeader { channels, pre_skip, input_sample_rate, output_gain, mapping_family })
    }
}

/// Opus packet-decoder adapter around an external codec engine.
pub struct OpusDecoder {
    feeder: Box<dyn PacketFeeder>,
    engine: Box<dyn CodecEngine>,
    output: SampleFormat,
    /// Packets of preroll required to re-converge after a seek.
    dependency: u32,
    packet: Vec<u8>,
    decoded: Vec<u8>,
    pending: Vec<i32>,
    pending_pos: usize,
}

impl OpusDecoder {
    fn decode_next_packet(&mut self) -> Result<bool> {
        if !self.feeder.feed(&mut self.packet)? {
            return Ok(false);
        }

        self.decoded.clear();
        let frames = self.engine.decode_packet(&self.packet, &mut self.decoded)?;

        let channels = self.output.channels as usize;

        self.pending.clear();
        self.pending_pos = 0;

        if frames > 0 {
            let samples = frames * channels;
            if self.decoded.is_empty() || self.decoded.len() % samples != 0 {
                return decode_failed_error("opus: engine output does not match declared format");
            }
            let width = self.decoded.len() / samples;
            if width == 0 || width > 4 {
                return decode_failed_error("opus: invalid engine sample width");
            }

            self.pending.resize(samples, 0);
            conv::widen_be_to_i32(&self.decoded, width, &mut self.pending);
        }

        Ok(true)
    }
}

impl PacketDecoder for OpusDecoder {
    fn try_new(
        info: &StreamInfo,
        feeder: Box<dyn PacketFeeder>,
        engine: Option<Box<dyn CodecEngine>>,
    ) -> Result<Self> {
        let mut engine = match engine {
            Some(engine) => engine,
            None => return codec_init_error("opus: a codec engine is required"),
        };

        let cookie = match &info.codec_config {
            Some(cookie) => cookie,
            None => return codec_init_error("opus: missing identification header"),
        };

        let header = IdHeader::try_parse(cookie)?;

        if info.format.channels != 0 && info.format.channels != header.channels {
            return codec_init_error("opus: channel count differs from container");
        }

        let frames_per_packet = match info.format.frames_per_packet {
            0 => DEFAULT_FRAMES_PER_PACKET,
            n => n,
        };

        let output = SampleFormat {
            sample_rate: OPUS_SAMPLE_RATE,
            channels: header.channels,
            bits_per_channel: SampleFormat::CANONICAL_BITS,
            bytes_per_frame: header.channels * (SampleFormat::CANONICAL_BITS / 8),
            frames_per_packet,
            codec: CODEC_TYPE_OPUS,
        };

        let dependency = (PREROLL_FRAMES + frames_per_packet - 1) / frames_per_packet;

        engine.init(cookie)?;

        Ok(OpusDecoder {
            feeder,
            engine,
            output,
            dependency,
            packet: Vec::new(),
            decoded: Vec::new(),
            pending: Vec::new(),
            pending_pos: 0,
        })
    }

    fn supported_codecs() -> &'static [AdapterDescriptor] {
        &[support_adapter!(CODEC_TYPE_OPUS, "opus", "Opus", true)]
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
        self.dependency
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
    use super::IdHeader;

    fn id_header(channels: u8, pre_skip: u16, family: u8) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"OpusHead");
        out.push(1);
        out.push(channels);
        out.extend_from_slice(&pre_skip.to_le_bytes());
        out.extend_from_slice(&48_000u32.to_le_bytes());
        out.extend_from_slice(&0i16.to_le_bytes());
        out.push(family);
        if family == 1 {
            out.push(channels); // streams
            out.push(0); // coupled
            for channel in 0..channels {
                out.push(channel);
            }
        }
        out
    }

    #[test]
    fn verify_id_header_parse() {
        let header = IdHeader::try_parse(&id_header(2, 312, 0)).unwrap();

        assert_eq!(header.channels, 2);
        assert_eq!(header.pre_skip, 312);
        assert_eq!(header.input_sample_rate, 48_000);
        assert_eq!(header.mapping_family, 0);
    }

    #[test]
    fn verify_id_header_mapping_table() {
        let header = IdHeader::try_parse(&id_header(6, 0, 1)).unwrap();
        assert_eq!(header.channels, 6);
        assert_eq!(header.mapping_family, 1);
    }

    #[test]
    fn verify_id_header_rejects_malformed() {
        // Wrong signature.
        let mut bad = id_header(2, 0, 0);
        bad[0] = b'X';
        assert!(IdHeader::try_parse(&bad).is_err());

        // Unsupported version.
        let mut bad = id_header(2, 0, 0);
        bad[8] = 2;
        assert!(IdHeader::try_parse(&bad).is_err());

        // Too many channels for family 0.
        assert!(IdHeader::try_parse(&id_header(3, 0, 0)).is_err());

        // Truncated mapping table.
        let mut bad = id_header(6, 0, 1);
        bad.truncate(bad.len() - 2);
        assert!(IdHeader::try_parse(&bad).is_err());
    }
}
