// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! ALAC packet-decoder adapter for Project Coda.
//!
//! The adapter fully parses and validates the ALAC "magic cookie" before
//! initializing the external codec engine with it. ALAC packets are
//! independently decodable, so the adapter declares no frame dependency and
//! no decoder delay.

use coda_core::audio::{ChannelMap, SampleFormat};
use coda_core::codecs::{
    AdapterDescriptor, CodecEngine, PacketDecoder, CODEC_TYPE_ALAC,
};
use coda_core::conv;
use coda_core::errors::{codec_init_error, decode_failed_error, Result};
use coda_core::formats::{PacketFeeder, StreamInfo};
use coda_core::io::{BufReader, ReadBytes};
use coda_core::support_adapter;
use log::warn;

/// Supported ALAC version.
const ALAC_VERSION: u8 = 0;

/// The ALAC "magic cookie", or codec specific configuration.
#[derive(Debug)]
#[allow(dead_code)]
struct MagicCookie {
    frame_length: u32,
    compatible_version: u8,
    bit_depth: u8,
    pb: u8,
    mb: u8,
    kb: u8,
    num_channels: u8,
    max_run: u16,
    max_frame_bytes: u32,
    avg_bit_rate: u32,
    sample_rate: u32,
    channel_map: ChannelMap,
}

impl MagicCookie {
    fn try_parse(mut buf: &[u8]) -> Result<MagicCookie> {
        // The magic cookie must be atleast 24 bytes long.
        if buf.len() < 24 {
            return codec_init_error("alac: magic cookie size too small");
        }

        // The magic cookie may be wrapped in a format atom. Skip over it.
        if buf[4..8] == *b"frma" {
            buf = &buf[12..];
        }

        // The magic cookie may additionally be wrapped in a codec atom. Skip
        // over it.
        if buf.len() >= 8 && buf[4..8] == *b"alac" {
            buf = &buf[12..];
        }

        // The unwrapped magic cookie must be either 24 or 48 bytes long.
        if buf.len() != 24 && buf.len() != 48 {
            return codec_init_error("alac: invalid magic cookie size");
        }

        let mut reader = BufReader::new(buf);

        let mut config = MagicCookie {
            frame_length: reader.read_be_u32()?,
            compatible_version: reader.read_u8()?,
            bit_depth: reader.read_u8()?,
            pb: reader.read_u8()?,
            mb: reader.read_u8()?,
            kb: reader.read_u8()?,
            num_channels: reader.read_u8()?,
            max_run: reader.read_be_u16()?,
            max_frame_bytes: reader.read_be_u32()?,
            avg_bit_rate: reader.read_be_u32()?,
            sample_rate: reader.read_be_u32()?,
            channel_map: ChannelMap::default(),
        };

        // Only support up-to the implemented ALAC version.
        if config.compatible_version > ALAC_VERSION {
            return codec_init_error("alac: not compatible with alac version 0");
        }

        if config.frame_length == 0 {
            return codec_init_error("alac: frame length cannot be 0");
        }

        // A bit depth greater than 32 is not allowed.
        if config.bit_depth == 0 || config.bit_depth > 32 {
            return codec_init_error("alac: invalid bit depth");
        }

        if config.sample_rate == 0 {
            return codec_init_error("alac: invalid sample rate");
        }

        // Only 8 channel layouts exist.
        if config.num_channels < 1 || config.num_channels > 8 {
            return codec_init_error("alac: unsupported number of channels");
        }

        // If the magic cookie is 48 bytes, the channel layout is explicitly
        // set, otherwise a layout is implied by the number of channels.
        config.channel_map = if reader.byte_len() == 48 {
            // The first field is the size of the channel layout record. This
            // should always be 24.
            if reader.read_be_u32()? != 24 {
                return codec_init_error("alac: invalid channel layout info size");
            }

            // The channel layout record identifier should be "chan".
            if reader.read_quad_bytes()? != *b"chan" {
                return codec_init_error("alac: invalid channel layout info id");
            }

            // The channel layout record version must be 0.
            if reader.read_be_u32()? != 0 {
                return codec_init_error("alac: invalid channel layout info version");
            }

            let layout_tag = reader.read_be_u32()?;

            let channel_map = match ChannelMap::from_layout_tag(layout_tag) {
                Some(map) => map,
                None => return codec_init_error("alac: invalid channel layout tag"),
            };

            // The number of channels stated in the mandatory part of the
            // magic cookie must match the channel layout.
            if usize::from(config.num_channels) != channel_map.count() {
                return codec_init_error(
                    "alac: the number of channels differs from the channel layout",
                );
            }

            // The final two fields are reserved and must be 0.
            if reader.read_be_u32()? != 0 || reader.read_be_u32()? != 0 {
                return codec_init_error("alac: reserved values in channel layout are not 0");
            }

            channel_map
        }
        else {
            // Standard layouts keyed by channel count. The layout tag packs
            // the channel count into its low 16 bits.
            let tag = match config.num_channels {
                1 => (100 << 16) | 1,
                2 => (101 << 16) | 2,
                3 => (113 << 16) | 3,
                4 => (116 << 16) | 4,
                5 => (120 << 16) | 5,
                6 => (124 << 16) | 6,
                7 => (142 << 16) | 7,
                8 => (127 << 16) | 8,
                _ => unreachable!(),
            };
            ChannelMap::from_layout_tag(tag).unwrap()
        };

        Ok(config)
    }
}

/// ALAC packet-decoder adapter around an external codec engine.
pub struct AlacDecoder {
    feeder: Box<dyn PacketFeeder>,
    engine: Box<dyn CodecEngine>,
    config: MagicCookie,
    output: SampleFormat,
    packet: Vec<u8>,
    decoded: Vec<u8>,
    pending: Vec<i32>,
    pending_pos: usize,
}

impl AlacDecoder {
    /// Feeds one packet through the engine into the pending sample buffer.
    /// Returns `false` at end of stream.
    fn decode_next_packet(&mut self) -> Result<bool> {
        if !self.feeder.feed(&mut self.packet)? {
            return Ok(false);
        }

        self.decoded.clear();
        let frames = self.engine.decode_packet(&self.packet, &mut self.decoded)?;

        let channels = u32::from(self.config.num_channels);
        let width = usize::from((self.config.bit_depth + 7) / 8);

        if frames as u32 > self.config.frame_length {
            return decode_failed_error("alac: packet exceeds frame length");
        }
        if self.decoded.len() != frames * channels as usize * width {
            return decode_failed_error("alac: engine output does not match declared format");
        }

        self.pending.clear();
        self.pending.resize(frames * channels as usize, 0);
        self.pending_pos = 0;
        conv::widen_be_to_i32(&self.decoded, width, &mut self.pending);

        Ok(true)
    }
}

impl PacketDecoder for AlacDecoder {
    fn try_new(
        info: &StreamInfo,
        feeder: Box<dyn PacketFeeder>,
        engine: Option<Box<dyn CodecEngine>>,
    ) -> Result<Self> {
        let mut engine = match engine {
            Some(engine) => engine,
            None => return codec_init_error("alac: a codec engine is required"),
        };

        let cookie = match &info.codec_config {
            Some(cookie) => cookie,
            None => return codec_init_error("alac: missing codec configuration"),
        };

        let config = MagicCookie::try_parse(cookie)?;

        // The container's declared channel count, when present, must agree
        // with the configuration.
        if info.format.channels != 0 && info.format.channels != u32::from(config.num_channels) {
            return codec_init_error("alac: channel count differs from container");
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
            channels: u32::from(config.num_channels),
            bits_per_channel: SampleFormat::CANONICAL_BITS,
            bytes_per_frame: u32::from(config.num_channels) * (SampleFormat::CANONICAL_BITS / 8),
            frames_per_packet: config.frame_length,
            codec: CODEC_TYPE_ALAC,
        };

        engine.init(cookie)?;

        Ok(AlacDecoder {
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
        &[support_adapter!(CODEC_TYPE_ALAC, "alac", "Apple Lossless Audio Codec", true)]
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

    fn feeder_mut(&mut self) -> &mut dyn PacketFeeder {
        &mut *self.feeder
    }
}

#[cfg(test)]
mod tests {
    use super::{AlacDecoder, MagicCookie};
    use coda_core::audio::SampleFormat;
    use coda_core::codecs::{CodecEngine, PacketDecoder, CODEC_TYPE_ALAC};
    use coda_core::errors::Result;
    use coda_core::formats::{PacketFeeder, StreamInfo};

    fn cookie(frame_length: u32, bit_depth: u8, channels: u8, rate: u32) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&frame_length.to_be_bytes());
        out.push(0); // compatible version
        out.push(bit_depth);
        out.push(40); // pb
        out.push(10); // mb
        out.push(14); // kb
        out.push(channels);
        out.extend_from_slice(&255u16.to_be_bytes()); // max run
        out.extend_from_slice(&0u32.to_be_bytes()); // max frame bytes
        out.extend_from_slice(&0u32.to_be_bytes()); // avg bit rate
        out.extend_from_slice(&rate.to_be_bytes());
        out
    }

    #[test]
    fn verify_cookie_parse() {
        let config = MagicCookie::try_parse(&cookie(4096, 16, 2, 44_100)).unwrap();

        assert_eq!(config.frame_length, 4096);
        assert_eq!(config.bit_depth, 16);
        assert_eq!(config.num_channels, 2);
        assert_eq!(config.sample_rate, 44_100);
        assert_eq!(config.channel_map.count(), 2);
    }

    #[test]
    fn verify_cookie_rejects_malformed() {
        // Too small.
        assert!(MagicCookie::try_parse(&[0u8; 12]).is_err());
        // Unsupported version.
        let mut bad = cookie(4096, 16, 2, 44_100);
        bad[4] = 1;
        assert!(MagicCookie::try_parse(&bad).is_err());
        // Invalid bit depth.
        let mut bad = cookie(4096, 16, 2, 44_100);
        bad[5] = 40;
        assert!(MagicCookie::try_parse(&bad).is_err());
        // Invalid channel count.
        assert!(MagicCookie::try_parse(&cookie(4096, 16, 9, 44_100)).is_err());
    }

    #[test]
    fn verify_cookie_with_layout_record() {
        let mut buf = cookie(4096, 16, 2, 44_100);
        buf.extend_from_slice(&24u32.to_be_bytes());
        buf.extend_from_slice(b"chan");
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf.extend_from_slice(&(((101u32) << 16) | 2).to_be_bytes());
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf.extend_from_slice(&0u32.to_be_bytes());

        let config = MagicCookie::try_parse(&buf).unwrap();
        assert_eq!(config.channel_map.count(), 2);

        // A layout disagreeing with the channel count is rejected.
        let mut bad = cookie(4096, 16, 1, 44_100);
        bad.extend_from_slice(&24u32.to_be_bytes());
        bad.extend_from_slice(b"chan");
        bad.extend_from_slice(&0u32.to_be_bytes());
        bad.extend_from_slice(&(((101u32) << 16) | 2).to_be_bytes());
        bad.extend_from_slice(&0u32.to_be_bytes());
        bad.extend_from_slice(&0u32.to_be_bytes());
        assert!(MagicCookie::try_parse(&bad).is_err());
    }

    /// An engine whose "compressed" packets are already big-endian PCM.
    struct PassthroughEngine {
        bit_depth: u8,
        channels: u8,
        initialized: bool,
        resets: u32,
    }

    impl CodecEngine for PassthroughEngine {
        fn init(&mut self, config: &[u8]) -> Result<()> {
            assert!(config.len() >= 24);
            self.initialized = true;
            Ok(())
        }

        fn decode_packet(&mut self, packet: &[u8], out: &mut Vec<u8>) -> Result<usize> {
            assert!(self.initialized);
            out.extend_from_slice(packet);
            let frame_size = usize::from(self.channels) * usize::from((self.bit_depth + 7) / 8);
            Ok(packet.len() / frame_size)
        }

        fn reset(&mut self) {
            self.resets += 1;
        }
    }

    struct VecFeeder {
        packets: Vec<Vec<u8>>,
        cursor: usize,
    }

    impl PacketFeeder for VecFeeder {
        fn feed(&mut self, buf: &mut Vec<u8>) -> Result<bool> {
            buf.clear();
            match self.packets.get(self.cursor) {
                Some(packet) => {
                    buf.extend_from_slice(packet);
                    self.cursor += 1;
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        fn seek_packet(&mut self, packet: u64) -> Result<()> {
            self.cursor = (packet as usize).min(self.packets.len());
            Ok(())
        }

        fn packet_index(&self) -> u64 {
            self.cursor as u64
        }
    }

    fn stream_info(frame_length: u32) -> StreamInfo {
        let mut info = StreamInfo::new(SampleFormat {
            sample_rate: 44_100,
            channels: 2,
            bits_per_channel: 0,
            bytes_per_frame: 0,
            frames_per_packet: frame_length,
            codec: CODEC_TYPE_ALAC,
        });
        info.codec_config = Some(cookie(frame_length, 16, 2, 44_100).into_boxed_slice());
        info
    }

    /// A stereo 16-bit "packet" of `frames` frames of silence.
    fn silent_packet(frames: usize) -> Vec<u8> {
        vec![0u8; frames * 4]
    }

    #[test]
    fn verify_full_and_short_packets() {
        // A stream of full packets, with a short final packet.
        let feeder = Box::new(VecFeeder {
            packets: vec![silent_packet(4096), silent_packet(4096), silent_packet(1000)],
            cursor: 0,
        });
        let engine =
            Box::new(PassthroughEngine { bit_depth: 16, channels: 2, initialized: false, resets: 0 });

        let mut dec = AlacDecoder::try_new(&stream_info(4096), feeder, Some(engine)).unwrap();

        assert_eq!(dec.sample_format().frames_per_packet, 4096);

        // Every decode call returns at most one packet's worth of frames.
        let mut dest = vec![0i32; 4096 * 2];
        assert_eq!(dec.decode(&mut dest, 4096).unwrap(), 4096);
        assert_eq!(dec.decode(&mut dest, 4096).unwrap(), 4096);
        // The final, short packet returns fewer.
        assert_eq!(dec.decode(&mut dest, 4096).unwrap(), 1000);
        assert_eq!(dec.decode(&mut dest, 4096).unwrap(), 0);
    }

    #[test]
    fn verify_widening_and_remainder() {
        let mut packet = Vec::new();
        for sample in [0x0102i16, 0x7fff, -0x8000, 0x0042] {
            packet.extend_from_slice(&sample.to_be_bytes());
        }

        let feeder = Box::new(VecFeeder { packets: vec![packet], cursor: 0 });
        let engine =
            Box::new(PassthroughEngine { bit_depth: 16, channels: 2, initialized: false, resets: 0 });

        let mut dec = AlacDecoder::try_new(&stream_info(4096), feeder, Some(engine)).unwrap();

        // Pull one frame at a time to exercise remainder buffering.
        let mut dest = [0i32; 2];
        assert_eq!(dec.decode(&mut dest, 1).unwrap(), 1);
        assert_eq!(dest, [0x0102_0000, 0x7fff_0000]);
        assert_eq!(dec.decode(&mut dest, 1).unwrap(), 1);
        assert_eq!(dest, [0x8000_0000u32 as i32, 0x0042_0000]);
        assert_eq!(dec.decode(&mut dest, 1).unwrap(), 0);
    }

    #[test]
    fn verify_reset_discards_pending_output() {
        let feeder = Box::new(VecFeeder { packets: vec![silent_packet(8)], cursor: 0 });
        let engine =
            Box::new(PassthroughEngine { bit_depth: 16, channels: 2, initialized: false, resets: 0 });

        let mut dec = AlacDecoder::try_new(&stream_info(4096), feeder, Some(engine)).unwrap();

        let mut dest = [0i32; 2];
        assert_eq!(dec.decode(&mut dest, 1).unwrap(), 1);
        dec.reset();
        // Buffered remainder from the first packet must be gone.
        assert_eq!(dec.decode(&mut dest, 1).unwrap(), 0);
    }
}
