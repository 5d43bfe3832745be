// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! FLAC packet-decoder adapter for Project Coda.
//!
//! The codec configuration blob is the stream information block. Frames are
//! independently decodable, so the adapter declares no frame dependency and
//! no decoder delay.

use coda_core::audio::SampleFormat;
use coda_core::codecs::{
    AdapterDescriptor, CodecEngine, PacketDecoder, CODEC_TYPE_FLAC,
};
use coda_core::conv;
use coda_core::errors::{codec_init_error, decode_failed_error, Result};
use coda_core::formats::{PacketFeeder, StreamInfo};
use coda_core::io::{BufReader, ReadBytes};
use coda_core::support_adapter;

/// The FLAC stream information block.
#[derive(Debug)]
#[allow(dead_code)]
struct StreamInfoBlock {
    block_len_min: u16,
    block_len_max: u16,
    frame_byte_len_min: u32,
    frame_byte_len_max: u32,
    sample_rate: u32,
    channels: u32,
    bits_per_sample: u32,
    n_samples: u64,
    md5: [u8; 16],
}

impl StreamInfoBlock {
    /// Parses the 34-byte stream information block. The blob may carry a
    /// 4-byte metadata block header, optionally preceded by a 4-byte
    /// version/flags word, as stored by atom-based containers.
    fn try_parse(mut buf: &[u8]) -> Result<StreamInfoBlock> {
        // Strip the version/flags word of an atom-based wrapper.
        if buf.len() == 42 {
            buf = &buf[4..];
        }
        // Strip a metadata block header for a stream information block.
        if buf.len() == 38 && buf[0] & 0x7f == 0 {
            buf = &buf[4..];
        }
        if buf.len() != 34 {
            return codec_init_error("flac: invalid stream information size");
        }

        let mut reader = BufReader::new(buf);

        let block_len_min = reader.read_be_u16()?;
        let block_len_max = reader.read_be_u16()?;

        // Block lengths must be in the range 16..=65535.
        if block_len_min < 16 || block_len_max < 16 || block_len_max < block_len_min {
            return codec_init_error("flac: invalid block length");
        }

        let frame_byte_len_min = reader.read_be_u24()?;
        let frame_byte_len_max = reader.read_be_u24()?;

        // The remaining fields are bit-packed: a 20-bit sample rate, a 3-bit
        // channel count less one, a 5-bit bit depth less one, and a 36-bit
        // sample count.
        let packed = reader.read_be_u64()?;

        let sample_rate = (packed >> 44) as u32;
        if sample_rate == 0 || sample_rate > 655_350 {
            return codec_init_error("flac: invalid sample rate");
        }

        let channels = ((packed >> 41) & 0x7) as u32 + 1;
        let bits_per_sample = ((packed >> 36) & 0x1f) as u32 + 1;
        if bits_per_sample < 4 {
            return codec_init_error("flac: invalid bits per sample");
        }

        let n_samples = packed & 0x0f_ffff_ffff;

        let mut md5 = [0u8; 16];
        reader.read_buf_exact(&mut md5)?;

        Ok(StreamInfoBlock {
            block_len_min,
            block_len_max,
            frame_byte_len_min,
            frame_byte_len_max,
            sample_rate,
            channels,
            bits_per_sample,
            n_samples,
            md5,
        })
    }
}

/// FLAC packet-decoder adapter around an external codec engine.
pub struct FlacDecoder {
    feeder: Box<dyn PacketFeeder>,
    engine: Box<dyn CodecEngine>,
    stream_info: StreamInfoBlock,
    output: SampleFormat,
    packet: Vec<u8>,
    decoded: Vec<u8>,
    pending: Vec<i32>,
    pending_pos: usize,
}

impl FlacDecoder {
    fn decode_next_packet(&mut self) -> Result<bool> {
        if !self.feeder.feed(&mut self.packet)? {
            return Ok(false);
        }

        self.decoded.clear();
        let frames = self.engine.decode_packet(&self.packet, &mut self.decoded)?;

        let channels = self.stream_info.channels as usize;
        let width = ((self.stream_info.bits_per_sample + 7) / 8) as usize;

        if frames > usize::from(self.stream_info.block_len_max) {
            return decode_failed_error("flac: packet exceeds maximum block length");
        }
        if self.decoded.len() != frames * channels * width {
            return decode_failed_error("flac: engine output does not match declared format");
        }

        self.pending.clear();
        self.pending.resize(frames * channels, 0);
        self.pending_pos = 0;
        conv::widen_be_to_i32(&self.decoded, width, &mut self.pending);

        Ok(true)
    }
}

impl PacketDecoder for FlacDecoder {
    fn try_new(
        info: &StreamInfo,
        feeder: Box<dyn PacketFeeder>,
        engine: Option<Box<dyn CodecEngine>>,
    ) -> Result<Self> {
        let mut engine = match engine {
            Some(engine) => engine,
            None => return codec_init_error("flac: a codec engine is required"),
        };

        let cookie = match &info.codec_config {
            Some(cookie) => cookie,
            None => return codec_init_error("flac: missing stream information"),
        };

        let stream_info = StreamInfoBlock::try_parse(cookie)?;

        if info.format.channels != 0 && info.format.channels != stream_info.channels {
            return codec_init_error("flac: channel count differs from container");
        }

        let output = SampleFormat {
            sample_rate: stream_info.sample_rate,
            channels: stream_info.channels,
            bits_per_channel: SampleFormat::CANONICAL_BITS,
            bytes_per_frame: stream_info.channels * (SampleFormat::CANONICAL_BITS / 8),
            frames_per_packet: u32::from(stream_info.block_len_max),
            codec: CODEC_TYPE_FLAC,
        };

        engine.init(cookie)?;

        Ok(FlacDecoder {
            feeder,
            engine,
            stream_info,
            output,
            packet: Vec::new(),
            decoded: Vec::new(),
            pending: Vec::new(),
            pending_pos: 0,
        })
    }

    fn supported_codecs() -> &'static [AdapterDescriptor] {
        &[support_adapter!(CODEC_TYPE_FLAC, "flac", "Free Lossless Audio Codec", true)]
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
    use super::StreamInfoBlock;

    fn stream_info_block(rate: u32, channels: u32, bps: u32, samples: u64) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&4096u16.to_be_bytes());
        out.extend_from_slice(&4096u16.to_be_bytes());
        out.extend_from_slice(&[0, 0, 0]); // min frame size (unknown)
        out.extend_from_slice(&[0, 0, 0]); // max frame size (unknown)

        let packed: u64 = (u64::from(rate) << 44)
            | (u64::from(channels - 1) << 41)
            | (u64::from(bps - 1) << 36)
            | samples;
        out.extend_from_slice(&packed.to_be_bytes());
        out.extend_from_slice(&[0u8; 16]); // md5
        out
    }

    #[test]
    fn verify_stream_info_parse() {
        let parsed = StreamInfoBlock::try_parse(&stream_info_block(44_100, 2, 16, 88_200)).unwrap();

        assert_eq!(parsed.block_len_min, 4096);
        assert_eq!(parsed.block_len_max, 4096);
        assert_eq!(parsed.sample_rate, 44_100);
        assert_eq!(parsed.channels, 2);
        assert_eq!(parsed.bits_per_sample, 16);
        assert_eq!(parsed.n_samples, 88_200);
    }

    #[test]
    fn verify_stream_info_with_block_header() {
        let mut buf = vec![0x00, 0x00, 0x00, 34];
        buf.extend_from_slice(&stream_info_block(48_000, 1, 24, 1000));

        let parsed = StreamInfoBlock::try_parse(&buf).unwrap();
        assert_eq!(parsed.sample_rate, 48_000);
        assert_eq!(parsed.bits_per_sample, 24);
    }

    #[test]
    fn verify_stream_info_rejects_malformed() {
        // Wrong size.
        assert!(StreamInfoBlock::try_parse(&[0u8; 20]).is_err());

        // Sample rate of zero.
        assert!(StreamInfoBlock::try_parse(&stream_info_block(0, 2, 16, 0)).is_err());

        // Block length below the minimum.
        let mut bad = stream_info_block(44_100, 2, 16, 0);
        bad[0] = 0;
        bad[1] = 8;
        assert!(StreamInfoBlock::try_parse(&bad).is_err());
    }
}
