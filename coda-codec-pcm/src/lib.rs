// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! LPCM packet decoder for Project Coda.
//!
//! LPCM needs no external codec engine: a packet is already sample data.
//! The decoder's work is normalizing width, byte order, and signedness to
//! the canonical left-justified 32-bit output.

use coda_core::audio::SampleFormat;
use coda_core::codecs::{
    AdapterDescriptor, CodecEngine, CodecType, PacketDecoder, CODEC_TYPE_PCM_F32BE,
    CODEC_TYPE_PCM_F32LE, CODEC_TYPE_PCM_F64BE, CODEC_TYPE_PCM_F64LE, CODEC_TYPE_PCM_S16BE,
    CODEC_TYPE_PCM_S16LE, CODEC_TYPE_PCM_S24BE, CODEC_TYPE_PCM_S24LE, CODEC_TYPE_PCM_S32BE,
    CODEC_TYPE_PCM_S32LE,
};
use coda_core::conv;
use coda_core::errors::{codec_init_error, decode_failed_error, Result};
use coda_core::formats::{PacketFeeder, StreamInfo};
use coda_core::support_adapter;

fn is_supported_pcm_codec(codec: CodecType) -> bool {
    matches!(
        codec,
        CODEC_TYPE_PCM_S16LE
            | CODEC_TYPE_PCM_S16BE
            | CODEC_TYPE_PCM_S24LE
            | CODEC_TYPE_PCM_S24BE
            | CODEC_TYPE_PCM_S32LE
            | CODEC_TYPE_PCM_S32BE
            | CODEC_TYPE_PCM_F32LE
            | CODEC_TYPE_PCM_F32BE
            | CODEC_TYPE_PCM_F64LE
            | CODEC_TYPE_PCM_F64BE
    )
}

fn is_little_endian(codec: CodecType) -> bool {
    matches!(
        codec,
        CODEC_TYPE_PCM_S16LE
            | CODEC_TYPE_PCM_S24LE
            | CODEC_TYPE_PCM_S32LE
            | CODEC_TYPE_PCM_F32LE
            | CODEC_TYPE_PCM_F64LE
    )
}

fn is_floating_point(codec: CodecType) -> bool {
    matches!(
        codec,
        CODEC_TYPE_PCM_F32LE | CODEC_TYPE_PCM_F32BE | CODEC_TYPE_PCM_F64LE | CODEC_TYPE_PCM_F64BE
    )
}

/// Pulse Code Modulation (PCM) packet decoder for all raw PCM codecs.
pub struct PcmDecoder {
    feeder: Box<dyn PacketFeeder>,
    native: SampleFormat,
    output: SampleFormat,
    packet: Vec<u8>,
    pending: Vec<i32>,
    pending_pos: usize,
}

impl PcmDecoder {
    /// Converts the current packet into pending canonical samples.
    fn convert_packet(&mut self) -> Result<()> {
        let width = self.native.bytes_per_sample() as usize;

        if self.packet.len() % self.native.bytes_per_frame as usize != 0 {
            return decode_failed_error("pcm: packet contains a partial frame");
        }

        let count = self.packet.len() / width;
        self.pending.clear();
        self.pending.resize(count, 0);
        self.pending_pos = 0;

        if is_floating_point(self.native.codec) {
            let le = is_little_endian(self.native.codec);

            match width {
                4 => {
                    for (bytes, out) in self.packet.chunks_exact(4).zip(self.pending.iter_mut()) {
                        let bytes: [u8; 4] = bytes.try_into().unwrap();
                        let x = if le { f32::from_le_bytes(bytes) } else { f32::from_be_bytes(bytes) };
                        *out = float_to_canonical(f64::from(x));
                    }
                }
                8 => {
                    for (bytes, out) in self.packet.chunks_exact(8).zip(self.pending.iter_mut()) {
                        let bytes: [u8; 8] = bytes.try_into().unwrap();
                        let x = if le { f64::from_le_bytes(bytes) } else { f64::from_be_bytes(bytes) };
                        *out = float_to_canonical(x);
                    }
                }
                _ => return decode_failed_error("pcm: invalid floating point width"),
            }
        }
        else {
            // Integer samples: normalize byte order, then widen and
            // left-justify into the canonical container.
            if is_little_endian(self.native.codec) {
                conv::byte_swap(&mut self.packet, width);
            }
            conv::widen_be_to_i32(&self.packet, width, &mut self.pending);
        }

        Ok(())
    }
}

/// Scales a normalized floating-point sample into the canonical integer
/// range, clamping out-of-range input.
fn float_to_canonical(x: f64) -> i32 {
    (x.clamp(-1.0, 1.0) * f64::from(i32::MAX)) as i32
}

impl PacketDecoder for PcmDecoder {
    fn try_new(
        info: &StreamInfo,
        feeder: Box<dyn PacketFeeder>,
        _engine: Option<Box<dyn CodecEngine>>,
    ) -> Result<Self> {
        let native = info.format;

        if !is_supported_pcm_codec(native.codec) {
            return codec_init_error("pcm: invalid codec type");
        }
        if native.channels < 1 {
            return codec_init_error("pcm: number of channels cannot be 0");
        }
        if native.sample_rate == 0 {
            return codec_init_error("pcm: sample rate is required");
        }
        if !native.is_valid_fixed_width() {
            return codec_init_error("pcm: inconsistent frame size");
        }

        let output = native.canonical_output();

        Ok(PcmDecoder {
            feeder,
            native,
            output,
            packet: Vec::new(),
            pending: Vec::new(),
            pending_pos: 0,
        })
    }

    fn supported_codecs() -> &'static [AdapterDescriptor] {
        &[
            support_adapter!(
                CODEC_TYPE_PCM_S16LE,
                "pcm_s16le",
                "PCM Signed 16-bit Little-Endian Interleaved",
                false
            ),
            support_adapter!(
                CODEC_TYPE_PCM_S16BE,
                "pcm_s16be",
                "PCM Signed 16-bit Big-Endian Interleaved",
                false
            ),
            support_adapter!(
                CODEC_TYPE_PCM_S24LE,
                "pcm_s24le",
                "PCM Signed 24-bit Little-Endian Interleaved",
                false
            ),
            support_adapter!(
                CODEC_TYPE_PCM_S24BE,
                "pcm_s24be",
                "PCM Signed 24-bit Big-Endian Interleaved",
                false
            ),
            support_adapter!(
                CODEC_TYPE_PCM_S32LE,
                "pcm_s32le",
                "PCM Signed 32-bit Little-Endian Interleaved",
                false
            ),
            support_adapter!(
                CODEC_TYPE_PCM_S32BE,
                "pcm_s32be",
                "PCM Signed 32-bit Big-Endian Interleaved",
                false
            ),
            support_adapter!(
                CODEC_TYPE_PCM_F32LE,
                "pcm_f32le",
                "PCM 32-bit Little-Endian Floating Point Interleaved",
                false
            ),
            support_adapter!(
                CODEC_TYPE_PCM_F32BE,
                "pcm_f32be",
                "PCM 32-bit Big-Endian Floating Point Interleaved",
                false
            ),
            support_adapter!(
                CODEC_TYPE_PCM_F64LE,
                "pcm_f64le",
                "PCM 64-bit Little-Endian Floating Point Interleaved",
                false
            ),
            support_adapter!(
                CODEC_TYPE_PCM_F64BE,
                "pcm_f64be",
                "PCM 64-bit Big-Endian Floating Point Interleaved",
                false
            ),
        ]
    }

    fn sample_format(&self) -> SampleFormat {
        self.output
    }

    fn decode(&mut self, dest: &mut [i32], max_frames: usize) -> Result<usize> {
        let stride = self.output.channels as usize;
        let mut produced = 0;

        while produced < max_frames {
            if self.pending_pos == self.pending.len() {
                if !self.feeder.feed(&mut self.packet)? {
                    break;
                }
                self.convert_packet()?;
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
        // No inter-packet state; just drop buffered output.
        self.pending.clear();
        self.pending_pos = 0;
    }

    fn feeder_mut(&mut self) -> &mut dyn PacketFeeder {
        &mut *self.feeder
    }
}

#[cfg(test)]
mod tests {
    use super::PcmDecoder;
    use coda_core::audio::SampleFormat;
    use coda_core::codecs::{
        PacketDecoder, CODEC_TYPE_PCM_F32BE, CODEC_TYPE_PCM_S16BE, CODEC_TYPE_PCM_S16LE,
    };
    use coda_core::errors::Result;
    use coda_core::formats::{PacketFeeder, StreamInfo};

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

    fn stream_info(codec: coda_core::codecs::CodecType, bits: u32, channels: u32) -> StreamInfo {
        StreamInfo::new(SampleFormat {
            sample_rate: 44_100,
            channels,
            bits_per_channel: bits,
            bytes_per_frame: channels * ((bits + 7) / 8),
            frames_per_packet: 1,
            codec,
        })
    }

    fn decoder(
        codec: coda_core::codecs::CodecType,
        bits: u32,
        channels: u32,
        packets: Vec<Vec<u8>>,
    ) -> PcmDecoder {
        let feeder = Box::new(VecFeeder { packets, cursor: 0 });
        PcmDecoder::try_new(&stream_info(codec, bits, channels), feeder, None).unwrap()
    }

    #[test]
    fn verify_s16be_widening() {
        let mut dec = decoder(
            CODEC_TYPE_PCM_S16BE,
            16,
            2,
            vec![vec![0x12, 0x34, 0xff, 0xfe, 0x80, 0x00, 0x7f, 0xff]],
        );

        let mut dest = [0i32; 4];
        assert_eq!(dec.decode(&mut dest, 2).unwrap(), 2);
        assert_eq!(
            dest,
            [0x1234_0000, 0xfffe_0000u32 as i32, 0x8000_0000u32 as i32, 0x7fff_0000]
        );

        // Output format is widened to the canonical width.
        assert_eq!(dec.sample_format().bits_per_channel, 32);
        assert_eq!(dec.sample_format().bytes_per_frame, 8);
    }

    #[test]
    fn verify_s16le_byte_order() {
        let mut dec = decoder(CODEC_TYPE_PCM_S16LE, 16, 1, vec![vec![0x34, 0x12]]);

        let mut dest = [0i32; 1];
        assert_eq!(dec.decode(&mut dest, 1).unwrap(), 1);
        assert_eq!(dest, [0x1234_0000]);
    }

    #[test]
    fn verify_f32be_scaling() {
        let mut packet = Vec::new();
        packet.extend_from_slice(&1.0f32.to_be_bytes());
        packet.extend_from_slice(&(-1.0f32).to_be_bytes());
        packet.extend_from_slice(&0.0f32.to_be_bytes());
        // Out of range input clamps rather than wrapping.
        packet.extend_from_slice(&2.0f32.to_be_bytes());

        let mut dec = decoder(CODEC_TYPE_PCM_F32BE, 32, 1, vec![packet]);

        let mut dest = [0i32; 4];
        assert_eq!(dec.decode(&mut dest, 4).unwrap(), 4);
        assert_eq!(dest, [i32::MAX, -i32::MAX, 0, i32::MAX]);
    }

    #[test]
    fn verify_remainder_buffering_across_calls() {
        let mut dec =
            decoder(CODEC_TYPE_PCM_S16BE, 16, 1, vec![vec![0x00, 0x01, 0x00, 0x02, 0x00, 0x03]]);

        let mut dest = [0i32; 2];
        assert_eq!(dec.decode(&mut dest, 2).unwrap(), 2);
        assert_eq!(dest, [0x0001_0000, 0x0002_0000]);
        assert_eq!(dec.decode(&mut dest, 2).unwrap(), 1);
        assert_eq!(dest[0], 0x0003_0000);
        assert_eq!(dec.decode(&mut dest, 2).unwrap(), 0);
    }

    #[test]
    fn verify_partial_frame_is_decode_failure() {
        let mut dec = decoder(CODEC_TYPE_PCM_S16BE, 16, 2, vec![vec![0x00, 0x01, 0x00]]);

        let mut dest = [0i32; 4];
        assert!(dec.decode(&mut dest, 2).is_err());
    }
}
