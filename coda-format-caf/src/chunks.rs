// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::str;

use coda_core::audio::{ChannelLabel, ChannelMap};
use coda_core::codecs::*;
use coda_core::errors::{malformed_container_error, unsupported_format_error, Result};
use coda_core::io::{ReadBytes, SourceStream};
use log::{debug, error, info};

#[derive(Debug)]
pub enum Chunk {
    AudioDescription(AudioDescription),
    AudioData(AudioData),
    ChannelLayout(ChannelLayout),
    MagicCookie(Box<[u8]>),
    PacketTable(PacketTable),
    Info(Vec<(String, String)>),
    Free,
}

impl Chunk {
    /// Reads a chunk.
    ///
    /// `desc` is the already-read audio description, used to decide how the
    /// packet table encodes its entries; it is `None` only while reading the
    /// audio description itself.
    ///
    /// After this function returns the reader is positioned at the start of
    /// the next chunk, except for the audio data chunk, which leaves the
    /// reader at the start of the audio payload. Unknown chunks are skipped
    /// and reported as `None`.
    pub fn read(
        reader: &mut SourceStream,
        desc: Option<&AudioDescription>,
    ) -> Result<Option<Self>> {
        let chunk_type = reader.read_quad_bytes()?;
        let chunk_size = reader.read_be_i64()?;
        let data_start = reader.pos();

        let result = match &chunk_type {
            b"desc" => {
                let desc = Chunk::AudioDescription(AudioDescription::read(reader)?);
                skip_chunk_remainder(reader, chunk_size, data_start)?;
                desc
            }
            b"data" => Chunk::AudioData(AudioData::read(reader, chunk_size)?),
            b"chan" => Chunk::ChannelLayout(ChannelLayout::read(reader, chunk_size)?),
            b"kuki" => {
                if chunk_size < 0 {
                    error!("invalid magic cookie chunk size ({chunk_size})");
                    return malformed_container_error("caf: invalid magic cookie chunk size");
                }
                Chunk::MagicCookie(reader.read_boxed_slice_exact(chunk_size as usize)?)
            }
            b"pakt" => {
                let desc = match desc {
                    Some(desc) => desc,
                    None => {
                        return malformed_container_error(
                            "caf: packet table chunk before audio description",
                        );
                    }
                };
                let table = Chunk::PacketTable(PacketTable::read(reader, chunk_size, desc)?);
                skip_chunk_remainder(reader, chunk_size, data_start)?;
                table
            }
            b"info" => Chunk::Info(read_info(reader, chunk_size)?),
            b"free" => {
                if chunk_size < 0 {
                    error!("invalid free chunk size ({chunk_size})");
                    return malformed_container_error("caf: invalid free chunk size");
                }
                reader.ignore_bytes(chunk_size as u64)?;
                Chunk::Free
            }
            other => {
                info!(
                    "skipping unknown chunk type ('{}')",
                    str::from_utf8(other.as_slice()).unwrap_or("????")
                );
                if chunk_size < 0 {
                    return malformed_container_error("caf: invalid chunk size");
                }
                reader.ignore_bytes(chunk_size as u64)?;
                return Ok(None);
            }
        };

        debug!("chunk: {result:?} - size: {chunk_size}");
        Ok(Some(result))
    }
}

/// The fixed-layout, big-endian audio description record. Always the first
/// chunk of a container.
#[derive(Debug)]
pub struct AudioDescription {
    pub sample_rate: f64,
    pub format_id: FormatId,
    pub bytes_per_packet: u32,
    pub frames_per_packet: u32,
    pub channels_per_frame: u32,
    pub bits_per_channel: u32,
}

impl AudioDescription {
    pub fn read(reader: &mut SourceStream) -> Result<Self> {
        let sample_rate = reader.read_be_f64()?;
        let format_id = FormatId::read(reader)?;

        let desc = Self {
            sample_rate,
            format_id,
            bytes_per_packet: reader.read_be_u32()?,
            frames_per_packet: reader.read_be_u32()?,
            channels_per_frame: reader.read_be_u32()?,
            bits_per_channel: reader.read_be_u32()?,
        };

        if !(desc.sample_rate.is_finite() && desc.sample_rate > 0.0) {
            error!("invalid sample rate ({})", desc.sample_rate);
            return malformed_container_error("caf: invalid sample rate");
        }
        if desc.channels_per_frame == 0 {
            return malformed_container_error("caf: channel count is zero");
        }

        Ok(desc)
    }

    pub fn codec_type(&self) -> Result<CodecType> {
        use FormatId::*;

        let result = match self.format_id {
            LinearPcm { floating_point, little_endian } => {
                if floating_point {
                    match (self.bits_per_channel, little_endian) {
                        (32, true) => CODEC_TYPE_PCM_F32LE,
                        (32, false) => CODEC_TYPE_PCM_F32BE,
                        (64, true) => CODEC_TYPE_PCM_F64LE,
                        (64, false) => CODEC_TYPE_PCM_F64BE,
                        (bits, _) => {
                            error!("unsupported PCM floating point format (bits: {bits})");
                            return unsupported_format_error("caf: unsupported bits per channel");
                        }
                    }
                }
                else {
                    match (self.bits_per_channel, little_endian) {
                        (16, true) => CODEC_TYPE_PCM_S16LE,
                        (16, false) => CODEC_TYPE_PCM_S16BE,
                        (24, true) => CODEC_TYPE_PCM_S24LE,
                        (24, false) => CODEC_TYPE_PCM_S24BE,
                        (32, true) => CODEC_TYPE_PCM_S32LE,
                        (32, false) => CODEC_TYPE_PCM_S32BE,
                        (bits, _) => {
                            error!("unsupported PCM integer format (bits: {bits})");
                            return unsupported_format_error("caf: unsupported bits per channel");
                        }
                    }
                }
            }
            AppleLossless => CODEC_TYPE_ALAC,
            Mpeg4Aac => CODEC_TYPE_AAC,
            MpegLayer1 => CODEC_TYPE_MP1,
            MpegLayer2 => CODEC_TYPE_MP2,
            MpegLayer3 => CODEC_TYPE_MP3,
            Opus => CODEC_TYPE_OPUS,
            Flac => CODEC_TYPE_FLAC,
        };

        Ok(result)
    }

    pub fn is_compressed(&self) -> bool {
        !matches!(self.format_id, FormatId::LinearPcm { .. })
    }
}

#[derive(Debug)]
pub enum FormatId {
    LinearPcm { floating_point: bool, little_endian: bool },
    AppleLossless,
    Mpeg4Aac,
    MpegLayer1,
    MpegLayer2,
    MpegLayer3,
    Opus,
    Flac,
}

impl FormatId {
    pub fn read(reader: &mut SourceStream) -> Result<Self> {
        use FormatId::*;

        let format_id = reader.read_quad_bytes()?;
        let format_flags = reader.read_be_u32()?;

        let result = match &format_id {
            b"lpcm" => {
                let floating_point = format_flags & (1 << 0) != 0;
                let little_endian = format_flags & (1 << 1) != 0;
                return Ok(LinearPcm { floating_point, little_endian });
            }
            b"alac" => AppleLossless,
            b"aac " => {
                // The format flags carry the MPEG-4 audio object type.
                if format_flags != 2 {
                    error!("unsupported AAC object type ({format_flags})");
                    return unsupported_format_error("caf: unsupported AAC object type");
                }
                return Ok(Mpeg4Aac);
            }
            b".mp1" => MpegLayer1,
            b".mp2" => MpegLayer2,
            b".mp3" => MpegLayer3,
            b"opus" => Opus,
            b"flac" => Flac,
            other => {
                error!("unsupported format id ({other:?})");
                return unsupported_format_error("caf: unsupported format id");
            }
        };

        if format_flags == 0 {
            Ok(result)
        }
        else {
            error!("format flags should be zero ({format_flags})");
            malformed_container_error("caf: non-zero format flags")
        }
    }
}

/// The audio payload chunk. Only the edit count field is consumed; the reader
/// is left at the start of the payload.
#[derive(Debug)]
pub struct AudioData {
    pub _edit_count: u32,
    pub start_pos: u64,
    /// The payload length, or `None` if the chunk declared an unknown size
    /// (a still-growing or streamed file).
    pub data_len: Option<u64>,
}

impl AudioData {
    pub fn read(reader: &mut SourceStream, chunk_size: i64) -> Result<Self> {
        let edit_count = reader.read_be_u32()?;
        let edit_count_len = 4u64;
        let start_pos = reader.pos();

        if chunk_size == -1 {
            return Ok(Self { _edit_count: edit_count, start_pos, data_len: None });
        }

        if chunk_size < 0 {
            error!("invalid audio data chunk size ({chunk_size})");
            return malformed_container_error("caf: invalid audio data chunk size");
        }

        let chunk_size = chunk_size as u64;
        if chunk_size < edit_count_len {
            return malformed_container_error("caf: invalid audio data chunk size");
        }

        Ok(Self { _edit_count: edit_count, start_pos, data_len: Some(chunk_size - edit_count_len) })
    }
}

/// The channel layout chunk.
#[derive(Debug)]
pub struct ChannelLayout {
    pub layout_tag: u32,
    pub bitmap: u32,
    pub labels: Vec<ChannelLabel>,
}

/// Channel layout tag selecting the channel-description list.
const LAYOUT_TAG_USE_DESCRIPTIONS: u32 = 0;
/// Channel layout tag selecting the channel bitmap.
const LAYOUT_TAG_USE_BITMAP: u32 = 1 << 16;

impl ChannelLayout {
    pub fn read(reader: &mut SourceStream, chunk_size: i64) -> Result<Self> {
        // The layout tag, bitmap, and description count are mandatory.
        if chunk_size < 12 {
            error!("channel layout chunk too small ({chunk_size})");
            return malformed_container_error("caf: malformed channel layout chunk");
        }

        let layout_tag = reader.read_be_u32()?;
        let bitmap = reader.read_be_u32()?;
        let num_descriptions = reader.read_be_u32()?;

        // Each description is 20 bytes: a label, flags, and 3 coordinates.
        if i64::from(num_descriptions) * 20 != chunk_size - 12 {
            error!("invalid channel description count ({num_descriptions})");
            return malformed_container_error("caf: malformed channel layout chunk");
        }

        let mut labels = Vec::with_capacity(num_descriptions as usize);
        for _ in 0..num_descriptions {
            let label = reader.read_be_u32()?;
            // Flags and spatial coordinates are presentation hints for
            // object-positioned audio and are not used.
            reader.ignore_bytes(16)?;
            labels.push(ChannelLabel::from_code(label));
        }

        Ok(Self { layout_tag, bitmap, labels })
    }

    /// Derives the bitstream channel order from whichever of the three layout
    /// encodings the chunk used.
    pub fn channel_map(&self) -> Option<ChannelMap> {
        match self.layout_tag {
            LAYOUT_TAG_USE_DESCRIPTIONS => {
                if self.labels.is_empty() {
                    None
                }
                else {
                    Some(ChannelMap::from_labels(self.labels.clone()))
                }
            }
            LAYOUT_TAG_USE_BITMAP => Some(ChannelMap::from_bitmap(self.bitmap)),
            tag => ChannelMap::from_layout_tag(tag),
        }
    }
}

/// One packet table entry. Offsets are relative to the payload start and are
/// accumulated while reading the table.
#[derive(Copy, Clone, Debug)]
pub struct PacketEntry {
    pub offset: u64,
    pub size: u32,
    pub frames: u32,
}

/// The packet table chunk.
#[derive(Debug)]
pub struct PacketTable {
    pub valid_frames: u64,
    pub priming_frames: u32,
    pub remainder_frames: u32,
    pub entries: Vec<PacketEntry>,
}

impl PacketTable {
    pub fn read(
        reader: &mut SourceStream,
        chunk_size: i64,
        desc: &AudioDescription,
    ) -> Result<Self> {
        // The header is 24 bytes.
        if chunk_size < 24 {
            error!("packet table chunk too small ({chunk_size})");
            return malformed_container_error("caf: malformed packet table chunk");
        }

        let num_packets = reader.read_be_i64()?;
        let valid_frames = reader.read_be_i64()?;
        let priming_frames = reader.read_be_i32()?;
        let remainder_frames = reader.read_be_i32()?;

        if num_packets < 0 || valid_frames < 0 || priming_frames < 0 || remainder_frames < 0 {
            return malformed_container_error("caf: negative packet table header field");
        }

        // Per-packet table entries exist only for the quantities the audio
        // description does not fix.
        let variable_size = desc.bytes_per_packet == 0;
        let variable_frames = desc.frames_per_packet == 0;

        let mut entries = Vec::new();

        if variable_size || variable_frames {
            entries.reserve(num_packets as usize);
            let mut offset = 0u64;

            for _ in 0..num_packets {
                let size = if variable_size {
                    read_ber_u64(reader)?
                }
                else {
                    u64::from(desc.bytes_per_packet)
                };
                let frames = if variable_frames {
                    read_ber_u64(reader)?
                }
                else {
                    u64::from(desc.frames_per_packet)
                };

                if size == 0 || size > u64::from(u32::MAX) || frames > u64::from(u32::MAX) {
                    return malformed_container_error("caf: invalid packet table entry");
                }

                entries.push(PacketEntry { offset, size: size as u32, frames: frames as u32 });
                offset += size;
            }
        }

        Ok(Self {
            valid_frames: valid_frames as u64,
            priming_frames: priming_frames as u32,
            remainder_frames: remainder_frames as u32,
            entries,
        })
    }

    /// The total number of frames the table accounts for.
    pub fn total_frames(&self, desc: &AudioDescription) -> u64 {
        if self.entries.is_empty() {
            0
        }
        else if desc.frames_per_packet > 0 {
            self.entries.len() as u64 * u64::from(desc.frames_per_packet)
        }
        else {
            self.entries.iter().map(|e| u64::from(e.frames)).sum()
        }
    }
}

/// Reads the textual information dictionary: a count, then NUL-separated
/// key/value string pairs.
fn read_info(reader: &mut SourceStream, chunk_size: i64) -> Result<Vec<(String, String)>> {
    if chunk_size < 4 {
        error!("info chunk too small ({chunk_size})");
        return malformed_container_error("caf: malformed info chunk");
    }

    let count = reader.read_be_u32()?;
    let data = reader.read_boxed_slice_exact((chunk_size - 4) as usize)?;

    let mut strings = data
        .split(|&byte| byte == 0)
        .map(|s| String::from_utf8_lossy(s).into_owned());

    let mut pairs = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let key = match strings.next() {
            Some(key) => key,
            None => break,
        };
        let value = strings.next().unwrap_or_default();
        pairs.push((key, value));
    }

    Ok(pairs)
}

/// Skips any bytes of the chunk its handler did not consume, leaving the
/// reader at the start of the next chunk.
fn skip_chunk_remainder(
    reader: &mut SourceStream,
    chunk_size: i64,
    data_start: u64,
) -> Result<()> {
    if chunk_size < 0 {
        return malformed_container_error("caf: invalid chunk size");
    }

    let consumed = reader.pos() - data_start;
    match (chunk_size as u64).checked_sub(consumed) {
        Some(0) => Ok(()),
        Some(remainder) => Ok(reader.ignore_bytes(remainder)?),
        None => malformed_container_error("caf: chunk overread"),
    }
}

/// Reads a variable-length big-endian integer: 7 data bits per byte,
/// most-significant group first, with the continuation bit set on all but the
/// last byte.
pub fn read_ber_u64<B: ReadBytes>(reader: &mut B) -> Result<u64> {
    let mut value = 0u64;

    // 10 bytes of 7 bits exceed a u64.
    for _ in 0..10 {
        let byte = reader.read_u8()?;

        if value > (u64::MAX >> 7) {
            return malformed_container_error("caf: variable-length integer overflow");
        }
        value = (value << 7) | u64::from(byte & 0x7f);

        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }

    malformed_container_error("caf: variable-length integer too long")
}

#[cfg(test)]
mod tests {
    use super::read_ber_u64;
    use coda_core::io::BufReader;

    #[test]
    fn verify_read_ber_u64() {
        // Single byte values.
        assert_eq!(read_ber_u64(&mut BufReader::new(&[0x00])).unwrap(), 0);
        assert_eq!(read_ber_u64(&mut BufReader::new(&[0x7f])).unwrap(), 127);

        // Continuation across two and three bytes.
        assert_eq!(read_ber_u64(&mut BufReader::new(&[0x81, 0x00])).unwrap(), 128);
        assert_eq!(read_ber_u64(&mut BufReader::new(&[0xff, 0x7f])).unwrap(), 0x3fff);
        assert_eq!(read_ber_u64(&mut BufReader::new(&[0x81, 0x80, 0x00])).unwrap(), 0x4000);

        // Continuation bit with no terminating byte.
        assert!(read_ber_u64(&mut BufReader::new(&[0x80])).is_err());
    }

    #[test]
    fn verify_read_ber_u64_rejects_overlong() {
        let overlong = [0xff; 10];
        assert!(read_ber_u64(&mut BufReader::new(&overlong)).is_err());
    }
}
