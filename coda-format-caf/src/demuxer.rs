// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::SeekFrom;

use coda_core::audio::SampleFormat;
use coda_core::errors::{malformed_container_error, unsupported_format_error, Result};
use coda_core::formats::{ContainerReader, FormatOptions, PacketFeeder, StreamInfo};
use coda_core::gapless::{EditList, PrimingInfo};
use coda_core::io::{ReadBytes, SourceStream};
use coda_core::meta::{Chapter, StandardTagKey, Tag, Value};
use log::{error, info};

use crate::chunks::*;

/// The number of single-frame packets grouped into one fed packet.
const FIXED_READ_PACKETS: u64 = 1152;

/// Packet-count sentinel for a still-growing payload of unknown size.
const UNKNOWN_PACKET_COUNT: u64 = u64::MAX;

/// How the payload is carved into packets.
enum PacketAddressing {
    /// Fixed-size packets addressed arithmetically. When `group` is set, the
    /// packets are single frames and are fed in groups of
    /// [`FIXED_READ_PACKETS`].
    Fixed { bytes_per_packet: u64, packet_count: u64, group: bool },
    /// Variable packets resolved through the packet table.
    Table { entries: Vec<PacketEntry> },
}

/// Chunk-based container (CAF) reader and packet feeder.
pub struct CafReader {
    reader: SourceStream,
    info: StreamInfo,
    tags: Vec<Tag>,
    chapters: Vec<Chapter>,
    data_start_pos: u64,
    addressing: PacketAddressing,
    cursor: u64,
}

impl ContainerReader for CafReader {
    fn try_new(mut reader: SourceStream, options: &FormatOptions) -> Result<Self> {
        check_file_header(&mut reader)?;

        // The audio description is mandatory and must be the first chunk.
        let desc = match Chunk::read(&mut reader, None)? {
            Some(Chunk::AudioDescription(desc)) => desc,
            other => {
                error!("expected audio description chunk, found: {other:?}");
                return malformed_container_error("caf: expected audio description chunk");
            }
        };

        let mut audio_data = None;
        let mut channel_layout = None;
        let mut cookie = None;
        let mut packet_table = None;
        let mut info_pairs = Vec::new();

        loop {
            match Chunk::read(&mut reader, Some(&desc))? {
                Some(Chunk::AudioDescription(_)) => {
                    return malformed_container_error("caf: additional audio description chunk");
                }
                Some(Chunk::AudioData(data)) => {
                    let stop = !advance_past_payload(&mut reader, &data)?;
                    audio_data = Some(data);
                    if stop {
                        break;
                    }
                }
                Some(Chunk::ChannelLayout(layout)) => channel_layout = Some(layout),
                Some(Chunk::MagicCookie(data)) => cookie = Some(data),
                Some(Chunk::PacketTable(table)) => packet_table = Some(table),
                Some(Chunk::Info(pairs)) => info_pairs = pairs,
                Some(Chunk::Free) | None => {}
            }

            if let Some(byte_len) = reader.byte_len() {
                if reader.pos() >= byte_len {
                    break;
                }
            }
        }

        let mut audio_data = match audio_data {
            Some(data) => data,
            None => return malformed_container_error("caf: missing audio data chunk"),
        };

        // An unknown payload size on a seekable stream extends to the end of
        // the file.
        if audio_data.data_len.is_none() {
            if let Some(byte_len) = reader.byte_len() {
                audio_data.data_len = Some(byte_len - audio_data.start_pos);
            }
        }

        // Everything below the payload start has been parsed; rewind for
        // packet feeding.
        if reader.pos() != audio_data.start_pos {
            reader.seek(SeekFrom::Start(audio_data.start_pos))?;
        }

        let reader = Self::build(
            reader,
            desc,
            audio_data,
            channel_layout,
            cookie,
            packet_table,
            info_pairs,
            options,
        )?;

        Ok(reader)
    }

    fn stream_info(&self) -> &StreamInfo {
        &self.info
    }

    fn tags(&self) -> &[Tag] {
        &self.tags
    }

    fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    fn into_feeder(self: Box<Self>) -> Box<dyn PacketFeeder> {
        self
    }
}

impl PacketFeeder for CafReader {
    fn feed(&mut self, buf: &mut Vec<u8>) -> Result<bool> {
        buf.clear();

        match &self.addressing {
            PacketAddressing::Table { entries } => {
                let entry = match entries.get(self.cursor as usize) {
                    Some(entry) => *entry,
                    None => return Ok(false),
                };

                let target = self.data_start_pos + entry.offset;
                if self.reader.pos() != target {
                    self.reader.seek(SeekFrom::Start(target))?;
                }

                buf.resize(entry.size as usize, 0);
                self.reader.read_buf_exact(buf)?;
                self.cursor += 1;
                Ok(true)
            }
            PacketAddressing::Fixed { bytes_per_packet, packet_count, group } => {
                if self.cursor >= *packet_count {
                    return Ok(false);
                }

                let packets = if *group {
                    FIXED_READ_PACKETS.min(*packet_count - self.cursor)
                }
                else {
                    1
                };

                let target = self.data_start_pos + self.cursor * *bytes_per_packet;
                if self.reader.pos() != target {
                    self.reader.seek(SeekFrom::Start(target))?;
                }

                buf.resize((packets * *bytes_per_packet) as usize, 0);

                // Tolerate a short final read: the payload may be shorter
                // than declared, or still growing.
                let mut filled = 0;
                while filled < buf.len() {
                    let count = self.reader.read_buf(&mut buf[filled..])?;
                    if count == 0 {
                        break;
                    }
                    filled += count;
                }

                let whole = filled as u64 / *bytes_per_packet;
                if whole == 0 {
                    buf.clear();
                    return Ok(false);
                }

                buf.truncate((whole * *bytes_per_packet) as usize);
                self.cursor += whole;
                Ok(true)
            }
        }
    }

    fn seek_packet(&mut self, packet: u64) -> Result<()> {
        let limit = match &self.addressing {
            PacketAddressing::Table { entries } => entries.len() as u64,
            PacketAddressing::Fixed { packet_count, .. } => *packet_count,
        };
        self.cursor = packet.min(limit);
        Ok(())
    }

    fn packet_index(&self) -> u64 {
        self.cursor
    }
}

impl CafReader {
    #[allow(clippy::too_many_arguments)]
    fn build(
        reader: SourceStream,
        desc: AudioDescription,
        audio_data: AudioData,
        channel_layout: Option<ChannelLayout>,
        cookie: Option<Box<[u8]>>,
        packet_table: Option<PacketTable>,
        info_pairs: Vec<(String, String)>,
        options: &FormatOptions,
    ) -> Result<Self> {
        let codec = desc.codec_type()?;

        let bytes_per_frame = if desc.is_compressed() {
            0
        }
        else {
            desc.bytes_per_packet / desc.frames_per_packet.max(1)
        };

        let format = SampleFormat {
            sample_rate: desc.sample_rate as u32,
            channels: desc.channels_per_frame,
            bits_per_channel: desc.bits_per_channel,
            bytes_per_frame,
            frames_per_packet: desc.frames_per_packet,
            codec,
        };

        if !desc.is_compressed() && !format.is_valid_fixed_width() {
            error!(
                "inconsistent packet size ({} bytes) for {} channels at {} bits",
                desc.bytes_per_packet, desc.channels_per_frame, desc.bits_per_channel
            );
            return malformed_container_error("caf: inconsistent audio description");
        }

        let priming = match &packet_table {
            Some(table) => {
                PrimingInfo { leading: table.priming_frames, trailing: table.remainder_frames }
            }
            None => PrimingInfo::default(),
        };

        let total_frames =
            derive_total_frames(&desc, &packet_table, audio_data.data_len, &priming)?;

        let addressing = match &packet_table {
            Some(table) if !table.entries.is_empty() => {
                PacketAddressing::Table { entries: table.entries.clone() }
            }
            _ if desc.bytes_per_packet > 0 => {
                let packet_count = match audio_data.data_len {
                    Some(len) => len / u64::from(desc.bytes_per_packet),
                    None => UNKNOWN_PACKET_COUNT,
                };
                PacketAddressing::Fixed {
                    bytes_per_packet: u64::from(desc.bytes_per_packet),
                    packet_count,
                    group: desc.frames_per_packet <= 1,
                }
            }
            _ => return malformed_container_error("caf: missing packet table"),
        };

        let packet_count = match &addressing {
            PacketAddressing::Table { entries } => entries.len() as u64,
            PacketAddressing::Fixed { packet_count, .. } => *packet_count,
        };

        let has_priming = priming.leading > 0 || priming.trailing > 0;
        let edits = if options.enable_gapless && has_priming && total_frames != u64::MAX {
            EditList::from_priming(priming, total_frames)
        }
        else {
            EditList::whole_track(total_frames)
        };

        let channel_map = channel_layout.and_then(|layout| {
            let map = layout.channel_map();
            if map.is_none() {
                // The layout tag does not correspond to a known channel
                // order; the channel count from the audio description still
                // stands.
                info!("unrecognized channel layout tag ({:#x})", layout.layout_tag);
            }
            map
        });

        let mut info = StreamInfo::new(format);
        info.codec_config = cookie;
        info.packet_count = packet_count;
        info.total_frames = total_frames;
        info.priming = priming;
        info.edits = edits;
        info.channel_map = channel_map;

        let tags = info_pairs.into_iter().map(|(key, value)| make_tag(key, value)).collect();

        Ok(CafReader {
            reader,
            info,
            tags,
            chapters: Vec::new(),
            data_start_pos: audio_data.start_pos,
            addressing,
            cursor: 0,
        })
    }
}

fn check_file_header(reader: &mut SourceStream) -> Result<()> {
    let file_type = reader.read_quad_bytes()?;
    if file_type != *b"caff" {
        return unsupported_format_error("caf: missing 'caff' stream marker");
    }

    let file_version = reader.read_be_u16()?;
    if file_version != 1 {
        error!("unsupported file version ({file_version})");
        return unsupported_format_error("caf: unsupported file version");
    }

    // Ignored in version 1.
    let _file_flags = reader.read_be_u16()?;

    Ok(())
}

/// Walks the reader past the payload of the audio data chunk where possible.
///
/// Returns `false` if no further structural chunks are reachable: the payload
/// size is unknown, or the stream cannot seek back once the payload has been
/// passed.
fn advance_past_payload(reader: &mut SourceStream, data: &AudioData) -> Result<bool> {
    if !reader.is_seekable() {
        // Chunks after the payload would be unreachable once skipped.
        return Ok(false);
    }

    match data.data_len {
        Some(len) => {
            reader.ignore_bytes(len)?;
            Ok(true)
        }
        // An unknown-size payload extends to the end of the stream.
        None => Ok(false),
    }
}

/// Computes the raw decode-timeline duration with the mandated priority
/// order: explicit valid-frame count, then packet-table frame counts, then
/// the payload size.
fn derive_total_frames(
    desc: &AudioDescription,
    packet_table: &Option<PacketTable>,
    data_len: Option<u64>,
    priming: &PrimingInfo,
) -> Result<u64> {
    if let Some(table) = packet_table {
        if table.valid_frames > 0 {
            return Ok(table.valid_frames
                + u64::from(priming.leading)
                + u64::from(priming.trailing));
        }

        let table_frames = table.total_frames(desc);
        if table_frames > 0 {
            return Ok(table_frames);
        }
    }

    if desc.bytes_per_packet > 0 {
        if let Some(data_len) = data_len {
            let packets = data_len / u64::from(desc.bytes_per_packet);
            return Ok(packets * u64::from(desc.frames_per_packet.max(1)));
        }

        // A fixed-rate payload of unknown size is presented unbounded; reads
        // end when the payload does.
        return Ok(u64::MAX);
    }

    error!("no packet table, valid-frame count, or fixed packet size");
    malformed_container_error("caf: cannot determine stream duration")
}

fn make_tag(key: String, value: String) -> Tag {
    let std_key = match key.to_ascii_lowercase().as_str() {
        "album" => Some(StandardTagKey::Album),
        "artist" => Some(StandardTagKey::Artist),
        "comments" => Some(StandardTagKey::Comment),
        "composer" => Some(StandardTagKey::Composer),
        "copyright" => Some(StandardTagKey::Copyright),
        "genre" => Some(StandardTagKey::Genre),
        "lyricist" => None,
        "recorded date" | "year" => Some(StandardTagKey::Date),
        "tempo" => Some(StandardTagKey::TempoBpm),
        "title" => Some(StandardTagKey::TrackTitle),
        "track number" => Some(StandardTagKey::TrackNumber),
        _ => None,
    };

    Tag { std_key, key, value: Value::String(value) }
}

#[cfg(test)]
mod tests {
    use super::CafReader;
    use coda_core::codecs::{CODEC_TYPE_ALAC, CODEC_TYPE_PCM_S16BE};
    use coda_core::formats::{ContainerReader, FormatOptions, PacketFeeder};
    use coda_core::io::SourceStream;
    use std::io::Cursor;

    fn push_chunk(out: &mut Vec<u8>, tag: &[u8; 4], body: &[u8]) {
        out.extend_from_slice(tag);
        out.extend_from_slice(&(body.len() as i64).to_be_bytes());
        out.extend_from_slice(body);
    }

    fn desc_chunk(
        rate: f64,
        format_id: &[u8; 4],
        flags: u32,
        bytes_per_packet: u32,
        frames_per_packet: u32,
        channels: u32,
        bits: u32,
    ) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&rate.to_be_bytes());
        body.extend_from_slice(format_id);
        body.extend_from_slice(&flags.to_be_bytes());
        body.extend_from_slice(&bytes_per_packet.to_be_bytes());
        body.extend_from_slice(&frames_per_packet.to_be_bytes());
        body.extend_from_slice(&channels.to_be_bytes());
        body.extend_from_slice(&bits.to_be_bytes());
        body
    }

    /// A 44.1 kHz 16-bit stereo PCM file of `frames` frames.
    fn lpcm_file(frames: u32) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"caff");
        out.extend_from_slice(&1u16.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());

        push_chunk(&mut out, b"desc", &desc_chunk(44_100.0, b"lpcm", 0, 4, 1, 2, 16));

        let mut data = Vec::new();
        data.extend_from_slice(&0u32.to_be_bytes());
        for frame in 0..frames {
            data.extend_from_slice(&(frame as i16).to_be_bytes());
            data.extend_from_slice(&(!(frame as i16)).to_be_bytes());
        }
        push_chunk(&mut out, b"data", &data);

        out
    }

    fn open(data: Vec<u8>) -> CafReader {
        let stream = SourceStream::new(Box::new(Cursor::new(data)));
        CafReader::try_new(stream, &FormatOptions::default()).unwrap()
    }

    #[test]
    fn verify_lpcm_parse() {
        let reader = open(lpcm_file(1000));
        let info = reader.stream_info();

        assert_eq!(info.format.codec, CODEC_TYPE_PCM_S16BE);
        assert_eq!(info.format.sample_rate, 44_100);
        assert_eq!(info.format.channels, 2);
        assert_eq!(info.format.bytes_per_frame, 4);
        assert_eq!(info.total_frames, 1000);
        assert_eq!(info.packet_count, 1000);
        assert_eq!(info.edits.total_duration(), 1000);
    }

    #[test]
    fn verify_lpcm_feed_groups_frames() {
        let mut reader = open(lpcm_file(2000));

        let mut buf = Vec::new();
        assert!(reader.feed(&mut buf).unwrap());
        assert_eq!(buf.len(), 1152 * 4);
        assert_eq!(&buf[..4], &[0x00, 0x00, 0xff, 0xff]);

        assert!(reader.feed(&mut buf).unwrap());
        assert_eq!(buf.len(), (2000 - 1152) * 4);

        assert!(!reader.feed(&mut buf).unwrap());
        assert!(buf.is_empty());
    }

    #[test]
    fn verify_feed_after_seek_packet() {
        let mut reader = open(lpcm_file(2000));

        reader.seek_packet(1500).unwrap();
        assert_eq!(reader.packet_index(), 1500);

        let mut buf = Vec::new();
        assert!(reader.feed(&mut buf).unwrap());
        assert_eq!(buf.len(), 500 * 4);
        assert_eq!(&buf[..2], &1500i16.to_be_bytes());
    }

    /// A compressed file with a BER packet table, priming, and a cookie.
    fn compressed_file() -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"caff");
        out.extend_from_slice(&1u16.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());

        // Variable packet size, 4096 frames per packet.
        push_chunk(&mut out, b"desc", &desc_chunk(44_100.0, b"alac", 0, 0, 4096, 2, 0));

        push_chunk(&mut out, b"kuki", &[0xaa; 24]);

        // Three packets: 200, 300, and 130 bytes. Packet sizes at and above
        // 128 exercise the continuation bit.
        let mut pakt = Vec::new();
        pakt.extend_from_slice(&3i64.to_be_bytes());
        pakt.extend_from_slice(&(3 * 4096i64 - 2112 - 100).to_be_bytes());
        pakt.extend_from_slice(&2112i32.to_be_bytes());
        pakt.extend_from_slice(&100i32.to_be_bytes());
        pakt.extend_from_slice(&[0x81, 0x48]); // 200
        pakt.extend_from_slice(&[0x82, 0x2c]); // 300
        pakt.extend_from_slice(&[0x81, 0x02]); // 130
        push_chunk(&mut out, b"pakt", &pakt);

        let mut data = Vec::new();
        data.extend_from_slice(&0u32.to_be_bytes());
        for i in 0..(200 + 300 + 130) {
            data.push(i as u8);
        }
        push_chunk(&mut out, b"data", &data);

        out
    }

    #[test]
    fn verify_packet_table_parse() {
        let reader = open(compressed_file());
        let info = reader.stream_info();

        assert_eq!(info.format.codec, CODEC_TYPE_ALAC);
        assert_eq!(info.packet_count, 3);
        assert_eq!(info.priming.leading, 2112);
        assert_eq!(info.priming.trailing, 100);

        // Duration follows the explicit valid-frame count.
        assert_eq!(info.total_frames, 3 * 4096);
        assert_eq!(info.edits.total_duration(), 3 * 4096 - 2112 - 100);
        assert_eq!(info.edits.media_offset_for_position(0), 2112);

        assert_eq!(info.codec_config.as_deref(), Some(&[0xaa; 24][..]));
    }

    #[test]
    fn verify_packet_table_feed() {
        let mut reader = open(compressed_file());

        let mut buf = Vec::new();
        assert!(reader.feed(&mut buf).unwrap());
        assert_eq!(buf.len(), 200);
        assert_eq!(buf[0], 0);

        assert!(reader.feed(&mut buf).unwrap());
        assert_eq!(buf.len(), 300);
        assert_eq!(buf[0], 200);

        // Rewind to the second packet.
        reader.seek_packet(1).unwrap();
        assert!(reader.feed(&mut buf).unwrap());
        assert_eq!(buf.len(), 300);
        assert_eq!(buf[0], 200);

        assert!(reader.feed(&mut buf).unwrap());
        assert_eq!(buf.len(), 130);

        assert!(!reader.feed(&mut buf).unwrap());
    }

    #[test]
    fn verify_pakt_after_data_is_found() {
        // Identical to compressed_file, but with the packet table written
        // after the payload, as encoders commonly do.
        let mut out = Vec::new();
        out.extend_from_slice(b"caff");
        out.extend_from_slice(&1u16.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());

        push_chunk(&mut out, b"desc", &desc_chunk(44_100.0, b"alac", 0, 0, 4096, 2, 0));
        push_chunk(&mut out, b"kuki", &[0xbb; 24]);

        let mut data = Vec::new();
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&[0x11; 64]);
        push_chunk(&mut out, b"data", &data);

        let mut pakt = Vec::new();
        pakt.extend_from_slice(&2i64.to_be_bytes());
        pakt.extend_from_slice(&0i64.to_be_bytes());
        pakt.extend_from_slice(&0i32.to_be_bytes());
        pakt.extend_from_slice(&0i32.to_be_bytes());
        pakt.extend_from_slice(&[0x20]); // 32
        pakt.extend_from_slice(&[0x20]); // 32
        push_chunk(&mut out, b"pakt", &pakt);

        let mut reader = open(out);
        assert_eq!(reader.stream_info().packet_count, 2);
        // Duration falls back to entry count x frames per packet.
        assert_eq!(reader.stream_info().total_frames, 2 * 4096);

        let mut buf = Vec::new();
        assert!(reader.feed(&mut buf).unwrap());
        assert_eq!(buf.len(), 32);
        assert_eq!(buf[0], 0x11);
    }

    #[test]
    fn verify_malformed_channel_layout_is_fatal() {
        let mut out = Vec::new();
        out.extend_from_slice(b"caff");
        out.extend_from_slice(&1u16.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());

        push_chunk(&mut out, b"desc", &desc_chunk(44_100.0, b"lpcm", 0, 4, 1, 2, 16));
        // A channel layout chunk below the minimum structural size.
        push_chunk(&mut out, b"chan", &[0u8; 8]);

        let stream = SourceStream::new(Box::new(Cursor::new(out)));
        let result = CafReader::try_new(stream, &FormatOptions::default());
        assert!(matches!(
            result.err(),
            Some(coda_core::errors::Error::MalformedContainer(_))
        ));
    }

    #[test]
    fn verify_unknown_chunks_are_skipped() {
        let mut out = Vec::new();
        out.extend_from_slice(b"caff");
        out.extend_from_slice(&1u16.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());

        push_chunk(&mut out, b"desc", &desc_chunk(44_100.0, b"lpcm", 0, 4, 1, 2, 16));
        push_chunk(&mut out, b"uuid", &[0xcc; 40]);

        let mut data = Vec::new();
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&[0u8; 40]);
        push_chunk(&mut out, b"data", &data);

        let reader = open(out);
        assert_eq!(reader.stream_info().total_frames, 10);
    }
}
