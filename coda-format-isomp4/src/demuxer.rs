// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::SeekFrom;

use coda_core::audio::SampleFormat;
use coda_core::errors::{
    is_end_of_stream, malformed_container_error, unsupported_format_error, Result,
};
use coda_core::formats::{ContainerReader, FormatOptions, PacketFeeder, StreamInfo};
use coda_core::gapless::{parse_gapless_text_tag, EditEntry, EditList, PrimingInfo};
use coda_core::io::{ReadBytes, SourceStream};
use coda_core::meta::{Chapter, Tag, Value};
use log::{info, warn};

use crate::atoms::hdlr::TrackType;
use crate::atoms::{AtomIterator, FtypAtom, MoovAtom, TrakAtom};

/// The key of the textual gapless (priming/duration) fallback tag.
const GAPLESS_TAG_KEY: &str = "iTunSMPB";

/// One addressable packet of the stream.
#[derive(Copy, Clone, Debug)]
struct SampleEntry {
    pos: u64,
    len: u32,
}

/// Atom-based container (ISO/MP4, M4A) reader and packet feeder.
///
/// The packet table is not stored explicitly by this container family; it is
/// derived at construction from the sample-to-chunk, sample-size, and
/// chunk-offset tables and kept as an internal index.
pub struct IsoMp4Reader {
    reader: SourceStream,
    info: StreamInfo,
    tags: Vec<Tag>,
    chapters: Vec<Chapter>,
    entries: Vec<SampleEntry>,
    cursor: u64,
}

impl ContainerReader for IsoMp4Reader {
    fn try_new(mut reader: SourceStream, options: &FormatOptions) -> Result<Self> {
        let is_seekable = reader.is_seekable();
        let total_len = reader.byte_len();

        let mut ftyp: Option<FtypAtom> = None;
        let mut moov: Option<MoovAtom> = None;

        {
            let mut iter = AtomIterator::new_root(&mut reader, total_len);

            loop {
                let header = match iter.next() {
                    Ok(Some(header)) => header,
                    Ok(None) => break,
                    Err(err) => {
                        // An unbounded stream ends with an end-of-stream
                        // error rather than an iterator boundary.
                        if moov.is_some() && is_end_of_stream(&err) {
                            break;
                        }
                        return Err(err);
                    }
                };

                match &header.atype {
                    b"ftyp" => ftyp = Some(iter.read_atom::<FtypAtom>()?),
                    b"moov" => moov = Some(iter.read_atom::<MoovAtom>()?),
                    b"mdat" => {
                        if !is_seekable {
                            // The payload cannot be skipped and revisited. If
                            // the movie atom has not been seen yet, the file
                            // is not streamable.
                            if moov.is_none() {
                                return unsupported_format_error(
                                    "isomp4: media data before movie atom on an unseekable stream",
                                );
                            }
                            break;
                        }
                    }
                    b"free" | b"skip" => {}
                    other => {
                        info!(
                            "skipping atom ('{}')",
                            std::str::from_utf8(other).unwrap_or("????")
                        );
                    }
                }
            }
        }

        if ftyp.is_none() {
            return unsupported_format_error("isomp4: missing file type atom");
        }

        let moov = match moov {
            Some(moov) => moov,
            None => return malformed_container_error("isomp4: missing movie atom"),
        };

        Self::build(reader, moov, options)
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

impl PacketFeeder for IsoMp4Reader {
    fn feed(&mut self, buf: &mut Vec<u8>) -> Result<bool> {
        buf.clear();

        let entry = match self.entries.get(self.cursor as usize) {
            Some(entry) => *entry,
            None => return Ok(false),
        };

        if self.reader.pos() != entry.pos {
            self.reader.seek(SeekFrom::Start(entry.pos))?;
        }

        buf.resize(entry.len as usize, 0);
        self.reader.read_buf_exact(buf)?;
        self.cursor += 1;
        Ok(true)
    }

    fn seek_packet(&mut self, packet: u64) -> Result<()> {
        self.cursor = packet.min(self.entries.len() as u64);
        Ok(())
    }

    fn packet_index(&self) -> u64 {
        self.cursor
    }
}

impl IsoMp4Reader {
    fn build(reader: SourceStream, moov: MoovAtom, options: &FormatOptions) -> Result<Self> {
        // This pipeline decodes a single audio stream: the first sound track.
        let trak = match
            moov.traks.into_iter().find(|t| t.mdia.hdlr.track_type == TrackType::Sound)
        {
            Some(trak) => trak,
            None => return unsupported_format_error("isomp4: no audio track"),
        };

        let tags = moov
            .udta
            .and_then(|udta| udta.meta)
            .and_then(|meta| meta.ilst)
            .map(|ilst| ilst.tags)
            .unwrap_or_default();

        let entries = build_sample_index(&trak)?;

        let stbl = &trak.mdia.minf.stbl;
        let stsd = &stbl.stsd;

        let media_timescale = trak.mdia.mdhd.timescale;
        let movie_timescale = moov.mvhd.timescale;

        let sample_rate =
            if stsd.sample_rate != 0 { stsd.sample_rate } else { media_timescale };

        // Frame arithmetic below equates media timescale units with frames.
        if media_timescale != sample_rate {
            warn!(
                "media timescale ({}) differs from the sample rate ({})",
                media_timescale, sample_rate
            );
        }

        let frames_per_packet = match stbl.stts.frames_per_packet() {
            Some(fpp) if fpp > 0 => fpp,
            _ => return malformed_container_error("isomp4 (stts): no packet durations"),
        };

        let total_frames = stbl.stts.total_duration;

        let format = SampleFormat {
            sample_rate,
            channels: stsd.channels,
            bits_per_channel: 0,
            bytes_per_frame: 0,
            frames_per_packet,
            codec: stsd.codec,
        };

        let (edits, priming) = derive_edits(
            &trak,
            &tags,
            total_frames,
            media_timescale,
            movie_timescale,
            options,
        );

        let mut stream_info = StreamInfo::new(format);
        stream_info.codec_config = stbl.stsd.codec_config.clone();
        stream_info.packet_count = entries.len() as u64;
        stream_info.total_frames = total_frames;
        stream_info.priming = priming;
        stream_info.edits = edits;

        Ok(IsoMp4Reader {
            reader,
            info: stream_info,
            tags,
            chapters: Vec::new(),
            entries,
            cursor: 0,
        })
    }
}

/// Flattens the sample-to-chunk, sample-size, and chunk-offset tables into a
/// per-packet position index.
fn build_sample_index(trak: &TrakAtom) -> Result<Vec<SampleEntry>> {
    let stbl = &trak.mdia.minf.stbl;
    let stsc = &stbl.stsc;
    let stsz = &stbl.stsz;
    let offsets = &stbl.chunk_offsets;

    let mut entries = Vec::with_capacity(stsz.sample_count as usize);
    let mut sample = 0u32;

    for (i, run) in stsc.entries.iter().enumerate() {
        let chunk_end = match stsc.entries.get(i + 1) {
            Some(next) => next.first_chunk,
            None => offsets.len() as u32,
        };

        if run.first_chunk > chunk_end || chunk_end as usize > offsets.len() {
            return malformed_container_error("isomp4 (stsc): chunk run exceeds offset table");
        }

        for chunk in run.first_chunk..chunk_end {
            let mut pos = offsets[chunk as usize];

            for _ in 0..run.samples_per_chunk {
                if sample >= stsz.sample_count {
                    break;
                }

                let len = match stsz.size(sample) {
                    Some(len) => len,
                    None => return malformed_container_error("isomp4 (stsz): missing sample size"),
                };

                entries.push(SampleEntry { pos, len });
                pos += u64::from(len);
                sample += 1;
            }
        }
    }

    if sample != stsz.sample_count {
        warn!(
            "sample tables account for {} of {} samples",
            sample, stsz.sample_count
        );
    }

    Ok(entries)
}

/// Derives the presentation timeline: from the edit list where present, else
/// reconstructed from the textual gapless tag, else the whole track.
fn derive_edits(
    trak: &TrakAtom,
    tags: &[Tag],
    total_frames: u64,
    media_timescale: u32,
    movie_timescale: u32,
    options: &FormatOptions,
) -> (EditList, PrimingInfo) {
    let mut edits = EditList::default();
    let mut priming = PrimingInfo::default();

    if options.enable_gapless {
        if let Some(elst) = trak.edts.as_ref().and_then(|edts| edts.elst.as_ref()) {
            let mut entries = Vec::new();

            for entry in &elst.entries {
                if entry.media_time < 0 {
                    // A dwell edit inserts silence; an audio transcoder has
                    // no vehicle for it.
                    warn!("dropping empty edit of duration {}", entry.segment_duration);
                    continue;
                }
                entries.push(EditEntry {
                    media_offset: entry.media_time as u64,
                    duration: entry.segment_duration,
                });
            }

            if !entries.is_empty() {
                let mut list = EditList::new(entries);
                // Edit durations are recorded in the presentation timescale;
                // remap them onto the media timeline once, here.
                list.scale_durations(media_timescale, movie_timescale);
                edits = list;
            }
        }

        // The textual fallback tag provides priming counts, and stands in
        // for a missing edit list entirely.
        if let Some(gapless) = tags
            .iter()
            .find(|tag| tag.key.eq_ignore_ascii_case(GAPLESS_TAG_KEY))
            .and_then(|tag| match &tag.value {
                Value::String(text) => parse_gapless_text_tag(text),
                _ => None,
            })
        {
            priming = PrimingInfo { leading: gapless.priming, trailing: gapless.remainder };

            if edits.is_empty() {
                edits = EditList::new(vec![EditEntry {
                    media_offset: u64::from(gapless.priming),
                    duration: gapless.valid_frames,
                }]);
            }
        }
        else if let [entry] = edits.entries() {
            // Recover priming counts from a single-entry edit list.
            priming = PrimingInfo {
                leading: entry.media_offset as u32,
                trailing: total_frames.saturating_sub(entry.media_offset + entry.duration)
                    as u32,
            };
        }
    }

    if edits.is_empty() {
        edits = EditList::whole_track(total_frames);
    }

    (edits, priming)
}
