// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `source` module provides the pull-based [`Source`] façade composing a
//! packet decoder, its feeder, the edit/gapless engine, and the sample FIFO
//! into the contract consumed by everything downstream: length, sample
//! format, `read_samples`, `seek_to`, tags and chapters.

use log::debug;

use crate::audio::SampleFormat;
use crate::codecs::PacketDecoder;
use crate::errors::Result;
use crate::fifo::SampleFifo;
use crate::formats::StreamInfo;
use crate::meta::{Chapter, Tag};

/// The minimum number of frames requested from the decoder per FIFO refill.
/// Formats whose packets are single frames are read at this granularity.
const DECODE_BLOCK_FRAMES: usize = 1152;

/// A `Source` is a pull-based, sample-accurate stream of decoded audio.
///
/// `read_samples` drains the FIFO; on empty, the edit engine supplies the raw
/// packet to decode next, the packet decoder produces frames (pulling
/// compressed packets from its feeder as needed), the result is committed
/// into the FIFO with edit-boundary trimming applied, and the read retries.
///
/// Each `Source` exclusively owns its decoder, feeder, and FIFO. All I/O is
/// blocking and single-threaded; a caller that wants to stop simply stops
/// calling [`read_samples`](Source::read_samples).
pub struct Source {
    info: StreamInfo,
    tags: Vec<Tag>,
    chapters: Vec<Chapter>,
    decoder: Box<dyn PacketDecoder>,
    fifo: SampleFifo<i32>,
    /// Discard buffer for seek preroll output.
    scratch: Vec<i32>,
    /// The number of frames to request from the decoder per refill.
    block_frames: usize,
    /// The logical (presentation timeline) position of the next frame
    /// returned to the caller.
    pos: u64,
    /// The raw (decode timeline) frame the decoder's next delivered frame
    /// corresponds to, once the pending `start_skip` is applied. `None` when
    /// the decoder cursor is not synchronized to any raw position.
    media_pos: Option<u64>,
    /// Frames to discard from decoded output before any data is delivered.
    start_skip: u64,
    /// The presented track length in frames.
    length: u64,
}

impl Source {
    /// Composes a new `Source` from parsed stream information, container
    /// metadata, and a constructed packet decoder.
    pub fn new(
        info: StreamInfo,
        tags: Vec<Tag>,
        chapters: Vec<Chapter>,
        decoder: Box<dyn PacketDecoder>,
    ) -> Self {
        let out_format = decoder.sample_format();

        let length = if info.edits.is_empty() {
            info.total_frames
        }
        else {
            info.edits.total_duration()
        };

        let block_frames = (info.frames_per_packet() as usize).max(DECODE_BLOCK_FRAMES);

        Source {
            info,
            tags,
            chapters,
            decoder,
            fifo: SampleFifo::new(out_format.channels as usize),
            scratch: Vec::new(),
            block_frames,
            pos: 0,
            media_pos: None,
            start_skip: 0,
            length,
        }
    }

    /// Gets the presented track length in frames.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Gets the logical position of the next frame to be read.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Gets the output sample format.
    pub fn sample_format(&self) -> SampleFormat {
        self.decoder.sample_format()
    }

    /// Gets the parsed stream information.
    pub fn stream_info(&self) -> &StreamInfo {
        &self.info
    }

    /// Gets the container's metadata tags, unchanged.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Gets the container's chapters, unchanged.
    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    /// Reads up-to `dest.len() / channels` frames of interleaved samples into
    /// `dest`. Returns the number of frames read; 0 signals the normal end of
    /// the stream.
    pub fn read_samples(&mut self, dest: &mut [i32]) -> Result<usize> {
        let stride = self.fifo.stride();
        let want = dest.len() / stride;
        let mut done = 0;

        while done < want {
            if self.fifo.count() == 0 && !self.refill()? {
                break;
            }

            let read = self.fifo.read(&mut dest[done * stride..want * stride]);
            done += read;
            self.pos += read as u64;
        }

        Ok(done)
    }

    /// Seeks to the logical position `target`.
    ///
    /// A target at or past the track length clamps to end of stream and does
    /// no decode work. Otherwise the decoder is reset, the FIFO cleared, and
    /// the decoder re-warmed so that the first frame subsequently read is
    /// exactly the frame at `target`. Returns the position seeked to.
    pub fn seek_to(&mut self, target: u64) -> Result<u64> {
        if target >= self.length {
            self.pos = self.length;
            self.fifo.reset();
            self.decoder.reset();
            self.decoder.feeder_mut().seek_packet(self.info.packet_count)?;
            self.media_pos = None;
            self.start_skip = 0;
            return Ok(self.pos);
        }

        self.pos = target;
        self.fifo.reset();

        let media = self.info.edits.media_offset_for_position(target);
        self.resync(media)?;

        Ok(target)
    }

    /// Decodes the next block of frames into the FIFO, applying start-skip
    /// and edit-boundary trimming. Returns `false` at end of stream.
    fn refill(&mut self) -> Result<bool> {
        debug_assert!(self.fifo.count() == 0);

        if self.pos >= self.length {
            return Ok(false);
        }

        let (edit_index, _) = self.info.edits.edit_for_position(self.pos);
        let target = self.info.edits.media_offset_for_position(self.pos);

        // The decoder cursor is elsewhere after construction, a seek past an
        // edit boundary, or an edit-list discontinuity.
        if self.media_pos != Some(target) {
            self.resync(target)?;
        }

        let stride = self.fifo.stride();
        let block = self.block_frames;

        // Logical frames left before the current edit (or the track) ends.
        let remaining = if self.info.edits.is_empty() {
            self.length - self.pos
        }
        else {
            self.info.edits.end_of_edit(edit_index) - self.pos
        };

        loop {
            self.fifo.reserve(block);

            let decoded = {
                let buf = self.fifo.write_buf(block);
                self.decoder.decode(buf, block)?
            };
            debug_assert!(decoded <= block);

            if decoded == 0 {
                // The decoder ran dry before the declared length; present the
                // short stream rather than failing the read.
                return Ok(false);
            }

            // Discard pending skip frames from the front of the output.
            let skip = self.start_skip.min(decoded as u64) as usize;
            if skip > 0 {
                let buf = self.fifo.write_buf(block);
                buf.copy_within(skip * stride..decoded * stride, 0);
                self.start_skip -= skip as u64;
            }

            // Trim output that crosses the edit boundary; the next refill
            // resynchronizes to the following edit.
            let usable = ((decoded - skip) as u64).min(remaining) as usize;

            self.media_pos = Some(target + (decoded - skip) as u64);

            if usable > 0 {
                self.fifo.commit(usable);
                return Ok(true);
            }
        }
    }

    /// Re-synchronizes the decoder to raw frame `target`: reset, position the
    /// packet cursor at or before the containing packet, decode and discard
    /// the codec's frame-dependency preroll, and arm the start skip.
    fn resync(&mut self, target: u64) -> Result<()> {
        debug!("resync decoder to raw frame {}", target);

        self.decoder.reset();
        self.fifo.reset();

        let fpp = self.info.frames_per_packet();
        let ipacket = target / fpp;

        let preroll = u64::from(self.decoder.max_frame_dependency()).min(ipacket);
        self.decoder.feeder_mut().seek_packet(ipacket - preroll)?;

        if preroll > 0 {
            let stride = self.fifo.stride();
            self.scratch.resize(self.block_frames * stride, 0);

            let mut remaining = preroll * fpp;
            while remaining > 0 {
                let ask = remaining.min(self.block_frames as u64) as usize;
                let got = self.decoder.decode(&mut self.scratch[..ask * stride], ask)?;
                if got == 0 {
                    break;
                }
                remaining -= got as u64;
            }
        }

        self.start_skip = target - ipacket * fpp + u64::from(self.decoder.decoder_delay());
        self.media_pos = Some(target);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Source;
    use crate::audio::SampleFormat;
    use crate::codecs::{
        AdapterDescriptor, CodecEngine, PacketDecoder, CODEC_TYPE_PCM_S16BE,
    };
    use crate::errors::Result;
    use crate::formats::{PacketFeeder, StreamInfo};
    use crate::gapless::{EditList, PrimingInfo};

    const FPP: u64 = 16;

    /// A feeder whose "packets" are just their own indices.
    struct RampFeeder {
        cursor: u64,
        packets: u64,
    }

    impl PacketFeeder for RampFeeder {
        fn feed(&mut self, buf: &mut Vec<u8>) -> Result<bool> {
            buf.clear();
            if self.cursor >= self.packets {
                return Ok(false);
            }
            buf.extend_from_slice(&self.cursor.to_be_bytes());
            self.cursor += 1;
            Ok(true)
        }

        fn seek_packet(&mut self, packet: u64) -> Result<()> {
            self.cursor = packet;
            Ok(())
        }

        fn packet_index(&self) -> u64 {
            self.cursor
        }
    }

    /// A mono decoder producing the raw frame index as the sample value.
    ///
    /// When `dependency` is nonzero, a packet decoded discontiguously from
    /// its predecessor produces poisoned samples, modelling un-warmed
    /// prediction state.
    struct RampDecoder {
        feeder: RampFeeder,
        total_frames: u64,
        dependency: u32,
        last_packet: Option<u64>,
        pending: Vec<i32>,
        pending_pos: usize,
    }

    impl RampDecoder {
        fn new(total_frames: u64, dependency: u32) -> Self {
            let packets = (total_frames + FPP - 1) / FPP;
            RampDecoder {
                feeder: RampFeeder { cursor: 0, packets },
                total_frames,
                dependency,
                last_packet: None,
                pending: Vec::new(),
                pending_pos: 0,
            }
        }
    }

    impl PacketDecoder for RampDecoder {
        fn try_new(
            _info: &StreamInfo,
            _feeder: Box<dyn PacketFeeder>,
            _engine: Option<Box<dyn CodecEngine>>,
        ) -> Result<Self> {
            unimplemented!()
        }

        fn supported_codecs() -> &'static [AdapterDescriptor] {
            &[]
        }

        fn sample_format(&self) -> SampleFormat {
            SampleFormat {
                sample_rate: 44_100,
                channels: 1,
                bits_per_channel: 32,
                bytes_per_frame: 4,
                frames_per_packet: FPP as u32,
                codec: CODEC_TYPE_PCM_S16BE,
            }
        }

        fn decode(&mut self, dest: &mut [i32], max_frames: usize) -> Result<usize> {
            let mut produced = 0;

            while produced < max_frames {
                if self.pending_pos == self.pending.len() {
                    let mut packet = Vec::new();
                    if !self.feeder.feed(&mut packet)? {
                        break;
                    }

                    let index = u64::from_be_bytes(packet.as_slice().try_into().unwrap());
                    let poisoned = self.dependency > 0
                        && index > 0
                        && self.last_packet != Some(index - 1);
                    self.last_packet = Some(index);

                    let base = index * FPP;
                    let frames = FPP.min(self.total_frames - base);

                    self.pending.clear();
                    self.pending_pos = 0;
                    for frame in 0..frames {
                        self.pending.push(if poisoned { -1 } else { (base + frame) as i32 });
                    }
                }

                let take =
                    (max_frames - produced).min(self.pending.len() - self.pending_pos);
                if take == 0 {
                    break;
                }
                dest[produced..produced + take].copy_from_slice(
                    &self.pending[self.pending_pos..self.pending_pos + take],
                );
                self.pending_pos += take;
                produced += take;
            }

            Ok(produced)
        }

        fn reset(&mut self) {
            self.pending.clear();
            self.pending_pos = 0;
            self.last_packet = None;
        }

        fn max_frame_dependency(&self) -> u32 {
            self.dependency
        }

        fn feeder_mut(&mut self) -> &mut dyn PacketFeeder {
            &mut self.feeder
        }
    }

    fn ramp_source(total_frames: u64, dependency: u32, edits: EditList) -> Source {
        let decoder = RampDecoder::new(total_frames, dependency);

        let mut info = StreamInfo::new(decoder.sample_format());
        info.packet_count = (total_frames + FPP - 1) / FPP;
        info.total_frames = total_frames;
        info.edits = edits;

        Source::new(info, Vec::new(), Vec::new(), Box::new(decoder))
    }

    #[test]
    fn verify_sequential_read() {
        let mut source = ramp_source(1000, 0, EditList::whole_track(1000));
        assert_eq!(source.length(), 1000);

        let mut dest = vec![0i32; 1000];
        assert_eq!(source.read_samples(&mut dest).unwrap(), 1000);
        for (i, sample) in dest.iter().enumerate() {
            assert_eq!(*sample, i as i32);
        }

        // End of stream is a zero-length read.
        assert_eq!(source.read_samples(&mut dest).unwrap(), 0);
    }

    #[test]
    fn verify_priming_is_never_exposed() {
        let priming = PrimingInfo { leading: 37, trailing: 11 };
        let total = 37 + 500 + 11;
        let mut source = ramp_source(total, 0, EditList::from_priming(priming, total));

        assert_eq!(source.length(), 500);

        let mut dest = vec![0i32; 600];
        assert_eq!(source.read_samples(&mut dest).unwrap(), 500);
        assert_eq!(dest[0], 37);
        assert_eq!(dest[499], 37 + 499);
    }

    #[test]
    fn verify_seek_equivalence_without_dependency() {
        // For a codec with no cross-packet dependency, seeking must yield the
        // same frames as reading from 0 and discarding.
        let mut source = ramp_source(512, 0, EditList::whole_track(512));

        for target in [0u64, 1, 15, 16, 17, 300, 511] {
            let pos = source.seek_to(target).unwrap();
            assert_eq!(pos, target);

            let mut dest = [0i32; 8];
            let got = source.read_samples(&mut dest).unwrap();
            assert!(got >= 1);
            assert_eq!(dest[0], target as i32);
        }
    }

    #[test]
    fn verify_seek_preroll_rewarms_prediction() {
        // With a one-packet dependency, a mid-stream seek must decode and
        // discard the preceding packet so no poisoned frames escape.
        let mut source = ramp_source(512, 1, EditList::whole_track(512));

        let pos = source.seek_to(100).unwrap();
        assert_eq!(pos, 100);

        let mut dest = vec![0i32; 412];
        assert_eq!(source.read_samples(&mut dest).unwrap(), 412);
        for (i, sample) in dest.iter().enumerate() {
            assert_eq!(*sample, 100 + i as i32);
        }
    }

    #[test]
    fn verify_seek_past_length_clamps() {
        let mut source = ramp_source(256, 0, EditList::whole_track(256));

        assert_eq!(source.seek_to(10_000).unwrap(), 256);
        assert_eq!(source.position(), 256);

        let mut dest = [0i32; 16];
        assert_eq!(source.read_samples(&mut dest).unwrap(), 0);
    }

    #[test]
    fn verify_seek_into_primed_stream() {
        let priming = PrimingInfo { leading: 37, trailing: 11 };
        let total = 37 + 500 + 11;
        let mut source = ramp_source(total, 1, EditList::from_priming(priming, total));

        source.seek_to(250).unwrap();

        let mut dest = [0i32; 4];
        assert_eq!(source.read_samples(&mut dest).unwrap(), 4);
        assert_eq!(dest[0], 37 + 250);
    }
}
