// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `formats` module provides the traits and support structures necessary
//! to implement container parsers and packet feeders.

use crate::audio::{ChannelMap, SampleFormat};
use crate::errors::Result;
use crate::gapless::{EditList, PrimingInfo};
use crate::io::SourceStream;
use crate::meta::{Chapter, Tag};

/// `FormatOptions` is a common set of options that all container parsers use.
#[derive(Copy, Clone, Debug)]
pub struct FormatOptions {
    /// Enable gapless playback. When enabled, the presentation timeline
    /// excludes encoder priming and trailing padding declared by the
    /// container. When disabled, the raw decode timeline is presented.
    /// Default: `true`.
    pub enable_gapless: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        FormatOptions { enable_gapless: true }
    }
}

/// `StreamInfo` is everything a container parser derives about its single
/// audio stream. It is parsed exactly once, at construction.
#[derive(Clone, Debug)]
pub struct StreamInfo {
    /// The sample format of the stream.
    pub format: SampleFormat,
    /// The codec configuration blob ("magic cookie") required to initialize a
    /// decoder, if the codec uses one. Opaque to the container.
    pub codec_config: Option<Box<[u8]>>,
    /// The total number of packets addressable through the feeder.
    pub packet_count: u64,
    /// The total number of raw frames on the decode timeline, including any
    /// encoder priming and trailing padding.
    pub total_frames: u64,
    /// Encoder priming and trailing padding frame counts.
    pub priming: PrimingInfo,
    /// The presentation timeline over the raw decode timeline.
    pub edits: EditList,
    /// The physical channel order of the bitstream, if declared.
    pub channel_map: Option<ChannelMap>,
}

impl StreamInfo {
    /// Creates stream info for the given format with an empty presentation
    /// timeline.
    pub fn new(format: SampleFormat) -> Self {
        StreamInfo {
            format,
            codec_config: None,
            packet_count: 0,
            total_frames: 0,
            priming: PrimingInfo::default(),
            edits: EditList::default(),
            channel_map: None,
        }
    }

    /// The nominal number of frames per packet, never 0.
    pub fn frames_per_packet(&self) -> u64 {
        u64::from(self.format.frames_per_packet.max(1))
    }
}

/// A `PacketFeeder` resolves "packet N" to bytes. It never decodes.
///
/// Packet sizing is container specific: a fixed byte size for fixed-width
/// formats, a variable-length-integer table for variable formats, or an index
/// the container maintains internally.
pub trait PacketFeeder: Send {
    /// Copies the compressed packet at the cursor into `buf` (replacing its
    /// contents) and advances the cursor. At end of stream, returns `false`
    /// and leaves `buf` empty.
    fn feed(&mut self, buf: &mut Vec<u8>) -> Result<bool>;

    /// Repositions the cursor to the given packet index. An index one past
    /// the last packet positions the feeder at end of stream. Repositioning
    /// backwards requires a seekable byte source.
    fn seek_packet(&mut self, packet: u64) -> Result<()>;

    /// Gets the index of the packet the next call to
    /// [`feed`](PacketFeeder::feed) will return.
    fn packet_index(&self) -> u64;
}

/// A `ContainerReader` parses a container's structure into a [`StreamInfo`]
/// plus metadata, and then serves the stream's packets as a [`PacketFeeder`].
///
/// Parse-time structural errors fail construction immediately; there is no
/// partial or degraded-mode parsing.
pub trait ContainerReader: PacketFeeder {
    /// Attempt to instantiate a `ContainerReader` from the given stream. The
    /// stream must be positioned at the start of the container.
    fn try_new(stream: SourceStream, options: &FormatOptions) -> Result<Self>
    where
        Self: Sized;

    /// Gets the parsed stream information.
    fn stream_info(&self) -> &StreamInfo;

    /// Gets the metadata tags read from the container.
    fn tags(&self) -> &[Tag];

    /// Gets the chapters read from the container.
    fn chapters(&self) -> &[Chapter];

    /// Consumes the reader, returning it as a plain packet feeder for a
    /// decoder to own.
    fn into_feeder(self: Box<Self>) -> Box<dyn PacketFeeder>;
}
