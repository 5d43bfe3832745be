// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `codecs` module provides the traits and support structures necessary
//! to implement packet-decoder adapters around external codec engines.

use std::collections::HashMap;
use std::fmt;

use crate::audio::SampleFormat;
use crate::errors::{unsupported_format_error, Result};
use crate::formats::{PacketFeeder, StreamInfo};

/// A `CodecType` is a unique identifier used to identify a specific codec.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CodecType(u32);

impl fmt::Display for CodecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Null codec
pub const CODEC_TYPE_NULL: CodecType = CodecType(0x0);

// Uncompressed PCM audio codecs
//------------------------------

/// PCM signed 16-bit little-endian interleaved
pub const CODEC_TYPE_PCM_S16LE: CodecType = CodecType(0x100);
/// PCM signed 16-bit big-endian interleaved
pub const CODEC_TYPE_PCM_S16BE: CodecType = CodecType(0x101);
/// PCM signed 24-bit little-endian interleaved
pub const CODEC_TYPE_PCM_S24LE: CodecType = CodecType(0x102);
/// PCM signed 24-bit big-endian interleaved
pub const CODEC_TYPE_PCM_S24BE: CodecType = CodecType(0x103);
/// PCM signed 32-bit little-endian interleaved
pub const CODEC_TYPE_PCM_S32LE: CodecType = CodecType(0x104);
/// PCM signed 32-bit big-endian interleaved
pub const CODEC_TYPE_PCM_S32BE: CodecType = CodecType(0x105);
/// PCM 32-bit little-endian floating point interleaved
pub const CODEC_TYPE_PCM_F32LE: CodecType = CodecType(0x106);
/// PCM 32-bit big-endian floating point interleaved
pub const CODEC_TYPE_PCM_F32BE: CodecType = CodecType(0x107);
/// PCM 64-bit little-endian floating point interleaved
pub const CODEC_TYPE_PCM_F64LE: CodecType = CodecType(0x108);
/// PCM 64-bit big-endian floating point interleaved
pub const CODEC_TYPE_PCM_F64BE: CodecType = CodecType(0x109);

// Compressed lossy audio codecs
//------------------------------

/// MPEG Layer 1 (MP1)
pub const CODEC_TYPE_MP1: CodecType = CodecType(0x1000);
/// MPEG Layer 2 (MP2)
pub const CODEC_TYPE_MP2: CodecType = CodecType(0x1001);
/// MPEG Layer 3 (MP3)
pub const CODEC_TYPE_MP3: CodecType = CodecType(0x1002);
/// Advanced Audio Coding (AAC)
pub const CODEC_TYPE_AAC: CodecType = CodecType(0x1003);
/// Opus
pub const CODEC_TYPE_OPUS: CodecType = CodecType(0x1004);

// Compressed lossless audio codecs
//---------------------------------

/// Free Lossless Audio Codec (FLAC)
pub const CODEC_TYPE_FLAC: CodecType = CodecType(0x2000);
/// Apple Lossless Audio Codec (ALAC)
pub const CODEC_TYPE_ALAC: CodecType = CodecType(0x2001);

/// `CodecEngine` is the contract of an external codec implementation. This
/// crate never inspects engine-internal state beyond it.
///
/// An engine is handed to a [`PacketDecoder`] adapter already resolved by the
/// caller; adapters never self-initialize a process-wide engine. Disposal is
/// `Drop`.
pub trait CodecEngine: Send {
    /// One-time initialization from the codec configuration blob. An engine
    /// that rejects the blob fails the owning decoder's construction.
    fn init(&mut self, config: &[u8]) -> Result<()>;

    /// Decodes one compressed packet, appending the produced frames to `out`
    /// as interleaved big-endian two's-complement samples of
    /// `ceil(bits / 8)` bytes each. Returns the number of frames produced,
    /// which may be zero while the engine gathers look-ahead.
    fn decode_packet(&mut self, packet: &[u8], out: &mut Vec<u8>) -> Result<usize>;

    /// Discards all look-ahead and prediction state. Required before decoding
    /// discontinuous packets.
    fn reset(&mut self);

    /// The offset, in frames, between the engine's output timeline and the
    /// media timeline introduced by internal look-ahead. Distinct from any
    /// container-declared priming.
    fn output_delay(&self) -> u32 {
        0
    }
}

/// An `EngineProvider` resolves a codec identifier to a ready
/// [`CodecEngine`]. It is supplied by the embedding application.
pub trait EngineProvider {
    /// Creates an engine for the given codec, or returns an unsupported
    /// format error when the codec has no engine in this build.
    fn make_engine(&self, codec: CodecType) -> Result<Box<dyn CodecEngine>>;
}

/// An `EngineProvider` that provides no engines. Sufficient for pipelines
/// restricted to engineless codecs such as LPCM.
#[derive(Default)]
pub struct NoEngines;

impl EngineProvider for NoEngines {
    fn make_engine(&self, _codec: CodecType) -> Result<Box<dyn CodecEngine>> {
        unsupported_format_error("core (codec): no codec engine available")
    }
}

/// A `PacketDecoder` adapts one codec family to a uniform pull contract: it
/// draws compressed packets from its [`PacketFeeder`] as needed and produces
/// canonical interleaved `i32` frames.
///
/// Different codec engines buffer very differently (one packet in, one
/// packet's frames out; fixed blocks; or continuous internal buffering with
/// partial consumption). Adapters normalize all of these behind
/// [`decode`](PacketDecoder::decode) and keep any engine callback re-entrancy
/// inside a single call.
pub trait PacketDecoder: Send {
    /// Attempts to instantiate the decoder for the given stream.
    ///
    /// This performs the one-time configuration step: the codec configuration
    /// blob in `info` is fully parsed and validated, and the engine (where
    /// one is required) is initialized from it, before the decoder reports a
    /// derived output [`SampleFormat`].
    fn try_new(
        info: &StreamInfo,
        feeder: Box<dyn PacketFeeder>,
        engine: Option<Box<dyn CodecEngine>>,
    ) -> Result<Self>
    where
        Self: Sized;

    /// Gets a list of descriptors for the codecs supported by this adapter.
    fn supported_codecs() -> &'static [AdapterDescriptor]
    where
        Self: Sized;

    /// Gets the output sample format. This is the decoded format, distinct
    /// from the codec's native or compressed format: sub-canonical integer
    /// widths are widened and left-justified.
    fn sample_format(&self) -> SampleFormat;

    /// Produces up-to `max_frames` decoded frames into `dest`, pulling zero
    /// or more packets from the feeder as needed and buffering remainder
    /// output across calls. `dest` must hold at least `max_frames` whole
    /// frames. Returns the number of frames produced; 0 signals end of
    /// stream.
    fn decode(&mut self, dest: &mut [i32], max_frames: usize) -> Result<usize>;

    /// Discards all buffered-but-unconsumed output and reinitializes engine
    /// prediction and look-ahead state. Required before reuse after a seek.
    fn reset(&mut self);

    /// The number of preceding packets that must be decoded and discarded to
    /// re-warm decoder state before output at an arbitrary packet is correct.
    /// 0 for codecs whose packets are independently decodable.
    fn max_frame_dependency(&self) -> u32 {
        0
    }

    /// The output-timeline delay, in frames, of the underlying engine.
    fn decoder_delay(&self) -> u32 {
        0
    }

    /// Accesses the decoder's packet feeder, e.g. to reposition the packet
    /// cursor for a seek.
    fn feeder_mut(&mut self) -> &mut dyn PacketFeeder;
}

/// An `AdapterDescriptor` stores a description of a single codec adapter:
/// the codec it decodes, names, whether it requires an external engine, and
/// an instantiation function.
#[derive(Copy, Clone)]
pub struct AdapterDescriptor {
    /// The `CodecType` identifier.
    pub codec: CodecType,
    /// A short ASCII-only string identifying the codec.
    pub short_name: &'static str,
    /// A longer, more descriptive, string identifying the codec.
    pub long_name: &'static str,
    /// True if the adapter requires an external codec engine.
    pub needs_engine: bool,
    // An instantiation function for the adapter.
    #[allow(clippy::type_complexity)]
    pub inst_func: fn(
        &StreamInfo,
        Box<dyn PacketFeeder>,
        Option<Box<dyn CodecEngine>>,
    ) -> Result<Box<dyn PacketDecoder>>,
}

/// A `CodecRegistry` allows the registration of codec adapters, and provides
/// a method to instantiate a [`PacketDecoder`] for a stream.
#[derive(Default)]
pub struct CodecRegistry {
    adapters: HashMap<CodecType, AdapterDescriptor>,
}

impl CodecRegistry {
    /// Instantiate a new `CodecRegistry`.
    pub fn new() -> Self {
        CodecRegistry { adapters: HashMap::new() }
    }

    /// Gets the `AdapterDescriptor` for a registered codec.
    pub fn get_adapter(&self, codec: CodecType) -> Option<&AdapterDescriptor> {
        self.adapters.get(&codec)
    }

    /// Registers all codecs supported by the adapter `D`. If a supported
    /// codec was previously registered by another adapter it is replaced.
    pub fn register_all<D: PacketDecoder>(&mut self) {
        for descriptor in D::supported_codecs() {
            self.register(descriptor);
        }
    }

    /// Register a single codec adapter.
    pub fn register(&mut self, descriptor: &AdapterDescriptor) {
        self.adapters.insert(descriptor.codec, *descriptor);
    }

    /// Searches the registry for an adapter supporting the stream's codec,
    /// resolves an engine through `engines` if the adapter requires one, and
    /// instantiates the decoder over the provided feeder.
    pub fn make(
        &self,
        info: &StreamInfo,
        feeder: Box<dyn PacketFeeder>,
        engines: &dyn EngineProvider,
    ) -> Result<Box<dyn PacketDecoder>> {
        match self.adapters.get(&info.format.codec) {
            Some(descriptor) => {
                let engine = if descriptor.needs_engine {
                    Some(engines.make_engine(descriptor.codec)?)
                }
                else {
                    None
                };
                (descriptor.inst_func)(info, feeder, engine)
            }
            None => unsupported_format_error("core (codec): unsupported codec"),
        }
    }
}

/// Convenience macro for declaring an `AdapterDescriptor`.
#[macro_export]
macro_rules! support_adapter {
    ($type:expr, $short_name:expr, $long_name:expr, $needs_engine:expr) => {
        AdapterDescriptor {
            codec: $type,
            short_name: $short_name,
            long_name: $long_name,
            needs_engine: $needs_engine,
            inst_func: |info, feeder, engine| {
                Ok(Box::new(Self::try_new(info, feeder, engine)?))
            },
        }
    };
}
