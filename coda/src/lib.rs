// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! # Project Coda
//!
//! Coda is the streaming container-demultiplexing and gapless-decode
//! pipeline of a desktop audio transcoder: it reads a compressed audio
//! container one packet at a time, drives a per-codec decoder adapter over an
//! external codec engine, and presents a pull-based, sample-accurate stream
//! of canonical frames.
//!
//! The usual entry point is [`open_source`]:
//!
//! 1. Wrap your input in a [`ByteSource`](core::io::ByteSource) (implemented
//!    for `std::fs::File` and `std::io::Cursor`).
//! 2. Provide an [`EngineProvider`](core::codecs::EngineProvider) resolving
//!    codec engines for the compressed codecs your build supports
//!    ([`NoEngines`](core::codecs::NoEngines) suffices for LPCM).
//! 3. Call [`open_source`]; the container is identified by its start-of-
//!    stream marker, parsed, and wired to a decoder from the default
//!    registry.
//! 4. Pull frames with [`Source::read_samples`](core::source::Source) and
//!    reposition with [`Source::seek_to`](core::source::Source).

use std::io::SeekFrom;

use coda_core::codecs::EngineProvider;
use coda_core::errors::{unsupported_format_error, Result};
use coda_core::formats::{ContainerReader, FormatOptions};
use coda_core::io::{ByteSource, ReadBytes, SourceStream};
use coda_core::source::Source;

pub use coda_core as core;

pub mod default {
    //! The `default` module provides a default codec adapter registry with
    //! all enabled adapters pre-registered.

    pub mod codecs {
        //! The `codecs` module re-exports all enabled decoder adapters.

        #[cfg(feature = "aac")]
        pub use coda_codec_aac::AacDecoder;
        #[cfg(feature = "alac")]
        pub use coda_codec_alac::AlacDecoder;
        #[cfg(feature = "flac")]
        pub use coda_codec_flac::FlacDecoder;
        #[cfg(feature = "mpa")]
        pub use coda_codec_mpa::MpaDecoder;
        #[cfg(feature = "opus")]
        pub use coda_codec_opus::OpusDecoder;
        #[cfg(feature = "pcm")]
        pub use coda_codec_pcm::PcmDecoder;
    }

    pub mod formats {
        //! The `formats` module re-exports all enabled container readers.

        #[cfg(feature = "caf")]
        pub use coda_format_caf::CafReader;
        #[cfg(feature = "isomp4")]
        pub use coda_format_isomp4::IsoMp4Reader;
    }

    use coda_core::codecs::CodecRegistry;
    use lazy_static::lazy_static;

    lazy_static! {
        static ref CODEC_REGISTRY: CodecRegistry = {
            let mut registry = CodecRegistry::new();
            register_enabled_codecs(&mut registry);
            registry
        };
    }

    /// Gets the default `CodecRegistry`, pre-registering all adapters
    /// selected by the feature flags in the includer's `Cargo.toml`.
    ///
    /// This function is lazy and does not instantiate the registry until the
    /// first call.
    pub fn get_codecs() -> &'static CodecRegistry {
        &CODEC_REGISTRY
    }

    /// Registers all adapters selected by the feature flags on the provided
    /// registry.
    pub fn register_enabled_codecs(registry: &mut CodecRegistry) {
        #[cfg(feature = "aac")]
        registry.register_all::<codecs::AacDecoder>();

        #[cfg(feature = "alac")]
        registry.register_all::<codecs::AlacDecoder>();

        #[cfg(feature = "flac")]
        registry.register_all::<codecs::FlacDecoder>();

        #[cfg(feature = "mpa")]
        registry.register_all::<codecs::MpaDecoder>();

        #[cfg(feature = "opus")]
        registry.register_all::<codecs::OpusDecoder>();

        #[cfg(feature = "pcm")]
        registry.register_all::<codecs::PcmDecoder>();

        // Silence the unused warning for engine-free builds.
        let _ = registry;
    }
}

/// Identifies the container by its start-of-stream marker and instantiates
/// the matching reader.
pub fn probe_container(
    mut stream: SourceStream,
    options: &FormatOptions,
) -> Result<Box<dyn ContainerReader>> {
    let first = stream.read_quad_bytes()?;
    let second = stream.read_quad_bytes()?;

    // The probe depth fits inside the stream buffer, so rewinding does not
    // require a seekable source.
    stream.seek(SeekFrom::Start(0))?;

    #[cfg(feature = "caf")]
    {
        if first == coda_format_caf::CAF_MARKER {
            let reader = coda_format_caf::CafReader::try_new(stream, options)?;
            return Ok(Box::new(reader));
        }
    }

    #[cfg(feature = "isomp4")]
    {
        if second == coda_format_isomp4::MP4_MARKER {
            let reader = coda_format_isomp4::IsoMp4Reader::try_new(stream, options)?;
            return Ok(Box::new(reader));
        }
    }

    let _ = (first, second);
    unsupported_format_error("core (probe): unsupported container format")
}

/// Opens a byte source as a pull-based [`Source`] of decoded audio.
///
/// The container is parsed once, a decoder adapter is instantiated from the
/// default registry (resolving an engine through `engines` where the codec
/// requires one), and the composed source is returned.
pub fn open_source(
    source: Box<dyn ByteSource>,
    engines: &dyn EngineProvider,
    options: &FormatOptions,
) -> Result<Source> {
    let stream = SourceStream::new(source);
    let reader = probe_container(stream, options)?;

    let info = reader.stream_info().clone();
    let tags = reader.tags().to_vec();
    let chapters = reader.chapters().to_vec();

    let feeder = reader.into_feeder();
    let decoder = default::get_codecs().make(&info, feeder, engines)?;

    Ok(Source::new(info, tags, chapters, decoder))
}
