// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! An ISO Base Media File Format (MP4/M4A) container parser and packet
//! feeder for Project Coda.

mod atoms;
mod demuxer;

pub use demuxer::IsoMp4Reader;

/// The atom type that opens every file of this container family. It follows
/// the leading 4-byte atom size.
pub const MP4_MARKER: [u8; 4] = *b"ftyp";
