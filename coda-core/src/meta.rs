// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `meta` module defines the metadata elements produced by container
//! parsers. They are consumed opaquely by the [`Source`](crate::source::Source)
//! façade and exposed unchanged to callers.

use std::fmt;

/// `StandardTagKey` is an enumeration providing standardized keys for common
/// tag types. A container parser may assign a `StandardTagKey` to a [`Tag`] if
/// the tag's native key is generally accepted to map to a specific usage.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StandardTagKey {
    Album,
    AlbumArtist,
    Artist,
    Comment,
    Compilation,
    Composer,
    Copyright,
    Date,
    DiscNumber,
    Encoder,
    Genre,
    Lyrics,
    TempoBpm,
    TrackNumber,
    TrackTitle,
}

/// A `Value` is the payload of a [`Tag`].
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// A textual value.
    String(String),
    /// An opaque binary value.
    Binary(Box<[u8]>),
    /// An unsigned integer value.
    UnsignedInt(u64),
    /// A boolean value.
    Boolean(bool),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => s.fmt(f),
            Value::Binary(b) => write!(f, "<{} bytes>", b.len()),
            Value::UnsignedInt(v) => v.fmt(f),
            Value::Boolean(v) => v.fmt(f),
        }
    }
}

/// A `Tag` encapsulates one piece of metadata.
#[derive(Clone, Debug)]
pub struct Tag {
    /// If the native key of the tag is known to map to a common usage, the
    /// standard key.
    pub std_key: Option<StandardTagKey>,
    /// The key of the tag as stored in the container.
    pub key: String,
    /// The value of the tag.
    pub value: Value,
}

impl Tag {
    /// Create a new `Tag`.
    pub fn new(std_key: Option<StandardTagKey>, key: &str, value: Value) -> Tag {
        Tag { std_key, key: key.to_string(), value }
    }

    /// Returns true if the tag's key maps to a standard key.
    pub fn is_known(&self) -> bool {
        self.std_key.is_some()
    }
}

/// A `Chapter` is a named point on the presentation timeline.
#[derive(Clone, Debug)]
pub struct Chapter {
    /// The chapter title.
    pub title: String,
    /// The timestamp of the chapter start in frames of the presentation
    /// timeline.
    pub start_ts: u64,
}
