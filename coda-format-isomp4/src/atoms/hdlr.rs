// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use coda_core::errors::{malformed_container_error, Result};
use coda_core::io::ReadBytes;

use crate::atoms::{Atom, AtomHeader};

/// The kind of media a track carries.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TrackType {
    Sound,
    Other([u8; 4]),
}

/// Handler reference atom.
#[derive(Debug)]
pub struct HdlrAtom {
    pub track_type: TrackType,
}

impl Atom for HdlrAtom {
    fn read<B: ReadBytes>(reader: &mut B, mut header: AtomHeader) -> Result<Self> {
        let (_, _) = header.read_extended_header(reader)?;

        let data_len = match header.data_len() {
            Some(len) if len >= 20 => len,
            _ => return malformed_container_error("isomp4 (hdlr): invalid atom size"),
        };

        // Pre-defined component type.
        reader.ignore_bytes(4)?;

        let track_type = match &reader.read_quad_bytes()? {
            b"soun" => TrackType::Sound,
            other => TrackType::Other(*other),
        };

        // Reserved fields and the handler name are not used.
        reader.ignore_bytes(data_len - 8)?;

        Ok(HdlrAtom { track_type })
    }
}
