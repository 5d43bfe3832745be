// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use coda_core::errors::{malformed_container_error, Result};
use coda_core::io::ReadBytes;

use crate::atoms::{Atom, AtomHeader};

/// Edit list entry. The segment duration is in movie timescale units; the
/// media time is in media timescale units, with -1 denoting an empty edit.
#[derive(Debug)]
pub struct ElstEntry {
    pub segment_duration: u64,
    pub media_time: i64,
}

/// Edit list atom.
#[derive(Debug)]
pub struct ElstAtom {
    pub entries: Vec<ElstEntry>,
}

impl Atom for ElstAtom {
    fn read<B: ReadBytes>(reader: &mut B, mut header: AtomHeader) -> Result<Self> {
        let (version, _) = header.read_extended_header(reader)?;

        let len = match header.data_len() {
            Some(len) if len >= 4 => len,
            _ => return malformed_container_error("isomp4 (elst): invalid atom size"),
        };

        let entry_count = reader.read_be_u32()?;
        let entry_len = if version == 0 { 12 } else { 20 };
        if u64::from(entry_count) != (len - 4) / entry_len {
            return malformed_container_error("isomp4 (elst): invalid entry count");
        }

        let mut entries = Vec::with_capacity(entry_count as usize);

        for _ in 0..entry_count {
            let (segment_duration, media_time) = match version {
                0 => (
                    u64::from(reader.read_be_u32()?),
                    i64::from(reader.read_be_u32()? as i32),
                ),
                1 => (reader.read_be_u64()?, reader.read_be_u64()? as i64),
                _ => return malformed_container_error("isomp4 (elst): invalid version"),
            };

            // The media rate is fixed-point 16.16 and is not used.
            let _ = reader.read_be_u32()?;

            entries.push(ElstEntry { segment_duration, media_time });
        }

        Ok(ElstAtom { entries })
    }
}
