// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use coda_core::errors::{malformed_container_error, Result};
use coda_core::io::ReadBytes;

use crate::atoms::{Atom, AtomHeader};

#[derive(Debug)]
pub struct StscEntry {
    /// The first chunk the entry applies to, indexed from 0.
    pub first_chunk: u32,
    pub samples_per_chunk: u32,
}

/// Sample-to-chunk atom.
#[derive(Debug)]
pub struct StscAtom {
    pub entries: Vec<StscEntry>,
}

impl Atom for StscAtom {
    fn read<B: ReadBytes>(reader: &mut B, mut header: AtomHeader) -> Result<Self> {
        let (_, _) = header.read_extended_header(reader)?;

        let len = match header.data_len() {
            Some(len) if len >= 4 => len,
            _ => return malformed_container_error("isomp4 (stsc): invalid atom size"),
        };

        let entry_count = reader.read_be_u32()?;
        if u64::from(entry_count) != (len - 4) / 12 {
            return malformed_container_error("isomp4 (stsc): invalid entry count");
        }

        let mut entries = Vec::with_capacity(entry_count as usize);
        let mut prev_first_chunk = 0;

        for i in 0..entry_count {
            let first_chunk = reader.read_be_u32()?;

            // Chunks are indexed from 1, and entries must be in ascending
            // chunk order.
            if first_chunk == 0 || (i > 0 && first_chunk <= prev_first_chunk) {
                return malformed_container_error("isomp4 (stsc): invalid first chunk");
            }
            prev_first_chunk = first_chunk;

            let samples_per_chunk = reader.read_be_u32()?;
            if samples_per_chunk == 0 {
                return malformed_container_error("isomp4 (stsc): entry has 0 samples per chunk");
            }

            // The sample description index is not used.
            let _ = reader.read_be_u32()?;

            entries.push(StscEntry { first_chunk: first_chunk - 1, samples_per_chunk });
        }

        Ok(StscAtom { entries })
    }
}
