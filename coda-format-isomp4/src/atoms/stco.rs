// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use coda_core::errors::{malformed_container_error, Result};
use coda_core::io::ReadBytes;

use crate::atoms::{Atom, AtomHeader};

/// Chunk offset atom (32-bit offsets).
#[derive(Debug)]
pub struct StcoAtom {
    pub chunk_offsets: Vec<u64>,
}

impl Atom for StcoAtom {
    fn read<B: ReadBytes>(reader: &mut B, mut header: AtomHeader) -> Result<Self> {
        let (_, _) = header.read_extended_header(reader)?;

        let len = match header.data_len() {
            Some(len) if len >= 4 => len,
            _ => return malformed_container_error("isomp4 (stco): invalid atom size"),
        };

        let entry_count = reader.read_be_u32()?;
        if u64::from(entry_count) != (len - 4) / 4 {
            return malformed_container_error("isomp4 (stco): invalid entry count");
        }

        let mut chunk_offsets = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            chunk_offsets.push(u64::from(reader.read_be_u32()?));
        }

        Ok(StcoAtom { chunk_offsets })
    }
}
