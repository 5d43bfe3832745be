// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use coda_core::errors::{malformed_container_error, Result};
use coda_core::io::ReadBytes;

use crate::atoms::{
    Atom, AtomHeader, AtomIterator, Co64Atom, StcoAtom, StscAtom, StsdAtom, StszAtom, SttsAtom,
};

/// Sample table atom.
#[derive(Debug)]
pub struct StblAtom {
    pub stsd: StsdAtom,
    pub stts: SttsAtom,
    pub stsc: StscAtom,
    pub stsz: StszAtom,
    /// Chunk offsets, merged from the 32-bit or 64-bit table.
    pub chunk_offsets: Vec<u64>,
}

impl Atom for StblAtom {
    fn read<B: ReadBytes>(reader: &mut B, header: AtomHeader) -> Result<Self> {
        let mut iter = AtomIterator::new(reader, header);

        let mut stsd = None;
        let mut stts = None;
        let mut stsc = None;
        let mut stsz = None;
        let mut stco = None;
        let mut co64 = None;

        while let Some(child) = iter.next()? {
            match &child.atype {
                b"stsd" => stsd = Some(iter.read_atom::<StsdAtom>()?),
                b"stts" => stts = Some(iter.read_atom::<SttsAtom>()?),
                b"stsc" => stsc = Some(iter.read_atom::<StscAtom>()?),
                b"stsz" => stsz = Some(iter.read_atom::<StszAtom>()?),
                b"stco" => stco = Some(iter.read_atom::<StcoAtom>()?),
                b"co64" => co64 = Some(iter.read_atom::<Co64Atom>()?),
                _ => {}
            }
        }

        let chunk_offsets = match (stco, co64) {
            (Some(stco), _) => stco.chunk_offsets,
            (None, Some(co64)) => co64.chunk_offsets,
            (None, None) => {
                return malformed_container_error("isomp4 (stbl): missing chunk offset table")
            }
        };

        match (stsd, stts, stsc, stsz) {
            (Some(stsd), Some(stts), Some(stsc), Some(stsz)) => {
                Ok(StblAtom { stsd, stts, stsc, stsz, chunk_offsets })
            }
            _ => malformed_container_error("isomp4 (stbl): missing mandatory sample table"),
        }
    }
}
