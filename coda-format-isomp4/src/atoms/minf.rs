// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use coda_core::errors::{malformed_container_error, Result};
use coda_core::io::ReadBytes;

use crate::atoms::{Atom, AtomHeader, AtomIterator, StblAtom};

/// Media information atom.
#[derive(Debug)]
pub struct MinfAtom {
    pub stbl: StblAtom,
}

impl Atom for MinfAtom {
    fn read<B: ReadBytes>(reader: &mut B, header: AtomHeader) -> Result<Self> {
        let mut iter = AtomIterator::new(reader, header);
        let mut stbl = None;

        while let Some(child) = iter.next()? {
            if &child.atype == b"stbl" {
                stbl = Some(iter.read_atom::<StblAtom>()?);
            }
        }

        match stbl {
            Some(stbl) => Ok(MinfAtom { stbl }),
            None => malformed_container_error("isomp4 (minf): missing sample table"),
        }
    }
}
