// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use coda_core::errors::{malformed_container_error, Result};
use coda_core::io::ReadBytes;

use crate::atoms::{Atom, AtomHeader, AtomIterator, EdtsAtom, MdiaAtom};

/// Track atom.
#[derive(Debug)]
pub struct TrakAtom {
    pub edts: Option<EdtsAtom>,
    pub mdia: MdiaAtom,
}

impl Atom for TrakAtom {
    fn read<B: ReadBytes>(reader: &mut B, header: AtomHeader) -> Result<Self> {
        let mut iter = AtomIterator::new(reader, header);

        let mut edts = None;
        let mut mdia = None;

        while let Some(child) = iter.next()? {
            match &child.atype {
                b"edts" => edts = Some(iter.read_atom::<EdtsAtom>()?),
                b"mdia" => mdia = Some(iter.read_atom::<MdiaAtom>()?),
                // The track header carries no audio information this parser
                // needs.
                _ => {}
            }
        }

        match mdia {
            Some(mdia) => Ok(TrakAtom { edts, mdia }),
            None => malformed_container_error("isomp4 (trak): missing media atom"),
        }
    }
}
