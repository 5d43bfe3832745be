// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use coda_core::errors::{malformed_container_error, Result};
use coda_core::io::ReadBytes;

use crate::atoms::{Atom, AtomHeader, AtomIterator, HdlrAtom, MdhdAtom, MinfAtom};

/// Media atom.
#[derive(Debug)]
pub struct MdiaAtom {
    pub mdhd: MdhdAtom,
    pub hdlr: HdlrAtom,
    pub minf: MinfAtom,
}

impl Atom for MdiaAtom {
    fn read<B: ReadBytes>(reader: &mut B, header: AtomHeader) -> Result<Self> {
        let mut iter = AtomIterator::new(reader, header);

        let mut mdhd = None;
        let mut hdlr = None;
        let mut minf = None;

        while let Some(child) = iter.next()? {
            match &child.atype {
                b"mdhd" => mdhd = Some(iter.read_atom::<MdhdAtom>()?),
                b"hdlr" => hdlr = Some(iter.read_atom::<HdlrAtom>()?),
                b"minf" => minf = Some(iter.read_atom::<MinfAtom>()?),
                _ => {}
            }
        }

        match (mdhd, hdlr, minf) {
            (Some(mdhd), Some(hdlr), Some(minf)) => Ok(MdiaAtom { mdhd, hdlr, minf }),
            _ => malformed_container_error("isomp4 (mdia): missing mandatory atom"),
        }
    }
}
