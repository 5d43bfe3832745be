// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use coda_core::errors::Result;
use coda_core::io::ReadBytes;

use crate::atoms::{Atom, AtomHeader, AtomIterator, IlstAtom};

/// Metadata atom.
#[derive(Debug, Default)]
pub struct MetaAtom {
    pub ilst: Option<IlstAtom>,
}

impl Atom for MetaAtom {
    fn read<B: ReadBytes>(reader: &mut B, mut header: AtomHeader) -> Result<Self> {
        // The metadata atom is a full atom in this container family.
        let (_, _) = header.read_extended_header(reader)?;

        let mut iter = AtomIterator::new(reader, header);
        let mut ilst = None;

        while let Some(child) = iter.next()? {
            if &child.atype == b"ilst" {
                ilst = Some(iter.read_atom::<IlstAtom>()?);
            }
        }

        Ok(MetaAtom { ilst })
    }
}
