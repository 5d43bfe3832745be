// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use coda_core::errors::Result;
use coda_core::io::ReadBytes;

use crate::atoms::{Atom, AtomHeader, AtomIterator, MetaAtom};

/// User data atom.
#[derive(Debug, Default)]
pub struct UdtaAtom {
    pub meta: Option<MetaAtom>,
}

impl Atom for UdtaAtom {
    fn read<B: ReadBytes>(reader: &mut B, header: AtomHeader) -> Result<Self> {
        let mut iter = AtomIterator::new(reader, header);
        let mut meta = None;

        while let Some(child) = iter.next()? {
            if &child.atype == b"meta" {
                meta = Some(iter.read_atom::<MetaAtom>()?);
            }
        }

        Ok(UdtaAtom { meta })
    }
}
