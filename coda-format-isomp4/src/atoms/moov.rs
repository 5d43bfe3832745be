// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use coda_core::errors::{malformed_container_error, Result};
use coda_core::io::ReadBytes;

use crate::atoms::{Atom, AtomHeader, AtomIterator, MvhdAtom, TrakAtom, UdtaAtom};

/// Movie atom.
#[derive(Debug)]
pub struct MoovAtom {
    pub mvhd: MvhdAtom,
    pub traks: Vec<TrakAtom>,
    pub udta: Option<UdtaAtom>,
}

impl Atom for MoovAtom {
    fn read<B: ReadBytes>(reader: &mut B, header: AtomHeader) -> Result<Self> {
        let mut iter = AtomIterator::new(reader, header);

        let mut mvhd = None;
        let mut traks = Vec::new();
        let mut udta = None;

        while let Some(child) = iter.next()? {
            match &child.atype {
                b"mvhd" => mvhd = Some(iter.read_atom::<MvhdAtom>()?),
                b"trak" => traks.push(iter.read_atom::<TrakAtom>()?),
                b"udta" => udta = Some(iter.read_atom::<UdtaAtom>()?),
                _ => {}
            }
        }

        match mvhd {
            Some(mvhd) => Ok(MoovAtom { mvhd, traks, udta }),
            None => malformed_container_error("isomp4 (moov): missing movie header"),
        }
    }
}
