// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use coda_core::errors::{malformed_container_error, Result};
use coda_core::io::ReadBytes;

use crate::atoms::{Atom, AtomHeader};

/// Movie header atom.
#[derive(Debug)]
pub struct MvhdAtom {
    /// The movie (presentation) timescale in units per second.
    pub timescale: u32,
    /// The presentation duration in movie timescale units.
    pub duration: u64,
}

impl Atom for MvhdAtom {
    fn read<B: ReadBytes>(reader: &mut B, mut header: AtomHeader) -> Result<Self> {
        let (version, _) = header.read_extended_header(reader)?;

        let (timescale, duration) = match version {
            0 => {
                // Creation and modification times.
                reader.ignore_bytes(8)?;
                (reader.read_be_u32()?, u64::from(reader.read_be_u32()?))
            }
            1 => {
                reader.ignore_bytes(16)?;
                (reader.read_be_u32()?, reader.read_be_u64()?)
            }
            _ => return malformed_container_error("isomp4 (mvhd): invalid version"),
        };

        if timescale == 0 {
            return malformed_container_error("isomp4 (mvhd): timescale cannot be 0");
        }

        // The rate, volume, matrix, and next-track fields are not used.

        Ok(MvhdAtom { timescale, duration })
    }
}
