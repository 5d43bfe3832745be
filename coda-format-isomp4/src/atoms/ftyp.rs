// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use coda_core::errors::{malformed_container_error, Result};
use coda_core::io::ReadBytes;

use crate::atoms::{Atom, AtomHeader};

/// File type atom.
#[derive(Debug)]
pub struct FtypAtom {
    pub major_brand: [u8; 4],
}

impl Atom for FtypAtom {
    fn read<B: ReadBytes>(reader: &mut B, header: AtomHeader) -> Result<Self> {
        let data_len = match header.data_len() {
            Some(len) if len >= 8 => len,
            _ => return malformed_container_error("isomp4 (ftyp): invalid atom size"),
        };

        let major_brand = reader.read_quad_bytes()?;
        // The minor version and compatible brands are not used.
        reader.ignore_bytes(data_len - 4)?;

        Ok(FtypAtom { major_brand })
    }
}
