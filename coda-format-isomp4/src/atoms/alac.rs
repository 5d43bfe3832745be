// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use coda_core::errors::{malformed_container_error, Result};
use coda_core::io::ReadBytes;

use crate::atoms::{Atom, AtomHeader};

/// ALAC configuration atom: the magic cookie, stored verbatim.
#[derive(Debug)]
pub struct AlacAtom {
    pub magic_cookie: Box<[u8]>,
}

impl Atom for AlacAtom {
    fn read<B: ReadBytes>(reader: &mut B, mut header: AtomHeader) -> Result<Self> {
        let (_, _) = header.read_extended_header(reader)?;

        let len = match header.data_len() {
            // The mandatory part of the cookie is 24 bytes.
            Some(len) if len >= 24 => len,
            _ => return malformed_container_error("isomp4 (alac): invalid atom size"),
        };

        let magic_cookie = reader.read_boxed_slice_exact(len as usize)?;
        Ok(AlacAtom { magic_cookie })
    }
}
