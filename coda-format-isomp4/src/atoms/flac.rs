// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use coda_core::errors::{malformed_container_error, Result};
use coda_core::io::ReadBytes;

use crate::atoms::{Atom, AtomHeader};

/// FLAC configuration atom: version/flags then metadata blocks, the first of
/// which must be the stream information block.
#[derive(Debug)]
pub struct FlacAtom {
    /// The 34-byte stream information block.
    pub stream_info: Box<[u8]>,
}

impl Atom for FlacAtom {
    fn read<B: ReadBytes>(reader: &mut B, mut header: AtomHeader) -> Result<Self> {
        let (_, _) = header.read_extended_header(reader)?;

        let len = match header.data_len() {
            // A block header plus the stream information block.
            Some(len) if len >= 4 + 34 => len,
            _ => return malformed_container_error("isomp4 (dfLa): invalid atom size"),
        };

        // The first metadata block must be stream information (type 0).
        let block_type = reader.read_u8()?;
        if block_type & 0x7f != 0 {
            return malformed_container_error("isomp4 (dfLa): expected stream information");
        }
        let block_len = reader.read_be_u24()?;
        if block_len != 34 {
            return malformed_container_error("isomp4 (dfLa): invalid stream information size");
        }

        let stream_info = reader.read_boxed_slice_exact(34)?;

        // Further metadata blocks are skipped by the caller via the atom
        // length.
        let _ = len;

        Ok(FlacAtom { stream_info })
    }
}
