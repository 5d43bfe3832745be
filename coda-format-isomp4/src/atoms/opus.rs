// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use coda_core::errors::{malformed_container_error, Result};
use coda_core::io::ReadBytes;

use crate::atoms::{Atom, AtomHeader};

/// Opus configuration atom.
///
/// The atom stores the identification header fields big-endian and without
/// the signature; the decoder expects the standard little-endian header, so
/// it is rebuilt here.
#[derive(Debug)]
pub struct OpusAtom {
    /// A standard identification header ("OpusHead").
    pub id_header: Box<[u8]>,
}

const OPUS_MAGIC: &[u8] = b"OpusHead";

impl Atom for OpusAtom {
    fn read<B: ReadBytes>(reader: &mut B, header: AtomHeader) -> Result<Self> {
        let len = match header.data_len() {
            // Version, channels, pre-skip, input rate, gain, mapping family.
            Some(len) if len >= 11 => len,
            _ => return malformed_container_error("isomp4 (dOps): invalid atom size"),
        };

        let version = reader.read_u8()?;
        if version != 0 {
            return malformed_container_error("isomp4 (dOps): invalid version");
        }

        let channels = reader.read_u8()?;
        let pre_skip = reader.read_be_u16()?;
        let input_sample_rate = reader.read_be_u32()?;
        let output_gain = reader.read_be_u16()?;
        let mapping_family = reader.read_u8()?;

        let mut id_header = Vec::with_capacity(OPUS_MAGIC.len() + len as usize);
        id_header.extend_from_slice(OPUS_MAGIC);
        id_header.push(1); // identification header version
        id_header.push(channels);
        id_header.extend_from_slice(&pre_skip.to_le_bytes());
        id_header.extend_from_slice(&input_sample_rate.to_le_bytes());
        id_header.extend_from_slice(&output_gain.to_le_bytes());
        id_header.push(mapping_family);

        if mapping_family != 0 {
            // The channel mapping table: stream counts then one entry per
            // channel.
            if len < 11 + 2 + u64::from(channels) {
                return malformed_container_error("isomp4 (dOps): truncated channel mapping");
            }
            id_header.push(reader.read_u8()?);
            id_header.push(reader.read_u8()?);
            for _ in 0..channels {
                id_header.push(reader.read_u8()?);
            }
        }

        Ok(OpusAtom { id_header: id_header.into_boxed_slice() })
    }
}
