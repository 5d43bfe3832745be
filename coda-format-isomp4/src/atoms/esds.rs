// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use coda_core::errors::{malformed_container_error, unsupported_format_error, Result};
use coda_core::io::ReadBytes;
use log::debug;

use crate::atoms::{Atom, AtomHeader};

const ES_DESCRIPTOR: u8 = 0x03;
const DECODER_CONFIG_DESCRIPTOR: u8 = 0x04;
const DECODER_SPECIFIC_DESCRIPTOR: u8 = 0x05;

/// MPEG-4 audio object type indication.
const OBJECT_TYPE_MPEG4_AUDIO: u8 = 0x40;

/// Elementary stream descriptor atom. Yields the decoder specific
/// configuration, i.e. the audio specific configuration for AAC.
#[derive(Debug)]
pub struct EsdsAtom {
    pub decoder_config: Box<[u8]>,
}

/// Reads a descriptor header: a tag and an expandable length of 7 bits per
/// byte with a continuation bit.
fn read_descriptor_header<B: ReadBytes>(reader: &mut B) -> Result<(u8, u32)> {
    let tag = reader.read_u8()?;

    let mut size = 0u32;
    for _ in 0..4 {
        let byte = reader.read_u8()?;
        size = (size << 7) | u32::from(byte & 0x7f);
        if byte & 0x80 == 0 {
            return Ok((tag, size));
        }
    }

    malformed_container_error("isomp4 (esds): descriptor length too long")
}

impl Atom for EsdsAtom {
    fn read<B: ReadBytes>(reader: &mut B, mut header: AtomHeader) -> Result<Self> {
        let (_, _) = header.read_extended_header(reader)?;

        let (tag, _) = read_descriptor_header(reader)?;
        if tag != ES_DESCRIPTOR {
            return malformed_container_error("isomp4 (esds): expected elementary stream descriptor");
        }

        // Elementary stream id.
        let _ = reader.read_be_u16()?;

        // Stream dependency, URL, and OCR fields are flagged in one byte.
        let flags = reader.read_u8()?;
        if flags & 0x80 != 0 {
            reader.ignore_bytes(2)?;
        }
        if flags & 0x40 != 0 {
            let url_len = reader.read_u8()?;
            reader.ignore_bytes(u64::from(url_len))?;
        }
        if flags & 0x20 != 0 {
            reader.ignore_bytes(2)?;
        }

        let (tag, _) = read_descriptor_header(reader)?;
        if tag != DECODER_CONFIG_DESCRIPTOR {
            return malformed_container_error("isomp4 (esds): expected decoder config descriptor");
        }

        let object_type = reader.read_u8()?;
        if object_type != OBJECT_TYPE_MPEG4_AUDIO {
            debug!("unsupported object type indication ({object_type:#x})");
            return unsupported_format_error("isomp4 (esds): unsupported object type");
        }

        // Stream type/buffer size, and the maximum and average bitrates.
        reader.ignore_bytes(4 + 4 + 4)?;

        let (tag, size) = read_descriptor_header(reader)?;
        if tag != DECODER_SPECIFIC_DESCRIPTOR {
            return malformed_container_error(
                "isomp4 (esds): expected decoder specific descriptor",
            );
        }

        let decoder_config = reader.read_boxed_slice_exact(size as usize)?;

        // Trailing descriptors (SL config) are skipped by the caller via the
        // atom length.

        Ok(EsdsAtom { decoder_config })
    }
}
