// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use coda_core::codecs::{
    CodecType, CODEC_TYPE_AAC, CODEC_TYPE_ALAC, CODEC_TYPE_FLAC, CODEC_TYPE_MP3, CODEC_TYPE_OPUS,
};
use coda_core::errors::{malformed_container_error, unsupported_format_error, Result};
use coda_core::io::ReadBytes;
use log::info;

use crate::atoms::{AlacAtom, Atom, AtomHeader, AtomIterator, EsdsAtom, FlacAtom, OpusAtom};

/// Sample description atom, reduced to the first audio sample entry.
#[derive(Debug)]
pub struct StsdAtom {
    pub codec: CodecType,
    pub sample_rate: u32,
    pub channels: u32,
    pub sample_size: u16,
    pub codec_config: Option<Box<[u8]>>,
}

impl Atom for StsdAtom {
    fn read<B: ReadBytes>(reader: &mut B, mut header: AtomHeader) -> Result<Self> {
        let (_, _) = header.read_extended_header(reader)?;

        let entry_count = reader.read_be_u32()?;
        if entry_count == 0 {
            return malformed_container_error("isomp4 (stsd): no sample entries");
        }

        // Only the first sample entry is used; a mid-stream description
        // change cannot be represented.
        let mut iter = AtomIterator::new(reader, header);

        let entry = match iter.next()? {
            Some(entry) => entry,
            None => return malformed_container_error("isomp4 (stsd): missing sample entry"),
        };

        let codec = match &entry.atype {
            b"mp4a" => CODEC_TYPE_AAC,
            b"alac" => CODEC_TYPE_ALAC,
            b"fLaC" => CODEC_TYPE_FLAC,
            b"Opus" => CODEC_TYPE_OPUS,
            b".mp3" => CODEC_TYPE_MP3,
            other => {
                info!("unsupported sample entry ({:?})", other);
                return unsupported_format_error("isomp4 (stsd): unsupported sample entry");
            }
        };

        let reader = iter.inner_mut();

        // Common audio sample entry fields.
        reader.ignore_bytes(6)?; // reserved
        let _data_ref_index = reader.read_be_u16()?;
        let version = reader.read_be_u16()?;
        reader.ignore_bytes(6)?; // revision and vendor
        let channels = u32::from(reader.read_be_u16()?);
        let sample_size = reader.read_be_u16()?;
        reader.ignore_bytes(4)?; // compression id and packet size
        let sample_rate = reader.read_be_u32()? >> 16; // 16.16 fixed point

        match version {
            0 => {}
            1 => {
                // The extended fields of a version 1 entry are not used.
                reader.ignore_bytes(16)?;
            }
            _ => return unsupported_format_error("isomp4 (stsd): unsupported sample entry version"),
        }

        // The codec configuration follows as child atoms of the entry.
        let mut codec_config = None;
        let mut children = AtomIterator::new(&mut *reader, entry);

        while let Some(child) = children.next()? {
            match &child.atype {
                b"esds" => {
                    codec_config = Some(children.read_atom::<EsdsAtom>()?.decoder_config);
                }
                b"alac" => {
                    codec_config = Some(children.read_atom::<AlacAtom>()?.magic_cookie);
                }
                b"dfLa" => {
                    codec_config = Some(children.read_atom::<FlacAtom>()?.stream_info);
                }
                b"dOps" => {
                    codec_config = Some(children.read_atom::<OpusAtom>()?.id_header);
                }
                _ => {}
            }
        }

        Ok(StsdAtom { codec, sample_rate, channels, sample_size, codec_config })
    }
}
