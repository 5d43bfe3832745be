// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use coda_core::errors::{malformed_container_error, Result};
use coda_core::io::ReadBytes;
use coda_core::meta::{StandardTagKey, Tag, Value};

use crate::atoms::{Atom, AtomHeader, AtomIterator};

/// The type indicator of a UTF-8 value payload.
const DATA_TYPE_UTF8: u32 = 1;
/// The type indicator of a big-endian signed integer payload.
const DATA_TYPE_SIGNED_INT: u32 = 21;

/// Metadata item list atom.
#[derive(Debug, Default)]
pub struct IlstAtom {
    pub tags: Vec<Tag>,
}

impl Atom for IlstAtom {
    fn read<B: ReadBytes>(reader: &mut B, header: AtomHeader) -> Result<Self> {
        let mut iter = AtomIterator::new(reader, header);
        let mut tags = Vec::new();

        while let Some(item) = iter.next()? {
            let item_type = item.atype;

            match &item_type {
                // A freeform item: a reverse-DNS meaning, a name, and a
                // value.
                b"----" => {
                    if let Some(tag) = read_freeform_item(&mut iter, item)? {
                        tags.push(tag);
                    }
                }
                _ => {
                    if let Some(value) = read_item_value(&mut iter, item)? {
                        let key = String::from_utf8_lossy(&item_type).into_owned();
                        tags.push(Tag { std_key: std_key_for(&item_type), key, value });
                    }
                }
            }
        }

        Ok(IlstAtom { tags })
    }
}

fn std_key_for(item_type: &[u8; 4]) -> Option<StandardTagKey> {
    let key = match item_type {
        b"\xa9alb" => StandardTagKey::Album,
        b"aART" => StandardTagKey::AlbumArtist,
        b"\xa9ART" => StandardTagKey::Artist,
        b"\xa9cmt" => StandardTagKey::Comment,
        b"cpil" => StandardTagKey::Compilation,
        b"\xa9wrt" => StandardTagKey::Composer,
        b"cprt" => StandardTagKey::Copyright,
        b"\xa9day" => StandardTagKey::Date,
        b"\xa9gen" => StandardTagKey::Genre,
        b"\xa9lyr" => StandardTagKey::Lyrics,
        b"tmpo" => StandardTagKey::TempoBpm,
        b"trkn" => StandardTagKey::TrackNumber,
        b"\xa9nam" => StandardTagKey::TrackTitle,
        b"\xa9too" => StandardTagKey::Encoder,
        _ => return None,
    };
    Some(key)
}

/// Reads the `data` child of a metadata item and converts its payload.
fn read_item_value<B: ReadBytes>(
    iter: &mut AtomIterator<B>,
    item: AtomHeader,
) -> Result<Option<Value>> {
    let mut children = AtomIterator::new(iter.inner_mut(), item);
    let mut value = None;

    while let Some(child) = children.next()? {
        if &child.atype == b"data" {
            value = Some(read_data_value(children.inner_mut(), child)?);
        }
    }

    Ok(value)
}

/// Reads a freeform metadata item: `mean` and `name` children select the key,
/// a `data` child carries the value.
fn read_freeform_item<B: ReadBytes>(
    iter: &mut AtomIterator<B>,
    item: AtomHeader,
) -> Result<Option<Tag>> {
    let mut children = AtomIterator::new(iter.inner_mut(), item);

    let mut name = None;
    let mut value = None;

    while let Some(child) = children.next()? {
        match &child.atype {
            // The meaning (a reverse-DNS namespace) does not disambiguate
            // any key this reader consumes.
            b"mean" => {}
            b"name" => {
                let mut header = child;
                let reader = children.inner_mut();
                let (_, _) = header.read_extended_header(reader)?;
                let len = match header.data_len() {
                    Some(len) => len,
                    None => {
                        return malformed_container_error("isomp4 (ilst): unsized name atom")
                    }
                };
                let buf = reader.read_boxed_slice_exact(len as usize)?;
                name = Some(String::from_utf8_lossy(&buf).into_owned());
            }
            b"data" => {
                let reader = children.inner_mut();
                value = Some(read_data_value(reader, child)?);
            }
            _ => {}
        }
    }

    match (name, value) {
        (Some(name), Some(value)) => Ok(Some(Tag { std_key: None, key: name, value })),
        _ => Ok(None),
    }
}

/// Reads a `data` atom payload: a type indicator, a locale, and the value.
fn read_data_value<B: ReadBytes>(reader: &mut B, header: AtomHeader) -> Result<Value> {
    let data_len = match header.data_len() {
        Some(len) if len >= 8 => len - 8,
        _ => return malformed_container_error("isomp4 (ilst): invalid data atom"),
    };

    // The upper byte of the type indicator is a version and must be 0.
    let type_indicator = reader.read_be_u32()? & 0x00ff_ffff;
    // The locale is not used.
    let _ = reader.read_be_u32()?;

    let buf = reader.read_boxed_slice_exact(data_len as usize)?;

    let value = match type_indicator {
        DATA_TYPE_UTF8 => Value::String(String::from_utf8_lossy(&buf).into_owned()),
        DATA_TYPE_SIGNED_INT => {
            // Integers are stored big-endian at their natural width.
            let mut acc = 0u64;
            for &byte in buf.iter().take(8) {
                acc = (acc << 8) | u64::from(byte);
            }
            Value::UnsignedInt(acc)
        }
        _ => Value::Binary(buf),
    };

    Ok(value)
}
