// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use coda_core::errors::{malformed_container_error, Result};
use coda_core::io::ReadBytes;

pub(crate) mod alac;
pub(crate) mod co64;
pub(crate) mod edts;
pub(crate) mod elst;
pub(crate) mod esds;
pub(crate) mod flac;
pub(crate) mod ftyp;
pub(crate) mod hdlr;
pub(crate) mod ilst;
pub(crate) mod mdhd;
pub(crate) mod mdia;
pub(crate) mod meta;
pub(crate) mod minf;
pub(crate) mod moov;
pub(crate) mod mvhd;
pub(crate) mod opus;
pub(crate) mod stbl;
pub(crate) mod stco;
pub(crate) mod stsc;
pub(crate) mod stsd;
pub(crate) mod stsz;
pub(crate) mod stts;
pub(crate) mod trak;
pub(crate) mod udta;

pub use alac::AlacAtom;
pub use co64::Co64Atom;
pub use edts::EdtsAtom;
pub use elst::ElstAtom;
pub use esds::EsdsAtom;
pub use flac::FlacAtom;
pub use ftyp::FtypAtom;
pub use hdlr::HdlrAtom;
pub use ilst::IlstAtom;
pub use mdhd::MdhdAtom;
pub use mdia::MdiaAtom;
pub use meta::MetaAtom;
pub use minf::MinfAtom;
pub use moov::MoovAtom;
pub use mvhd::MvhdAtom;
pub use opus::OpusAtom;
pub use stbl::StblAtom;
pub use stco::StcoAtom;
pub use stsc::StscAtom;
pub use stsd::StsdAtom;
pub use stsz::StszAtom;
pub use stts::SttsAtom;
pub use trak::TrakAtom;
pub use udta::UdtaAtom;

/// Common atom header: a 4-character type and a total size. A size of 1
/// escapes to a 64-bit size; a size of 0 extends the atom to the end of the
/// stream.
#[derive(Copy, Clone, Debug)]
pub struct AtomHeader {
    /// The atom type.
    pub atype: [u8; 4],
    /// The position of the atom.
    pub atom_pos: u64,
    /// The size of all read headers.
    header_len: u64,
    /// The total size of the atom including headers, if known.
    atom_len: Option<u64>,
}

impl AtomHeader {
    /// Size of a standard atom header.
    const HEADER_SIZE: u64 = 8;
    /// Size of an atom header with a 64-bit size.
    const LARGE_HEADER_SIZE: u64 = AtomHeader::HEADER_SIZE + 8;

    /// Reads an atom header.
    pub fn read<B: ReadBytes>(reader: &mut B) -> Result<AtomHeader> {
        let atom_pos = reader.pos();

        let atom_len = u64::from(reader.read_be_u32()?);
        let atype = reader.read_quad_bytes()?;

        let (header_len, atom_len) = match atom_len {
            // The atom spans the remainder of the stream.
            0 => (AtomHeader::HEADER_SIZE, None),
            // A 64-bit atom size follows.
            1 => {
                let large_len = reader.read_be_u64()?;
                if large_len < AtomHeader::LARGE_HEADER_SIZE {
                    return malformed_container_error("isomp4: atom size is invalid");
                }
                (AtomHeader::LARGE_HEADER_SIZE, Some(large_len))
            }
            len => {
                if len < AtomHeader::HEADER_SIZE {
                    return malformed_container_error("isomp4: atom size is invalid");
                }
                (AtomHeader::HEADER_SIZE, Some(len))
            }
        };

        Ok(AtomHeader { atype, atom_pos, header_len, atom_len })
    }

    /// If the atom size is known, gets the total payload size.
    pub fn data_len(&self) -> Option<u64> {
        self.atom_len.map(|len| len - self.header_len)
    }

    /// Given a position, and if the atom size is known, calculates the amount
    /// of unread payload data.
    pub fn data_unread_at(&self, pos: u64) -> Option<u64> {
        self.atom_len.map(|atom_len| {
            let data_end = self.atom_pos + atom_len;
            data_end.saturating_sub(pos)
        })
    }

    /// Reads the version and flags fields of a full atom.
    ///
    /// On success, consumes 4 bytes of the payload.
    pub fn read_extended_header<B: ReadBytes>(&mut self, reader: &mut B) -> Result<(u8, u32)> {
        if let Some(data_len) = self.data_len() {
            if data_len < 4 {
                return malformed_container_error("isomp4: full atom too small");
            }
        }

        let header = (reader.read_u8()?, reader.read_be_u24()?);
        self.header_len += 4;

        Ok(header)
    }
}

/// An atom that can be read from a stream given its header.
pub trait Atom: Sized {
    fn read<B: ReadBytes>(reader: &mut B, header: AtomHeader) -> Result<Self>;
}

/// Iterates the atoms of a stream or of a parent atom's payload, skipping
/// whatever the caller does not consume.
pub struct AtomIterator<B: ReadBytes> {
    reader: B,
    /// The exclusive end position of the iterated region, if bounded.
    end_pos: Option<u64>,
    cur_atom: Option<AtomHeader>,
    next_atom_pos: u64,
}

impl<B: ReadBytes> AtomIterator<B> {
    /// Iterates the root atoms of a stream. `len` bounds the stream when its
    /// total length is known.
    pub fn new_root(reader: B, len: Option<u64>) -> Self {
        let base_pos = reader.pos();
        AtomIterator { reader, end_pos: len, cur_atom: None, next_atom_pos: base_pos }
    }

    /// Iterates the child atoms of `parent`.
    pub fn new(reader: B, parent: AtomHeader) -> Self {
        let base_pos = reader.pos();
        AtomIterator {
            end_pos: parent.data_unread_at(base_pos).map(|rem| base_pos + rem),
            reader,
            cur_atom: None,
            next_atom_pos: base_pos,
        }
    }

    pub fn inner_mut(&mut self) -> &mut B {
        &mut self.reader
    }

    /// Advances to the next atom, skipping any unread payload of the current
    /// one, and returns its header. Returns `None` at the end of the region.
    pub fn next(&mut self) -> Result<Option<AtomHeader>> {
        let cur_pos = self.reader.pos();

        if cur_pos < self.next_atom_pos {
            self.reader.ignore_bytes(self.next_atom_pos - cur_pos)?;
        }
        else if cur_pos > self.next_atom_pos {
            // The atom's declared length was wrong, or a handler overread.
            return malformed_container_error("isomp4: overread atom");
        }

        if let Some(end_pos) = self.end_pos {
            if self.next_atom_pos >= end_pos {
                return Ok(None);
            }
        }

        let atom = AtomHeader::read(&mut self.reader)?;

        self.next_atom_pos = match atom.atom_len {
            // An atom spanning the remainder of the region ends it.
            None => self.end_pos.unwrap_or(u64::MAX),
            Some(len) => atom.atom_pos + len,
        };

        self.cur_atom = Some(atom);
        Ok(self.cur_atom)
    }

    /// Reads the current atom. May be called at most once per advance.
    pub fn read_atom<A: Atom>(&mut self) -> Result<A> {
        // The stream cannot rewind to re-read an atom.
        assert!(self.cur_atom.is_some());
        A::read(&mut self.reader, self.cur_atom.take().unwrap())
    }
}
