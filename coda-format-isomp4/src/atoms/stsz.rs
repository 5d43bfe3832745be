// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use coda_core::errors::{malformed_container_error, Result};
use coda_core::io::ReadBytes;

use crate::atoms::{Atom, AtomHeader};

/// The byte sizes of a track's samples.
#[derive(Debug)]
pub enum SampleSize {
    Constant(u32),
    Variable(Vec<u32>),
}

/// Sample size atom.
#[derive(Debug)]
pub struct StszAtom {
    pub sample_count: u32,
    pub sample_sizes: SampleSize,
}

impl StszAtom {
    /// Gets the size of the sample at `index`.
    pub fn size(&self, index: u32) -> Option<u32> {
        if index >= self.sample_count {
            return None;
        }
        match &self.sample_sizes {
            SampleSize::Constant(size) => Some(*size),
            SampleSize::Variable(sizes) => sizes.get(index as usize).copied(),
        }
    }
}

impl Atom for StszAtom {
    fn read<B: ReadBytes>(reader: &mut B, mut header: AtomHeader) -> Result<Self> {
        let (_, _) = header.read_extended_header(reader)?;

        let len = match header.data_len() {
            Some(len) if len >= 8 => len,
            _ => return malformed_container_error("isomp4 (stsz): invalid atom size"),
        };

        let constant_size = reader.read_be_u32()?;
        let sample_count = reader.read_be_u32()?;

        let sample_sizes = if constant_size != 0 {
            SampleSize::Constant(constant_size)
        }
        else {
            if u64::from(sample_count) != (len - 8) / 4 {
                return malformed_container_error("isomp4 (stsz): invalid sample count");
            }

            let mut sizes = Vec::with_capacity(sample_count as usize);
            for _ in 0..sample_count {
                sizes.push(reader.read_be_u32()?);
            }
            SampleSize::Variable(sizes)
        };

        Ok(StszAtom { sample_count, sample_sizes })
    }
}
