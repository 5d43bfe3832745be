// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end pipeline tests over synthesized chunk-based containers.

mod common;

use std::io::Cursor;

use coda::core::codecs::NoEngines;
use coda::core::formats::FormatOptions;
use coda::core::source::Source;
use coda::open_source;
use common::{ramp_frames, ramp_value, PassthroughEngines};

fn push_chunk(out: &mut Vec<u8>, tag: &[u8; 4], body: &[u8]) {
    out.extend_from_slice(tag);
    out.extend_from_slice(&(body.len() as i64).to_be_bytes());
    out.extend_from_slice(body);
}

fn desc_chunk(
    format_id: &[u8; 4],
    bytes_per_packet: u32,
    frames_per_packet: u32,
    bits: u32,
) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&44_100.0f64.to_be_bytes());
    body.extend_from_slice(format_id);
    body.extend_from_slice(&0u32.to_be_bytes()); // format flags
    body.extend_from_slice(&bytes_per_packet.to_be_bytes());
    body.extend_from_slice(&frames_per_packet.to_be_bytes());
    body.extend_from_slice(&2u32.to_be_bytes()); // channels
    body.extend_from_slice(&bits.to_be_bytes());
    body
}

/// A 44.1 kHz 16-bit big-endian stereo PCM file of `frames` ramp frames.
fn lpcm_file(frames: usize) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"caff");
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());

    push_chunk(&mut out, b"desc", &desc_chunk(b"lpcm", 4, 1, 16));

    let mut data = Vec::new();
    data.extend_from_slice(&0u32.to_be_bytes()); // edit count
    data.extend_from_slice(&ramp_frames(0, frames));
    push_chunk(&mut out, b"data", &data);

    out
}

/// A compressed file whose packets are passthrough PCM: `packet_frames`
/// frames per table entry, with the given priming header fields.
fn compressed_file(packet_frames: &[usize], priming: i32, remainder: i32, valid: i64) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"caff");
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());

    push_chunk(&mut out, b"desc", &desc_chunk(b"alac", 0, 4096, 0));

    // A minimal valid magic cookie: 4096-frame packets, 16-bit, stereo.
    let mut kuki = Vec::new();
    kuki.extend_from_slice(&4096u32.to_be_bytes());
    kuki.push(0);
    kuki.push(16);
    kuki.extend_from_slice(&[40, 10, 14]);
    kuki.push(2);
    kuki.extend_from_slice(&255u16.to_be_bytes());
    kuki.extend_from_slice(&0u32.to_be_bytes());
    kuki.extend_from_slice(&0u32.to_be_bytes());
    kuki.extend_from_slice(&44_100u32.to_be_bytes());
    push_chunk(&mut out, b"kuki", &kuki);

    let mut pakt = Vec::new();
    pakt.extend_from_slice(&(packet_frames.len() as i64).to_be_bytes());
    pakt.extend_from_slice(&valid.to_be_bytes());
    pakt.extend_from_slice(&priming.to_be_bytes());
    pakt.extend_from_slice(&remainder.to_be_bytes());
    for frames in packet_frames {
        // Packet byte sizes as variable-length integers.
        let size = frames * 4;
        assert!(size < (1 << 21));
        pakt.push(0x80 | ((size >> 14) as u8 & 0x7f));
        pakt.push(0x80 | ((size >> 7) as u8 & 0x7f));
        pakt.push(size as u8 & 0x7f);
    }
    push_chunk(&mut out, b"pakt", &pakt);

    let mut data = Vec::new();
    data.extend_from_slice(&0u32.to_be_bytes());
    let mut start = 0;
    for frames in packet_frames {
        data.extend_from_slice(&ramp_frames(start, *frames));
        start += frames;
    }
    push_chunk(&mut out, b"data", &data);

    out
}

fn open_lpcm(frames: usize) -> Source {
    open_source(
        Box::new(Cursor::new(lpcm_file(frames))),
        &NoEngines,
        &FormatOptions::default(),
    )
    .unwrap()
}

#[test]
fn verify_lpcm_length_and_single_read() {
    // A 1000-frame 44.1 kHz 16-bit stereo payload at 4 bytes per frame.
    let mut source = open_lpcm(1000);

    assert_eq!(source.length(), 1000);
    assert_eq!(source.sample_format().sample_rate, 44_100);
    assert_eq!(source.sample_format().channels, 2);

    // A single read returns exactly the whole payload.
    let mut dest = vec![0i32; 1000 * 2];
    assert_eq!(source.read_samples(&mut dest).unwrap(), 1000);

    for i in 0..1000 {
        assert_eq!(dest[i * 2], ramp_value(i));
    }

    assert_eq!(source.read_samples(&mut dest).unwrap(), 0);
}

#[test]
fn verify_lpcm_seek_matches_sequential_read() {
    // With no cross-packet dependency, a seek must land on exactly the frame
    // a sequential read would have produced.
    let mut source = open_lpcm(3000);

    let mut reference = vec![0i32; 3000 * 2];
    assert_eq!(source.read_samples(&mut reference).unwrap(), 3000);

    for target in [0usize, 1, 1151, 1152, 1153, 2047, 2999] {
        source.seek_to(target as u64).unwrap();

        let mut dest = [0i32; 16];
        let got = source.read_samples(&mut dest).unwrap();
        assert!(got >= 1);
        for frame in 0..got {
            assert_eq!(dest[frame * 2], reference[(target + frame) * 2]);
            assert_eq!(dest[frame * 2 + 1], reference[(target + frame) * 2 + 1]);
        }
    }
}

#[test]
fn verify_compressed_read_and_seek() {
    let total = 4096 + 4096 + 1000;
    let file = compressed_file(&[4096, 4096, 1000], 0, 0, total as i64);

    let mut source = open_source(
        Box::new(Cursor::new(file)),
        &PassthroughEngines,
        &FormatOptions::default(),
    )
    .unwrap();

    assert_eq!(source.length(), total as u64);

    let mut dest = vec![0i32; total * 2];
    assert_eq!(source.read_samples(&mut dest).unwrap(), total);
    for i in 0..total {
        assert_eq!(dest[i * 2], ramp_value(i));
    }

    // Seek to a mid-packet position: the packet cursor floors to the packet
    // boundary and the remainder is skipped frame-accurately.
    source.seek_to(5000).unwrap();
    let mut dest = [0i32; 8];
    assert_eq!(source.read_samples(&mut dest).unwrap(), 4);
    assert_eq!(dest[0], ramp_value(5000));
}

#[test]
fn verify_compressed_priming_is_trimmed() {
    // 300 priming frames and 100 trailing frames around 8000 valid frames.
    let total = 300 + 8000 + 100;
    let file = compressed_file(&[4096, 4096, total - 8192], 300, 100, 8000);

    let mut source = open_source(
        Box::new(Cursor::new(file)),
        &PassthroughEngines,
        &FormatOptions::default(),
    )
    .unwrap();

    assert_eq!(source.length(), 8000);

    let mut dest = vec![0i32; 8100 * 2];
    assert_eq!(source.read_samples(&mut dest).unwrap(), 8000);

    // The priming frames are never exposed, and the trailing remainder is
    // cut off.
    assert_eq!(dest[0], ramp_value(300));
    assert_eq!(dest[7999 * 2], ramp_value(300 + 7999));
}
