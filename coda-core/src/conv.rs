// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `conv` module provides pure, stateless sample-width conversion
//! helpers used by packet decoders to normalize codec-native sample widths to
//! the canonical output width.
//!
//! All helpers treat a sample as a big-endian string of bytes and branch only
//! on width. Little-endian data must be [`byte_swap`]ed first.

/// Widens each `src_width`-byte sample in `src` to `dest_width` bytes in
/// `dest`, left-justifying the sample into the most-significant bytes of the
/// wider container and zeroing the rest.
///
/// Panics if `dest_width < src_width`, if `src` is not a whole number of
/// samples, or if `dest` is not exactly as long as the widened data.
pub fn unpack(src: &[u8], dest: &mut [u8], src_width: usize, dest_width: usize) {
    assert!(src_width > 0 && src_width <= dest_width);
    assert!(src.len() % src_width == 0);

    let count = src.len() / src_width;
    assert!(dest.len() == count * dest_width);

    for (src_sample, dest_sample) in
        src.chunks_exact(src_width).zip(dest.chunks_exact_mut(dest_width))
    {
        dest_sample[..src_width].copy_from_slice(src_sample);
        dest_sample[src_width..].fill(0);
    }
}

/// Narrows each `src_width`-byte sample in `src` to `dest_width` bytes in
/// `dest` by dropping the least-significant bytes. The inverse of [`unpack`]
/// whenever the dropped bytes are zero.
///
/// Panics under the same conditions as [`unpack`], with the widths reversed.
pub fn pack(src: &[u8], dest: &mut [u8], src_width: usize, dest_width: usize) {
    assert!(dest_width > 0 && dest_width <= src_width);
    assert!(src.len() % src_width == 0);

    let count = src.len() / src_width;
    assert!(dest.len() == count * dest_width);

    for (src_sample, dest_sample) in
        src.chunks_exact(src_width).zip(dest.chunks_exact_mut(dest_width))
    {
        dest_sample.copy_from_slice(&src_sample[..dest_width]);
    }
}

/// Toggles the sign bit of each `width`-byte sample in `buf`, converting
/// between offset-binary and two's-complement PCM in either direction.
pub fn convert_sign(buf: &mut [u8], width: usize) {
    assert!(width > 0);
    assert!(buf.len() % width == 0);

    for sample in buf.chunks_exact_mut(width) {
        sample[0] ^= 0x80;
    }
}

/// Reverses the byte order of each `width`-byte sample in `buf`.
pub fn byte_swap(buf: &mut [u8], width: usize) {
    assert!(width > 0);
    assert!(buf.len() % width == 0);

    for sample in buf.chunks_exact_mut(width) {
        sample.reverse();
    }
}

/// Widens each big-endian two's-complement sample of `bytes_per_sample` bytes
/// into a left-justified `i32`, the canonical in-memory sample.
///
/// Panics if `bytes_per_sample` is not in `1..=4`, if `src` is not a whole
/// number of samples, or if `dest` is shorter than the number of samples.
pub fn widen_be_to_i32(src: &[u8], bytes_per_sample: usize, dest: &mut [i32]) {
    assert!(bytes_per_sample >= 1 && bytes_per_sample <= 4);
    assert!(src.len() % bytes_per_sample == 0);

    let count = src.len() / bytes_per_sample;
    assert!(dest.len() >= count);

    let shift = 8 * (4 - bytes_per_sample);

    for (src_sample, dest_sample) in src.chunks_exact(bytes_per_sample).zip(dest.iter_mut()) {
        let mut value = 0u32;
        for &byte in src_sample {
            value = (value << 8) | u32::from(byte);
        }
        *dest_sample = (value << shift) as i32;
    }
}

#[cfg(test)]
mod tests {
    use super::{byte_swap, convert_sign, pack, unpack, widen_be_to_i32};

    #[test]
    fn verify_unpack_left_justifies() {
        let src = [0x12, 0x34, 0xab, 0xcd];
        let mut dest = [0u8; 8];
        unpack(&src, &mut dest, 2, 4);
        assert_eq!(dest, [0x12, 0x34, 0x00, 0x00, 0xab, 0xcd, 0x00, 0x00]);
    }

    #[test]
    fn verify_pack_unpack_round_trip() {
        // Every width pair where no precision is lost.
        for (narrow, wide) in [(1, 2), (1, 4), (2, 3), (2, 4), (3, 4)] {
            let src: Vec<u8> = (0u8..12).map(|v| v.wrapping_mul(37)).collect();
            let src = &src[..(12 / narrow) * narrow];

            let count = src.len() / narrow;
            let mut widened = vec![0u8; count * wide];
            unpack(src, &mut widened, narrow, wide);

            let mut narrowed = vec![0u8; src.len()];
            pack(&widened, &mut narrowed, wide, narrow);
            assert_eq!(narrowed, src);
        }
    }

    #[test]
    fn verify_convert_sign_is_involutive() {
        let mut buf = [0x00, 0x01, 0x7f, 0xff, 0x80, 0x00];
        convert_sign(&mut buf, 2);
        assert_eq!(buf, [0x80, 0x01, 0xff, 0xff, 0x00, 0x00]);
        convert_sign(&mut buf, 2);
        assert_eq!(buf, [0x00, 0x01, 0x7f, 0xff, 0x80, 0x00]);
    }

    #[test]
    fn verify_byte_swap() {
        let mut buf = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06];
        byte_swap(&mut buf, 3);
        assert_eq!(buf, [0x03, 0x02, 0x01, 0x06, 0x05, 0x04]);
        byte_swap(&mut buf, 3);
        assert_eq!(buf, [0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
    }

    #[test]
    fn verify_widen_be_to_i32() {
        let mut dest = [0i32; 2];

        widen_be_to_i32(&[0x12, 0x34, 0xff, 0xfe], 2, &mut dest);
        assert_eq!(dest, [0x1234_0000, 0xfffe_0000u32 as i32]);

        widen_be_to_i32(&[0x80, 0x00, 0x01, 0x7f, 0xff, 0xff], 3, &mut dest);
        assert_eq!(dest, [0x8000_0100u32 as i32, 0x7fff_ff00]);
    }
}
