// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `fifo` module provides a growable ring buffer of interleaved audio
//! frames with reserve/commit producer semantics and read/advance consumer
//! semantics.

/// A `SampleFifo` is a growable ring buffer of fixed-stride frames, where the
/// stride is the number of interleaved samples per frame (the channel count).
///
/// The producer calls [`reserve`](SampleFifo::reserve) to make room,
/// writes into [`write_buf`](SampleFifo::write_buf), then
/// [`commit`](SampleFifo::commit)s. The consumer reads from
/// [`read_buf`](SampleFifo::read_buf) (or copies with
/// [`read`](SampleFifo::read)) and [`advance`](SampleFifo::advance)s.
///
/// The invariant `0 <= read_pos <= write_pos <= capacity` holds after every
/// operation. All positions and counts are in frames.
pub struct SampleFifo<S: Copy + Default> {
    buf: Vec<S>,
    /// Samples per frame.
    stride: usize,
    /// First unread frame.
    read_pos: usize,
    /// First unwritten frame.
    write_pos: usize,
}

impl<S: Copy + Default> SampleFifo<S> {
    /// Creates an empty FIFO for frames of `stride` interleaved samples.
    /// Panics if `stride` is 0.
    pub fn new(stride: usize) -> Self {
        assert!(stride > 0, "frame stride cannot be 0");
        SampleFifo { buf: Vec::new(), stride, read_pos: 0, write_pos: 0 }
    }

    /// Gets the number of samples per frame.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Gets the number of unread frames.
    pub fn count(&self) -> usize {
        self.write_pos - self.read_pos
    }

    /// Gets the current capacity in frames.
    pub fn capacity(&self) -> usize {
        self.buf.len() / self.stride
    }

    /// Discards all buffered frames.
    pub fn reset(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
    }

    /// Ensures there is room to write `frames` more frames, compacting unread
    /// data to the front of the buffer before growing it if needed.
    pub fn reserve(&mut self, frames: usize) {
        if self.capacity() - self.write_pos >= frames {
            return;
        }

        // Compact unread frames to the front.
        if self.read_pos > 0 {
            let count = self.count();
            self.buf.copy_within(
                self.read_pos * self.stride..self.write_pos * self.stride,
                0,
            );
            self.read_pos = 0;
            self.write_pos = count;
        }

        let needed = (self.write_pos + frames) * self.stride;
        if needed > self.buf.len() {
            self.buf.resize(needed, S::default());
        }
    }

    /// Gets the writable region for the next `frames` frames. The region must
    /// have been made available with [`reserve`](SampleFifo::reserve); panics
    /// otherwise. Written frames are not visible until committed.
    pub fn write_buf(&mut self, frames: usize) -> &mut [S] {
        assert!(
            self.capacity() - self.write_pos >= frames,
            "write region exceeds reserved capacity"
        );
        let start = self.write_pos * self.stride;
        &mut self.buf[start..start + frames * self.stride]
    }

    /// Makes `frames` previously written frames visible to the consumer.
    pub fn commit(&mut self, frames: usize) {
        assert!(self.capacity() - self.write_pos >= frames, "commit exceeds reserved capacity");
        self.write_pos += frames;
    }

    /// Gets the readable region containing all unread frames.
    pub fn read_buf(&self) -> &[S] {
        &self.buf[self.read_pos * self.stride..self.write_pos * self.stride]
    }

    /// Discards `frames` frames from the front of the readable region.
    pub fn advance(&mut self, frames: usize) {
        assert!(frames <= self.count(), "advance exceeds unread frame count");
        self.read_pos += frames;
        if self.read_pos == self.write_pos {
            self.read_pos = 0;
            self.write_pos = 0;
        }
    }

    /// Copies up-to `dest.len() / stride` frames into `dest` and advances past
    /// them. Returns the number of frames copied.
    pub fn read(&mut self, dest: &mut [S]) -> usize {
        let frames = (dest.len() / self.stride).min(self.count());
        let start = self.read_pos * self.stride;
        dest[..frames * self.stride]
            .copy_from_slice(&self.buf[start..start + frames * self.stride]);
        self.advance(frames);
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::SampleFifo;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn verify_write_read_order() {
        let mut fifo = SampleFifo::<i32>::new(2);

        fifo.reserve(3);
        fifo.write_buf(3).copy_from_slice(&[1, 2, 3, 4, 5, 6]);
        fifo.commit(3);

        assert_eq!(fifo.count(), 3);
        assert_eq!(fifo.read_buf(), &[1, 2, 3, 4, 5, 6]);

        let mut dest = [0i32; 4];
        assert_eq!(fifo.read(&mut dest), 2);
        assert_eq!(dest, [1, 2, 3, 4]);
        assert_eq!(fifo.count(), 1);

        fifo.advance(1);
        assert_eq!(fifo.count(), 0);
    }

    #[test]
    fn verify_compaction_preserves_data() {
        let mut fifo = SampleFifo::<i32>::new(1);

        fifo.reserve(4);
        fifo.write_buf(4).copy_from_slice(&[10, 20, 30, 40]);
        fifo.commit(4);
        fifo.advance(3);

        // Forces a compaction of the one unread frame before growing.
        let grow = fifo.capacity();
        fifo.reserve(grow + 8);
        assert_eq!(fifo.read_buf(), &[40]);

        fifo.write_buf(1)[0] = 50;
        fifo.commit(1);
        assert_eq!(fifo.read_buf(), &[40, 50]);
    }

    #[test]
    fn verify_reset() {
        let mut fifo = SampleFifo::<i32>::new(2);
        fifo.reserve(2);
        fifo.write_buf(2).copy_from_slice(&[1, 2, 3, 4]);
        fifo.commit(2);
        fifo.reset();
        assert_eq!(fifo.count(), 0);
        assert_eq!(fifo.read_buf(), &[] as &[i32]);
    }

    #[test]
    fn verify_randomized_invariants() {
        let mut rng = SmallRng::seed_from_u64(0x5eed);
        let mut fifo = SampleFifo::<i32>::new(2);

        // Model the FIFO with a monotonically increasing sequence and verify
        // frames always emerge in write order.
        let mut next_write = 0i32;
        let mut next_read = 0i32;

        for _ in 0..10_000 {
            if rng.gen_bool(0.5) {
                let frames = rng.gen_range(0..64);
                fifo.reserve(frames);
                let buf = fifo.write_buf(frames);
                for sample in buf.iter_mut() {
                    *sample = next_write;
                    next_write += 1;
                }
                fifo.commit(frames);
            }
            else {
                let frames = rng.gen_range(0..64).min(fifo.count());
                let read = fifo.read_buf();
                for sample in &read[..frames * 2] {
                    assert_eq!(*sample, next_read);
                    next_read += 1;
                }
                fifo.advance(frames);
            }

            assert!(fifo.count() <= fifo.capacity());
        }
    }
}
