// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp;
use std::io;
use std::io::SeekFrom;

use super::{ByteSource, ReadBytes};

/// The size of the read-ahead buffer.
const BUFFER_LEN: usize = 32 * 1024;

#[inline(always)]
fn end_of_stream<T>() -> io::Result<T> {
    Err(io::Error::new(io::ErrorKind::UnexpectedEof, "end of stream"))
}

/// `SourceStream` is a buffered reader over a [`ByteSource`] that tracks the
/// absolute stream position and supports seeking when the underlying source
/// does.
///
/// Seeks within the currently buffered region are satisfied without touching
/// the underlying source.
pub struct SourceStream {
    /// The underlying byte source.
    inner: Box<dyn ByteSource>,
    /// The read-ahead buffer.
    buf: Box<[u8]>,
    /// The absolute stream position of `buf[0]`.
    base_pos: u64,
    /// The next byte in the buffer to read.
    read_pos: usize,
    /// The number of valid bytes in the buffer.
    end_pos: usize,
    /// Cached seekability of the source.
    is_seekable: bool,
    /// Cached total length of the source, if known.
    total_len: Option<u64>,
}

impl SourceStream {
    /// Instantiates a new `SourceStream` over the provided source.
    pub fn new(inner: Box<dyn ByteSource>) -> Self {
        let is_seekable = inner.is_seekable();
        let total_len = inner.byte_len();

        SourceStream {
            inner,
            buf: vec![0u8; BUFFER_LEN].into_boxed_slice(),
            base_pos: 0,
            read_pos: 0,
            end_pos: 0,
            is_seekable,
            total_len,
        }
    }

    /// Returns if the underlying source is seekable.
    pub fn is_seekable(&self) -> bool {
        self.is_seekable
    }

    /// Returns the total length of the underlying source in bytes, if known.
    pub fn byte_len(&self) -> Option<u64> {
        self.total_len
    }

    /// Destroys the `SourceStream` and returns the underlying source.
    pub fn into_inner(self) -> Box<dyn ByteSource> {
        self.inner
    }

    /// Seeks to the absolute stream position given by `pos`.
    ///
    /// A seek within the buffered region never touches the underlying source
    /// and is therefore valid even for unseekable sources.
    pub fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(off) => off,
            SeekFrom::Current(delta) => {
                let cur = self.pos();
                if delta >= 0 {
                    cur.checked_add(delta as u64)
                }
                else {
                    cur.checked_sub(delta.unsigned_abs())
                }
                .ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidInput, "seek out of range")
                })?
            }
            SeekFrom::End(delta) => {
                let len = self.total_len.ok_or_else(|| {
                    io::Error::new(io::ErrorKind::Unsupported, "stream length unknown")
                })?;
                if delta >= 0 {
                    len.checked_add(delta as u64)
                }
                else {
                    len.checked_sub(delta.unsigned_abs())
                }
                .ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidInput, "seek out of range")
                })?
            }
        };

        // Attempt to satisfy the seek within the buffered region.
        if target >= self.base_pos && target < self.base_pos + self.end_pos as u64 {
            self.read_pos = (target - self.base_pos) as usize;
            return Ok(target);
        }

        if !self.is_seekable {
            // Unseekable sources may still skip forward by reading.
            let cur = self.pos();
            if target >= cur {
                self.ignore_bytes(target - cur)?;
                return Ok(target);
            }
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "source does not support seeking",
            ));
        }

        let seeked = self.inner.seek(SeekFrom::Start(target))?;
        self.base_pos = seeked;
        self.read_pos = 0;
        self.end_pos = 0;
        Ok(seeked)
    }

    /// Refills the buffer from the underlying source. Returns the number of
    /// buffered bytes, which is 0 at the end of the stream.
    fn fetch(&mut self) -> io::Result<usize> {
        if self.read_pos < self.end_pos {
            return Ok(self.end_pos - self.read_pos);
        }

        self.base_pos += self.end_pos as u64;
        self.read_pos = 0;
        self.end_pos = self.inner.read(&mut self.buf)?;
        Ok(self.end_pos)
    }

    /// As `fetch`, but end of stream is an error.
    fn fetch_or_eof(&mut self) -> io::Result<()> {
        if self.fetch()? == 0 {
            return end_of_stream();
        }
        Ok(())
    }
}

impl ReadBytes for SourceStream {
    #[inline(always)]
    fn read_byte(&mut self) -> io::Result<u8> {
        self.fetch_or_eof()?;

        let byte = self.buf[self.read_pos];
        self.read_pos += 1;
        Ok(byte)
    }

    fn read_double_bytes(&mut self) -> io::Result<[u8; 2]> {
        let mut bytes = [0u8; 2];
        self.read_buf_exact(&mut bytes)?;
        Ok(bytes)
    }

    fn read_triple_bytes(&mut self) -> io::Result<[u8; 3]> {
        let mut bytes = [0u8; 3];
        self.read_buf_exact(&mut bytes)?;
        Ok(bytes)
    }

    fn read_quad_bytes(&mut self) -> io::Result<[u8; 4]> {
        let mut bytes = [0u8; 4];
        self.read_buf_exact(&mut bytes)?;
        Ok(bytes)
    }

    fn read_buf(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.fetch()? == 0 {
            return Ok(0);
        }

        let len = cmp::min(self.end_pos - self.read_pos, buf.len());
        buf[..len].copy_from_slice(&self.buf[self.read_pos..self.read_pos + len]);
        self.read_pos += len;
        Ok(len)
    }

    fn read_buf_exact(&mut self, mut buf: &mut [u8]) -> io::Result<()> {
        while !buf.is_empty() {
            let count = self.read_buf(buf)?;
            if count == 0 {
                return end_of_stream();
            }
            buf = &mut buf[count..];
        }
        Ok(())
    }

    fn ignore_bytes(&mut self, mut count: u64) -> io::Result<()> {
        while count > 0 {
            let available = self.fetch()?;
            if available == 0 {
                return end_of_stream();
            }
            let discard = cmp::min(available as u64, count) as usize;
            self.read_pos += discard;
            count -= discard as u64;
        }
        Ok(())
    }

    #[inline(always)]
    fn pos(&self) -> u64 {
        self.base_pos + self.read_pos as u64
    }
}

#[cfg(test)]
mod tests {
    use super::SourceStream;
    use crate::io::ReadBytes;
    use std::io::{Cursor, SeekFrom};

    #[test]
    fn verify_read_primitives() {
        let data: Vec<u8> = vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let mut stream = SourceStream::new(Box::new(Cursor::new(data)));

        assert_eq!(stream.read_byte().unwrap(), 0x01);
        assert_eq!(stream.read_be_u16().unwrap(), 0x0203);
        assert_eq!(stream.read_be_u32().unwrap(), 0x0405_0607);
        assert_eq!(stream.pos(), 7);
        assert_eq!(stream.read_byte().unwrap(), 0x08);
        assert!(stream.read_byte().is_err());
    }

    #[test]
    fn verify_seek_within_buffer() {
        let data: Vec<u8> = (0u8..=255).collect();
        let mut stream = SourceStream::new(Box::new(Cursor::new(data)));

        assert_eq!(stream.read_byte().unwrap(), 0);
        stream.seek(SeekFrom::Start(100)).unwrap();
        assert_eq!(stream.pos(), 100);
        assert_eq!(stream.read_byte().unwrap(), 100);
        stream.seek(SeekFrom::Start(3)).unwrap();
        assert_eq!(stream.read_byte().unwrap(), 3);
        stream.seek(SeekFrom::End(-1)).unwrap();
        assert_eq!(stream.read_byte().unwrap(), 255);
    }

    #[test]
    fn verify_ignore_bytes() {
        let data: Vec<u8> = (0u8..=255).collect();
        let mut stream = SourceStream::new(Box::new(Cursor::new(data)));

        stream.ignore_bytes(200).unwrap();
        assert_eq!(stream.pos(), 200);
        assert_eq!(stream.read_byte().unwrap(), 200);
        assert!(stream.ignore_bytes(100).is_err());
    }
}
