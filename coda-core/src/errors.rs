// Coda
// Copyright (c) 2026 The Project Coda Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type.

use std::error;
use std::fmt;
use std::io;
use std::result;

/// `SeekErrorKind` is a list of generic reasons why a seek may fail.
#[derive(Debug)]
pub enum SeekErrorKind {
    /// The stream is not seekable at all.
    Unseekable,
    /// The stream can only be seeked forward.
    ForwardOnly,
    /// The position to seek to is out of range.
    OutOfRange,
}

impl SeekErrorKind {
    fn as_str(&self) -> &'static str {
        match *self {
            SeekErrorKind::Unseekable => "stream is not seekable",
            SeekErrorKind::ForwardOnly => "stream can only be seeked forward",
            SeekErrorKind::OutOfRange => "requested seek position is out-of-range for stream",
        }
    }
}

/// `Error` provides an enumeration of all possible errors reported by Coda.
#[derive(Debug)]
pub enum Error {
    /// An IO error occurred while reading, writing, or seeking the stream.
    IoError(std::io::Error),
    /// The container is structurally invalid: a mandatory chunk, atom, or
    /// table is missing or malformed. Raised at parse time only; there is no
    /// partial or degraded-mode container parsing.
    MalformedContainer(&'static str),
    /// The container was recognized, but it describes a feature or codec this
    /// build does not support.
    UnsupportedFormat(&'static str),
    /// The codec configuration blob was rejected while initializing a decoder.
    CodecInitFailed(&'static str),
    /// The codec engine reported an error mid-stream. Compressed audio decode
    /// errors are not generally recoverable, so the current read is aborted.
    DecodeFailed(&'static str),
    /// The stream could not be seeked.
    SeekError(SeekErrorKind),
    /// A limit was reached while decoding or demuxing the stream. Limits are
    /// used to prevent denial-of-service attacks from malicious streams.
    LimitError(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::IoError(ref err) => err.fmt(f),
            Error::MalformedContainer(msg) => {
                write!(f, "malformed container: {}", msg)
            }
            Error::UnsupportedFormat(feature) => {
                write!(f, "unsupported format: {}", feature)
            }
            Error::CodecInitFailed(msg) => {
                write!(f, "codec initialization failed: {}", msg)
            }
            Error::DecodeFailed(msg) => {
                write!(f, "decode failed: {}", msg)
            }
            Error::SeekError(ref kind) => {
                write!(f, "seek error: {}", kind.as_str())
            }
            Error::LimitError(constraint) => {
                write!(f, "limit reached: {}", constraint)
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::IoError(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}

pub type Result<T> = result::Result<T, Error>;

/// Convenience function to create a malformed container error.
pub fn malformed_container_error<T>(msg: &'static str) -> Result<T> {
    Err(Error::MalformedContainer(msg))
}

/// Convenience function to create an unsupported format error.
pub fn unsupported_format_error<T>(feature: &'static str) -> Result<T> {
    Err(Error::UnsupportedFormat(feature))
}

/// Convenience function to create a codec initialization error.
pub fn codec_init_error<T>(msg: &'static str) -> Result<T> {
    Err(Error::CodecInitFailed(msg))
}

/// Convenience function to create a decode failure error.
pub fn decode_failed_error<T>(msg: &'static str) -> Result<T> {
    Err(Error::DecodeFailed(msg))
}

/// Convenience function to create a seek error.
pub fn seek_error<T>(kind: SeekErrorKind) -> Result<T> {
    Err(Error::SeekError(kind))
}

/// Convenience function to create a limit error.
pub fn limit_error<T>(constraint: &'static str) -> Result<T> {
    Err(Error::LimitError(constraint))
}

/// Convenience function to create an end-of-stream error.
///
/// End of stream is not a failure: it is the normal zero-length read signal.
/// Callers test for it with [`is_end_of_stream`].
pub fn end_of_stream_error<T>() -> Result<T> {
    Err(Error::IoError(io::Error::new(io::ErrorKind::UnexpectedEof, "end of stream")))
}

/// Returns true if the error is the end-of-stream signal.
pub fn is_end_of_stream(err: &Error) -> bool {
    matches!(err, Error::IoError(ref io_err) if io_err.kind() == io::ErrorKind::UnexpectedEof)
}
