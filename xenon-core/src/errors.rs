// Xenon
// Copyright (c) 2025 The Project Xenon Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type.

use std::error;
use std::fmt;
use std::io;
use std::result;

/// `Error` provides an enumeration of all possible errors reported by Xenon.
///
/// The error taxonomy is two-level: `IoError` and `DecodeError` are fatal to the input file being
/// read, whereas `EventError` is localized to a single event or equipment block and the read loop
/// may continue with the next event.
#[derive(Debug)]
pub enum Error {
    /// An IO error occured while reading or seeking the stream.
    IoError(io::Error),
    /// The stream contained malformed framing and the current file cannot be decoded further.
    DecodeError(&'static str),
    /// A single equipment payload or event was malformed. The remainder of the file is
    /// still readable.
    EventError(&'static str),
    /// An unsupported container or firmware feature was encountered.
    Unsupported(&'static str),
    /// A default or user-defined limit was reached while decoding. Limits are used to prevent
    /// runaway allocation from malformed streams.
    LimitError(&'static str),
}

impl Error {
    /// Returns true if the error is localized to one event and the file read loop may continue.
    pub fn is_event_error(&self) -> bool {
        matches!(self, Error::EventError(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::IoError(ref err) => err.fmt(f),
            Error::DecodeError(msg) => {
                f.write_str("malformed stream: ")?;
                f.write_str(msg)
            }
            Error::EventError(msg) => {
                f.write_str("malformed event: ")?;
                f.write_str(msg)
            }
            Error::Unsupported(feature) => {
                f.write_str("unsupported feature: ")?;
                f.write_str(feature)
            }
            Error::LimitError(constraint) => {
                f.write_str("limit reached: ")?;
                f.write_str(constraint)
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

/// Convenience function to create a decode (file-fatal) error.
pub fn decode_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::DecodeError(desc))
}

/// Convenience function to create an event-localized error.
pub fn event_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::EventError(desc))
}

/// Convenience function to create an unsupported feature error.
pub fn unsupported_error<T>(feature: &'static str) -> Result<T> {
    Err(Error::Unsupported(feature))
}

/// Convenience function to create a limit error.
pub fn limit_error<T>(constraint: &'static str) -> Result<T> {
    Err(Error::LimitError(constraint))
}
