// Copyright 2017 `multipart-async` Crate Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Everything that can go wrong while constructing a parser or feeding it a body.
///
/// Once `push`/`eof` returns one of these (other than `PushAfterDone` itself), the parser
/// latches: every subsequent call returns `PushAfterDone`.
#[derive(Debug)]
pub enum MultipartError {
    /// The `Content-Type` header was missing, was not `multipart/form-data`, or had no
    /// `boundary` parameter.
    ContentType(String),
    /// The accumulated header block for a part exceeded the configured maximum.
    HeaderBlockTooLarge {
        /// The configured limit that was exceeded.
        limit: usize,
    },
    /// The header block had no `CRLF CRLF` terminator, or its `Content-Disposition` could
    /// not be parsed.
    MalformedHeaders(String),
    /// `Content-Disposition` was present but had no `name` parameter.
    MissingName,
    /// The two bytes following a delimiter were neither `CRLF` nor `--`.
    UnexpectedInputAfterDelimiter,
    /// `eof()` was reached before the closing delimiter.
    Truncated,
    /// A duplicate target name was registered.
    DuplicateRegistration(String),
    /// `push`/`eof` was called after the parser reached `Done` or after a prior error.
    PushAfterDone,
    /// A registered target's callback returned an error; propagated verbatim.
    Target(Box<dyn StdError + Send + Sync>),
}

impl fmt::Display for MultipartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MultipartError::ContentType(msg) => write!(f, "invalid Content-Type: {}", msg),
            MultipartError::HeaderBlockTooLarge { limit } => {
                write!(f, "part header block exceeded {} bytes", limit)
            }
            MultipartError::MalformedHeaders(msg) => write!(f, "malformed part headers: {}", msg),
            MultipartError::MissingName => {
                write!(f, "Content-Disposition is missing the 'name' parameter")
            }
            MultipartError::UnexpectedInputAfterDelimiter => {
                write!(f, "expected CRLF or '--' immediately after a boundary delimiter")
            }
            MultipartError::Truncated => write!(f, "body ended before the closing delimiter"),
            MultipartError::DuplicateRegistration(name) => {
                write!(f, "a target is already registered under the name {:?}", name)
            }
            MultipartError::PushAfterDone => {
                write!(f, "push/eof called after the parser finished or errored")
            }
            MultipartError::Target(err) => write!(f, "target error: {}", err),
        }
    }
}

impl StdError for MultipartError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            MultipartError::Target(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for MultipartError {
    fn from(err: io::Error) -> Self {
        MultipartError::Target(Box::new(err))
    }
}

pub(crate) fn malformed<T>(msg: impl Into<String>) -> Result<T, MultipartError> {
    Err(MultipartError::MalformedHeaders(msg.into()))
}

pub(crate) fn content_type_error<T>(msg: impl Into<String>) -> Result<T, MultipartError> {
    Err(MultipartError::ContentType(msg.into()))
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MultipartError>;
