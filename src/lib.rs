// Copyright 2017 `multipart-async` Crate Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//! A chunk-boundary-tolerant, synchronous, streaming parser for HTTP `multipart/form-data`
//! request bodies.
//!
//! The parser is fed arbitrarily-sized chunks of a request body via [`MultipartParser::push`]
//! and dispatches each part's payload, as it arrives, to a caller-registered
//! [`Target`](target::Target) keyed by the part's `name`. It never buffers more than a
//! boundary's worth of bytes internally and never holds the whole body in memory, regardless
//! of how the caller splits it across calls.
//!
//! ```
//! use streaming_multipart::{MultipartParser, ValueTarget};
//!
//! let body = b"--X\r\nContent-Disposition: form-data; name=\"greeting\"\r\n\r\nhello\r\n--X--\r\n";
//!
//! let mut greeting = ValueTarget::new();
//! let mut parser = MultipartParser::new("X").unwrap();
//! parser.register("greeting", &mut greeting).unwrap();
//!
//! parser.push(body).unwrap();
//! parser.eof().unwrap();
//!
//! assert_eq!(greeting.value(), b"hello");
//! ```
//!
//! Features:
//!
//! * `http` (optional): adds [`MultipartParser::from_header_map`], extracting the boundary
//!   straight from an [`http::HeaderMap`].
#![deny(missing_docs)]

#[macro_use]
extern crate log;

pub extern crate mime;

#[cfg(feature = "http")]
pub extern crate http;

mod boundary;
mod content_type;
mod error;
mod headers;
mod parser;
mod target;

pub use error::{MultipartError, Result};
pub use headers::{ContentDisposition, PartHeaders};
pub use parser::{MultipartParser, DEFAULT_MAX_HEADER_BYTES};
pub use target::{FileTarget, FileUsingRemoteNameTarget, NullTarget, Sha256Target, Target, ValueTarget};
