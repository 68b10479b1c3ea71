// Copyright 2016 `multipart` Crate Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//! The multipart state machine and target dispatcher: orchestrates
//! `Preamble -> AfterDelimiter -> PartHeaders -> PartBody -> ... -> Epilogue -> Done`, using
//! the [`Finder`](crate::boundary::Finder) to locate each boundary marker and dispatching
//! committed payload bytes to the target registered for the current part's name.
use std::collections::HashMap;

use crate::boundary::Finder;
#[cfg(feature = "http")]
use crate::content_type::extract_boundary_from_header_map;
use crate::content_type::extract_boundary;
use crate::error::{MultipartError, Result};
use crate::headers::{parse_header_block, PartHeaders};
use crate::target::Target;

/// Default cap on a part's accumulated header block.
pub const DEFAULT_MAX_HEADER_BYTES: usize = 64 * 1024;

const CRLF: &[u8] = b"\r\n";
const CRLF_CRLF: &[u8] = b"\r\n\r\n";

#[derive(Debug)]
enum Phase {
    Preamble,
    AfterDelimiter,
    PartHeaders,
    PartBody,
    Epilogue,
    Done,
}

/// A chunk-boundary-tolerant `multipart/form-data` parser.
///
/// Construct with [`MultipartParser::new`] (boundary already extracted) or
/// [`MultipartParser::from_headers`] (extracts `Content-Type`/`boundary` itself). Register
/// targets with [`MultipartParser::register`] before the first [`MultipartParser::push`].
/// Feed body bytes with `push`, then call [`MultipartParser::eof`] once the body is
/// exhausted.
pub struct MultipartParser<'t> {
    delimiter: Vec<u8>,
    finder: Finder,
    phase: Phase,
    latched: bool,

    after_delim_buf: Vec<u8>,
    header_accum: Vec<u8>,
    max_header_bytes: usize,

    targets: HashMap<Vec<u8>, &'t mut dyn Target>,
    active_target: Option<Vec<u8>>,
}

impl<'t> MultipartParser<'t> {
    /// Construct a parser for a body delimited by `boundary` (without the leading `--`).
    pub fn new(boundary: impl AsRef<[u8]>) -> Result<Self> {
        Self::with_max_header_bytes(boundary, DEFAULT_MAX_HEADER_BYTES)
    }

    /// Like [`MultipartParser::new`], but with a caller-supplied cap on a part's accumulated
    /// header block instead of [`DEFAULT_MAX_HEADER_BYTES`].
    pub fn with_max_header_bytes(boundary: impl AsRef<[u8]>, max_header_bytes: usize) -> Result<Self> {
        let boundary = boundary.as_ref();
        if boundary.is_empty() || boundary.len() > 70 {
            return Err(MultipartError::ContentType(format!(
                "boundary length {} is outside the accepted 1-70 character range",
                boundary.len()
            )));
        }

        let mut delimiter = Vec::with_capacity(CRLF.len() + 2 + boundary.len());
        delimiter.extend_from_slice(CRLF);
        delimiter.extend_from_slice(b"--");
        delimiter.extend_from_slice(boundary);

        // Seed the finder's carry with a virtual leading CRLF so that a delimiter occurring
        // with no preceding CRLF at the very start of the body is found by the same search as
        // every other delimiter. The virtual bytes are never real input, but Preamble output
        // is discarded regardless, so there is nothing for them to corrupt.
        let mut finder = Finder::new(delimiter.clone());
        finder.seed_carry(CRLF);

        debug!("boundary: {:?}", String::from_utf8_lossy(boundary));

        Ok(MultipartParser {
            delimiter,
            finder,
            phase: Phase::Preamble,
            latched: false,
            after_delim_buf: Vec::with_capacity(1),
            header_accum: Vec::new(),
            max_header_bytes,
            targets: HashMap::new(),
            active_target: None,
        })
    }

    /// Construct a parser from a request's headers, extracting `Content-Type` and its
    /// `boundary` parameter.
    pub fn from_headers<'h, I>(headers: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'h str, &'h str)>,
    {
        let boundary = extract_boundary(headers)?;
        Self::new(boundary)
    }

    /// Construct a parser from an [`http::HeaderMap`], extracting `Content-Type` and its
    /// `boundary` parameter. Requires the `http` feature.
    #[cfg(feature = "http")]
    pub fn from_header_map(headers: &http::HeaderMap) -> Result<Self> {
        let boundary = extract_boundary_from_header_map(headers)?;
        Self::new(boundary)
    }

    /// Bind `name` to `target` for the lifetime of this parser. Must be called before the
    /// first `push`. Duplicate names are rejected.
    pub fn register(&mut self, name: impl Into<Vec<u8>>, target: &'t mut dyn Target) -> Result<()> {
        let name = name.into();
        if self.targets.contains_key(&name) {
            let name_str = String::from_utf8_lossy(&name).into_owned();
            warn!("duplicate target registration for name {:?}", name_str);
            return Err(MultipartError::DuplicateRegistration(name_str));
        }
        trace!("registered target for name {:?}", String::from_utf8_lossy(&name));
        self.targets.insert(name, target);
        Ok(())
    }

    /// `true` once the closing delimiter has been consumed (the `Epilogue` or `Done` phase).
    pub fn is_done(&self) -> bool {
        matches!(self.phase, Phase::Epilogue | Phase::Done)
    }

    /// Feed the next chunk of the body. Chunks may be any non-negative size, including zero
    /// or one byte, and may split a delimiter, header line, or payload run at any offset.
    pub fn push(&mut self, chunk: &[u8]) -> Result<()> {
        if self.latched {
            return Err(MultipartError::PushAfterDone);
        }

        let result = self.push_inner(chunk);
        if let Err(ref err) = result {
            warn!("multipart parse error, latching: {}", err);
            self.latched = true;
        }
        result
    }

    /// Signal end of input. Validates that the closing delimiter was seen, returning
    /// `Truncated` otherwise. Idempotent once `Done` has been reached.
    pub fn eof(&mut self) -> Result<()> {
        if matches!(self.phase, Phase::Done) {
            return Ok(());
        }
        if self.latched {
            return Err(MultipartError::PushAfterDone);
        }

        match self.phase {
            Phase::Epilogue => {
                self.phase = Phase::Done;
                Ok(())
            }
            _ => {
                warn!("eof() reached in phase {:?}, expected Epilogue", self.phase);
                self.latched = true;
                Err(MultipartError::Truncated)
            }
        }
    }

    fn push_inner(&mut self, chunk: &[u8]) -> Result<()> {
        let mut rest = chunk;

        loop {
            let advance = match self.phase {
                Phase::Preamble => self.step_preamble(rest)?,
                Phase::AfterDelimiter => self.step_after_delimiter(rest)?,
                Phase::PartHeaders => self.step_part_headers(rest)?,
                Phase::PartBody => self.step_part_body(rest)?,
                Phase::Epilogue => None,
                Phase::Done => return Err(MultipartError::PushAfterDone),
            };

            match advance {
                Some(next_rest) => {
                    rest = next_rest;
                    if rest.is_empty() {
                        // Every phase handler treats empty input as a no-op, so there is
                        // nothing left for this call to do.
                        break;
                    }
                }
                None => break,
            }
        }

        Ok(())
    }

    fn step_preamble<'a>(&mut self, input: &'a [u8]) -> Result<Option<&'a [u8]>> {
        let fed = self.finder.feed(input);
        // Preamble bytes are discarded.
        drop(fed.carry_flush);

        match fed.matched_rest {
            Some(rest) => {
                trace!("preamble delimiter found, entering AfterDelimiter");
                self.phase = Phase::AfterDelimiter;
                self.after_delim_buf.clear();
                Ok(Some(rest))
            }
            None => Ok(None),
        }
    }

    fn step_after_delimiter<'a>(&mut self, input: &'a [u8]) -> Result<Option<&'a [u8]>> {
        if self.after_delim_buf.is_empty() {
            if input.len() >= 2 {
                let two = [input[0], input[1]];
                self.dispatch_after_delimiter(&two)?;
                Ok(Some(&input[2..]))
            } else if input.len() == 1 {
                self.after_delim_buf.push(input[0]);
                Ok(None)
            } else {
                Ok(None)
            }
        } else {
            debug_assert_eq!(self.after_delim_buf.len(), 1);
            if input.is_empty() {
                return Ok(None);
            }
            let two = [self.after_delim_buf[0], input[0]];
            self.after_delim_buf.clear();
            self.dispatch_after_delimiter(&two)?;
            Ok(Some(&input[1..]))
        }
    }

    fn dispatch_after_delimiter(&mut self, two: &[u8; 2]) -> Result<()> {
        match two {
            b"--" => {
                trace!("closing delimiter found, entering Epilogue");
                self.phase = Phase::Epilogue;
            }
            b"\r\n" => {
                trace!("continuing delimiter found, entering PartHeaders");
                self.phase = Phase::PartHeaders;
                self.header_accum.clear();
                self.finder = Finder::new(CRLF_CRLF.to_vec());
            }
            _ => {
                warn!("unexpected 2 bytes after delimiter: {:?}", two);
                return Err(MultipartError::UnexpectedInputAfterDelimiter);
            }
        }
        Ok(())
    }

    fn step_part_headers<'a>(&mut self, input: &'a [u8]) -> Result<Option<&'a [u8]>> {
        let fed = self.finder.feed(input);

        self.header_accum.extend_from_slice(&fed.carry_flush);
        self.header_accum.extend_from_slice(fed.committed);

        if self.header_accum.len() > self.max_header_bytes {
            warn!("header block exceeded {} bytes", self.max_header_bytes);
            return Err(MultipartError::HeaderBlockTooLarge {
                limit: self.max_header_bytes,
            });
        }

        match fed.matched_rest {
            Some(rest) => {
                self.header_accum.extend_from_slice(CRLF_CRLF);
                let headers = parse_header_block(&self.header_accum)?;
                self.begin_part_body(headers)?;
                Ok(Some(rest))
            }
            None => Ok(None),
        }
    }

    fn begin_part_body(&mut self, headers: PartHeaders) -> Result<()> {
        let name = headers.disposition.name.as_bytes().to_vec();
        let registered = self.targets.contains_key(&name);
        debug!("part headers parsed: {:?} (registered: {})", headers.disposition, registered);

        if registered {
            let target = self.targets.get_mut(&name).expect("just checked contains_key");
            target.start()?;
            target.headers_parsed(&headers.disposition)?;
            self.active_target = Some(name);
        } else {
            self.active_target = None;
        }

        self.phase = Phase::PartBody;
        self.finder = Finder::new(self.delimiter.clone());
        Ok(())
    }

    fn step_part_body<'a>(&mut self, input: &'a [u8]) -> Result<Option<&'a [u8]>> {
        let fed = self.finder.feed(input);

        if let Some(name) = self.active_target.clone() {
            if !fed.carry_flush.is_empty() {
                let target = self.targets.get_mut(&name).expect("active target must be registered");
                target.data_received(&fed.carry_flush)?;
            }
            if !fed.committed.is_empty() {
                let target = self.targets.get_mut(&name).expect("active target must be registered");
                target.data_received(fed.committed)?;
            }
        }

        match fed.matched_rest {
            Some(rest) => {
                if let Some(name) = self.active_target.take() {
                    trace!("part body complete for {:?}", String::from_utf8_lossy(&name));
                    let target = self.targets.get_mut(&name).expect("active target must be registered");
                    target.finish()?;
                }
                self.phase = Phase::AfterDelimiter;
                self.after_delim_buf.clear();
                Ok(Some(rest))
            }
            None => Ok(None),
        }
    }
}
