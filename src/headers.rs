// Copyright 2017 `multipart-async` Crate Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//! Parses the header block of a single part: the bytes between a delimiter's trailing CRLF
//! and the blank line (`CRLF CRLF`) that terminates it.
use std::str;

use httparse::{EMPTY_HEADER, Status};

use crate::error::{malformed, MultipartError, Result};

const MAX_HEADERS: usize = 16;

/// A part's parsed `Content-Disposition: form-data; ...` value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContentDisposition {
    /// The `name` parameter. Always non-empty once successfully parsed; a missing `name`
    /// is a hard error, reported separately as `MissingName`.
    pub name: String,
    /// The `filename` parameter, if present.
    pub filename: Option<String>,
    /// Any other `key=value` parameters, preserved but not acted upon.
    pub params: Vec<(String, String)>,
}

/// The decoded headers of one part.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PartHeaders {
    /// `(name, value)` pairs in wire order. Names are preserved as received; lookups via
    /// [`PartHeaders::get`] are case-insensitive.
    pub raw: Vec<(String, String)>,
    /// The required `Content-Disposition: form-data` descriptor.
    pub disposition: ContentDisposition,
    /// The `Content-Type` header value, if present, verbatim (this crate does not parse it
    /// beyond what's needed to pass it through).
    pub content_type: Option<String>,
}

impl PartHeaders {
    /// Case-insensitive header lookup, returning the first match in wire order.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.raw
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Parse a header block. `block` must be the bytes strictly between the delimiter's CRLF and
/// the terminating `CRLF CRLF`, *including* the trailing `CRLF CRLF` (httparse expects it).
pub(crate) fn parse_header_block(block: &[u8]) -> Result<PartHeaders> {
    debug_assert!(
        block.ends_with(b"\r\n\r\n"),
        "header block must end with CRLF CRLF"
    );

    let mut header_buf = [EMPTY_HEADER; MAX_HEADERS];

    let headers = match httparse::parse_headers(block, &mut header_buf) {
        Ok(Status::Complete((_, headers))) => headers,
        Ok(Status::Partial) => return malformed("incomplete header block"),
        Err(e) => return malformed(format!("error parsing part headers: {}", e)),
    };

    let mut out = PartHeaders::default();
    let mut seen_disposition = false;

    for header in headers {
        let value = str::from_utf8(header.value)
            .map_err(|_| MultipartError::MalformedHeaders(format!(
                "header {:?} value is not valid UTF-8",
                header.name
            )))?
            .trim();

        out.raw.push((header.name.to_string(), value.to_string()));

        if header.name.eq_ignore_ascii_case("Content-Disposition") {
            if seen_disposition {
                return malformed("a second Content-Disposition header is not accepted");
            }
            seen_disposition = true;
            out.disposition = parse_content_disposition(value)?;
        } else if header.name.eq_ignore_ascii_case("Content-Type") {
            out.content_type = Some(value.to_string());
        }
    }

    if !seen_disposition {
        return malformed("part is missing a Content-Disposition: form-data header");
    }

    if out.disposition.name.is_empty() {
        return Err(MultipartError::MissingName);
    }

    Ok(out)
}

fn parse_content_disposition(value: &str) -> Result<ContentDisposition> {
    let mut sections = value.splitn(2, ';');

    let disp_type = sections.next().unwrap_or("").trim();
    if !disp_type.eq_ignore_ascii_case("form-data") {
        return malformed(format!(
            "unsupported Content-Disposition type {:?}; only \"form-data\" is accepted",
            disp_type
        ));
    }

    let mut rem = sections.next().unwrap_or("");
    let mut out = ContentDisposition::default();

    while let Some((key, val, next_rem)) = parse_param(rem)? {
        rem = next_rem;

        match key.as_str() {
            "name" => out.name = val,
            "filename" => out.filename = Some(val),
            _ => out.params.push((key, val)),
        }
    }

    if out.name.is_empty() {
        return Err(MultipartError::MissingName);
    }

    Ok(out)
}

/// Parse one leading `key=value` (or `key="quoted value"`) pair off the front of `input`,
/// returning it along with whatever follows. `value` has quoting/escaping already resolved.
fn parse_param(input: &str) -> Result<Option<(String, String, &str)>> {
    let input = input.trim_start_matches(|c: char| c == ';' || c.is_whitespace());
    if input.is_empty() {
        return Ok(None);
    }

    let eq = input
        .find('=')
        .ok_or_else(|| MultipartError::MalformedHeaders(format!(
            "expected key=value in Content-Disposition parameter: {:?}",
            input
        )))?;

    let key = input[..eq].trim().to_ascii_lowercase();
    let rest = input[eq + 1..].trim_start();

    if rest.starts_with('"') {
        let (value, after) = parse_quoted(&rest[1..])?;
        Ok(Some((key, value, after)))
    } else {
        let end = rest.find(';').unwrap_or(rest.len());
        let value = rest[..end].trim().to_string();
        Ok(Some((key, value, &rest[end..])))
    }
}

/// Parse a quoted string (the opening `"` already consumed), honoring `\\` and `\"` escapes.
/// Returns the unescaped value and whatever followed the closing quote.
fn parse_quoted(input: &str) -> Result<(String, &str)> {
    let mut value = String::new();
    let mut chars = input.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((value, &input[i + 1..])),
            '\\' => match chars.next() {
                Some((_, escaped @ ('\\' | '"'))) => value.push(escaped),
                Some((_, other)) => {
                    value.push('\\');
                    value.push(other);
                }
                None => return malformed("unterminated escape in quoted Content-Disposition value"),
            },
            other => value.push(other),
        }
    }

    malformed("unterminated quoted string in Content-Disposition")
}
