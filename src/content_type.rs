// Copyright 2017 `multipart-async` Crate Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//! Extraction of the multipart boundary from a request's `Content-Type` header.
//!
//! Parser construction takes the full header set, not a pre-extracted boundary, so the
//! crate needs some way to pull `Content-Type` out of a header map itself.
use mime::Mime;

use crate::error::{content_type_error, MultipartError, Result};

/// Find the `Content-Type` header (case-insensitively) in `headers`, verify it is
/// `multipart/form-data`, and return the `boundary` parameter.
pub(crate) fn extract_boundary<'h, I>(headers: I) -> Result<String>
where
    I: IntoIterator<Item = (&'h str, &'h str)>,
{
    let content_type = headers
        .into_iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
        .map(|(_, value)| value)
        .ok_or_else(|| MultipartError::ContentType("missing Content-Type header".into()))?;

    boundary_from_content_type(content_type)
}

pub(crate) fn boundary_from_content_type(content_type: &str) -> Result<String> {
    let mime: Mime = content_type
        .parse()
        .map_err(|_| MultipartError::ContentType(format!("unparseable Content-Type: {:?}", content_type)))?;

    if mime.type_() != mime::MULTIPART || mime.subtype() != "form-data" {
        return content_type_error(format!(
            "Content-Type is not multipart/form-data: {:?}",
            content_type
        ));
    }

    let boundary = mime
        .get_param("boundary")
        .ok_or_else(|| MultipartError::ContentType("missing boundary parameter".into()))?
        .as_str();

    if boundary.is_empty() || boundary.len() > 70 {
        return content_type_error(format!(
            "boundary length {} is outside the accepted 1-70 character range",
            boundary.len()
        ));
    }

    Ok(boundary.to_string())
}

#[cfg(feature = "http")]
pub(crate) fn extract_boundary_from_header_map(headers: &http::HeaderMap) -> Result<String> {
    let content_type = headers
        .get(http::header::CONTENT_TYPE)
        .ok_or_else(|| MultipartError::ContentType("missing Content-Type header".into()))?
        .to_str()
        .map_err(|_| MultipartError::ContentType("Content-Type header is not valid UTF-8/ASCII".into()))?;

    boundary_from_content_type(content_type)
}
