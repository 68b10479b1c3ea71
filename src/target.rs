// Copyright 2017 `multipart-async` Crate Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//! The target capability set and the built-in targets: `Null`, `Value`, `File`,
//! `FileUsingRemoteName`, `Sha256`.
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::MultipartError;
use crate::headers::ContentDisposition;

/// The lifecycle a registered target receives for exactly one part.
///
/// Ownership: the parser holds a `&mut dyn Target` (or a generic `T: Target`) for the
/// duration of `push`/`eof`; it never takes ownership of the target. `data_received` may be
/// called any number of times (including zero); the concatenation of every chunk it receives
/// equals the part's payload exactly.
pub trait Target {
    /// Called once, before `headers_parsed`, as soon as this part is dispatched to this
    /// target.
    fn start(&mut self) -> Result<(), MultipartError> {
        Ok(())
    }

    /// Called once, after `start` and before the first `data_received`, with a read-only
    /// view of the part's `Content-Disposition` parameters (including `filename`, for
    /// targets that resolve their destination from the remote name).
    fn headers_parsed(&mut self, _disposition: &ContentDisposition) -> Result<(), MultipartError> {
        Ok(())
    }

    /// Called zero or more times with consecutive slices of the part's payload.
    fn data_received(&mut self, chunk: &[u8]) -> Result<(), MultipartError>;

    /// Called once, after the last `data_received`, when the part's closing delimiter has
    /// been found. Not called if the body is truncated or a parse error aborts the part —
    /// In-progress targets do not receive a `finish` on error paths.
    fn finish(&mut self) -> Result<(), MultipartError> {
        Ok(())
    }
}

/// Discards all data. Still runs the full lifecycle, so it's useful for parts whose payload
/// the caller doesn't care about but whose presence (and name/filename) it wants verified.
#[derive(Debug, Default)]
pub struct NullTarget;

impl Target for NullTarget {
    fn data_received(&mut self, _chunk: &[u8]) -> Result<(), MultipartError> {
        Ok(())
    }
}

/// Accumulates a part's payload in memory.
#[derive(Debug, Default)]
pub struct ValueTarget {
    buf: Vec<u8>,
}

impl ValueTarget {
    /// An empty target, ready to receive a part's payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// The part's full payload, once `finish` has run.
    pub fn value(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the target, taking ownership of the accumulated payload.
    pub fn into_value(self) -> Vec<u8> {
        self.buf
    }
}

impl Target for ValueTarget {
    fn data_received(&mut self, chunk: &[u8]) -> Result<(), MultipartError> {
        self.buf.extend_from_slice(chunk);
        Ok(())
    }
}

/// Streams a part's payload to a file at a fixed path.
///
/// The file is opened in `start()` and closed in `finish()`. If `finish` is never reached
/// (truncated body, a later parse error, or the caller simply dropping the parser), the
/// partially-written file is left behind for the caller to clean up: a target's cleanup on
/// the unhappy path is the target's (or caller's) responsibility, not the parser's.
pub struct FileTarget {
    path: PathBuf,
    open_options: OpenOptions,
    file: Option<File>,
}

impl FileTarget {
    /// Write the part's payload to `path`, truncating any existing file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let mut open_options = OpenOptions::new();
        open_options.write(true).create(true).truncate(true);
        FileTarget {
            path: path.into(),
            open_options,
            file: None,
        }
    }

    /// Override the open mode (e.g. to append instead of truncate).
    pub fn with_open_options(path: impl Into<PathBuf>, open_options: OpenOptions) -> Self {
        FileTarget {
            path: path.into(),
            open_options,
            file: None,
        }
    }
}

impl Target for FileTarget {
    fn start(&mut self) -> Result<(), MultipartError> {
        self.file = Some(self.open_options.open(&self.path)?);
        Ok(())
    }

    fn data_received(&mut self, chunk: &[u8]) -> Result<(), MultipartError> {
        write_all(&mut self.file, chunk)
    }

    fn finish(&mut self) -> Result<(), MultipartError> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        Ok(())
    }
}

/// Like [`FileTarget`], but resolves its filename from the part's `Content-Disposition:
/// filename` parameter, joined onto a fixed directory.
///
/// ### Note: Untrustworthy
/// `filename` is provided directly by the client. This target does not sanitize it; doing so
/// (e.g. to prevent path traversal) is the caller's responsibility before the parser is run,
/// or by wrapping this target.
pub struct FileUsingRemoteNameTarget {
    directory: PathBuf,
    open_options: OpenOptions,
    resolved_path: Option<PathBuf>,
    file: Option<File>,
}

impl FileUsingRemoteNameTarget {
    /// Write incoming parts into `directory`, under the filename the client supplied.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        let mut open_options = OpenOptions::new();
        open_options.write(true).create(true).truncate(true);
        FileUsingRemoteNameTarget {
            directory: directory.into(),
            open_options,
            resolved_path: None,
            file: None,
        }
    }

    /// The path this target resolved to, once `headers_parsed` has run.
    pub fn resolved_path(&self) -> Option<&Path> {
        self.resolved_path.as_deref()
    }
}

impl Target for FileUsingRemoteNameTarget {
    fn headers_parsed(&mut self, disposition: &ContentDisposition) -> Result<(), MultipartError> {
        let filename = disposition.filename.as_ref().ok_or_else(|| {
            MultipartError::Target(Box::new(io::Error::new(
                io::ErrorKind::InvalidInput,
                "part has no filename to resolve a remote name from",
            )))
        })?;

        self.resolved_path = Some(self.directory.join(filename));
        Ok(())
    }

    fn start(&mut self) -> Result<(), MultipartError> {
        // Only `start` before `headers_parsed` is guaranteed, not the reverse, so the file is
        // actually opened lazily on the first `data_received` call instead; see below.
        Ok(())
    }

    fn data_received(&mut self, chunk: &[u8]) -> Result<(), MultipartError> {
        if self.file.is_none() {
            let path = self.resolved_path.as_ref().ok_or_else(|| {
                MultipartError::Target(Box::new(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "data received before headers_parsed resolved a filename",
                )))
            })?;
            self.file = Some(self.open_options.open(path)?);
        }
        write_all(&mut self.file, chunk)
    }

    fn finish(&mut self) -> Result<(), MultipartError> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        Ok(())
    }
}

fn write_all(file: &mut Option<File>, chunk: &[u8]) -> Result<(), MultipartError> {
    match file {
        Some(file) => {
            file.write_all(chunk)?;
            Ok(())
        }
        None => Err(MultipartError::Target(Box::new(io::Error::new(
            io::ErrorKind::Other,
            "data_received called before start() opened the file",
        )))),
    }
}

/// Computes a streaming SHA-256 digest of a part's payload without retaining the payload
/// itself.
#[derive(Debug, Default)]
pub struct Sha256Target {
    hasher: Sha256,
}

impl Sha256Target {
    /// A fresh hasher with no data fed to it yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// The lower-case hex digest, once `finish` has run.
    pub fn hex_digest(&self) -> String {
        let digest = self.hasher.clone().finalize();
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl Target for Sha256Target {
    fn data_received(&mut self, chunk: &[u8]) -> Result<(), MultipartError> {
        self.hasher.update(chunk);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn value_target_concatenates_chunks() {
        let mut target = ValueTarget::new();
        target.data_received(b"hel").unwrap();
        target.data_received(b"lo").unwrap();
        assert_eq!(target.value(), b"hello");
    }

    #[test]
    fn sha256_target_matches_known_digest() {
        let mut target = Sha256Target::new();
        target.data_received(b"abc").unwrap();
        assert_eq!(
            target.hex_digest(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn file_target_writes_payload() {
        let dir = std::env::temp_dir().join(format!("streaming-multipart-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("out.bin");

        let mut target = FileTarget::new(&path);
        target.start().unwrap();
        target.data_received(b"payload").unwrap();
        target.finish().unwrap();

        let mut contents = Vec::new();
        File::open(&path).unwrap().read_to_end(&mut contents).unwrap();
        assert_eq!(contents, b"payload");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn file_using_remote_name_resolves_path() {
        let dir = std::env::temp_dir().join(format!("streaming-multipart-test-remote-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let mut target = FileUsingRemoteNameTarget::new(&dir);
        let disposition = ContentDisposition {
            name: "f".into(),
            filename: Some("upload.bin".into()),
            params: Vec::new(),
        };
        target.headers_parsed(&disposition).unwrap();
        assert_eq!(target.resolved_path(), Some(dir.join("upload.bin")).as_deref());

        target.data_received(b"xyz").unwrap();
        target.finish().unwrap();

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn file_using_remote_name_without_filename_errors() {
        let mut target = FileUsingRemoteNameTarget::new(std::env::temp_dir());
        let disposition = ContentDisposition {
            name: "f".into(),
            filename: None,
            params: Vec::new(),
        };
        assert!(target.headers_parsed(&disposition).is_err());
    }
}
