// Copyright 2016 `multipart` Crate Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//! The delimiter finder: locates a fixed byte pattern across successive, independently-sized
//! chunks without ever buffering more than `pattern.len() - 1` bytes between calls.

/// The result of feeding one chunk to a [`Finder`].
pub(crate) struct Fed<'a> {
    /// Bytes that were held over from a previous call and are now proven not to be part of
    /// the pattern. Must be committed (in order) *before* `committed`.
    pub carry_flush: Vec<u8>,
    /// A slice borrowed directly from the chunk passed to `feed`, safe to commit after
    /// `carry_flush`.
    pub committed: &'a [u8],
    /// `Some(rest)` if the pattern was found in this call. `rest` is whatever of the chunk
    /// remained after the matched pattern; the caller is responsible for reprocessing it
    /// (e.g. re-entering the finder for the next delimiter, or inspecting it directly).
    pub matched_rest: Option<&'a [u8]>,
}

/// Scans a byte stream, delivered as a sequence of independently-sized chunks, for
/// non-overlapping occurrences of a fixed pattern.
///
/// Carries at most `pattern.len() - 1` bytes between calls: the proper suffix of everything
/// seen so far that is also a proper prefix of `pattern`, and therefore might still turn into
/// a match once more bytes arrive.
#[derive(Debug)]
pub(crate) struct Finder {
    pattern: Vec<u8>,
    carry: Vec<u8>,
}

impl Finder {
    pub fn new(pattern: impl Into<Vec<u8>>) -> Self {
        let pattern = pattern.into();
        assert!(!pattern.is_empty(), "Finder pattern must not be empty");
        Finder {
            carry: Vec::with_capacity(pattern.len() - 1),
            pattern,
        }
    }

    /// The number of carried bytes, `< pattern.len()`. Exposed for the carry-bound property test.
    pub fn carry_len(&self) -> usize {
        self.carry.len()
    }

    pub fn pattern_len(&self) -> usize {
        self.pattern.len()
    }

    /// Drop any held-back carry. Used when a match has just been consumed and the carry is
    /// known to have been part of the delimiter, not payload.
    pub fn reset(&mut self) {
        self.carry.clear();
    }

    /// Pre-populate the carry with bytes that were never part of the real input stream. Used
    /// once, at construction, to let a single search recognize a pattern occurring with no
    /// real bytes in front of it (see `parser.rs`'s virtual leading CRLF at body start).
    /// `seed` must be a proper prefix of `pattern`, shorter than `pattern.len()`.
    pub fn seed_carry(&mut self, seed: &[u8]) {
        debug_assert!(seed.len() < self.pattern.len());
        debug_assert_eq!(&self.pattern[..seed.len()], seed);
        self.carry = seed.to_vec();
    }

    pub fn feed<'a>(&mut self, chunk: &'a [u8]) -> Fed<'a> {
        if chunk.is_empty() {
            return Fed {
                carry_flush: Vec::new(),
                committed: &[],
                matched_rest: None,
            };
        }

        if self.carry.is_empty() {
            return self.feed_no_carry(chunk);
        }

        self.feed_with_carry(chunk)
    }

    fn feed_no_carry<'a>(&mut self, chunk: &'a [u8]) -> Fed<'a> {
        if let Some(pos) = find(chunk, &self.pattern) {
            let rest_start = pos + self.pattern.len();
            return Fed {
                carry_flush: Vec::new(),
                committed: &chunk[..pos],
                matched_rest: Some(&chunk[rest_start..]),
            };
        }

        let k = longest_prefix_suffix(chunk, &self.pattern);
        let commit_end = chunk.len() - k;
        self.carry = chunk[commit_end..].to_vec();

        Fed {
            carry_flush: Vec::new(),
            committed: &chunk[..commit_end],
            matched_rest: None,
        }
    }

    fn feed_with_carry<'a>(&mut self, chunk: &'a [u8]) -> Fed<'a> {
        let carry_len = self.carry.len();
        let mut combined = std::mem::take(&mut self.carry);
        combined.extend_from_slice(chunk);

        if let Some(pos) = find(&combined, &self.pattern) {
            let match_end = pos + self.pattern.len();

            let carry_flush = combined[..pos.min(carry_len)].to_vec();
            let committed = if pos > carry_len {
                &chunk[..pos - carry_len]
            } else {
                &chunk[..0]
            };
            // `match_end > carry_len` always holds: carry_len <= pattern.len() - 1 and
            // match_end >= pattern.len(), so the remainder always lies inside `chunk`.
            let rest = &chunk[match_end - carry_len..];

            return Fed {
                carry_flush,
                committed,
                matched_rest: Some(rest),
            };
        }

        let k = longest_prefix_suffix(&combined, &self.pattern);
        let commit_end = combined.len() - k;

        let (carry_flush, committed) = if commit_end <= carry_len {
            (combined[..commit_end].to_vec(), &chunk[..0])
        } else {
            (combined[..carry_len].to_vec(), &chunk[..commit_end - carry_len])
        };

        self.carry = combined[commit_end..].to_vec();

        Fed {
            carry_flush,
            committed,
            matched_rest: None,
        }
    }
}

/// Find the first occurrence of `pattern` in `haystack`, using a Boyer-Moore-Horspool bad
/// character table. `pattern` is expected to be short (a multipart delimiter is at most
/// ~76 bytes), so the table is rebuilt on every search rather than cached.
fn find(haystack: &[u8], pattern: &[u8]) -> Option<usize> {
    if pattern.len() > haystack.len() {
        return None;
    }
    if pattern.is_empty() {
        return Some(0);
    }

    let plen = pattern.len();
    let last = plen - 1;

    let mut skip = [plen; 256];
    for (i, &b) in pattern[..last].iter().enumerate() {
        skip[b as usize] = last - i;
    }

    let mut pos = 0;
    while pos + plen <= haystack.len() {
        let window = &haystack[pos..pos + plen];
        if window == pattern {
            return Some(pos);
        }
        let skip_by = skip[window[last] as usize];
        pos += skip_by;
    }

    None
}

/// `k = max { j <= min(haystack.len(), pattern.len() - 1) : haystack[end-j..] == pattern[..j] }`
fn longest_prefix_suffix(haystack: &[u8], pattern: &[u8]) -> usize {
    let max_k = haystack.len().min(pattern.len() - 1);
    for k in (1..=max_k).rev() {
        if haystack[haystack.len() - k..] == pattern[..k] {
            return k;
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Drives `finder` over `chunks`, immediately re-feeding whatever follows a match (within
    /// the same logical buffer) so that back-to-back delimiters are all discovered — this is
    /// how a caller recovers the "all non-overlapping matches" property from a finder whose
    /// `feed` reports only the first match per call.
    fn collect_all(finder: &mut Finder, chunks: &[&[u8]]) -> (Vec<u8>, Vec<usize>) {
        let mut committed = Vec::new();
        let mut match_offsets = Vec::new();

        for chunk in chunks {
            let mut rest = *chunk;
            loop {
                let fed = finder.feed(rest);
                committed.extend_from_slice(&fed.carry_flush);
                committed.extend_from_slice(fed.committed);
                match fed.matched_rest {
                    Some(next_rest) => {
                        match_offsets.push(committed.len());
                        finder.reset();
                        rest = next_rest;
                    }
                    None => break,
                }
            }
        }

        (committed, match_offsets)
    }

    #[test]
    fn single_chunk_match() {
        let mut finder = Finder::new(b"--X".to_vec());
        let fed = finder.feed(b"hello--Xworld");
        assert_eq!(fed.carry_flush, Vec::<u8>::new());
        assert_eq!(fed.committed, b"hello");
        assert_eq!(fed.matched_rest, Some(&b"world"[..]));
    }

    #[test]
    fn no_match_retains_prefix_as_carry() {
        let mut finder = Finder::new(b"--X".to_vec());
        let fed = finder.feed(b"hello--");
        assert_eq!(fed.committed, b"hello");
        assert_eq!(fed.matched_rest, None);
        assert_eq!(finder.carry_len(), 2);
    }

    #[test]
    fn straddling_match_byte_by_byte() {
        let _ = env_logger::try_init();
        debug!("testing byte-by-byte straddling match");

        let pattern: &[u8] = b"--X";
        let mut finder = Finder::new(pattern.to_vec());
        let data = b"ab--Xcd";

        let mut committed = Vec::new();
        let mut matched = false;

        for &byte in data {
            let chunk = [byte];
            let fed = finder.feed(&chunk);
            committed.extend_from_slice(&fed.carry_flush);
            committed.extend_from_slice(fed.committed);
            if let Some(rest) = fed.matched_rest {
                committed.extend_from_slice(rest);
                matched = true;
                finder.reset();
            }
        }

        assert!(matched);
        assert_eq!(committed, b"abcd");
    }

    #[test]
    fn carry_never_exceeds_pattern_len_minus_one() {
        let pattern: &[u8] = b"\r\n--boundary";
        let mut finder = Finder::new(pattern.to_vec());

        // Feed every proper prefix of the pattern, one byte at a time, and confirm the carry
        // bound holds at every step (no match should ever be reported, since we never
        // complete the pattern).
        for &byte in &pattern[..pattern.len() - 1] {
            let chunk = [byte];
            let fed = finder.feed(&chunk);
            assert!(fed.matched_rest.is_none());
            assert!(finder.carry_len() <= pattern.len() - 1);
        }
    }

    #[test]
    fn non_overlapping_matches_left_to_right() {
        let mut finder = Finder::new(b"aa".to_vec());
        // "aa" `aa` `aa" -> at positions 0 and non-overlapping at 2, not 1 (greedy, no overlap)
        let (committed, offsets) = collect_all(&mut finder, &[b"aaaa"]);
        assert_eq!(committed, b"");
        assert_eq!(offsets, vec![0, 0]);
    }

    #[test]
    fn empty_chunk_is_noop() {
        let mut finder = Finder::new(b"--X".to_vec());
        let fed = finder.feed(b"");
        assert_eq!(fed.committed, b"");
        assert!(fed.matched_rest.is_none());
        assert_eq!(finder.carry_len(), 0);
    }
}
