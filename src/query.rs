//! Query processing: decode → bang match → stitch → encode.
//!
//! A bang is a `!`-prefixed token that starts the query or follows a space,
//! runs to the next space, is at least two bytes long and names a directory
//! entry. The earliest such token wins.

use std::sync::Arc;

use crate::codec;
use crate::directory::{Bang, Directory};

pub const QUERY_MARKER: &[u8] = b"?q=";
pub const DEFAULT_SEARCH_TEMPLATE: &str = "https://www.google.com/search?q=";

/// A matched bang token inside a decoded query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BangMatch<'d, 'q> {
    pub trigger: &'q [u8],
    pub position: usize,
    pub len: usize,
    pub bang: &'d Bang,
}

/// Where to redirect: `target` is a URL template (its placeholder still
/// unfilled) or a bare domain, `query` is the percent-encoded remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved<'d, 'b> {
    pub target: &'d str,
    pub query: &'b [u8],
    pub bang: Option<&'d Bang>,
}

/// Finds the earliest bang in `decoded`.
pub fn find_bang<'d, 'q>(directory: &'d Directory, decoded: &'q [u8]) -> Option<BangMatch<'d, 'q>> {
    if decoded.first() == Some(&b'!') {
        if let Some(found) = candidate_at(directory, decoded, 0) {
            return Some(found);
        }
    }

    let mut from = 1;
    while let Some(offset) = decoded.get(from..).and_then(|rest| codec::find_byte(rest, b'!')) {
        let position = from + offset;
        if decoded[position - 1] == b' ' {
            if let Some(found) = candidate_at(directory, decoded, position) {
                return Some(found);
            }
        }
        from = position + 1;
    }
    None
}

fn candidate_at<'d, 'q>(
    directory: &'d Directory,
    decoded: &'q [u8],
    position: usize,
) -> Option<BangMatch<'d, 'q>> {
    let rest = &decoded[position..];
    let len = rest.iter().position(|&b| b == b' ').unwrap_or(rest.len());
    if len < 2 {
        return None;
    }
    let trigger = &rest[..len];
    directory.get(trigger).map(|bang| BangMatch {
        trigger,
        position,
        len,
        bang,
    })
}

/// Raw (still encoded) value of the `q` parameter: the bytes after `?q=` up
/// to the next space or the end of `url`.
pub fn extract_query(url: &[u8]) -> Option<&[u8]> {
    let marker = url
        .windows(QUERY_MARKER.len())
        .position(|w| w == QUERY_MARKER)?;
    let rest = &url[marker + QUERY_MARKER.len()..];
    let end = codec::find_byte(rest, b' ').unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Removes the `len`-byte token at `position` plus one adjoining space on
/// each side, joining what is left with a single space. Works in place and
/// returns the new length.
fn stitch(query: &mut [u8], position: usize, len: usize) -> usize {
    let prefix = position.saturating_sub(1);
    let mut suffix = position + len;
    if query.get(suffix) == Some(&b' ') {
        suffix += 1;
    }
    let suffix_len = query.len() - suffix;

    match (prefix, suffix_len) {
        (0, 0) => 0,
        (0, _) => {
            query.copy_within(suffix.., 0);
            suffix_len
        }
        (_, 0) => prefix,
        _ => {
            query[prefix] = b' ';
            query.copy_within(suffix.., prefix + 1);
            prefix + 1 + suffix_len
        }
    }
}

pub struct QueryProcessor {
    directory: Arc<Directory>,
    default_template: String,
}

impl QueryProcessor {
    pub fn new(directory: Arc<Directory>, default_template: impl Into<String>) -> Self {
        Self {
            directory,
            default_template: default_template.into(),
        }
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn default_template(&self) -> &str {
        &self.default_template
    }

    /// Resolves the search in `url` using `decode` and `encode` as scratch.
    ///
    /// `decode` must hold the raw query length, `encode` three times that.
    pub fn process<'s, 'b>(
        &'s self,
        url: &[u8],
        decode: &'b mut [u8],
        encode: &'b mut [u8],
    ) -> Resolved<'s, 'b> {
        let Some(raw) = extract_query(url) else {
            return self.fallback(&[]);
        };

        let decoded_len = codec::decode(raw, decode);
        let decoded = &decode[..decoded_len];

        let Some(found) = find_bang(&self.directory, decoded) else {
            let n = codec::encode(decoded, encode);
            let encode: &'b [u8] = encode;
            return self.fallback(&encode[..n]);
        };
        let (position, len, bang) = (found.position, found.len, found.bang);

        let clean_len = stitch(&mut decode[..decoded_len], position, len);
        if clean_len == 0 {
            if let Some(domain) = &bang.domain {
                return Resolved {
                    target: domain,
                    query: &[],
                    bang: Some(bang),
                };
            }
        }

        let n = codec::encode(&decode[..clean_len], encode);
        let encode: &'b [u8] = encode;
        Resolved {
            target: &bang.url_template,
            query: &encode[..n],
            bang: Some(bang),
        }
    }

    fn fallback<'s, 'b>(&'s self, query: &'b [u8]) -> Resolved<'s, 'b> {
        Resolved {
            target: &self.default_template,
            query,
            bang: None,
        }
    }
}
