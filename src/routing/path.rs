//! Lexical path cleanup and segmentation.
//!
//! # Responsibilities
//! - Resolve `.` and `..` elements and collapse duplicate slashes
//! - Preserve the trailing slash, which is routing-significant
//! - Split paths into segments that keep their trailing slash attached
//!
//! # Design Decisions
//! - Purely lexical: no filesystem access, no percent-decoding
//! - Cleanup differences surface as 301 redirects, not silent rewrites

/// Lexically cleans a URL path.
///
/// Collapses duplicate slashes, resolves `.` and `..`, and keeps a trailing
/// slash when the input had one. The result always begins with `/`.
pub fn clean(path: &str) -> String {
    let trailing = path.ends_with('/');

    let mut out: Vec<&str> = Vec::new();
    for piece in path.split('/') {
        match piece {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            _ => out.push(piece),
        }
    }

    let mut cleaned = String::with_capacity(path.len());
    cleaned.push('/');
    cleaned.push_str(&out.join("/"));
    if trailing && !cleaned.ends_with('/') {
        cleaned.push('/');
    }
    cleaned
}

/// Splits after every `/`, keeping the separator attached to its segment.
///
/// `"/dir/file"` becomes `["/", "dir/", "file"]`, mirroring the shape the
/// trie stores: directory segments carry their slash, file segments do not.
pub fn split_after(s: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for (i, b) in s.bytes().enumerate() {
        if b == b'/' {
            pieces.push(s[start..=i].to_string());
            start = i + 1;
        }
    }
    pieces.push(s[start..].to_string());
    pieces
}

/// Trims empty strings from both ends of a segment list.
pub fn trim_empty_ends(mut segments: Vec<String>) -> Vec<String> {
    while segments.first().is_some_and(|s| s.is_empty()) {
        segments.remove(0);
    }
    while segments.last().is_some_and(|s| s.is_empty()) {
        segments.pop();
    }
    segments
}

/// Splits a request path into trie segments: everything after the leading
/// slash, slash-keeping, with empty ends removed.
pub fn request_segments(path: &str) -> Vec<String> {
    let mut pieces = split_after(path);
    if !pieces.is_empty() {
        pieces.remove(0);
    }
    trim_empty_ends(pieces)
}
