//! Citation-marker grammar.
//!
//! ```text
//! marker     := "(" ident [ ws* "," ws* ident ws* ] ")"
//! ident      := [A-Za-z0-9_-]+
//! ```
//!
//! The marker surface is shared with the generation prompt and existing run logs, so it
//! is matched exactly: no whitespace after `(` and none before `)` for one-identifier
//! markers. Scanning is leftmost and non-overlapping.

pub mod segment;

use std::collections::BTreeSet;

use crate::domain::CitationMarker;

pub use segment::{segment_claims, MIN_CLAIM_CHARS};

/// Section headings that start the appended reference list.
pub const REFERENCE_HEADINGS: [&str; 2] = ["## References", "**References**"];

/// A marker together with its byte span in the scanned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerMatch {
    pub start: usize,
    pub end: usize,
    pub marker: CitationMarker,
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

fn take_ident(bytes: &[u8], from: usize) -> usize {
    let mut i = from;
    while i < bytes.len() && is_ident_byte(bytes[i]) {
        i += 1;
    }
    i
}

fn skip_ws(bytes: &[u8], from: usize) -> usize {
    let mut i = from;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// Try to read one marker whose `(` sits at `pos`. Returns the end offset (exclusive).
fn match_marker_at(text: &str, pos: usize) -> Option<(usize, CitationMarker)> {
    let bytes = text.as_bytes();
    if bytes.get(pos) != Some(&b'(') {
        return None;
    }

    let first_start = pos + 1;
    let first_end = take_ident(bytes, first_start);
    if first_end == first_start {
        return None;
    }
    let source_id = &text[first_start..first_end];

    if bytes.get(first_end) == Some(&b')') {
        return Some((first_end + 1, CitationMarker::source_only(source_id)));
    }

    let comma = skip_ws(bytes, first_end);
    if bytes.get(comma) != Some(&b',') {
        return None;
    }
    let second_start = skip_ws(bytes, comma + 1);
    let second_end = take_ident(bytes, second_start);
    if second_end == second_start {
        return None;
    }
    let close = skip_ws(bytes, second_end);
    if bytes.get(close) != Some(&b')') {
        return None;
    }

    Some((
        close + 1,
        CitationMarker::with_fragment(source_id, &text[second_start..second_end]),
    ))
}

/// All markers in `text`, left to right.
pub fn scan_markers(text: &str) -> Vec<MarkerMatch> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] == b'(' {
            if let Some((end, marker)) = match_marker_at(text, i) {
                out.push(MarkerMatch {
                    start: i,
                    end,
                    marker,
                });
                i = end;
                continue;
            }
        }
        i += 1;
    }
    out
}

/// Distinct source ids cited anywhere in `text`.
pub fn cited_source_ids(text: &str) -> BTreeSet<String> {
    scan_markers(text)
        .into_iter()
        .map(|m| m.marker.source_id)
        .collect()
}

pub fn has_reference_section(answer: &str) -> bool {
    REFERENCE_HEADINGS.iter().any(|h| answer.contains(h))
}

/// The answer body with any trailing reference section removed.
pub fn strip_reference_section(answer: &str) -> &str {
    let mut body = answer;
    for heading in REFERENCE_HEADINGS {
        if let Some(idx) = body.find(heading) {
            body = body[..idx].trim();
        }
    }
    body
}
