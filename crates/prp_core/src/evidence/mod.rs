//! Claim → fragment → confidence table built from an answer and its retrieved fragments.

pub mod render;

use crate::citations::segment::significant_claims;
use crate::domain::{CitationMarker, Confidence, EvidenceRow, RetrievalResult};
use crate::thread::ResearchThread;

pub use render::{render_csv, render_html, render_markdown, EvidenceFormat};

pub const EVIDENCE_SNIPPET_CHARS: usize = 500;
pub const NOTE_NO_CITATION: &str = "No inline citation";
pub const NOTE_NOT_RETRIEVED: &str = "Chunk not in retrieved set";

/// Exact fragment-id match first, then the first retrieved fragment of the same source.
pub fn resolve_marker<'a>(
    marker: &CitationMarker,
    retrieved: &'a [RetrievalResult],
) -> Option<&'a RetrievalResult> {
    let wanted = marker.canonical_fragment_id();
    retrieved
        .iter()
        .find(|r| r.fragment_id == wanted)
        .or_else(|| retrieved.iter().find(|r| r.source_id == marker.source_id))
}

fn row_for_citation(claim: &str, marker: &CitationMarker, retrieved: &[RetrievalResult]) -> EvidenceRow {
    let resolved = resolve_marker(marker, retrieved).filter(|r| !r.text.trim().is_empty());
    match resolved {
        Some(r) => EvidenceRow {
            claim: claim.to_string(),
            evidence_snippet: render::truncate_chars(&r.text, EVIDENCE_SNIPPET_CHARS),
            citation: format!("({}, {})", marker.source_id, r.fragment_id),
            confidence: Confidence::High,
            notes: String::new(),
        },
        None => EvidenceRow {
            claim: claim.to_string(),
            evidence_snippet: String::new(),
            citation: format!("({}, {})", marker.source_id, marker.canonical_fragment_id()),
            confidence: Confidence::Low,
            notes: NOTE_NOT_RETRIEVED.to_string(),
        },
    }
}

/// One row per (claim, citation); uncited claims get a single low-confidence row.
pub fn build_evidence_rows(answer: &str, retrieved: &[RetrievalResult]) -> Vec<EvidenceRow> {
    let mut rows = Vec::new();
    for claim in significant_claims(answer) {
        if claim.citations.is_empty() {
            rows.push(EvidenceRow {
                claim: claim.text,
                evidence_snippet: String::new(),
                citation: String::new(),
                confidence: Confidence::Low,
                notes: NOTE_NO_CITATION.to_string(),
            });
            continue;
        }
        for marker in claim.citations.iter() {
            rows.push(row_for_citation(&claim.text, marker, retrieved));
        }
    }
    rows
}

pub fn build_evidence_table(thread: &ResearchThread) -> Vec<EvidenceRow> {
    build_evidence_rows(&thread.answer, &thread.retrieved_chunks)
}
