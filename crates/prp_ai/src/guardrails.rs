//! After-the-fact checks on generated answers. Nothing here fails a query: violations are
//! reported so callers can demote or display them.

use prp_core::citations::{scan_markers, segment::significant_claims, strip_reference_section};
use prp_core::domain::{CitationMarker, RetrievalResult, REFUSAL_PHRASE};
use prp_core::evidence::resolve_marker;
use prp_core::manifest::Manifest;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarkerAudit {
    pub marker: String,
    pub source_id: String,
    pub fragment_id: String,
    /// The exact fragment id is in the retrieved set.
    pub exact_match: bool,
    /// Retrieved fragment the marker resolves to, exact or by source fallback.
    pub resolved_to: Option<String>,
    pub source_in_manifest: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CitationAudit {
    pub is_refusal: bool,
    pub markers: Vec<MarkerAudit>,
    pub uncited_claims: usize,
}

impl CitationAudit {
    pub fn unresolved(&self) -> impl Iterator<Item = &MarkerAudit> {
        self.markers.iter().filter(|m| m.resolved_to.is_none())
    }

    pub fn unknown_sources(&self) -> impl Iterator<Item = &MarkerAudit> {
        self.markers.iter().filter(|m| !m.source_in_manifest)
    }

    /// Every marker resolves and every source is known.
    pub fn is_clean(&self) -> bool {
        self.unresolved().next().is_none() && self.unknown_sources().next().is_none()
    }
}

/// The answer reports that the corpus lacks support for the question.
pub fn reports_missing_evidence(answer: &str) -> bool {
    let lower = answer.to_lowercase();
    lower.contains("corpus does not contain evidence") || lower.contains("no evidence")
}

pub fn audit_citations(
    answer: &str,
    retrieved: &[RetrievalResult],
    manifest: Option<&Manifest>,
) -> CitationAudit {
    let body = strip_reference_section(answer);
    let markers = scan_markers(body)
        .into_iter()
        .map(|m| audit_marker(&m.marker, retrieved, manifest))
        .collect();
    let uncited_claims = significant_claims(answer)
        .iter()
        .filter(|c| c.citations.is_empty())
        .count();

    CitationAudit {
        is_refusal: body.trim_start().starts_with(REFUSAL_PHRASE),
        markers,
        uncited_claims,
    }
}

fn audit_marker(
    marker: &CitationMarker,
    retrieved: &[RetrievalResult],
    manifest: Option<&Manifest>,
) -> MarkerAudit {
    let wanted = marker.canonical_fragment_id();
    MarkerAudit {
        marker: marker.render(),
        source_id: marker.source_id.clone(),
        exact_match: retrieved.iter().any(|r| r.fragment_id == wanted),
        resolved_to: resolve_marker(marker, retrieved).map(|r| r.fragment_id.clone()),
        source_in_manifest: manifest.map(|m| m.contains(&marker.source_id)).unwrap_or(false),
        fragment_id: wanted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prp_core::manifest::ManifestRecord;

    fn hit(fragment_id: &str, source_id: &str) -> RetrievalResult {
        RetrievalResult {
            fragment_id: fragment_id.to_string(),
            source_id: source_id.to_string(),
            text: "t".to_string(),
            sequence_index: 0,
            distance: 0.0,
        }
    }

    #[test]
    fn reports_exact_fallback_and_fabricated_markers() {
        let manifest = Manifest::from_records(vec![ManifestRecord {
            source_id: "A".to_string(),
            ..ManifestRecord::default()
        }]);
        let answer = "First claim text (A, A_chunk_01). Second claim (A, A_chunk_07). \
Made up claim (GHOST).\n\nA paragraph with no citation at all.";
        let audit = audit_citations(answer, &[hit("A_chunk_01", "A")], Some(&manifest));

        assert!(!audit.is_refusal);
        assert_eq!(audit.markers.len(), 3);
        assert!(audit.markers[0].exact_match);
        assert!(!audit.markers[1].exact_match);
        assert_eq!(audit.markers[1].resolved_to.as_deref(), Some("A_chunk_01"));
        assert_eq!(audit.markers[2].resolved_to, None);
        assert!(!audit.markers[2].source_in_manifest);
        assert_eq!(audit.uncited_claims, 1);
        assert!(!audit.is_clean());
    }

    #[test]
    fn reference_section_is_not_audited() {
        let answer = "Claim here (A).\n\n## References\n\n- **B**: (B) title";
        let audit = audit_citations(answer, &[hit("A_chunk_00", "A")], None);
        assert_eq!(audit.markers.len(), 1);
    }

    #[test]
    fn detects_refusals() {
        let audit = audit_citations(
            "The corpus does not contain evidence for this. No relevant passages were retrieved.",
            &[],
            None,
        );
        assert!(audit.is_refusal);
        assert!(reports_missing_evidence("Sorry, there is no evidence for that."));
        assert!(!reports_missing_evidence("Faithfulness is measured (A)."));
    }
}
