use serde::{Deserialize, Deserializer, Serialize};

/// Literal separating a source id from the fragment ordinal in a fragment id.
pub const FRAGMENT_ID_DELIMITER: &str = "_chunk_";

/// Fixed phrase the answer generator emits when no fragment supports an answer.
pub const REFUSAL_PHRASE: &str = "The corpus does not contain evidence for this.";

/// Cleaned document text as handed over by the extraction collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub source_id: String,
    pub text: String,
}

impl Document {
    pub fn new(source_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            text: text.into(),
        }
    }
}

/// Single-fragment records written by older ingests carry only `word_count` and
/// `total_chunks`; the span fields default to zero when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FragmentMeta {
    pub word_count: usize,
    pub start_word: usize,
    pub end_word: usize,
    pub total_chunks: usize,
}

/// A bounded, citable slice of one document.
///
/// Serialized with the fragment-store field names (`chunk_id`, `chunk_index`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Fragment {
    #[serde(rename = "chunk_id")]
    pub fragment_id: String,
    pub source_id: String,
    pub text: String,
    #[serde(rename = "chunk_index")]
    pub sequence_index: usize,
    pub metadata: FragmentMeta,
}

/// `{source_id}_chunk_{NN}`, zero padded to at least two digits.
pub fn fragment_id_for(source_id: &str, sequence_index: usize) -> String {
    format!("{source_id}{FRAGMENT_ID_DELIMITER}{sequence_index:02}")
}

/// One hit of a retrieval query. `distance` is stored as `score` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalResult {
    #[serde(rename = "chunk_id")]
    pub fragment_id: String,
    pub source_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "chunk_index", default, deserialize_with = "null_as_default")]
    pub sequence_index: usize,
    #[serde(rename = "score", default, deserialize_with = "null_as_default")]
    pub distance: f32,
}

// Older thread records carry `null` for fields they could not fill.
fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

impl RetrievalResult {
    pub fn from_fragment(fragment: &Fragment, distance: f32) -> Self {
        Self {
            fragment_id: fragment.fragment_id.clone(),
            source_id: fragment.source_id.clone(),
            text: fragment.text.clone(),
            sequence_index: fragment.sequence_index,
            distance,
        }
    }
}

/// A parsed `(source_id)` or `(source_id, fragment_id)` occurrence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CitationMarker {
    pub source_id: String,
    pub fragment_id: Option<String>,
}

impl CitationMarker {
    pub fn source_only(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            fragment_id: None,
        }
    }

    pub fn with_fragment(source_id: impl Into<String>, fragment_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            fragment_id: Some(fragment_id.into()),
        }
    }

    /// True when the second identifier follows the `{source}_chunk_{NN}` convention and
    /// is not a repeat of the source id. This is a substring heuristic: a source id
    /// that itself contains `_chunk_` is misclassified.
    pub fn has_fragment_ref(&self) -> bool {
        match self.fragment_id.as_deref() {
            Some(fid) => fid != self.source_id && fid.contains(FRAGMENT_ID_DELIMITER),
            None => false,
        }
    }

    /// Fragment id this marker points at. A missing second identifier, or one equal to
    /// the source id, means "the first fragment of that source".
    pub fn canonical_fragment_id(&self) -> String {
        match self.fragment_id.as_deref() {
            Some(fid) if fid != self.source_id => fid.to_string(),
            _ => fragment_id_for(&self.source_id, 0),
        }
    }

    /// Surface form, as the generator is asked to write it.
    pub fn render(&self) -> String {
        match self.fragment_id.as_deref() {
            Some(fid) => format!("({}, {})", self.source_id, fid),
            None => format!("({})", self.source_id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claim {
    pub text: String,
    pub citations: Vec<CitationMarker>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvidenceRow {
    pub claim: String,
    pub evidence_snippet: String,
    pub citation: String,
    pub confidence: Confidence,
    pub notes: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_ids_are_zero_padded() {
        assert_eq!(fragment_id_for("RAGAS2023", 0), "RAGAS2023_chunk_00");
        assert_eq!(fragment_id_for("RAGAS2023", 7), "RAGAS2023_chunk_07");
        assert_eq!(fragment_id_for("RAGAS2023", 123), "RAGAS2023_chunk_123");
    }

    #[test]
    fn canonical_fragment_id_normalizes_source_only_markers() {
        assert_eq!(
            CitationMarker::source_only("SRC1").canonical_fragment_id(),
            "SRC1_chunk_00"
        );
        assert_eq!(
            CitationMarker::with_fragment("SRC1", "SRC1").canonical_fragment_id(),
            "SRC1_chunk_00"
        );
        assert_eq!(
            CitationMarker::with_fragment("SRC1", "SRC1_chunk_04").canonical_fragment_id(),
            "SRC1_chunk_04"
        );
        // Explicit identifiers outside the convention are kept as given.
        assert_eq!(
            CitationMarker::with_fragment("SRC1", "p12").canonical_fragment_id(),
            "p12"
        );
        assert!(!CitationMarker::with_fragment("SRC1", "p12").has_fragment_ref());
    }

    #[test]
    fn retrieval_result_uses_wire_field_names() {
        let r = RetrievalResult {
            fragment_id: "A_chunk_00".to_string(),
            source_id: "A".to_string(),
            text: "t".to_string(),
            sequence_index: 0,
            distance: 0.5,
        };
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["chunk_id"], "A_chunk_00");
        assert_eq!(v["chunk_index"], 0);
        assert_eq!(v["score"], 0.5);
    }
}
