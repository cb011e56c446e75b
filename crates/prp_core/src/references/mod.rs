use std::collections::BTreeSet;

use crate::citations::{cited_source_ids, has_reference_section};
use crate::domain::RetrievalResult;
use crate::manifest::{Manifest, ManifestRecord};

/// Sources worth listing: every cited source plus every retrieved source.
pub fn referenced_source_ids(answer: &str, retrieved: &[RetrievalResult]) -> BTreeSet<String> {
    let mut ids = cited_source_ids(answer);
    for r in retrieved {
        if !r.source_id.is_empty() {
            ids.insert(r.source_id.clone());
        }
    }
    ids
}

pub fn format_reference(rec: &ManifestRecord) -> String {
    let title = if rec.title.is_empty() { "Unknown" } else { rec.title.as_str() };
    format!(
        "- **{}**: {}. {} ({}). {}. {}",
        rec.source_id, title, rec.authors, rec.year, rec.venue, rec.url_or_doi
    )
}

/// One line per id found in the manifest, sorted by id. Unknown ids are dropped: the
/// manifest is the source of truth, so an id it does not know is unverifiable.
pub fn build_reference_list(source_ids: &BTreeSet<String>, manifest: &Manifest) -> Vec<String> {
    source_ids
        .iter()
        .filter_map(|sid| manifest.get(sid))
        .map(format_reference)
        .collect()
}

/// Append a `## References` section for cited and retrieved sources.
///
/// Returns the answer unchanged when it already has a reference section or when no
/// source resolves, so applying it twice equals applying it once.
pub fn attach_references(answer: &str, retrieved: &[RetrievalResult], manifest: &Manifest) -> String {
    if has_reference_section(answer) {
        return answer.to_string();
    }
    let ids = referenced_source_ids(answer, retrieved);
    let lines = build_reference_list(&ids, manifest);
    if lines.is_empty() {
        return answer.to_string();
    }
    format!(
        "{}\n\n## References\n\n{}",
        answer.trim_end(),
        lines.join("\n")
    )
}
