use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Bibliographic row of the corpus manifest, keyed by `source_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ManifestRecord {
    pub source_id: String,
    pub raw_path: String,
    pub processed_path: String,
    pub title: String,
    pub authors: String,
    pub year: String,
    pub venue: String,
    pub url_or_doi: String,
    /// `;`-separated.
    pub tags: String,
}

impl ManifestRecord {
    pub fn tag_list(&self) -> Vec<String> {
        self.tags
            .split(';')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

/// Read-only lookup table; manifest order is preserved for ingestion and tag suggestions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    records: Vec<ManifestRecord>,
    by_id: BTreeMap<String, usize>,
}

fn get<'a>(row: &'a csv::StringRecord, headers: &csv::StringRecord, name: &str) -> &'a str {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .and_then(|idx| row.get(idx))
        .map(|v| v.trim())
        .unwrap_or("")
}

impl Manifest {
    pub fn from_records(records: Vec<ManifestRecord>) -> Self {
        let mut m = Manifest::default();
        for r in records {
            m.insert(r);
        }
        m
    }

    fn insert(&mut self, rec: ManifestRecord) {
        // A repeated source_id replaces the earlier row in place.
        if let Some(&idx) = self.by_id.get(&rec.source_id) {
            self.records[idx] = rec;
            return;
        }
        self.by_id.insert(rec.source_id.clone(), self.records.len());
        self.records.push(rec);
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            return Err(AppError::new(
                "MANIFEST_NOT_FOUND",
                "Corpus manifest not found",
            )
            .with_details(format!("path={}", path.display())));
        }
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::new("MANIFEST_READ_FAILED", "Failed to read corpus manifest")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        Self::parse(&raw)
    }

    pub fn parse(csv_text: &str) -> Result<Self, AppError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(csv_text.as_bytes());

        let headers = rdr
            .headers()
            .map_err(|e| {
                AppError::new("MANIFEST_PARSE_FAILED", "Failed to read manifest headers")
                    .with_details(e.to_string())
            })?
            .clone();
        if !headers.iter().any(|h| h.trim() == "source_id") {
            return Err(AppError::new(
                "MANIFEST_PARSE_FAILED",
                "Manifest is missing the source_id column",
            ));
        }

        let mut manifest = Manifest::default();
        for (i, result) in rdr.records().enumerate() {
            let row = result.map_err(|e| {
                AppError::new("MANIFEST_PARSE_FAILED", "Failed to parse manifest row")
                    .with_details(format!("row={}; err={}", i + 1, e))
            })?;
            let source_id = get(&row, &headers, "source_id");
            if source_id.is_empty() {
                continue;
            }
            manifest.insert(ManifestRecord {
                source_id: source_id.to_string(),
                raw_path: get(&row, &headers, "raw_path").to_string(),
                processed_path: get(&row, &headers, "processed_path").to_string(),
                title: get(&row, &headers, "title").to_string(),
                authors: get(&row, &headers, "authors").to_string(),
                year: get(&row, &headers, "year").to_string(),
                venue: get(&row, &headers, "venue").to_string(),
                url_or_doi: get(&row, &headers, "url_or_doi").to_string(),
                tags: get(&row, &headers, "tags").to_string(),
            });
        }
        Ok(manifest)
    }

    pub fn get(&self, source_id: &str) -> Option<&ManifestRecord> {
        self.by_id.get(source_id).map(|&i| &self.records[i])
    }

    pub fn contains(&self, source_id: &str) -> bool {
        self.by_id.contains_key(source_id)
    }

    pub fn records(&self) -> &[ManifestRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

const FALLBACK_KEYWORDS: [&str; 4] = ["faithfulness", "RAG", "evaluation", "benchmark"];

/// First distinct manifest tags (lower-cased, longer than two characters), in manifest order.
pub fn suggested_keywords(manifest: Option<&Manifest>, limit: usize) -> Vec<String> {
    let mut seen = std::collections::BTreeSet::new();
    let mut out = Vec::new();
    if let Some(m) = manifest {
        'rows: for rec in m.records() {
            for tag in rec.tag_list() {
                let tag = tag.to_lowercase();
                if tag.chars().count() > 2 && seen.insert(tag.clone()) {
                    out.push(tag);
                    if out.len() >= limit {
                        break 'rows;
                    }
                }
            }
        }
    }
    if out.is_empty() {
        return FALLBACK_KEYWORDS
            .iter()
            .take(limit)
            .map(|s| s.to_string())
            .collect();
    }
    out
}

/// Trust-behavior hint shown when the answer reports missing evidence.
pub fn suggestion_message(manifest: Option<&Manifest>) -> String {
    let keywords = suggested_keywords(manifest, 5);
    format!(
        "**Suggested next step:** The retrieved passages don't contain evidence. \
         Try rephrasing your query or adding related keywords (e.g., {}).",
        keywords.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const CSV: &str = "source_id,raw_path,processed_path,title,authors,year,venue,url_or_doi,tags\n\
RAGAS2023,data/raw/ragas.pdf,data/processed/RAGAS2023.txt,RAGAS: Automated Evaluation,Es et al.,2023,EACL,https://arxiv.org/abs/2309.15217,faithfulness;RAG;evaluation\n\
ARES2023,data/raw/ares.pdf,data/processed/ARES2023.txt,ARES,\"Saad-Falcon, J.\",2023,NAACL,https://arxiv.org/abs/2311.09476,evaluation; NLI ;ai\n\
,,,,,,,,\n";

    #[test]
    fn parses_rows_and_skips_blank_ids() {
        let m = Manifest::parse(CSV).unwrap();
        assert_eq!(m.len(), 2);
        let ares = m.get("ARES2023").unwrap();
        assert_eq!(ares.authors, "Saad-Falcon, J.");
        assert_eq!(ares.tag_list(), vec!["evaluation", "NLI", "ai"]);
        assert!(!m.contains("GHOST"));
    }

    #[test]
    fn missing_manifest_is_a_configuration_error() {
        let dir = tempdir().unwrap();
        let err = Manifest::load(&dir.path().join("data_manifest.csv")).unwrap_err();
        assert_eq!(err.code, "MANIFEST_NOT_FOUND");
        assert!(err.is_config_error());
    }

    #[test]
    fn manifest_without_source_id_column_is_rejected() {
        let err = Manifest::parse("title,year\nx,2020\n").unwrap_err();
        assert_eq!(err.code, "MANIFEST_PARSE_FAILED");
    }

    #[test]
    fn suggestions_use_distinct_tags_in_order() {
        let m = Manifest::parse(CSV).unwrap();
        assert_eq!(
            suggested_keywords(Some(&m), 8),
            vec!["faithfulness", "rag", "evaluation", "nli"]
        );
        assert_eq!(suggested_keywords(Some(&m), 2), vec!["faithfulness", "rag"]);
        assert_eq!(suggested_keywords(None, 3), vec!["faithfulness", "RAG", "evaluation"]);
        assert!(suggestion_message(Some(&m)).contains("faithfulness, rag"));
    }
}
