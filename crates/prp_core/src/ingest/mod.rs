use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::config::PortalConfig;
use crate::domain::{Document, Fragment};
use crate::error::AppError;
use crate::fragment::{write_fragments, Fragmenter};
use crate::manifest::{Manifest, ManifestRecord};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkippedSource {
    pub source_id: String,
    pub reason: String,
}

/// `text_sha256` lets a later run tell whether the extracted text changed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestedSource {
    pub source_id: String,
    pub fragments: usize,
    pub text_sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct IngestReport {
    pub sources_total: usize,
    pub sources_processed: usize,
    pub fragments_written: usize,
    pub sources: Vec<IngestedSource>,
    pub skipped: Vec<SkippedSource>,
}

impl IngestReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Where the extracted text of a source lives. An empty `processed_path` falls back to
/// `data/processed/{source_id}.txt` under the corpus root.
pub fn processed_text_path(cfg: &PortalConfig, rec: &ManifestRecord) -> PathBuf {
    let rel = rec.processed_path.trim();
    if rel.is_empty() {
        return cfg
            .corpus_root
            .join("data")
            .join("processed")
            .join(format!("{}.txt", rec.source_id));
    }
    let p = PathBuf::from(rel);
    if p.is_absolute() {
        p
    } else {
        cfg.corpus_root.join(p)
    }
}

fn load_document(cfg: &PortalConfig, rec: &ManifestRecord) -> Result<Document, String> {
    let path = processed_text_path(cfg, rec);
    let text = fs::read_to_string(&path)
        .map_err(|e| format!("Extracted text unreadable: path={}; err={}", path.display(), e))?;
    if text.trim().chars().count() < cfg.chunking.min_text_chars {
        return Err("Extracted text too short or empty".to_string());
    }
    Ok(Document::new(rec.source_id.clone(), text))
}

/// Fragment every manifest source and rewrite the fragment store.
///
/// Per-source problems are recorded in the report and do not stop the run. Invalid chunk
/// parameters and store write failures do.
pub fn ingest_corpus(cfg: &PortalConfig, manifest: &Manifest) -> Result<IngestReport, AppError> {
    let fragmenter = Fragmenter::from_config(&cfg.chunking)?;

    let mut report = IngestReport {
        sources_total: manifest.len(),
        ..IngestReport::default()
    };
    let mut fragments: Vec<Fragment> = Vec::new();

    for rec in manifest.records() {
        match load_document(cfg, rec) {
            Ok(doc) => {
                let produced = fragmenter.fragment(&doc);
                info!(source_id = %rec.source_id, fragments = produced.len(), "source fragmented");
                report.sources_processed += 1;
                report.sources.push(IngestedSource {
                    source_id: rec.source_id.clone(),
                    fragments: produced.len(),
                    text_sha256: hex::encode(Sha256::digest(doc.text.as_bytes())),
                });
                fragments.extend(produced);
            }
            Err(reason) => {
                warn!(source_id = %rec.source_id, reason = %reason, "source skipped");
                report.skipped.push(SkippedSource {
                    source_id: rec.source_id.clone(),
                    reason,
                });
            }
        }
    }

    write_fragments(&cfg.fragments_path, &fragments)?;
    report.fragments_written = fragments.len();
    info!(
        processed = report.sources_processed,
        total = report.sources_total,
        skipped = report.skipped.len(),
        fragments = report.fragments_written,
        path = %cfg.fragments_path.display(),
        "ingest finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_processed_path_uses_conventional_location() {
        let cfg = PortalConfig::for_root("/corpus");
        let rec = ManifestRecord {
            source_id: "S1".to_string(),
            ..ManifestRecord::default()
        };
        assert_eq!(
            processed_text_path(&cfg, &rec),
            PathBuf::from("/corpus/data/processed/S1.txt")
        );
    }

    #[test]
    fn short_text_is_skipped_with_reason() {
        let dir = tempdir().unwrap();
        let cfg = PortalConfig::for_root(dir.path());
        fs::create_dir_all(dir.path().join("data/processed")).unwrap();
        fs::write(dir.path().join("data/processed/S1.txt"), "too short").unwrap();
        let rec = ManifestRecord {
            source_id: "S1".to_string(),
            ..ManifestRecord::default()
        };
        assert_eq!(
            load_document(&cfg, &rec).unwrap_err(),
            "Extracted text too short or empty"
        );
    }

    #[test]
    fn invalid_chunk_params_stop_before_any_work() {
        let dir = tempdir().unwrap();
        let mut cfg = PortalConfig::for_root(dir.path());
        cfg.chunking.overlap_words = cfg.chunking.size_words;
        let err = ingest_corpus(&cfg, &Manifest::default()).unwrap_err();
        assert_eq!(err.code, "CHUNK_PARAMS_INVALID");
        assert!(!cfg.fragments_path.exists());
    }
}
