use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::domain::RetrievalResult;
use crate::error::AppError;

pub const DEFAULT_PROMPT_ID: &str = "rag_v1";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggedChunk {
    pub chunk_id: String,
    pub source_id: String,
    pub score: f32,
}

/// One line of `logs/rag_runs.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunLogEntry {
    pub query_id: String,
    pub query_text: String,
    pub timestamp: String,
    pub retrieved_chunk_ids: Vec<String>,
    pub retrieved_chunks: Vec<LoggedChunk>,
    pub model_output: String,
    pub prompt_id: String,
    pub model_name: String,
    pub top_k: usize,
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
}

impl RunLogEntry {
    /// Entry stamped with the current UTC time. Chunk text is not logged.
    pub fn new(
        query_id: &str,
        query_text: &str,
        retrieved: &[RetrievalResult],
        model_output: &str,
        model_name: &str,
        top_k: usize,
    ) -> Self {
        Self {
            query_id: query_id.to_string(),
            query_text: query_text.to_string(),
            timestamp: now_rfc3339(),
            retrieved_chunk_ids: retrieved.iter().map(|r| r.fragment_id.clone()).collect(),
            retrieved_chunks: retrieved
                .iter()
                .map(|r| LoggedChunk {
                    chunk_id: r.fragment_id.clone(),
                    source_id: r.source_id.clone(),
                    score: r.distance,
                })
                .collect(),
            model_output: model_output.to_string(),
            prompt_id: DEFAULT_PROMPT_ID.to_string(),
            model_name: model_name.to_string(),
            top_k,
            notes: None,
            latency_ms: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_latency_ms(mut self, ms: f64) -> Self {
        self.latency_ms = Some((ms * 100.0).round() / 100.0);
        self
    }
}

pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}

/// Append-only JSONL log of query runs.
#[derive(Debug, Clone)]
pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &RunLogEntry) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::new("RUN_LOG_WRITE_FAILED", "Failed to create log directory")
                    .with_details(format!("path={}; err={}", parent.display(), e))
            })?;
        }
        let mut line = serde_json::to_vec(entry).map_err(|e| {
            AppError::new("RUN_LOG_WRITE_FAILED", "Failed to encode run log entry")
                .with_details(e.to_string())
        })?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                AppError::new("RUN_LOG_WRITE_FAILED", "Failed to open run log")
                    .with_details(format!("path={}; err={}", self.path.display(), e))
            })?;
        file.write_all(&line).map_err(|e| {
            AppError::new("RUN_LOG_WRITE_FAILED", "Failed to append run log entry")
                .with_details(format!("path={}; err={}", self.path.display(), e))
        })
    }

    pub fn read_all(&self) -> Result<Vec<RunLogEntry>, AppError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path).map_err(|e| {
            AppError::new("RUN_LOG_READ_FAILED", "Failed to read run log")
                .with_details(format!("path={}; err={}", self.path.display(), e))
        })?;
        raw.lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty())
            .map(|(i, l)| {
                serde_json::from_str(l).map_err(|e| {
                    AppError::new("RUN_LOG_READ_FAILED", "Failed to decode run log entry")
                        .with_details(format!("line={}; err={}", i + 1, e))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn appends_one_line_per_run() {
        let dir = tempdir().unwrap();
        let log = RunLog::new(dir.path().join("logs").join("rag_runs.jsonl"));
        let hit = RetrievalResult {
            fragment_id: "S_chunk_00".to_string(),
            source_id: "S".to_string(),
            text: "long text that is not logged".to_string(),
            sequence_index: 0,
            distance: 0.25,
        };

        let e1 = RunLogEntry::new("Q_1", "first?", &[hit.clone()], "a (S)", "llama3.1", 5)
            .with_latency_ms(12.3456);
        let e2 = RunLogEntry::new("Q_2", "second?", &[], "b", "llama3.1", 5).with_notes("dry run");
        log.append(&e1).unwrap();
        log.append(&e2).unwrap();

        let raw = fs::read_to_string(log.path()).unwrap();
        assert_eq!(raw.lines().count(), 2);
        assert!(!raw.contains("not logged"));

        let back = log.read_all().unwrap();
        assert_eq!(back[0].retrieved_chunk_ids, vec!["S_chunk_00".to_string()]);
        assert_eq!(back[0].latency_ms, Some(12.35));
        assert_eq!(back[0].prompt_id, DEFAULT_PROMPT_ID);
        assert_eq!(back[1].notes.as_deref(), Some("dry run"));
        assert!(OffsetDateTime::parse(&back[1].timestamp, &Rfc3339).is_ok());
    }
}
