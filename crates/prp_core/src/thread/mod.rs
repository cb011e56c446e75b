use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::RetrievalResult;
use crate::error::AppError;

/// A persisted query, the fragments retrieved for it, and the generated answer.
///
/// Storage and listing of threads live outside this crate; this is the record shape the
/// evidence table is built from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchThread {
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub query_id: String,
    pub query: String,
    #[serde(default)]
    pub retrieved_chunks: Vec<RetrievalResult>,
    pub answer: String,
    #[serde(default)]
    pub timestamp: String,
}

impl ResearchThread {
    pub fn from_json_file(path: &Path) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::new("THREAD_NOT_FOUND", "Failed to read thread record")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            AppError::new("THREAD_INVALID", "Failed to decode thread record")
                .with_details(format!("path={}; err={}", path.display(), e))
        })
    }

    pub fn to_json_file(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::new("THREAD_WRITE_FAILED", "Failed to create thread directory")
                    .with_details(format!("path={}; err={}", parent.display(), e))
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            AppError::new("THREAD_WRITE_FAILED", "Failed to encode thread record")
                .with_details(e.to_string())
        })?;
        fs::write(path, json.as_bytes()).map_err(|e| {
            AppError::new("THREAD_WRITE_FAILED", "Failed to write thread record")
                .with_details(format!("path={}; err={}", path.display(), e))
        })
    }
}
