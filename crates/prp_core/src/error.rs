use serde::{Deserialize, Serialize};
use std::fmt;

/// Single structured error shape used by every pipeline stage and the CLI.
///
/// `code` is a stable identifier (`CONFIG_*`, `CHUNK_*`, `AI_INDEX_*`, ...) that callers
/// match on; `message` is operator-facing; `details` carries paths and underlying causes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Configuration errors are operator-correctable and must stop the run.
    pub fn is_config_error(&self) -> bool {
        self.code.starts_with("CONFIG_")
            || self.code.starts_with("CHUNK_PARAMS_")
            || self.code == "MANIFEST_NOT_FOUND"
            || self.code == "AI_INDEX_NOT_BUILT"
            || self.code == "AI_INDEX_MODEL_MISMATCH"
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(d) = self.details.as_ref() {
            write!(f, " ({d})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}
