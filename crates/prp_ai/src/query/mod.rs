//! Retrieve → generate → post-process for one question.

use prp_core::domain::RetrievalResult;
use prp_core::error::AppError;
use prp_core::manifest::{suggestion_message, Manifest};
use prp_core::references::attach_references;
use prp_core::runlog::{RunLog, RunLogEntry};
use prp_core::thread::ResearchThread;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::embeddings::Embedder;
use crate::generate::{prompts::PROMPT_ID, AnswerGenerator};
use crate::guardrails::reports_missing_evidence;
use crate::index::VectorIndex;
use crate::llm::Llm;
use crate::retrieve::Retriever;

/// Everything a query needs, borrowed from the caller. The index is read-only here.
pub struct QueryContext<'a> {
    pub index: &'a VectorIndex,
    pub embedder: &'a dyn Embedder,
    pub llm: &'a dyn Llm,
    pub generation_model: &'a str,
    pub manifest: Option<&'a Manifest>,
    pub run_log: Option<&'a RunLog>,
    pub default_top_k: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    pub top_k: Option<usize>,
    pub query_id: Option<String>,
    /// Retrieve only; no generation and no run log entry.
    pub dry_run: bool,
    pub attach_references: bool,
    pub log_run: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            top_k: None,
            query_id: None,
            dry_run: false,
            attach_references: true,
            log_run: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryOutcome {
    pub query_id: String,
    pub query: String,
    pub top_k: usize,
    pub retrieved: Vec<RetrievalResult>,
    /// Empty for dry runs; `ERROR: ...` when generation failed.
    pub answer: String,
    pub suggestion: Option<String>,
    pub generation_error: Option<AppError>,
    pub latency_ms: Option<f64>,
}

impl QueryOutcome {
    pub fn to_thread(&self, thread_id: impl Into<String>, timestamp: impl Into<String>) -> ResearchThread {
        ResearchThread {
            thread_id: thread_id.into(),
            query_id: self.query_id.clone(),
            query: self.query.clone(),
            retrieved_chunks: self.retrieved.clone(),
            answer: self.answer.clone(),
            timestamp: timestamp.into(),
        }
    }
}

/// `Q_` plus the first 8 hex chars of SHA-256 over the query text.
pub fn default_query_id(query: &str) -> String {
    let digest = hex::encode(Sha256::digest(query.as_bytes()));
    format!("Q_{}", &digest[..8])
}

/// Run one query end to end.
///
/// Retrieval errors (missing index, model mismatch, embedding failure) are returned.
/// Generation errors are not: the outcome carries an `ERROR:` answer and the error itself
/// so batch callers can keep going.
pub fn run_query(
    ctx: &QueryContext<'_>,
    query: &str,
    opts: &QueryOptions,
) -> Result<QueryOutcome, AppError> {
    let top_k = opts.top_k.unwrap_or(ctx.default_top_k);
    let query_id = opts
        .query_id
        .clone()
        .unwrap_or_else(|| default_query_id(query));

    let retrieved = Retriever::new(ctx.index, ctx.embedder).retrieve(query, top_k)?;
    info!(query_id = %query_id, top_k, retrieved = retrieved.len(), "retrieval complete");

    let mut outcome = QueryOutcome {
        query_id,
        query: query.to_string(),
        top_k,
        retrieved,
        answer: String::new(),
        suggestion: None,
        generation_error: None,
        latency_ms: None,
    };
    if opts.dry_run {
        return Ok(outcome);
    }

    let generator = AnswerGenerator::new(ctx.llm, ctx.generation_model);
    match generator.generate(query, &outcome.retrieved) {
        Ok(generated) => {
            outcome.latency_ms = generated.latency_ms;
            outcome.answer = generated.text;
        }
        Err(e) => {
            warn!(query_id = %outcome.query_id, error = %e, "generation failed");
            outcome.answer = format!("ERROR: {}", e.message);
            outcome.generation_error = Some(e);
        }
    }

    if outcome.generation_error.is_none() {
        if opts.attach_references {
            if let Some(manifest) = ctx.manifest {
                outcome.answer = attach_references(&outcome.answer, &outcome.retrieved, manifest);
            }
        }
        if reports_missing_evidence(&outcome.answer) {
            outcome.suggestion = Some(suggestion_message(ctx.manifest));
        }
    }

    if opts.log_run {
        if let Some(log) = ctx.run_log {
            append_run_log(log, &outcome, ctx.generation_model);
        }
    }
    Ok(outcome)
}

// A failed log write must not cost the caller the answer.
fn append_run_log(log: &RunLog, outcome: &QueryOutcome, model_name: &str) {
    let mut entry = RunLogEntry::new(
        &outcome.query_id,
        &outcome.query,
        &outcome.retrieved,
        &outcome.answer,
        model_name,
        outcome.top_k,
    );
    entry.prompt_id = PROMPT_ID.to_string();
    if let Some(ms) = outcome.latency_ms {
        entry = entry.with_latency_ms(ms);
    }
    if let Some(e) = outcome.generation_error.as_ref() {
        entry = entry.with_notes(e.to_string());
    }
    if let Err(e) = log.append(&entry) {
        warn!(path = %log.path().display(), error = %e, "run log append failed");
    }
}

#[cfg(test)]
mod tests {
    use super::default_query_id;

    #[test]
    fn query_ids_are_stable_and_short() {
        let a = default_query_id("What does RAGAS measure?");
        assert_eq!(a, default_query_id("What does RAGAS measure?"));
        assert_eq!(a.len(), 10);
        assert!(a.starts_with("Q_"));
        assert_ne!(a, default_query_id("What does ARES measure?"));
    }
}
