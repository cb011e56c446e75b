use std::time::Instant;

use prp_core::domain::{RetrievalResult, REFUSAL_PHRASE};
use prp_core::error::AppError;
use tracing::info;

use crate::llm::Llm;

pub mod prompts;

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAnswer {
    pub text: String,
    /// `None` when the model was not called.
    pub latency_ms: Option<f64>,
}

/// Answer returned without a model call when retrieval came back empty.
pub fn empty_retrieval_answer() -> String {
    format!("{REFUSAL_PHRASE} No relevant passages were retrieved.")
}

pub struct AnswerGenerator<'a> {
    llm: &'a dyn Llm,
    model: String,
}

impl<'a> AnswerGenerator<'a> {
    pub fn new(llm: &'a dyn Llm, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Grounded answer for `query`. The citation contract lives in the prompt; the model's
    /// output is returned as-is and audited downstream.
    pub fn generate(
        &self,
        query: &str,
        chunks: &[RetrievalResult],
    ) -> Result<GeneratedAnswer, AppError> {
        if chunks.is_empty() {
            return Ok(GeneratedAnswer {
                text: empty_retrieval_answer(),
                latency_ms: None,
            });
        }

        let prompt = prompts::user_prompt(query, chunks);
        let started = Instant::now();
        let text = self
            .llm
            .generate(&self.model, prompts::SYSTEM_PROMPT, &prompt)
            .map_err(|e| {
                AppError::new("AI_GENERATION_FAILED", "Answer generation failed")
                    .with_details(e.to_string())
                    .with_retryable(e.retryable)
            })?;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        info!(model = %self.model, passages = chunks.len(), latency_ms, "answer generated");

        Ok(GeneratedAnswer {
            text,
            latency_ms: Some(latency_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct RecordingLlm {
        prompts: RefCell<Vec<String>>,
    }

    impl Llm for RecordingLlm {
        fn generate(&self, _model: &str, system: &str, prompt: &str) -> Result<String, AppError> {
            assert!(system.contains("(source_id, chunk_id)"));
            self.prompts.borrow_mut().push(prompt.to_string());
            Ok("Answer (S, S_chunk_00).".to_string())
        }
    }

    fn hit(text: &str) -> RetrievalResult {
        RetrievalResult {
            fragment_id: "S_chunk_00".to_string(),
            source_id: "S".to_string(),
            text: text.to_string(),
            sequence_index: 0,
            distance: 0.0,
        }
    }

    #[test]
    fn empty_retrieval_short_circuits_to_refusal() {
        let llm = RecordingLlm {
            prompts: RefCell::new(Vec::new()),
        };
        let g = AnswerGenerator::new(&llm, "m");
        let out = g.generate("q", &[]).unwrap();
        assert!(out.text.starts_with(REFUSAL_PHRASE));
        assert_eq!(out.latency_ms, None);
        assert!(llm.prompts.borrow().is_empty());
    }

    #[test]
    fn prompt_labels_passages_and_caps_their_text() {
        let llm = RecordingLlm {
            prompts: RefCell::new(Vec::new()),
        };
        let g = AnswerGenerator::new(&llm, "m");
        let long = "x".repeat(2500);
        g.generate("what is x?", &[hit("first"), hit(&long)]).unwrap();

        let prompts = llm.prompts.borrow();
        let p = &prompts[0];
        assert!(p.contains("## Question\nwhat is x?"));
        assert!(p.contains("[1] source_id=S, chunk_id=S_chunk_00\nfirst\n\n---\n\n[2]"));
        assert!(!p.contains(&"x".repeat(2001)));
    }
}
