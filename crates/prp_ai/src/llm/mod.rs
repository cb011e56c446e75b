use std::time::Duration;

use prp_core::config::{GenerationConfig, GenerationProvider};
use prp_core::error::AppError;

use crate::ollama::OllamaClient;

/// Chat-style text generation: a system instruction plus one user prompt.
pub trait Llm {
    fn generate(&self, model: &str, system: &str, prompt: &str) -> Result<String, AppError>;
}

pub mod ollama_llm;
pub mod openai_compat;

pub use ollama_llm::OllamaLlm;
pub use openai_compat::OpenAiCompatLlm;

/// Build the configured generation backend. A missing API key is a configuration error.
pub fn llm_from_config(cfg: &GenerationConfig) -> Result<Box<dyn Llm>, AppError> {
    let timeout = Duration::from_secs(cfg.timeout_secs.max(1));
    match cfg.provider {
        GenerationProvider::Ollama => {
            let client = OllamaClient::new(&cfg.base_url)?.with_timeout(timeout);
            Ok(Box::new(OllamaLlm::new(client)))
        }
        GenerationProvider::OpenaiCompatible => {
            let api_key = std::env::var(&cfg.api_key_env).unwrap_or_default();
            if api_key.trim().is_empty() {
                return Err(AppError::new(
                    "CONFIG_API_KEY_MISSING",
                    "Generation API key is not set",
                )
                .with_details(format!("env={}", cfg.api_key_env)));
            }
            Ok(Box::new(OpenAiCompatLlm::new(
                &cfg.base_url,
                api_key,
                cfg.max_tokens,
                timeout,
            )?))
        }
    }
}
