use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const DEFAULT_CHUNK_SIZE_WORDS: usize = 400;
pub const DEFAULT_OVERLAP_WORDS: usize = 40;
pub const DEFAULT_MIN_TEXT_CHARS: usize = 100;
pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    pub size_words: usize,
    pub overlap_words: usize,
    /// Extracted texts shorter than this are skipped at ingest.
    pub min_text_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size_words: DEFAULT_CHUNK_SIZE_WORDS,
            overlap_words: DEFAULT_OVERLAP_WORDS,
            min_text_chars: DEFAULT_MIN_TEXT_CHARS,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: DEFAULT_TOP_K }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "all-minilm".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GenerationProvider {
    Ollama,
    OpenaiCompatible,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GenerationConfig {
    pub provider: GenerationProvider,
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the bearer token (OpenAI-compatible providers only).
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: GenerationProvider::Ollama,
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "llama3.1".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            timeout_secs: 60,
            max_tokens: 1024,
        }
    }
}

/// Every location and tunable the pipeline reads, passed explicitly into each stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PortalConfig {
    pub corpus_root: PathBuf,
    pub manifest_path: PathBuf,
    pub fragments_path: PathBuf,
    pub index_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self::for_root(PathBuf::from("."))
    }
}

impl PortalConfig {
    /// Conventional layout under a corpus root:
    /// `data/data_manifest.csv`, `data/processed/chunks.jsonl`, `index/`, `logs/`.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            manifest_path: root.join("data").join("data_manifest.csv"),
            fragments_path: root.join("data").join("processed").join("chunks.jsonl"),
            index_dir: root.join("index"),
            logs_dir: root.join("logs"),
            corpus_root: root,
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
        }
    }

    /// Read a JSON config file. Relative paths resolve against `corpus_root`, which
    /// itself resolves against the config file's directory.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::new("CONFIG_NOT_FOUND", "Failed to read config file")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        let mut cfg: PortalConfig = serde_json::from_str(&raw).map_err(|e| {
            AppError::new("CONFIG_INVALID", "Failed to decode config file")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;

        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        if cfg.corpus_root.is_relative() {
            cfg.corpus_root = base.join(&cfg.corpus_root);
        }
        let root = cfg.corpus_root.clone();
        for p in [
            &mut cfg.manifest_path,
            &mut cfg.fragments_path,
            &mut cfg.index_dir,
            &mut cfg.logs_dir,
        ] {
            if p.is_relative() {
                *p = root.join(&*p);
            }
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        validate_chunking(&self.chunking)?;
        if self.retrieval.top_k == 0 {
            return Err(AppError::new(
                "CONFIG_INVALID",
                "retrieval.top_k must be at least 1",
            ));
        }
        if self.embedding.model.trim().is_empty() {
            return Err(AppError::new(
                "CONFIG_INVALID",
                "embedding.model is required",
            ));
        }
        if self.generation.model.trim().is_empty() {
            return Err(AppError::new(
                "CONFIG_INVALID",
                "generation.model is required",
            ));
        }
        Ok(())
    }

    pub fn run_log_path(&self) -> PathBuf {
        self.logs_dir.join("rag_runs.jsonl")
    }
}

/// Degenerate window parameters would stall the sliding window; reject them up front.
pub fn validate_chunking(c: &ChunkingConfig) -> Result<(), AppError> {
    if c.size_words == 0 {
        return Err(AppError::new(
            "CHUNK_PARAMS_INVALID",
            "Chunk size must be at least one word",
        ));
    }
    if c.overlap_words >= c.size_words {
        return Err(AppError::new(
            "CHUNK_PARAMS_INVALID",
            "Chunk overlap must be smaller than chunk size",
        )
        .with_details(format!(
            "size_words={}; overlap_words={}",
            c.size_words, c.overlap_words
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn for_root_uses_conventional_layout() {
        let cfg = PortalConfig::for_root("/corpus");
        assert_eq!(cfg.manifest_path, PathBuf::from("/corpus/data/data_manifest.csv"));
        assert_eq!(
            cfg.fragments_path,
            PathBuf::from("/corpus/data/processed/chunks.jsonl")
        );
        assert_eq!(cfg.index_dir, PathBuf::from("/corpus/index"));
        assert_eq!(cfg.run_log_path(), PathBuf::from("/corpus/logs/rag_runs.jsonl"));
    }

    #[test]
    fn load_resolves_relative_paths_and_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("portal.json");
        fs::write(
            &path,
            r#"{"corpus_root": "corpus", "index_dir": "idx", "chunking": {"size_words": 200}}"#,
        )
        .unwrap();

        let cfg = PortalConfig::load(&path).unwrap();
        assert_eq!(cfg.corpus_root, dir.path().join("corpus"));
        assert_eq!(cfg.index_dir, dir.path().join("corpus").join("idx"));
        assert_eq!(cfg.chunking.size_words, 200);
        assert_eq!(cfg.chunking.overlap_words, DEFAULT_OVERLAP_WORDS);
        assert_eq!(cfg.retrieval.top_k, DEFAULT_TOP_K);
    }

    #[test]
    fn load_rejects_overlap_not_smaller_than_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("portal.json");
        fs::write(&path, r#"{"chunking": {"size_words": 40, "overlap_words": 40}}"#).unwrap();
        let err = PortalConfig::load(&path).unwrap_err();
        assert_eq!(err.code, "CHUNK_PARAMS_INVALID");
        assert!(err.is_config_error());
    }

    #[test]
    fn missing_config_file_is_reported() {
        let dir = tempdir().unwrap();
        let err = PortalConfig::load(&dir.path().join("nope.json")).unwrap_err();
        assert_eq!(err.code, "CONFIG_NOT_FOUND");
    }
}
