//! Flat exact-search vector index over fragment embeddings.
//!
//! Two artifacts live in the index directory and are always written as a pair:
//! `index_vectors.json` (model, dimension, vectors by insertion position) and
//! `chunk_map.json` (position → fragment fields). Both carry the same fingerprint so a
//! torn write is detected on load.

use std::fs;
use std::path::{Path, PathBuf};

use prp_core::domain::{Fragment, RetrievalResult};
use prp_core::error::AppError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::embeddings::Embedder;

pub const VECTORS_FILE: &str = "index_vectors.json";
pub const CHUNK_MAP_FILE: &str = "chunk_map.json";

/// Side-table row; `index` equals the vector's insertion position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMapEntry {
    pub index: usize,
    pub chunk_id: String,
    pub source_id: String,
    pub text: String,
    pub chunk_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMap {
    pub model_name: String,
    pub dimension: usize,
    pub num_chunks: usize,
    #[serde(default)]
    pub fingerprint: String,
    pub chunks: Vec<ChunkMapEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct VectorBlob {
    model_name: String,
    dimension: usize,
    fingerprint: String,
    vectors: Vec<Vec<f32>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    model_name: String,
    dimension: usize,
    vectors: Vec<Vec<f32>>,
    chunks: Vec<ChunkMapEntry>,
}

fn fingerprint(model_name: &str, chunks: &[ChunkMapEntry]) -> String {
    let mut h = Sha256::new();
    h.update(model_name.as_bytes());
    for c in chunks {
        h.update([0u8]);
        h.update(c.chunk_id.as_bytes());
        h.update([0u8]);
        h.update(c.text.as_bytes());
    }
    hex::encode(h.finalize())
}

fn write_json_tmp<T: Serialize>(path: &Path, value: &T) -> Result<PathBuf, AppError> {
    let tmp = path.with_extension("tmp");
    let json = serde_json::to_vec(value).map_err(|e| {
        AppError::new("AI_INDEX_BUILD_FAILED", "Failed to encode index artifact")
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    fs::write(&tmp, json).map_err(|e| {
        AppError::new("AI_INDEX_BUILD_FAILED", "Failed to write index artifact")
            .with_details(format!("path={}; err={}", tmp.display(), e))
    })?;
    Ok(tmp)
}

fn rename_into_place(tmp: &Path, dest: &Path) -> Result<(), AppError> {
    fs::rename(tmp, dest).map_err(|e| {
        AppError::new("AI_INDEX_BUILD_FAILED", "Failed to finalize index artifact write")
            .with_details(format!("tmp={}; dest={}; err={}", tmp.display(), dest.display(), e))
    })
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, AppError> {
    let bytes = fs::read(path).map_err(|e| {
        AppError::new("AI_INDEX_CORRUPT", "Failed to read index artifact")
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        AppError::new("AI_INDEX_CORRUPT", "Failed to decode index artifact")
            .with_details(format!("path={}; err={}", path.display(), e))
    })
}

impl VectorIndex {
    /// Embed every fragment in order. Position `i` of the index is `fragments[i]`.
    pub fn build(
        fragments: &[Fragment],
        embedder: &dyn Embedder,
        model: &str,
    ) -> Result<Self, AppError> {
        if fragments.is_empty() {
            return Err(AppError::new(
                "AI_INDEX_BUILD_FAILED",
                "No fragments to index; run ingestion first",
            ));
        }

        let mut dimension: Option<usize> = None;
        let mut vectors = Vec::with_capacity(fragments.len());
        let mut chunks = Vec::with_capacity(fragments.len());
        for (i, f) in fragments.iter().enumerate() {
            let v = embedder.embed(model, &f.text).map_err(|e| {
                AppError::new("AI_EMBEDDINGS_FAILED", "Failed to compute embeddings")
                    .with_details(format!("chunk_id={}; err={}", f.fragment_id, e))
                    .with_retryable(e.retryable)
            })?;
            match dimension {
                Some(d) if d != v.len() => {
                    return Err(AppError::new(
                        "AI_INDEX_BUILD_FAILED",
                        "Embedding dimension mismatch across chunks",
                    )
                    .with_details(format!(
                        "expected={}; got={}; chunk_id={}",
                        d,
                        v.len(),
                        f.fragment_id
                    )));
                }
                Some(_) => {}
                None => dimension = Some(v.len()),
            }
            vectors.push(v);
            chunks.push(ChunkMapEntry {
                index: i,
                chunk_id: f.fragment_id.clone(),
                source_id: f.source_id.clone(),
                text: f.text.clone(),
                chunk_index: f.sequence_index,
            });
        }

        let index = Self {
            model_name: model.to_string(),
            dimension: dimension.unwrap_or(0),
            vectors,
            chunks,
        };
        info!(
            model = %index.model_name,
            dimension = index.dimension,
            chunks = index.len(),
            "vector index built"
        );
        Ok(index)
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn chunks(&self) -> &[ChunkMapEntry] {
        &self.chunks
    }

    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        self.vectors.get(position).map(Vec::as_slice)
    }

    pub fn result_at(&self, position: usize, distance: f32) -> Option<RetrievalResult> {
        self.chunks.get(position).map(|c| RetrievalResult {
            fragment_id: c.chunk_id.clone(),
            source_id: c.source_id.clone(),
            text: c.text.clone(),
            sequence_index: c.chunk_index,
            distance,
        })
    }

    pub fn chunk_map(&self) -> ChunkMap {
        ChunkMap {
            model_name: self.model_name.clone(),
            dimension: self.dimension,
            num_chunks: self.chunks.len(),
            fingerprint: fingerprint(&self.model_name, &self.chunks),
            chunks: self.chunks.clone(),
        }
    }

    /// Write both artifacts. Neither final file is replaced until both temp files exist.
    pub fn save(&self, dir: &Path) -> Result<(), AppError> {
        fs::create_dir_all(dir).map_err(|e| {
            AppError::new("AI_INDEX_BUILD_FAILED", "Failed to create index directory")
                .with_details(format!("path={}; err={}", dir.display(), e))
        })?;
        let map = self.chunk_map();
        let blob = VectorBlob {
            model_name: self.model_name.clone(),
            dimension: self.dimension,
            fingerprint: map.fingerprint.clone(),
            vectors: self.vectors.clone(),
        };

        let vectors_path = dir.join(VECTORS_FILE);
        let map_path = dir.join(CHUNK_MAP_FILE);
        let vectors_tmp = write_json_tmp(&vectors_path, &blob)?;
        let map_tmp = write_json_tmp(&map_path, &map)?;
        rename_into_place(&vectors_tmp, &vectors_path)?;
        rename_into_place(&map_tmp, &map_path)?;
        info!(path = %dir.display(), chunks = map.num_chunks, "vector index saved");
        Ok(())
    }

    pub fn exists(dir: &Path) -> bool {
        dir.join(VECTORS_FILE).exists() && dir.join(CHUNK_MAP_FILE).exists()
    }

    pub fn load(dir: &Path) -> Result<Self, AppError> {
        if !Self::exists(dir) {
            return Err(AppError::new(
                "AI_INDEX_NOT_BUILT",
                "Index not found; run build-index first",
            )
            .with_details(format!("path={}", dir.display())));
        }
        let blob: VectorBlob = read_json(&dir.join(VECTORS_FILE))?;
        let map: ChunkMap = read_json(&dir.join(CHUNK_MAP_FILE))?;

        let corrupt = |msg: &str, details: String| {
            AppError::new("AI_INDEX_CORRUPT", msg.to_string())
                .with_details(format!("path={}; {}", dir.display(), details))
        };
        if blob.vectors.len() != map.chunks.len() || map.num_chunks != map.chunks.len() {
            return Err(corrupt(
                "Index artifacts disagree on chunk count",
                format!(
                    "vectors={}; chunks={}; num_chunks={}",
                    blob.vectors.len(),
                    map.chunks.len(),
                    map.num_chunks
                ),
            ));
        }
        if blob.model_name != map.model_name || blob.dimension != map.dimension {
            return Err(corrupt(
                "Index artifacts disagree on model",
                format!("vectors_model={}; map_model={}", blob.model_name, map.model_name),
            ));
        }
        if let Some((i, c)) = map.chunks.iter().enumerate().find(|(i, c)| c.index != *i) {
            return Err(corrupt(
                "Chunk map positions are out of order",
                format!("position={}; index={}", i, c.index),
            ));
        }
        if let Some(v) = blob.vectors.iter().find(|v| v.len() != blob.dimension) {
            return Err(corrupt(
                "Index vector dims mismatch",
                format!("expected={}; got={}", blob.dimension, v.len()),
            ));
        }
        let expected = fingerprint(&map.model_name, &map.chunks);
        if blob.fingerprint != expected || (!map.fingerprint.is_empty() && map.fingerprint != expected) {
            return Err(corrupt(
                "Index artifacts were written by different builds",
                format!("vectors_fp={}; expected_fp={}", blob.fingerprint, expected),
            ));
        }

        Ok(Self {
            model_name: map.model_name,
            dimension: map.dimension,
            vectors: blob.vectors,
            chunks: map.chunks,
        })
    }

    /// Embedding with a different model than the index was built with has no meaningful
    /// distance, so it is refused outright.
    pub fn ensure_model(&self, model: &str) -> Result<(), AppError> {
        if self.model_name != model {
            return Err(AppError::new(
                "AI_INDEX_MODEL_MISMATCH",
                "Embedding model differs from the one the index was built with; rebuild the index",
            )
            .with_details(format!("index_model={}; configured_model={}", self.model_name, model)));
        }
        Ok(())
    }
}
