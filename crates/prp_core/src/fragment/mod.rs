//! Word-window fragmentation of cleaned document text.
//!
//! Fragments are `size_words` wide and advance by `size_words - overlap_words`, so a
//! sentence straddling a boundary appears in both neighbours. Ids are derived from the
//! source id and window position only, which keeps them stable across reruns.

pub mod store;

use crate::config::{validate_chunking, ChunkingConfig};
use crate::domain::{fragment_id_for, Document, Fragment, FragmentMeta};
use crate::error::AppError;

pub use store::{read_fragments, write_fragments};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragmenter {
    size_words: usize,
    overlap_words: usize,
}

impl Fragmenter {
    pub fn new(size_words: usize, overlap_words: usize) -> Result<Self, AppError> {
        validate_chunking(&ChunkingConfig {
            size_words,
            overlap_words,
            ..ChunkingConfig::default()
        })?;
        Ok(Self {
            size_words,
            overlap_words,
        })
    }

    pub fn from_config(cfg: &ChunkingConfig) -> Result<Self, AppError> {
        Self::new(cfg.size_words, cfg.overlap_words)
    }

    pub fn size_words(&self) -> usize {
        self.size_words
    }

    pub fn overlap_words(&self) -> usize {
        self.overlap_words
    }

    pub fn fragment(&self, doc: &Document) -> Vec<Fragment> {
        fragment_text(&doc.source_id, &doc.text, self.size_words, self.overlap_words)
    }
}

fn fragment_text(source_id: &str, text: &str, size: usize, overlap: usize) -> Vec<Fragment> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let n = words.len();
    if n == 0 {
        return Vec::new();
    }

    if n <= size {
        return vec![Fragment {
            fragment_id: fragment_id_for(source_id, 0),
            source_id: source_id.to_string(),
            text: text.trim().to_string(),
            sequence_index: 0,
            metadata: FragmentMeta {
                word_count: n,
                start_word: 0,
                end_word: n,
                total_chunks: 1,
            },
        }];
    }

    let step = size - overlap;
    let mut out: Vec<Fragment> = Vec::new();
    let mut start = 0usize;
    while start < n {
        let end = (start + size).min(n);
        let idx = out.len();
        out.push(Fragment {
            fragment_id: fragment_id_for(source_id, idx),
            source_id: source_id.to_string(),
            text: words[start..end].join(" "),
            sequence_index: idx,
            metadata: FragmentMeta {
                word_count: end - start,
                start_word: start,
                end_word: end,
                // Back-filled below once the count is known.
                total_chunks: 0,
            },
        });
        start += step;
    }

    let total = out.len();
    for f in out.iter_mut() {
        f.metadata.total_chunks = total;
    }
    out
}
