use prp_core::domain::RetrievalResult;
use prp_core::error::AppError;
use tracing::debug;

use crate::embeddings::Embedder;
use crate::index::VectorIndex;

mod similarity;

pub use similarity::squared_l2;

/// Query-time view over a loaded index. Holds no mutable state, so one index can serve
/// any number of retrievers.
pub struct Retriever<'a> {
    index: &'a VectorIndex,
    embedder: &'a dyn Embedder,
}

impl<'a> Retriever<'a> {
    pub fn new(index: &'a VectorIndex, embedder: &'a dyn Embedder) -> Self {
        Self { index, embedder }
    }

    pub fn index(&self) -> &VectorIndex {
        self.index
    }

    /// The `top_k` nearest fragments, ascending by distance. Ties keep insertion order.
    pub fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievalResult>, AppError> {
        let q = query.trim();
        if q.is_empty() {
            return Err(AppError::new("AI_RETRIEVAL_FAILED", "Query must not be empty"));
        }
        let top_k = top_k.min(self.index.len());
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let qv = self.embedder.embed(self.index.model_name(), q)?;
        let dims = self.index.dimension();
        if qv.len() != dims {
            return Err(AppError::new(
                "AI_RETRIEVAL_FAILED",
                "Query embedding dims do not match index dims",
            )
            .with_details(format!("index_dims={dims}; query_dims={}", qv.len())));
        }

        let mut hits: Vec<(usize, f32)> = (0..self.index.len())
            .filter_map(|pos| self.index.vector(pos).map(|v| (pos, squared_l2(&qv, v))))
            .collect();
        // Stable sort: equal distances stay in insertion order, NaN distances go last.
        hits.sort_by(|a, b| {
            a.1.is_nan()
                .cmp(&b.1.is_nan())
                .then_with(|| a.1.total_cmp(&b.1))
        });
        hits.truncate(top_k);

        let out: Vec<RetrievalResult> = hits
            .into_iter()
            .filter_map(|(pos, d)| self.index.result_at(pos, d))
            .collect();
        debug!(
            top_k,
            returned = out.len(),
            best = ?out.first().map(|r| r.distance),
            "retrieval finished"
        );
        Ok(out)
    }
}
