use pdfqa_core::config::PdfqaConfig;
use pdfqa_core::error::AppError;
use serde::{Deserialize, Serialize};

use crate::embeddings::Embedder;
use crate::index::{IndexStore, VectorIndex};

mod similarity;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedChunk {
    pub ordinal: u32,
    pub text: String,
    pub score: f32,
}

/// Rank the chunks of `index` against `question`, most similar first.
///
/// The question is embedded with the model recorded in the index manifest.
/// Ties keep insertion order. Entries with a zero vector are never returned.
pub fn query_index(
    index: &VectorIndex,
    embedder: &dyn Embedder,
    question: &str,
    top_k: usize,
) -> Result<Vec<RetrievedChunk>, AppError> {
    let q = question.trim();
    if q.is_empty() {
        return Err(AppError::new("AI_RETRIEVAL_FAILED", "Question must not be empty"));
    }
    if index.is_empty() || top_k == 0 {
        return Ok(Vec::new());
    }

    let qv = embedder.embed(&index.manifest.embedding_model, q)?;
    let qnorm = similarity::l2_norm(&qv);
    if qnorm == 0.0 {
        return Err(AppError::new(
            "AI_RETRIEVAL_FAILED",
            "Question embedding norm is zero",
        ));
    }

    let mut hits: Vec<(usize, f32)> = Vec::with_capacity(index.len());
    for (pos, entry) in index.entries.iter().enumerate() {
        if entry.vector.len() != qv.len() {
            return Err(AppError::new(
                "AI_RETRIEVAL_FAILED",
                "Question embedding dims do not match index dims",
            )
            .with_details(format!(
                "ordinal={}; index_dims={}; query_dims={}",
                entry.ordinal,
                entry.vector.len(),
                qv.len()
            )));
        }
        let vnorm = similarity::l2_norm(&entry.vector);
        if vnorm == 0.0 {
            continue;
        }
        hits.push((pos, similarity::cosine_similarity(&qv, &entry.vector, qnorm, vnorm)));
    }

    hits.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    hits.truncate(top_k);

    Ok(hits
        .into_iter()
        .map(|(pos, score)| {
            let entry = &index.entries[pos];
            RetrievedChunk {
                ordinal: entry.ordinal,
                text: entry.text.clone(),
                score,
            }
        })
        .collect())
}

/// Loads the index fresh for every question and ranks it.
///
/// Never fails: a missing, locked or unreadable index, or a failing
/// embedding call, all come back as an empty result.
pub struct Retriever<'a> {
    store: &'a IndexStore,
    embedder: &'a dyn Embedder,
    top_k: usize,
}

impl<'a> Retriever<'a> {
    pub fn new(store: &'a IndexStore, embedder: &'a dyn Embedder, config: &PdfqaConfig) -> Self {
        Self {
            store,
            embedder,
            top_k: config.top_k,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn retrieve(&self, question: &str) -> Vec<RetrievedChunk> {
        let index = match self.store.load() {
            Ok(index) => index,
            Err(e) if e.is("INDEX_NOT_FOUND") => {
                tracing::info!(
                    path = %self.store.root().display(),
                    "no index yet; answering without context"
                );
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!(error = %e, "index unavailable; answering without context");
                return Vec::new();
            }
        };

        match query_index(&index, self.embedder, question, self.top_k) {
            Ok(hits) => {
                tracing::debug!(hits = hits.len(), top_k = self.top_k, "retrieved chunks");
                hits
            }
            Err(e) => {
                tracing::warn!(error = %e, "retrieval failed; answering without context");
                Vec::new()
            }
        }
    }
}
