use serde::{Deserialize, Serialize};

use super::lock::LockStatus;

pub const INDEX_FORMAT_VERSION: u32 = 1;

/// One stored chunk and the vector it was embedded to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub ordinal: u32,
    pub text: String,
    pub vector: Vec<f32>,
}

/// Written last during persist; its presence marks a complete index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexManifest {
    pub format_version: u32,
    pub embedding_model: String,
    pub dims: u32,
    pub chunk_count: u32,
    pub corpus_sha256: String,
    pub built_at: String,
}

/// What is stored at an index location, without loading any vectors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexStatus {
    /// `None` until a build has completed.
    pub manifest: Option<IndexManifest>,
    pub lock: LockStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    pub manifest: IndexManifest,
    pub entries: Vec<IndexEntry>,
}

impl VectorIndex {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
