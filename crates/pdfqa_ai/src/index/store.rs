use std::fs;
use std::path::{Path, PathBuf};

use pdfqa_core::error::AppError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::lock::{self, IndexLock, LockStatus};
use super::model::{IndexEntry, IndexManifest, IndexStatus, VectorIndex, INDEX_FORMAT_VERSION};
use crate::embeddings::Embedder;

/// Embed every chunk, in order, into a fresh in-memory index.
///
/// Fails with `INDEX_EMPTY` when there is nothing to embed, and with
/// `INDEX_BUILD_FAILED` when the embedder changes dimension mid-build.
pub fn build_with_embedder<'c, I>(
    chunks: I,
    embedder: &dyn Embedder,
    model: &str,
    built_at: &str,
) -> Result<VectorIndex, AppError>
where
    I: IntoIterator<Item = &'c str>,
{
    let mut entries: Vec<IndexEntry> = Vec::new();
    let mut hasher = Sha256::new();
    let mut dims: Option<usize> = None;

    for (ordinal, text) in chunks.into_iter().enumerate() {
        let vector = embedder.embed(model, text).map_err(|e| {
            let retryable = e.retryable;
            AppError::new("AI_EMBEDDINGS_FAILED", "Failed to compute embeddings")
                .with_details(format!("ordinal={ordinal}; err={e}"))
                .with_retryable(retryable)
        })?;
        match dims {
            Some(d) if d != vector.len() => {
                return Err(AppError::new(
                    "INDEX_BUILD_FAILED",
                    "Embedding dimension mismatch across chunks",
                )
                .with_details(format!(
                    "expected={d}; got={}; ordinal={ordinal}",
                    vector.len()
                )));
            }
            Some(_) => {}
            None => dims = Some(vector.len()),
        }

        hasher.update((text.len() as u64).to_le_bytes());
        hasher.update(text.as_bytes());
        entries.push(IndexEntry {
            ordinal: ordinal as u32,
            text: text.to_string(),
            vector,
        });
        tracing::debug!(ordinal, chars = text.chars().count(), "embedded chunk");
    }

    let dims = dims.ok_or_else(|| AppError::new("INDEX_EMPTY", "No chunks to index"))?;

    let manifest = IndexManifest {
        format_version: INDEX_FORMAT_VERSION,
        embedding_model: model.to_string(),
        dims: dims as u32,
        chunk_count: entries.len() as u32,
        corpus_sha256: hex::encode(hasher.finalize()),
        built_at: built_at.to_string(),
    };
    tracing::info!(
        chunks = manifest.chunk_count,
        dims = manifest.dims,
        model = %manifest.embedding_model,
        "built vector index"
    );
    Ok(VectorIndex { manifest, entries })
}

/// Handle on the single on-disk index location.
///
/// Layout under `root`: `index_manifest.json`, `index_entries.json` and,
/// while an ingestion runs, `index.lock`.
#[derive(Debug, Clone)]
pub struct IndexStore {
    root: PathBuf,
}

impl IndexStore {
    pub fn open(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    fn manifest_path(&self) -> PathBuf {
        self.root.join("index_manifest.json")
    }

    fn entries_path(&self) -> PathBuf {
        self.root.join("index_entries.json")
    }

    fn lock_path(&self) -> PathBuf {
        self.root.join("index.lock")
    }

    fn ensure_dirs(&self) -> Result<(), AppError> {
        fs::create_dir_all(self.root.as_path()).map_err(|e| {
            AppError::new("INDEX_WRITE_FAILED", "Failed to create index directory")
                .with_details(format!("path={}; err={}", self.root.display(), e))
        })
    }

    pub fn lock_status(&self) -> LockStatus {
        lock::inspect(&self.lock_path())
    }

    /// True while a running process holds the write lock. A lock left by a
    /// process that has exited does not count.
    pub fn is_locked(&self) -> bool {
        matches!(self.lock_status(), LockStatus::Held { .. })
    }

    /// Take the exclusive write lock. Fails with `INDEX_LOCKED` if a live
    /// holder exists; a stale lock is reclaimed.
    pub fn lock(&self) -> Result<IndexLock, AppError> {
        self.ensure_dirs()?;
        IndexLock::acquire(self.lock_path())
    }

    /// Replace whatever index is stored here with `index`.
    ///
    /// Both files are staged as `.tmp` first, so a failed write leaves the
    /// previous index loadable. The manifest is then removed and renamed
    /// back in last; an interruption between those steps reads back as
    /// `INDEX_NOT_FOUND` rather than a torn index.
    pub fn persist(&self, lock: &IndexLock, index: &VectorIndex) -> Result<(), AppError> {
        if lock.path() != self.lock_path().as_path() {
            return Err(AppError::new(
                "INDEX_WRITE_FAILED",
                "Lock does not belong to this index location",
            )
            .with_details(format!(
                "lock={}; index={}",
                lock.path().display(),
                self.root.display()
            )));
        }
        self.ensure_dirs()?;

        let entries_path = self.entries_path();
        let manifest_path = self.manifest_path();
        let entries_tmp = write_json_tmp(&entries_path, &index.entries, "index entries")?;
        let manifest_tmp = match write_json_tmp(&manifest_path, &index.manifest, "index manifest") {
            Ok(tmp) => tmp,
            Err(e) => {
                discard_tmp(&entries_tmp);
                return Err(e);
            }
        };

        if manifest_path.exists() {
            fs::remove_file(&manifest_path).map_err(|e| {
                discard_tmp(&entries_tmp);
                discard_tmp(&manifest_tmp);
                AppError::new("INDEX_WRITE_FAILED", "Failed to remove previous index manifest")
                    .with_details(format!("path={}; err={}", manifest_path.display(), e))
            })?;
        }
        commit_tmp(&entries_tmp, &entries_path, "index entries")?;
        commit_tmp(&manifest_tmp, &manifest_path, "index manifest")?;

        tracing::info!(
            path = %self.root.display(),
            chunks = index.manifest.chunk_count,
            "persisted vector index"
        );
        Ok(())
    }

    /// Read the stored index as-is. Vector dimensions are not checked here.
    pub fn load(&self) -> Result<VectorIndex, AppError> {
        match self.lock_status() {
            LockStatus::Held { .. } => {
                return Err(AppError::new(
                    "INDEX_LOCKED",
                    "Index is being rebuilt; try again once ingestion finishes",
                )
                .with_details(format!("lock={}", self.lock_path().display()))
                .with_retryable(true));
            }
            LockStatus::Stale { pid } => {
                tracing::warn!(
                    path = %self.lock_path().display(),
                    pid,
                    "ignoring stale index lock"
                );
            }
            LockStatus::Unlocked => {}
        }

        let manifest: IndexManifest = match self.manifest()? {
            Some(m) => m,
            None => return Err(self.not_found()),
        };
        let entries_path = self.entries_path();
        if !entries_path.exists() {
            return Err(self.not_found());
        }
        let entries: Vec<IndexEntry> = read_json(&entries_path, "index entries")?;

        tracing::debug!(
            path = %self.root.display(),
            chunks = entries.len(),
            "loaded vector index"
        );
        Ok(VectorIndex { manifest, entries })
    }

    /// The manifest of the stored index, or `None` when nothing was built yet.
    pub fn manifest(&self) -> Result<Option<IndexManifest>, AppError> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(None);
        }
        read_json(&path, "index manifest").map(Some)
    }

    pub fn status(&self) -> Result<IndexStatus, AppError> {
        Ok(IndexStatus {
            manifest: self.manifest()?,
            lock: self.lock_status(),
        })
    }

    fn not_found(&self) -> AppError {
        AppError::new("INDEX_NOT_FOUND", "No index has been built yet")
            .with_details(format!("path={}", self.root.display()))
    }
}

fn write_json_tmp<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
    what: &str,
) -> Result<PathBuf, AppError> {
    let tmp = path.with_extension("tmp");
    let json = serde_json::to_vec(value).map_err(|e| {
        AppError::new("INDEX_WRITE_FAILED", format!("Failed to encode {what}"))
            .with_details(e.to_string())
    })?;
    fs::write(&tmp, &json).map_err(|e| {
        AppError::new("INDEX_WRITE_FAILED", format!("Failed to write {what}"))
            .with_details(format!("path={}; err={}", tmp.display(), e))
    })?;
    Ok(tmp)
}

fn commit_tmp(tmp: &Path, dest: &Path, what: &str) -> Result<(), AppError> {
    fs::rename(tmp, dest).map_err(|e| {
        AppError::new("INDEX_WRITE_FAILED", format!("Failed to finalize {what} write"))
            .with_details(format!("tmp={}; dest={}; err={}", tmp.display(), dest.display(), e))
    })
}

fn discard_tmp(tmp: &Path) {
    if let Err(e) = fs::remove_file(tmp) {
        tracing::debug!(path = %tmp.display(), error = %e, "failed to remove staged file");
    }
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T, AppError> {
    let bytes = fs::read(path).map_err(|e| {
        AppError::new("INDEX_READ_FAILED", format!("Failed to read {what}"))
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        AppError::new("INDEX_READ_FAILED", format!("Failed to decode {what}"))
            .with_details(format!("path={}; err={}", path.display(), e))
    })
}
