use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_COMPLETION_MODEL: &str = "llama3.1";
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 1_000;
pub const DEFAULT_TOP_K: usize = 4;

const MAX_TOP_K: usize = 50;

/// Every tunable the pipeline reads. Components receive this (or the
/// fields they need) at construction; nothing is read from globals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PdfqaConfig {
    pub ollama_url: String,
    pub embedding_model: String,
    pub completion_model: String,
    pub temperature: f32,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub index_location: PathBuf,
    /// Characters of retrieved context shown to the relevance check.
    pub relevance_excerpt_chars: usize,
    pub request_timeout_secs: u64,
}

impl Default for PdfqaConfig {
    fn default() -> Self {
        Self {
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            completion_model: DEFAULT_COMPLETION_MODEL.to_string(),
            temperature: 0.3,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            index_location: PathBuf::from("pdfqa_index"),
            relevance_excerpt_chars: 4_000,
            request_timeout_secs: 120,
        }
    }
}

impl PdfqaConfig {
    /// Read a TOML config file, or fall back to defaults when `path` is `None`.
    /// Missing keys take their default value.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let config = match path {
            Some(p) => {
                let raw = fs::read_to_string(p).map_err(|e| {
                    AppError::new("CONFIG_READ_FAILED", "Failed to read config file")
                        .with_details(format!("path={}; err={}", p.display(), e))
                })?;
                Self::from_toml_str(&raw).map_err(|e| {
                    let cause = e.details.clone().unwrap_or_default();
                    e.with_details(format!("path={}; err={}", p.display(), cause))
                })?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, AppError> {
        toml::from_str(raw).map_err(|e| {
            AppError::new("CONFIG_INVALID", "Failed to parse config file")
                .with_details(e.to_string())
        })
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.chunk_size == 0 {
            return Err(AppError::new(
                "CONFIG_INVALID",
                "chunk_size must be greater than zero",
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::new(
                "CONFIG_INVALID",
                "chunk_overlap must be smaller than chunk_size",
            )
            .with_details(format!(
                "chunk_size={}; chunk_overlap={}",
                self.chunk_size, self.chunk_overlap
            )));
        }
        if self.top_k == 0 || self.top_k > MAX_TOP_K {
            return Err(AppError::new(
                "CONFIG_INVALID",
                "top_k must be between 1 and 50",
            )
            .with_details(format!("top_k={}", self.top_k)));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(AppError::new(
                "CONFIG_INVALID",
                "temperature must be between 0.0 and 2.0",
            )
            .with_details(format!("temperature={}", self.temperature)));
        }
        if self.embedding_model.trim().is_empty() || self.completion_model.trim().is_empty() {
            return Err(AppError::new(
                "CONFIG_INVALID",
                "embedding_model and completion_model must be set",
            ));
        }
        if self.index_location.as_os_str().is_empty() {
            return Err(AppError::new(
                "CONFIG_INVALID",
                "index_location must not be empty",
            ));
        }
        Ok(())
    }
}
