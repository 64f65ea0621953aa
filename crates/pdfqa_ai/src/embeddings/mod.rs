use pdfqa_core::error::AppError;

/// Turns text into a fixed-dimension vector. Implementations must return
/// the same dimension for every input under a given model.
pub trait Embedder {
    fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, AppError>;
}

pub mod ollama_embed;

pub use ollama_embed::OllamaEmbedder;
