use pdfqa_core::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerateOptions {
    pub temperature: f32,
}

/// Prompt in, completion text out. The returned text is passed through
/// untouched; callers decide how to interpret it.
pub trait Llm {
    fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: GenerateOptions,
    ) -> Result<String, AppError>;
}

pub mod ollama_llm;

pub use ollama_llm::OllamaLlm;
