use pdfqa_core::error::AppError;
use serde::{Deserialize, Serialize};

use super::Embedder;
use crate::ollama::OllamaClient;

#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: OllamaClient,
}

impl OllamaEmbedder {
    pub fn new(client: OllamaClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Clone, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

impl Embedder for OllamaEmbedder {
    fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        let url = format!("{}/api/embeddings", self.client.base_url());
        let req = EmbeddingsRequest {
            model,
            prompt: input,
        };
        let body = serde_json::to_value(req).map_err(|e| {
            AppError::new("AI_EMBEDDINGS_FAILED", "Failed to encode embeddings request")
                .with_details(e.to_string())
        })?;
        let resp = ureq::post(&url)
            .timeout(self.client.timeout())
            .send_json(body);

        match resp {
            Ok(r) => {
                let v: EmbeddingsResponse = r.into_json().map_err(|e| {
                    AppError::new("AI_EMBEDDINGS_FAILED", "Failed to decode embeddings response")
                        .with_details(e.to_string())
                })?;
                if v.embedding.is_empty() {
                    return Err(AppError::new(
                        "AI_EMBEDDINGS_FAILED",
                        "Embeddings response was empty",
                    )
                    .with_details(format!("model={model}")));
                }
                Ok(v.embedding)
            }
            Err(ureq::Error::Status(code, r)) => {
                let body = r.into_string().unwrap_or_default();
                Err(
                    AppError::new("AI_EMBEDDINGS_FAILED", "Embeddings request failed")
                        .with_details(format!("status={code}; model={model}; body={body}"))
                        .with_retryable(code >= 500),
                )
            }
            Err(e) => Err(
                AppError::new("AI_EMBEDDINGS_FAILED", "Failed to call embeddings endpoint")
                    .with_details(e.to_string())
                    .with_retryable(true),
            ),
        }
    }
}
