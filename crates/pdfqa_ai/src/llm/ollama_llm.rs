use pdfqa_core::error::AppError;
use serde::{Deserialize, Serialize};

use super::{GenerateOptions, Llm};
use crate::ollama::OllamaClient;

#[derive(Debug, Clone)]
pub struct OllamaLlm {
    client: OllamaClient,
}

impl OllamaLlm {
    pub fn new(client: OllamaClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Clone, Serialize)]
struct RequestOptions {
    temperature: f32,
}

#[derive(Debug, Clone, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: RequestOptions,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl Llm for OllamaLlm {
    fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: GenerateOptions,
    ) -> Result<String, AppError> {
        let url = format!("{}/api/generate", self.client.base_url());
        let req = GenerateRequest {
            model,
            prompt,
            stream: false,
            options: RequestOptions {
                temperature: options.temperature,
            },
        };
        let body = serde_json::to_value(req).map_err(|e| {
            AppError::new("AI_COMPLETION_FAILED", "Failed to encode completion request")
                .with_details(e.to_string())
        })?;

        let resp = ureq::post(&url)
            .timeout(self.client.timeout())
            .send_json(body);

        match resp {
            Ok(r) => {
                let v: GenerateResponse = r.into_json().map_err(|e| {
                    AppError::new("AI_COMPLETION_FAILED", "Failed to decode completion response")
                        .with_details(e.to_string())
                })?;
                Ok(v.response)
            }
            Err(ureq::Error::Status(code, r)) => {
                let body = r.into_string().unwrap_or_default();
                Err(
                    AppError::new("AI_COMPLETION_FAILED", "Completion request failed")
                        .with_details(format!("status={code}; model={model}; body={body}"))
                        .with_retryable(code >= 500),
                )
            }
            Err(e) => Err(
                AppError::new("AI_COMPLETION_FAILED", "Failed to call completion endpoint")
                    .with_details(e.to_string())
                    .with_retryable(true),
            ),
        }
    }
}
