use std::time::Duration;

use pdfqa_core::error::AppError;

/// Connection settings shared by the Ollama embedder and completion client.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    timeout: Duration,
}

impl OllamaClient {
    /// `base_url` must be `http(s)://host[:port]` with no path; a trailing
    /// slash is trimmed.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        validate_base_url(&base_url)?;
        Ok(Self { base_url, timeout })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn health_check(&self) -> Result<(), AppError> {
        let url = format!("{}/api/tags", self.base_url);
        let resp = ureq::get(&url).timeout(Duration::from_secs(2)).call();

        match resp {
            Ok(r) if r.status() == 200 => Ok(()),
            Ok(r) => Err(
                AppError::new("AI_OLLAMA_UNHEALTHY", "Ollama health check failed")
                    .with_details(format!("status={}", r.status())),
            ),
            Err(ureq::Error::Status(code, _)) => Err(
                AppError::new("AI_OLLAMA_UNHEALTHY", "Ollama health check failed")
                    .with_details(format!("status={code}")),
            ),
            Err(e) => Err(AppError::new("AI_OLLAMA_UNREACHABLE", "Failed to reach Ollama")
                .with_details(format!("base_url={}; err={}", self.base_url, e))
                .with_retryable(true)),
        }
    }
}

fn validate_base_url(base_url: &str) -> Result<(), AppError> {
    let invalid = |why: &str| {
        AppError::new("AI_BASE_URL_INVALID", "Ollama base URL is invalid")
            .with_details(format!("base_url={base_url}; {why}"))
    };

    let rest = base_url
        .strip_prefix("http://")
        .or_else(|| base_url.strip_prefix("https://"))
        .ok_or_else(|| invalid("scheme must be http or https"))?;
    if rest.contains('/') {
        return Err(invalid("path components are not allowed"));
    }
    if rest.contains('@') {
        return Err(invalid("userinfo is not allowed"));
    }

    let (host, port) = match rest.rsplit_once(':') {
        // Bracketed IPv6 literal without a port.
        Some((_, tail)) if rest.starts_with('[') && tail.ends_with(']') => (rest, None),
        Some((host, port)) => (host, Some(port)),
        None => (rest, None),
    };
    if host.is_empty() {
        return Err(invalid("host is empty"));
    }
    if let Some(port) = port {
        match port.parse::<u16>() {
            Ok(p) if p > 0 => {}
            _ => return Err(invalid("port must be 1-65535")),
        }
    }
    Ok(())
}
