use std::time::Duration;

use pdfqa_ai::answer::{Answer, AnswerRouter};
use pdfqa_ai::chunking::ChunkSpec;
use pdfqa_ai::embeddings::{Embedder, OllamaEmbedder};
use pdfqa_ai::index::{build_with_embedder, IndexStatus, IndexStore};
use pdfqa_ai::llm::{Llm, OllamaLlm};
use pdfqa_ai::ollama::OllamaClient;
use pdfqa_ai::relevance::RelevanceValidator;
use pdfqa_ai::retrieve::Retriever;
use pdfqa_core::config::PdfqaConfig;
use pdfqa_core::error::AppError;
use pdfqa_core::pdf::{extract_text, PdfInput};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

#[derive(Debug, Clone, serde::Serialize)]
pub struct IngestSummary {
    pub documents: u32,
    pub pages_with_text: u32,
    pub chunk_count: u32,
    pub dims: u32,
    pub index_location: String,
}

/// The two entry points (ingest, ask) wired to one config, one index
/// location and one pair of model collaborators.
pub struct PdfQa {
    config: PdfqaConfig,
    store: IndexStore,
    embedder: Box<dyn Embedder>,
    llm: Box<dyn Llm>,
}

impl PdfQa {
    pub fn new(
        config: PdfqaConfig,
        embedder: Box<dyn Embedder>,
        llm: Box<dyn Llm>,
    ) -> Result<Self, AppError> {
        config.validate()?;
        let store = IndexStore::open(config.index_location.clone());
        Ok(Self {
            config,
            store,
            embedder,
            llm,
        })
    }

    /// Use Ollama for both embeddings and completions.
    pub fn with_ollama(config: PdfqaConfig) -> Result<Self, AppError> {
        let client = ollama_client(&config)?;
        Self::new(
            config,
            Box::new(OllamaEmbedder::new(client.clone())),
            Box::new(OllamaLlm::new(client)),
        )
    }

    pub fn config(&self) -> &PdfqaConfig {
        &self.config
    }

    /// Extract, chunk, embed and persist. Always replaces the stored index;
    /// nothing is written when the PDFs carry no extractable text.
    pub fn ingest_pdfs(&self, docs: &[PdfInput]) -> Result<IngestSummary, AppError> {
        let corpus = extract_text(docs)?;
        if corpus.is_empty() {
            return Err(AppError::new(
                "INGEST_EMPTY_INPUT",
                "No text could be extracted from the uploaded PDFs",
            )
            .with_details(format!(
                "documents={}; pages={}",
                corpus.documents, corpus.pages_total
            )));
        }
        let mut summary = self.ingest_text(&corpus.text)?;
        summary.documents = corpus.documents;
        summary.pages_with_text = corpus.pages_with_text;
        Ok(summary)
    }

    pub fn ingest_text(&self, text: &str) -> Result<IngestSummary, AppError> {
        let spec = ChunkSpec::from_config(&self.config)?;
        if spec.split(text).all(|c| c.trim().is_empty()) {
            return Err(AppError::new("INGEST_EMPTY_INPUT", "No content to index"));
        }

        // Held for the whole rebuild so readers never see a half-written index.
        let lock = self.store.lock()?;
        let index = build_with_embedder(
            spec.split(text),
            self.embedder.as_ref(),
            &self.config.embedding_model,
            &now_rfc3339_utc()?,
        )?;
        self.store.persist(&lock, &index)?;
        drop(lock);

        Ok(IngestSummary {
            documents: 0,
            pages_with_text: 0,
            chunk_count: index.manifest.chunk_count,
            dims: index.manifest.dims,
            index_location: self.store.root().display().to_string(),
        })
    }

    /// Run the routing pipeline and report which path produced the answer.
    pub fn answer(&self, question: &str) -> Result<Answer, AppError> {
        self.answer_with_top_k(question, self.config.top_k)
    }

    pub fn answer_with_top_k(&self, question: &str, top_k: usize) -> Result<Answer, AppError> {
        let retriever =
            Retriever::new(&self.store, self.embedder.as_ref(), &self.config).with_top_k(top_k);
        let validator = RelevanceValidator::new(self.llm.as_ref(), &self.config);
        AnswerRouter::new(retriever, validator, self.llm.as_ref(), &self.config).answer(question)
    }

    /// Query entry point: always returns displayable text. A failed request
    /// is reported in the text itself and leaves the index untouched.
    pub fn ask(&self, question: &str) -> String {
        self.ask_with_top_k(question, self.config.top_k)
    }

    pub fn ask_with_top_k(&self, question: &str, top_k: usize) -> String {
        if question.trim().is_empty() {
            return "Please enter a question.".to_string();
        }
        match self.answer_with_top_k(question, top_k) {
            Ok(answer) => answer.text,
            Err(e) => {
                tracing::error!(error = %e, "failed to answer question");
                format!("Sorry, the question could not be answered: {}", e.message)
            }
        }
    }

    /// Stored manifest plus the state of the write lock.
    pub fn status(&self) -> Result<IndexStatus, AppError> {
        self.store.status()
    }
}

pub fn ollama_client(config: &PdfqaConfig) -> Result<OllamaClient, AppError> {
    OllamaClient::new(
        &config.ollama_url,
        Duration::from_secs(config.request_timeout_secs),
    )
}

fn now_rfc3339_utc() -> Result<String, AppError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|e| {
            AppError::new("TIME_FORMAT_FAILED", "Failed to format time").with_details(e.to_string())
        })
}
