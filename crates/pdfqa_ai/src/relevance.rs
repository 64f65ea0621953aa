use pdfqa_core::config::PdfqaConfig;
use pdfqa_core::error::AppError;

use crate::llm::{GenerateOptions, Llm};
use crate::prompts::relevance_prompt;

/// Binary relevance check backed by a single completion call.
///
/// Only a reply that trims to exactly `True` counts as relevant. Anything
/// else, including `true`, `True.` or an empty reply, is treated as not
/// relevant and is never retried. Completion failures are returned as errors.
pub struct RelevanceValidator<'a> {
    llm: &'a dyn Llm,
    model: String,
    options: GenerateOptions,
    excerpt_chars: usize,
}

impl<'a> RelevanceValidator<'a> {
    pub fn new(llm: &'a dyn Llm, config: &PdfqaConfig) -> Self {
        Self {
            llm,
            model: config.completion_model.clone(),
            options: GenerateOptions {
                temperature: config.temperature,
            },
            excerpt_chars: config.relevance_excerpt_chars,
        }
    }

    pub fn is_relevant(&self, question: &str, context: &str) -> Result<bool, AppError> {
        let excerpt = excerpt(context, self.excerpt_chars);
        let prompt = relevance_prompt(question, excerpt);
        let reply = self.llm.generate(&self.model, &prompt, self.options)?;

        let verdict = parse_verdict(&reply);
        if !verdict && reply.trim() != "False" {
            tracing::debug!(
                reply = %reply.trim(),
                "ambiguous relevance reply; treating as not relevant"
            );
        }
        tracing::info!(relevant = verdict, "relevance verdict");
        Ok(verdict)
    }
}

pub fn parse_verdict(reply: &str) -> bool {
    reply.trim() == "True"
}

fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
