use pdfqa_core::config::PdfqaConfig;
use pdfqa_core::error::AppError;
use serde::{Deserialize, Serialize};

use crate::llm::{GenerateOptions, Llm};
use crate::prompts::grounded_answer_prompt;
use crate::relevance::RelevanceValidator;
use crate::retrieve::{RetrievedChunk, Retriever};

mod reply;

pub use reply::ModelReply;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GeneralReason {
    NoContext,
    NotRelevant,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "path", content = "reason")]
pub enum AnswerPath {
    Grounded,
    General(GeneralReason),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    pub path: AnswerPath,
    /// Number of retrieved chunks, whether or not they were used.
    pub context_chunks: usize,
}

enum RouteState {
    Start,
    Retrieve,
    Validate(Vec<RetrievedChunk>),
    GroundedAnswer(Vec<RetrievedChunk>),
    GeneralAnswer {
        reason: GeneralReason,
        context_chunks: usize,
    },
    Done(Answer),
}

impl RouteState {
    fn name(&self) -> &'static str {
        match self {
            RouteState::Start => "start",
            RouteState::Retrieve => "retrieve",
            RouteState::Validate(_) => "validate",
            RouteState::GroundedAnswer(_) => "grounded_answer",
            RouteState::GeneralAnswer { .. } => "general_answer",
            RouteState::Done(_) => "done",
        }
    }
}

/// Routes a question to a grounded or a general-knowledge answer.
///
/// Retrieval problems degrade to the general path. Errors from the
/// relevance check or either answering call end the request.
pub struct AnswerRouter<'a> {
    retriever: Retriever<'a>,
    validator: RelevanceValidator<'a>,
    llm: &'a dyn Llm,
    model: String,
    options: GenerateOptions,
}

impl<'a> AnswerRouter<'a> {
    pub fn new(
        retriever: Retriever<'a>,
        validator: RelevanceValidator<'a>,
        llm: &'a dyn Llm,
        config: &PdfqaConfig,
    ) -> Self {
        Self {
            retriever,
            validator,
            llm,
            model: config.completion_model.clone(),
            options: GenerateOptions {
                temperature: config.temperature,
            },
        }
    }

    pub fn answer(&self, question: &str) -> Result<Answer, AppError> {
        let mut state = RouteState::Start;
        loop {
            let next = match state {
                RouteState::Start => RouteState::Retrieve,
                RouteState::Retrieve => {
                    let chunks = self.retriever.retrieve(question);
                    if chunks.is_empty() {
                        RouteState::GeneralAnswer {
                            reason: GeneralReason::NoContext,
                            context_chunks: 0,
                        }
                    } else {
                        RouteState::Validate(chunks)
                    }
                }
                RouteState::Validate(chunks) => {
                    let context = chunks
                        .iter()
                        .map(|c| c.text.as_str())
                        .collect::<Vec<_>>()
                        .join("\n\n");
                    if self.validator.is_relevant(question, &context)? {
                        RouteState::GroundedAnswer(chunks)
                    } else {
                        RouteState::GeneralAnswer {
                            reason: GeneralReason::NotRelevant,
                            context_chunks: chunks.len(),
                        }
                    }
                }
                RouteState::GroundedAnswer(chunks) => {
                    let prompt = grounded_answer_prompt(question, &chunks);
                    let text = self.llm.generate(&self.model, &prompt, self.options)?;
                    RouteState::Done(Answer {
                        text,
                        path: AnswerPath::Grounded,
                        context_chunks: chunks.len(),
                    })
                }
                RouteState::GeneralAnswer {
                    reason,
                    context_chunks,
                } => {
                    let raw = self.llm.generate(&self.model, question, self.options)?;
                    RouteState::Done(Answer {
                        text: ModelReply::decode(&raw).into_text(),
                        path: AnswerPath::General(reason),
                        context_chunks,
                    })
                }
                RouteState::Done(answer) => {
                    tracing::info!(
                        path = ?answer.path,
                        context_chunks = answer.context_chunks,
                        "answered question"
                    );
                    return Ok(answer);
                }
            };
            tracing::debug!(state = next.name(), "route transition");
            state = next;
        }
    }
}
