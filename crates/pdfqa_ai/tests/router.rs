use std::cell::RefCell;

use pdfqa_ai::answer::{AnswerPath, AnswerRouter, GeneralReason};
use pdfqa_ai::embeddings::Embedder;
use pdfqa_ai::index::{build_with_embedder, IndexStore};
use pdfqa_ai::llm::{GenerateOptions, Llm};
use pdfqa_ai::relevance::RelevanceValidator;
use pdfqa_ai::retrieve::Retriever;
use pdfqa_core::config::PdfqaConfig;
use pdfqa_core::error::AppError;
use pretty_assertions::assert_eq;

struct LetterEmbedder;

impl Embedder for LetterEmbedder {
    fn embed(&self, _model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        let mut v = vec![0f32; 26];
        for ch in input.chars().flat_map(|c| c.to_lowercase()) {
            if ch.is_ascii_lowercase() {
                v[(ch as u8 - b'a') as usize] += 1.0;
            }
        }
        Ok(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Call {
    Relevance,
    Grounded,
    General,
}

fn classify(prompt: &str) -> Call {
    if prompt.contains("Answer with exactly one word: True or False") {
        Call::Relevance
    } else if prompt.contains("using the provided context") {
        Call::Grounded
    } else {
        Call::General
    }
}

/// Replies per call kind and records which kinds were requested.
struct ScriptedLlm {
    verdict: String,
    grounded: String,
    general: String,
    calls: RefCell<Vec<Call>>,
    prompts: RefCell<Vec<String>>,
    requests: RefCell<Vec<(String, GenerateOptions)>>,
}

impl ScriptedLlm {
    fn new(verdict: &str, grounded: &str, general: &str) -> Self {
        Self {
            verdict: verdict.to_string(),
            grounded: grounded.to_string(),
            general: general.to_string(),
            calls: RefCell::new(Vec::new()),
            prompts: RefCell::new(Vec::new()),
            requests: RefCell::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }
}

impl Llm for ScriptedLlm {
    fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: GenerateOptions,
    ) -> Result<String, AppError> {
        let kind = classify(prompt);
        self.calls.borrow_mut().push(kind);
        self.prompts.borrow_mut().push(prompt.to_string());
        self.requests.borrow_mut().push((model.to_string(), options));
        Ok(match kind {
            Call::Relevance => self.verdict.clone(),
            Call::Grounded => self.grounded.clone(),
            Call::General => self.general.clone(),
        })
    }
}

/// Judges relevance by keyword overlap and answers grounded questions
/// from the context it was given.
struct KeywordLlm;

impl Llm for KeywordLlm {
    fn generate(
        &self,
        _model: &str,
        prompt: &str,
        _options: GenerateOptions,
    ) -> Result<String, AppError> {
        match classify(prompt) {
            Call::Relevance => {
                let question = section(prompt, "Question:\n", "\n\nContext:");
                let context = section(prompt, "Context:\n", "\n\nDoes the context");
                let shared = question
                    .split_whitespace()
                    .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
                    .filter(|w| w.len() > 4)
                    .any(|w| context.to_lowercase().contains(&w));
                Ok(if shared { "True" } else { "False" }.to_string())
            }
            Call::Grounded => {
                if prompt.contains("City Y") {
                    Ok("According to the documents, the capital of Country X is City Y."
                        .to_string())
                } else {
                    Ok("I could not find that in the documents.".to_string())
                }
            }
            Call::General => Ok(r#"{"role": "assistant", "content": "2 + 2 = 4"}"#.to_string()),
        }
    }
}

fn section<'p>(prompt: &'p str, start: &str, end: &str) -> &'p str {
    let from = prompt.find(start).map(|i| i + start.len()).unwrap_or(0);
    let rest = &prompt[from..];
    let to = rest.find(end).unwrap_or(rest.len());
    &rest[..to]
}

struct FailingLlm;

impl Llm for FailingLlm {
    fn generate(
        &self,
        _model: &str,
        _prompt: &str,
        _options: GenerateOptions,
    ) -> Result<String, AppError> {
        Err(AppError::new("AI_COMPLETION_FAILED", "Failed to call completion endpoint")
            .with_retryable(true))
    }
}

fn ingest(store: &IndexStore, texts: &[&str]) {
    let index =
        build_with_embedder(texts.iter().copied(), &LetterEmbedder, "mock", "t").expect("build");
    let lock = store.lock().expect("lock");
    store.persist(&lock, &index).expect("persist");
}

fn router<'a>(store: &'a IndexStore, llm: &'a dyn Llm, config: &PdfqaConfig) -> AnswerRouter<'a> {
    AnswerRouter::new(
        Retriever::new(store, &LetterEmbedder, config),
        RelevanceValidator::new(llm, config),
        llm,
        config,
    )
}

#[test]
fn grounded_answer_mentions_fact_from_document() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = IndexStore::open(dir.path().to_path_buf());
    ingest(&store, &["The capital of Country X is City Y."]);
    let config = PdfqaConfig::default();

    let answer = router(&store, &KeywordLlm, &config)
        .answer("What is the capital of Country X?")
        .expect("answer");
    assert_eq!(answer.path, AnswerPath::Grounded);
    assert_eq!(answer.context_chunks, 1);
    assert!(answer.text.contains("City Y"));
}

#[test]
fn no_index_skips_validation_and_answers_generally() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = IndexStore::open(dir.path().join("fresh"));
    let config = PdfqaConfig::default();
    let llm = ScriptedLlm::new("True", "grounded", "4");

    let answer = router(&store, &llm, &config).answer("What is 2+2?").expect("answer");
    assert_eq!(answer.path, AnswerPath::General(GeneralReason::NoContext));
    assert_eq!(answer.text, "4");
    assert_eq!(answer.context_chunks, 0);
    assert_eq!(llm.calls(), vec![Call::General]);
    // The general path sends the raw question with no context.
    assert_eq!(llm.prompts.borrow()[0], "What is 2+2?");
}

#[test]
fn unrelated_question_takes_general_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = IndexStore::open(dir.path().to_path_buf());
    ingest(&store, &["Photosynthesis converts sunlight, water and carbon dioxide into glucose."]);
    let config = PdfqaConfig::default();

    let answer = router(&store, &KeywordLlm, &config)
        .answer("Who painted the Mona Lisa?")
        .expect("answer");
    assert_eq!(answer.path, AnswerPath::General(GeneralReason::NotRelevant));
    assert_eq!(answer.context_chunks, 1);
    assert_eq!(answer.text, "2 + 2 = 4");
}

#[test]
fn ambiguous_verdicts_fall_back_to_general_answer() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = IndexStore::open(dir.path().to_path_buf());
    ingest(&store, &["Some stored passage about things."]);
    let config = PdfqaConfig::default();

    for verdict in ["true", "True.", "", "Maybe", "Yes"] {
        let llm = ScriptedLlm::new(verdict, "grounded", "general");
        let answer = router(&store, &llm, &config).answer("things?").expect("answer");
        assert_eq!(
            answer.path,
            AnswerPath::General(GeneralReason::NotRelevant),
            "verdict={verdict:?}"
        );
        assert_eq!(answer.text, "general");
        assert_eq!(llm.calls(), vec![Call::Relevance, Call::General]);
    }
}

#[test]
fn grounded_answer_is_returned_verbatim() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = IndexStore::open(dir.path().to_path_buf());
    ingest(&store, &["first passage", "second passage"]);
    let config = PdfqaConfig::default();
    let raw = r#"{"content": "kept as-is"}"#;
    let llm = ScriptedLlm::new("True", raw, "unused");

    let answer = router(&store, &llm, &config).answer("passage").expect("answer");
    assert_eq!(answer.path, AnswerPath::Grounded);
    assert_eq!(answer.text, raw);
    assert_eq!(answer.context_chunks, 2);
    assert_eq!(llm.calls(), vec![Call::Relevance, Call::Grounded]);

    let prompts = llm.prompts.borrow();
    assert!(prompts[1].contains("first passage"));
    assert!(prompts[1].contains("second passage"));
}

#[test]
fn completion_failures_propagate_once_context_exists() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = IndexStore::open(dir.path().to_path_buf());
    ingest(&store, &["context"]);
    let config = PdfqaConfig::default();

    let err = router(&store, &FailingLlm, &config).answer("context?").expect_err("must fail");
    assert_eq!(err.code, "AI_COMPLETION_FAILED");
}

#[test]
fn general_answer_failure_propagates_without_index() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = IndexStore::open(dir.path().join("fresh"));
    let config = PdfqaConfig::default();

    let err = router(&store, &FailingLlm, &config).answer("What is 2+2?").expect_err("must fail");
    assert_eq!(err.code, "AI_COMPLETION_FAILED");
    assert!(!store.root().exists());
}

#[test]
fn configured_model_and_temperature_reach_every_completion_call() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = IndexStore::open(dir.path().to_path_buf());
    ingest(&store, &["some passage"]);
    let config = PdfqaConfig {
        completion_model: "mistral".to_string(),
        temperature: 0.7,
        ..PdfqaConfig::default()
    };
    let expected = ("mistral".to_string(), GenerateOptions { temperature: 0.7 });

    let grounded = ScriptedLlm::new("True", "grounded", "unused");
    router(&store, &grounded, &config).answer("passage").expect("answer");
    assert_eq!(grounded.calls(), vec![Call::Relevance, Call::Grounded]);
    assert_eq!(*grounded.requests.borrow(), vec![expected.clone(), expected.clone()]);

    let general = ScriptedLlm::new("False", "unused", "general");
    router(&store, &general, &config).answer("passage").expect("answer");
    assert_eq!(general.calls(), vec![Call::Relevance, Call::General]);
    assert_eq!(*general.requests.borrow(), vec![expected.clone(), expected]);
}
