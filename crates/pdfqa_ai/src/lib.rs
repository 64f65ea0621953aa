pub mod answer;
pub mod chunking;
pub mod embeddings;
pub mod index;
pub mod llm;
pub mod ollama;
pub mod relevance;
pub mod retrieve;

mod prompts;
