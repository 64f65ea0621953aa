use crate::retrieve::RetrievedChunk;

pub(crate) fn relevance_prompt(question: &str, context_excerpt: &str) -> String {
    // The caller compares the trimmed reply to the literal `True`; keep the
    // instruction strict about the output shape.
    format!(
        r#"You are checking whether a document excerpt can help answer a question.

Question:
{question}

Context:
{context_excerpt}

Does the context contain information relevant to answering the question?
Answer with exactly one word: True or False. Do not add punctuation or explanation.
"#
    )
}

pub(crate) fn grounded_answer_prompt(question: &str, chunks: &[RetrievedChunk]) -> String {
    let context = chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");
    format!(
        r#"Answer the question as thoroughly as possible using the provided context.
Prefer the context over anything else you know. If the answer is not in the context,
answer from your general knowledge instead, and do not invent details about the documents.

Context:
{context}

Question:
{question}

Answer:
"#
    )
}
