use serde::Deserialize;

/// A completion reply after shape detection.
///
/// Some models answer with a JSON object (`{"content": ...}` or a chat
/// style `{"message": {"content": ...}}`) instead of prose. Both shapes
/// collapse to the same text via [`ModelReply::into_text`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelReply {
    Structured(String),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StructuredPayload {
    Content { content: String },
    Message { message: MessageBody },
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    content: String,
}

impl ModelReply {
    /// Never fails: anything that is not a recognised structured payload is
    /// kept verbatim as `Text`.
    pub fn decode(raw: &str) -> Self {
        match serde_json::from_str::<StructuredPayload>(raw.trim()) {
            Ok(StructuredPayload::Content { content }) => ModelReply::Structured(content),
            Ok(StructuredPayload::Message { message }) => ModelReply::Structured(message.content),
            Err(e) => {
                tracing::debug!(error = %e, "reply is not a structured payload; using raw text");
                ModelReply::Text(raw.to_string())
            }
        }
    }

    pub fn into_text(self) -> String {
        match self {
            ModelReply::Structured(s) | ModelReply::Text(s) => s,
        }
    }
}
