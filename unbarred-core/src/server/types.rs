use serde::{Deserialize, Serialize};

/// A message in the client's conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequestBody {
    #[serde(default)]
    pub messages: Vec<Message>,

    /// Jurisdiction key or label chosen in the front end
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,
}

impl ChatRequestBody {
    /// The question being asked: the last message's content, or empty.
    pub fn query(&self) -> &str {
        self.messages.last().map(|m| m.content.as_str()).unwrap_or("")
    }
}

/// Query string of `GET /api/csv`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CsvQuery {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub county: Option<String>,
}

/// Kind of a streamed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    Chunk,
    Done,
    Error,
}

/// One line of the newline-delimited JSON answer stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    #[serde(rename = "type")]
    pub chunk_type: ChunkType,
    pub content: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StreamChunk {
    pub fn chunk(content: impl Into<String>) -> Self {
        Self {
            chunk_type: ChunkType::Chunk,
            content: content.into(),
            error: None,
        }
    }

    /// Final frame; carries the whole answer.
    pub fn done(content: impl Into<String>) -> Self {
        Self {
            chunk_type: ChunkType::Done,
            content: content.into(),
            error: None,
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            chunk_type: ChunkType::Error,
            content: String::new(),
            error: Some(error.into()),
        }
    }

    /// Serialized frame followed by a newline.
    pub fn to_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"type":"error","content":"","error":"serialization failed"}"#.to_string()
        });
        line.push('\n');
        line
    }
}

/// Buffered answer body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponseBody {
    pub response: String,
}

/// Error response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
