//! Query embedding through the data store's edge function.
//!
//! The function takes `{ "input": text }` and answers with
//! `{ "embedding": ... }`, either a plain array or an object keyed by the
//! element index. The vector is opaque to the pipeline; its dimension is
//! whatever the deployed model produces.

use crate::supabase::SupabaseClient;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur during embedding generation.
#[derive(Debug, Error)]
pub enum EmbedderError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The function answered with a non-success status.
    #[error("Embedding service error: {0}")]
    Api(String),

    /// The response did not contain a usable vector.
    #[error("Malformed embedding response: {0}")]
    Malformed(String),
}

/// Result type for embedding operations.
pub type Result<T> = std::result::Result<T, EmbedderError>;

/// Converts text into a query vector.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embeds `text` as-is; empty text is not rejected here.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Embedder backed by a Supabase edge function.
#[derive(Debug, Clone)]
pub struct SupabaseEmbedder {
    client: SupabaseClient,
    function: String,
}

impl SupabaseEmbedder {
    pub fn new(client: SupabaseClient, function: impl Into<String>) -> Self {
        Self {
            client,
            function: function.into(),
        }
    }
}

#[async_trait]
impl EmbeddingService for SupabaseEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = self.client.function_url(&self.function);

        let response = self
            .client
            .request(Method::POST, &url)
            .json(&serde_json::json!({ "input": text }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, %body, "Embedding function returned an error");
            return Err(EmbedderError::Api(format!("status {}", status)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| EmbedderError::Malformed(e.to_string()))?;

        let embedding = decode_embedding(&body["embedding"])?;
        debug!(dimension = embedding.len(), "Query embedding generated");
        Ok(embedding)
    }
}

/// Turns the function's `embedding` field into an ordered vector.
///
/// Object keys are element indices; they are ordered numerically so that
/// `"10"` follows `"9"`.
pub fn decode_embedding(value: &Value) -> Result<Vec<f32>> {
    let embedding = match value {
        Value::Array(items) => items
            .iter()
            .map(as_f32)
            .collect::<Result<Vec<_>>>()?,
        Value::Object(map) => {
            let mut indexed = map
                .iter()
                .map(|(key, v)| {
                    let index = key
                        .parse::<usize>()
                        .map_err(|_| EmbedderError::Malformed(format!("non-index key '{}'", key)))?;
                    Ok((index, as_f32(v)?))
                })
                .collect::<Result<Vec<_>>>()?;
            indexed.sort_by_key(|(index, _)| *index);
            indexed.into_iter().map(|(_, v)| v).collect()
        }
        Value::Null => return Err(EmbedderError::Malformed("missing embedding".to_string())),
        other => {
            return Err(EmbedderError::Malformed(format!(
                "unexpected embedding type: {}",
                other
            )))
        }
    };

    if embedding.is_empty() {
        return Err(EmbedderError::Malformed("empty embedding".to_string()));
    }
    Ok(embedding)
}

fn as_f32(value: &Value) -> Result<f32> {
    value
        .as_f64()
        .map(|v| v as f32)
        .ok_or_else(|| EmbedderError::Malformed(format!("non-numeric component {}", value)))
}
