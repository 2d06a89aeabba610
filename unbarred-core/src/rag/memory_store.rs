//! In-memory document storage and search.
//!
//! Keeps rows with their embeddings in process and scores them with cosine
//! similarity. Used for offline runs against an exported seed file and as
//! the store behind the pipeline tests.

use super::store::{DocumentStore, Result, StoreError};
use super::types::{DocumentRow, SearchParams};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A row together with its stored embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
    #[serde(flatten)]
    pub row: DocumentRow,
    pub embedding: Vec<f32>,
}

impl StoredDocument {
    pub fn new(row: DocumentRow, embedding: Vec<f32>) -> Self {
        Self { row, embedding }
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    documents: Arc<RwLock<Vec<StoredDocument>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a JSON array of rows, each carrying an `embedding` field.
    pub async fn from_seed_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::Seed(format!("{}: {}", path.display(), e)))?;
        let documents: Vec<StoredDocument> = serde_json::from_str(&contents)
            .map_err(|e| StoreError::Seed(format!("{}: {}", path.display(), e)))?;
        tracing::info!(count = documents.len(), path = %path.display(), "Loaded seed documents");

        Ok(Self {
            documents: Arc::new(RwLock::new(documents)),
        })
    }

    pub async fn add(&self, document: StoredDocument) {
        self.documents.write().await.push(document);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn search(&self, params: &SearchParams) -> Result<Vec<DocumentRow>> {
        let documents = self.documents.read().await;

        let mut results: Vec<DocumentRow> = documents
            .iter()
            .filter(|doc| match &params.jurisdiction {
                Some(label) => doc.row.jurisdiction == *label,
                None => true,
            })
            .filter_map(|doc| {
                let score = cosine_similarity(&params.embedding, &doc.embedding);
                (score >= params.threshold).then(|| doc.row.clone().with_similarity(score))
            })
            .collect();

        results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        results.truncate(params.limit);
        Ok(results)
    }

    async fn count(&self, jurisdiction: Option<&str>) -> Result<usize> {
        let documents = self.documents.read().await;
        Ok(documents
            .iter()
            .filter(|doc| jurisdiction.map_or(true, |label| doc.row.jurisdiction == label))
            .count())
    }

    async fn fetch_by_ids(&self, ids: &[String]) -> Result<Vec<DocumentRow>> {
        let documents = self.documents.read().await;
        Ok(documents
            .iter()
            .filter(|doc| ids.contains(&doc.row.id))
            .map(|doc| doc.row.clone().with_similarity(0.0))
            .collect())
    }
}

/// Calculates cosine similarity between two vectors.
///
/// Returns a value between -1.0 and 1.0; mismatched or zero vectors score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}
