//! Document store abstraction and factory.

use super::memory_store::MemoryStore;
use super::supabase_store::SupabaseStore;
use super::types::{DocumentRow, SearchParams};
use crate::config::{StorageMode, StoreConfig};
use crate::supabase::SupabaseClient;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by a document store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Store returned an error: {0}")]
    Api(String),

    #[error("Malformed store response: {0}")]
    Malformed(String),

    #[error("Failed to load seed documents: {0}")]
    Seed(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Read-only access to indexed legal documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Similarity search.
    ///
    /// Returns at most `params.limit` rows whose similarity is at least
    /// `params.threshold`, restricted to `params.jurisdiction` when set.
    async fn search(&self, params: &SearchParams) -> Result<Vec<DocumentRow>>;

    /// Number of documents indexed for a jurisdiction label (all documents when `None`).
    async fn count(&self, jurisdiction: Option<&str>) -> Result<usize>;

    /// Full rows for the given identifiers, in no particular order.
    async fn fetch_by_ids(&self, ids: &[String]) -> Result<Vec<DocumentRow>>;
}

/// Creates the document store selected by the storage mode.
///
/// - `Remote` talks to the hosted database through its REST gateway
/// - `Memory` keeps rows in-process, seeded from a JSON file when given
pub async fn create_document_store(
    config: &StoreConfig,
    client: SupabaseClient,
) -> Result<Arc<dyn DocumentStore>> {
    match &config.storage_mode {
        StorageMode::Remote => Ok(Arc::new(SupabaseStore::new(client, config))),
        StorageMode::Memory { seed_path } => {
            let store = match seed_path {
                Some(path) => MemoryStore::from_seed_file(path).await?,
                None => MemoryStore::new(),
            };
            Ok(Arc::new(store))
        }
    }
}
