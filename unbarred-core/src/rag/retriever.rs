//! Embedding plus jurisdiction-aware similarity retrieval.

use super::embedder::{EmbedderError, EmbeddingService};
use super::store::{DocumentStore, StoreError};
use super::types::{DocumentRow, SearchParams};
use crate::config::FilterMode;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

/// Couples the embedding service with the document store and applies the
/// configured jurisdiction filter.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingService>,
    store: Arc<dyn DocumentStore>,
    filter_mode: FilterMode,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingService>,
        store: Arc<dyn DocumentStore>,
        filter_mode: FilterMode,
    ) -> Self {
        Self {
            embedder,
            store,
            filter_mode,
        }
    }

    pub fn filter_mode(&self) -> FilterMode {
        self.filter_mode
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        self.embedder.embed(text).await
    }

    /// Returns at most `limit` rows at or above `threshold`, most similar
    /// first. Equal scores are ordered by id.
    pub async fn retrieve(
        &self,
        embedding: Vec<f32>,
        threshold: f32,
        limit: usize,
        jurisdiction: Option<&str>,
    ) -> Result<Vec<DocumentRow>, StoreError> {
        let store_filter = match self.filter_mode {
            FilterMode::Strict => jurisdiction.map(str::to_string),
            FilterMode::Fuzzy | FilterMode::None => None,
        };

        let params = SearchParams {
            embedding,
            threshold,
            limit,
            jurisdiction: store_filter,
        };
        let mut rows = self.store.search(&params).await?;

        if let (FilterMode::Fuzzy, Some(label)) = (self.filter_mode, jurisdiction) {
            rows.retain(|row| labels_overlap(&row.jurisdiction, label));
        }

        rows.retain(|row| row.similarity >= threshold);
        rank(&mut rows);
        rows.truncate(limit);

        debug!(
            rows = rows.len(),
            filter = ?self.filter_mode,
            jurisdiction = jurisdiction.unwrap_or("-"),
            "Retrieved documents"
        );
        Ok(rows)
    }

    /// Document count for a jurisdiction. Only strict filtering asks the
    /// store for a filtered count; the other modes count everything.
    pub async fn count(&self, jurisdiction: Option<&str>) -> Result<usize, StoreError> {
        let filter = match self.filter_mode {
            FilterMode::Strict => jurisdiction,
            FilterMode::Fuzzy | FilterMode::None => None,
        };
        self.store.count(filter).await
    }

    pub async fn fetch_by_ids(&self, ids: &[String]) -> Result<Vec<DocumentRow>, StoreError> {
        self.store.fetch_by_ids(ids).await
    }
}

/// Similarity descending, then id ascending.
fn rank(rows: &mut [DocumentRow]) {
    rows.sort_by(|a, b| match b.similarity.total_cmp(&a.similarity) {
        Ordering::Equal => a.id.cmp(&b.id),
        other => other,
    });
}

/// Case-insensitive containment in either direction. Empty labels never match.
fn labels_overlap(row_label: &str, query_label: &str) -> bool {
    let row = row_label.trim().to_lowercase();
    let query = query_label.trim().to_lowercase();
    if row.is_empty() || query.is_empty() {
        return false;
    }
    row.contains(&query) || query.contains(&row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::embedder;
    use crate::rag::store;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedEmbedder;

    #[async_trait]
    impl EmbeddingService for FixedEmbedder {
        async fn embed(&self, _text: &str) -> embedder::Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }
    }

    /// Returns canned rows and remembers the filter it was asked for.
    struct CannedStore {
        rows: Vec<DocumentRow>,
        seen_filter: Mutex<Vec<Option<String>>>,
    }

    impl CannedStore {
        fn new(rows: Vec<DocumentRow>) -> Self {
            Self {
                rows,
                seen_filter: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl DocumentStore for CannedStore {
        async fn search(&self, params: &SearchParams) -> store::Result<Vec<DocumentRow>> {
            self.seen_filter.lock().unwrap().push(params.jurisdiction.clone());
            Ok(self
                .rows
                .iter()
                .filter(|r| match &params.jurisdiction {
                    Some(label) => r.jurisdiction == *label,
                    None => true,
                })
                .cloned()
                .collect())
        }

        async fn count(&self, jurisdiction: Option<&str>) -> store::Result<usize> {
            self.seen_filter
                .lock()
                .unwrap()
                .push(jurisdiction.map(str::to_string));
            Ok(self.rows.len())
        }

        async fn fetch_by_ids(&self, _ids: &[String]) -> store::Result<Vec<DocumentRow>> {
            Ok(Vec::new())
        }
    }

    fn rows() -> Vec<DocumentRow> {
        vec![
            DocumentRow::new("b", "two").with_jurisdiction("Alameda County").with_similarity(0.7),
            DocumentRow::new("a", "one").with_jurisdiction("Alameda County").with_similarity(0.7),
            DocumentRow::new("c", "three").with_jurisdiction("alameda").with_similarity(0.9),
            DocumentRow::new("d", "four").with_jurisdiction("Sierra Madre").with_similarity(0.8),
            DocumentRow::new("e", "five").with_jurisdiction("").with_similarity(0.95),
            DocumentRow::new("f", "six").with_jurisdiction("Alameda County").with_similarity(0.2),
        ]
    }

    fn retriever(mode: FilterMode) -> (Retriever, Arc<CannedStore>) {
        let store = Arc::new(CannedStore::new(rows()));
        let retriever = Retriever::new(Arc::new(FixedEmbedder), store.clone(), mode);
        (retriever, store)
    }

    fn ids(rows: &[DocumentRow]) -> Vec<&str> {
        rows.iter().map(|r| r.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_strict_passes_label_to_store() {
        let (retriever, store) = retriever(FilterMode::Strict);
        let rows = retriever
            .retrieve(vec![1.0], 0.5, 10, Some("Alameda County"))
            .await
            .unwrap();

        assert_eq!(ids(&rows), vec!["a", "b"]);
        assert_eq!(
            store.seen_filter.lock().unwrap().as_slice(),
            &[Some("Alameda County".to_string())]
        );
    }

    #[tokio::test]
    async fn test_fuzzy_matches_containment() {
        let (retriever, store) = retriever(FilterMode::Fuzzy);
        let rows = retriever
            .retrieve(vec![1.0], 0.5, 10, Some("Alameda County"))
            .await
            .unwrap();

        assert_eq!(ids(&rows), vec!["c", "a", "b"]);
        assert_eq!(store.seen_filter.lock().unwrap().as_slice(), &[None]);
    }

    #[tokio::test]
    async fn test_none_mode_ignores_jurisdiction() {
        let (retriever, _) = retriever(FilterMode::None);
        let rows = retriever
            .retrieve(vec![1.0], 0.5, 3, Some("Alameda County"))
            .await
            .unwrap();

        assert_eq!(ids(&rows), vec!["e", "c", "d"]);
    }

    #[tokio::test]
    async fn test_count_filter_follows_mode() {
        let (strict, strict_store) = retriever(FilterMode::Strict);
        strict.count(Some("Sierra Madre")).await.unwrap();
        assert_eq!(
            strict_store.seen_filter.lock().unwrap().as_slice(),
            &[Some("Sierra Madre".to_string())]
        );

        let (fuzzy, fuzzy_store) = retriever(FilterMode::Fuzzy);
        fuzzy.count(Some("Sierra Madre")).await.unwrap();
        assert_eq!(fuzzy_store.seen_filter.lock().unwrap().as_slice(), &[None]);
    }

    #[test]
    fn test_labels_overlap() {
        assert!(labels_overlap("Alameda County", "alameda"));
        assert!(labels_overlap("alameda", "Alameda County"));
        assert!(!labels_overlap("", "Alameda County"));
        assert!(!labels_overlap("Sierra Madre", "Alameda County"));
    }
}
