//! Retrieval for legal questions.
//!
//! # Overview
//!
//! A question is turned into a query vector by the [`EmbeddingService`], the
//! [`DocumentStore`] returns the most similar legal text chunks, and
//! [`assemble_context`] folds them into the bounded context block that the
//! prompt builder hands to the model.
//!
//! # Architecture
//!
//! - [`embedder`]: query embedding through the hosted edge function
//! - [`store`]: the document store trait and its factory
//! - [`Retriever`]: jurisdiction filtering, ranking and capping, shared by the
//!   chat pipeline and the CSV export
//! - [`context`]: context assembly and citation tags
//!
//! Two stores exist: [`SupabaseStore`] calls the hosted database, and
//! [`MemoryStore`] scores rows in process with cosine similarity.

pub mod context;
pub mod embedder;
mod memory_store;
mod retriever;
pub mod store;
mod supabase_store;
mod types;

pub use context::{assemble_context, source_tag};
pub use embedder::{EmbedderError, EmbeddingService, SupabaseEmbedder};
pub use memory_store::{cosine_similarity, MemoryStore, StoredDocument};
pub use retriever::Retriever;
pub use store::{create_document_store, DocumentStore, StoreError};
pub use supabase_store::SupabaseStore;
pub use types::{DocumentRow, SearchParams};
