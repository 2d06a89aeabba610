//! unbarred-core - Retrieval and generation pipeline for local-law research
//!
//! Provides the components behind the Unbarred legal research assistant:
//! - Configuration and the supported jurisdictions
//! - Service adapters: query embedding, document store, language model provider
//! - Retrieval, context assembly and prompt building
//! - The chat pipeline and the CSV export
//! - Server API (primary interface)
//!
//! ## Primary API
//!
//! Most users start a [`Server`] from a [`Config`]; the CLI and tests drive
//! [`ChatPipeline`] and [`CsvExporter`] directly.

pub mod config;
pub mod export;
pub mod jurisdiction;
pub mod pipeline;
pub mod prompt;
pub mod provider;
pub mod rag;
pub mod server;
pub mod supabase;

// Public exports
pub use config::{Config, ConfigError};
pub use export::CsvExporter;
pub use jurisdiction::Jurisdiction;
pub use pipeline::{ChatPipeline, PipelineError, PipelineEvent};
pub use server::{AppState, Server, ServerError};

// Provider exports
pub use provider::{ChatRequest, ChatResponse, Message, Provider, ProviderError};

// Retrieval exports
pub use rag::{DocumentRow, DocumentStore, EmbeddingService, Retriever};
