//! unbarred - Legal research assistant for California local law
//!
//! This is the convenience wrapper crate that re-exports the
//! `unbarred-core` components.
//!
//! # Quick Start
//!
//! ```toml
//! [dependencies]
//! unbarred = "0.1"
//! ```

// Re-export core
pub use unbarred_core::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use unbarred_core::config::{AnswerFormat, FilterMode, ResponseMode, StorageMode};
    pub use unbarred_core::*;
}
