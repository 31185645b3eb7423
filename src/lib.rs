//! # CodeContext
//!
//! A retrieval-augmented code context engine: given an indexed repository
//! and a natural-language task, it returns a tightly ranked set of code
//! regions plus diagram artifacts and token-budgeted prompt packages, and it
//! can apply LLM-generated patches safely through an isolated worktree.
//!
//! ## Architecture
//!
//! The crate is organized following Domain-Driven Design principles:
//!
//! - `domain`: Core models (entities, chunks, graphs, signals, patches) and
//!   pure scoring helpers
//! - `application`: Use cases (index, retrieve, prompt, patch, feedback)
//!   and the trait seams they depend on
//! - `connector`: External integrations (tree-sitter, vector stores, git,
//!   LLM gateway, Git host) and the storage layer

pub mod application;
pub mod config;
pub mod connector;
pub mod domain;

// Re-export commonly used types
pub use application::*;
pub use config::Settings;
pub use connector::*;
pub use domain::*;
