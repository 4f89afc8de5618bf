//! # Domain Layer
//!
//! Entities, extraction rules, embedding payloads and query models.
//! This layer is independent of the vector store, the embedder and the
//! primary record store.

mod error;
pub mod models;

pub use error::*;
pub use models::*;
