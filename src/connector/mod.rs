//! # Connector Layer
//!
//! Adapters implementing the application ports:
//! - Vector stores (ChromaDB, in-memory)
//! - Embedders (HTTP, mock, closure-backed)
//! - Record stores (in-memory with lifecycle hooks, JSON-lines file)
//!
//! plus the [`Container`] that wires them together for the binary.

pub mod adapter;
pub mod container;

pub use adapter::*;
pub use container::*;
