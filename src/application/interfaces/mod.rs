mod embedding_service;
mod record_store;
mod vector_store;

pub use embedding_service::*;
pub use record_store::*;
pub use vector_store::*;
