mod embedding_payload;
mod entity;
mod extraction_rules;
mod query;

pub use embedding_payload::*;
pub use entity::*;
pub use extraction_rules::*;
pub use query::*;
