mod collection_resolver;
mod embedding_builder;
mod embedding_index;
mod query_resolver;
mod registry;
mod sync_coordinator;

pub use collection_resolver::*;
pub use embedding_builder::*;
pub use embedding_index::*;
pub use query_resolver::*;
pub use registry::*;
pub use sync_coordinator::*;
