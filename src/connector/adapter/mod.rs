mod chroma_vector_store;
mod fn_embedding;
mod http_embedding;
mod in_memory_record_store;
mod in_memory_vector_store;
mod json_record_store;
mod mock_embedding;

pub use chroma_vector_store::*;
pub use fn_embedding::*;
pub use http_embedding::*;
pub use in_memory_record_store::*;
pub use in_memory_vector_store::*;
pub use json_record_store::*;
pub use mock_embedding::*;
