pub mod application;
pub mod connector;
pub mod domain;

pub use application::{
    embed_checked, Collection, CollectionHandle, CollectionResolver, EmbedOptions,
    EmbeddingBuilder, EmbeddingIndex, EmbeddingRegistry, EmbeddingService, KeyedLocks,
    QueryResolver, RecordLifecycle, RecordStore, SyncCoordinator, VectorStore,
};

pub use connector::{
    ChromaVectorStore, Container, ContainerConfig, EmbedderKind, FnEmbedding, HttpEmbedding,
    InMemoryRecordStore, InMemoryVectorStore, JsonRecord, JsonRecordRules, JsonRecordStore,
    MockEmbedding,
};

pub use domain::{
    default_collection_name, CollectionQuery, DomainError, EmbeddingPayload, Entity, EntityMatch,
    ExtractionRules, ExtractionRulesBuilder, IncludeField, Metadata, MetadataValue, QueryHit,
    QueryInput, QueryOptions, DEFAULT_QUERY_LIMIT,
};
