use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Metadata;
use crate::application::EmbedOptions;

pub const DEFAULT_QUERY_LIMIT: usize = 10;

/// Payload fields a similarity query may return alongside ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncludeField {
    Metadatas,
    Documents,
    Distances,
}

impl IncludeField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Metadatas => "metadatas",
            Self::Documents => "documents",
            Self::Distances => "distances",
        }
    }

    pub fn defaults() -> Vec<IncludeField> {
        vec![Self::Metadatas, Self::Documents, Self::Distances]
    }
}

impl std::fmt::Display for IncludeField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Caller-facing options for a similarity query over one entity type.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    limit: usize,
    where_metadata: Option<Value>,
    where_document: Option<Value>,
    include: Vec<IncludeField>,
    embedder_options: EmbedOptions,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self {
            limit: DEFAULT_QUERY_LIMIT,
            where_metadata: None,
            where_document: None,
            include: IncludeField::defaults(),
            embedder_options: EmbedOptions::new(),
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// An empty object means "no filter".
    pub fn with_where_metadata(mut self, filter: Value) -> Self {
        self.where_metadata = non_empty_filter(filter);
        self
    }

    /// An empty object means "no filter".
    pub fn with_where_document(mut self, filter: Value) -> Self {
        self.where_document = non_empty_filter(filter);
        self
    }

    pub fn with_include(mut self, include: Vec<IncludeField>) -> Self {
        self.include = include;
        self
    }

    /// Forwarded verbatim to the embedder when the query text is embedded.
    /// Ignored for types without an embedder.
    pub fn with_embedder_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.embedder_options.insert(key.into(), value);
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn where_metadata(&self) -> Option<&Value> {
        self.where_metadata.as_ref()
    }

    pub fn where_document(&self) -> Option<&Value> {
        self.where_document.as_ref()
    }

    pub fn include(&self) -> &[IncludeField] {
        &self.include
    }

    pub fn embedder_options(&self) -> &EmbedOptions {
        &self.embedder_options
    }
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty_filter(filter: Value) -> Option<Value> {
    match &filter {
        Value::Null => None,
        Value::Object(map) if map.is_empty() => None,
        _ => Some(filter),
    }
}

/// What the collection ranks against: a vector computed by our embedder, or
/// raw text the store embeds itself.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryInput {
    Embedding(Vec<f32>),
    Text(String),
}

/// A similarity query as sent to a collection.
#[derive(Debug, Clone)]
pub struct CollectionQuery {
    pub input: QueryInput,
    pub limit: usize,
    pub where_metadata: Option<Value>,
    pub where_document: Option<Value>,
    pub include: Vec<IncludeField>,
}

impl CollectionQuery {
    pub fn includes(&self, field: IncludeField) -> bool {
        self.include.contains(&field)
    }
}

/// One ranked hit from a collection, closest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryHit {
    pub id: String,
    pub distance: Option<f32>,
    pub document: Option<String>,
    pub metadata: Option<Metadata>,
}

impl QueryHit {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            distance: None,
            document: None,
            metadata: None,
        }
    }
}

/// A query hit resolved into its primary-store entity.
#[derive(Debug, Clone)]
pub struct EntityMatch<E> {
    entity: E,
    distance: Option<f32>,
    document: Option<String>,
    metadata: Option<Metadata>,
}

impl<E> EntityMatch<E> {
    pub fn new(entity: E, hit: QueryHit) -> Self {
        Self {
            entity,
            distance: hit.distance,
            document: hit.document,
            metadata: hit.metadata,
        }
    }

    pub fn entity(&self) -> &E {
        &self.entity
    }

    pub fn into_entity(self) -> E {
        self.entity
    }

    pub fn distance(&self) -> Option<f32> {
        self.distance
    }

    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }
}
