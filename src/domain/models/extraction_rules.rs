use std::fmt;
use std::sync::Arc;

use convert_case::{Case, Casing};
use pluralizer::pluralize;
use tracing::warn;

use super::{Entity, MetadataValue};
use crate::application::{EmbedOptions, EmbeddingService};
use crate::domain::DomainError;

pub type DocumentAccessor<E> = Arc<dyn Fn(&E) -> Result<String, DomainError> + Send + Sync>;
pub type MetadataAccessor<E> = Arc<dyn Fn(&E) -> Result<MetadataValue, DomainError> + Send + Sync>;

/// Derives the collection name for a type name: snake_case with the last
/// word pluralized (`BlogPost` -> `blog_posts`, `Story` -> `stories`).
pub fn default_collection_name(type_name: &str) -> String {
    let snake = type_name.to_case(Case::Snake);
    match snake.rsplit_once('_') {
        Some((head, last)) => format!("{}_{}", head, pluralize(last, 2, false)),
        None => pluralize(&snake, 2, false),
    }
}

/// How one entity type is turned into an embedding payload.
///
/// Built once through [`ExtractionRules::builder`] and read-only afterwards.
pub struct ExtractionRules<E: Entity> {
    collection_name: String,
    document: Option<DocumentAccessor<E>>,
    metadata: Vec<(String, MetadataAccessor<E>)>,
    embedder: Option<Arc<dyn EmbeddingService>>,
    embedder_options: EmbedOptions,
    keep_document: bool,
}

impl<E: Entity> ExtractionRules<E> {
    pub fn builder() -> ExtractionRulesBuilder<E> {
        ExtractionRulesBuilder::new()
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    pub fn document(&self) -> Option<&DocumentAccessor<E>> {
        self.document.as_ref()
    }

    /// Metadata accessors in configured order, `None` when none are set.
    pub fn metadata(&self) -> Option<&[(String, MetadataAccessor<E>)]> {
        if self.metadata.is_empty() {
            None
        } else {
            Some(&self.metadata)
        }
    }

    pub fn metadata_fields(&self) -> Vec<&str> {
        self.metadata.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn embedder(&self) -> Option<&Arc<dyn EmbeddingService>> {
        self.embedder.as_ref()
    }

    pub fn embedder_options(&self) -> &EmbedOptions {
        &self.embedder_options
    }

    pub fn keep_document(&self) -> bool {
        self.keep_document
    }
}

impl<E: Entity> fmt::Debug for ExtractionRules<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionRules")
            .field("entity", &E::TYPE_NAME)
            .field("collection_name", &self.collection_name)
            .field("document", &self.document.is_some())
            .field("metadata", &self.metadata_fields())
            .field(
                "embedder",
                &self.embedder.as_ref().map(|e| e.model_name().to_string()),
            )
            .field("keep_document", &self.keep_document)
            .finish()
    }
}

pub struct ExtractionRulesBuilder<E: Entity> {
    collection_name: Option<String>,
    document: Option<DocumentAccessor<E>>,
    metadata: Vec<(String, MetadataAccessor<E>)>,
    embedder: Option<Arc<dyn EmbeddingService>>,
    embedder_options: EmbedOptions,
    keep_document: bool,
}

impl<E: Entity> ExtractionRulesBuilder<E> {
    fn new() -> Self {
        Self {
            collection_name: None,
            document: None,
            metadata: Vec::new(),
            embedder: None,
            embedder_options: EmbedOptions::new(),
            keep_document: true,
        }
    }

    pub fn collection_name(mut self, name: impl Into<String>) -> Self {
        self.collection_name = Some(name.into());
        self
    }

    pub fn document<F>(mut self, accessor: F) -> Self
    where
        F: Fn(&E) -> String + Send + Sync + 'static,
    {
        self.document = Some(Arc::new(move |entity| Ok(accessor(entity))));
        self
    }

    /// Fallible document accessor; its error is reported against the
    /// `document` field.
    pub fn try_document<F, Err>(mut self, accessor: F) -> Self
    where
        F: Fn(&E) -> Result<String, Err> + Send + Sync + 'static,
        Err: fmt::Display,
    {
        self.document = Some(Arc::new(move |entity| {
            accessor(entity).map_err(|e| DomainError::extraction("document", e.to_string()))
        }));
        self
    }

    pub fn metadata<F, V>(self, name: impl Into<String>, accessor: F) -> Self
    where
        F: Fn(&E) -> V + Send + Sync + 'static,
        V: Into<MetadataValue>,
    {
        self.insert_metadata(name.into(), Arc::new(move |entity| Ok(accessor(entity).into())))
    }

    pub fn try_metadata<F, V, Err>(self, name: impl Into<String>, accessor: F) -> Self
    where
        F: Fn(&E) -> Result<V, Err> + Send + Sync + 'static,
        V: Into<MetadataValue>,
        Err: fmt::Display,
    {
        let name = name.into();
        let field = name.clone();
        self.insert_metadata(
            name,
            Arc::new(move |entity| {
                accessor(entity)
                    .map(Into::into)
                    .map_err(|e| DomainError::extraction(field.as_str(), e.to_string()))
            }),
        )
    }

    // Metadata fields form an ordered set: a repeated name swaps the
    // accessor and keeps its original position.
    fn insert_metadata(mut self, name: String, accessor: MetadataAccessor<E>) -> Self {
        match self.metadata.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = accessor,
            None => self.metadata.push((name, accessor)),
        }
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingService>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn embedder_options(mut self, options: EmbedOptions) -> Self {
        self.embedder_options = options;
        self
    }

    pub fn keep_document(mut self, keep: bool) -> Self {
        self.keep_document = keep;
        self
    }

    pub fn build(self) -> Result<ExtractionRules<E>, DomainError> {
        let collection_name = self
            .collection_name
            .unwrap_or_else(|| default_collection_name(E::TYPE_NAME));

        if collection_name.trim().is_empty() {
            return Err(DomainError::configuration(format!(
                "{}: collection name must not be empty",
                E::TYPE_NAME
            )));
        }

        if self.embedder.is_some() && self.document.is_none() {
            return Err(DomainError::configuration(format!(
                "{}: an embedder needs a document accessor to embed",
                E::TYPE_NAME
            )));
        }

        if !self.keep_document && self.embedder.is_none() {
            warn!(
                "{}: keep_document is off without an embedder, document text will be discarded",
                E::TYPE_NAME
            );
        }

        Ok(ExtractionRules {
            collection_name,
            document: self.document,
            metadata: self.metadata,
            embedder: self.embedder,
            embedder_options: self.embedder_options,
            keep_document: self.keep_document,
        })
    }
}
