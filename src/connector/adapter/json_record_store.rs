//! Records read from a JSON-lines file, one object per line.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::application::{EmbeddingService, RecordStore};
use crate::domain::{default_collection_name, DomainError, Entity, ExtractionRules, MetadataValue};

/// One JSON object with a string-coercible id.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRecord {
    id: String,
    fields: Map<String, Value>,
}

impl JsonRecord {
    pub fn from_value(value: Value, id_field: &str) -> Result<Self, DomainError> {
        let fields = match value {
            Value::Object(fields) => fields,
            other => {
                return Err(DomainError::invalid_input(format!(
                    "Expected a JSON object, got {}",
                    other
                )))
            }
        };

        let id = match fields.get(id_field) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(other) => {
                return Err(DomainError::invalid_input(format!(
                    "Id field `{}` must be a string or number, got {}",
                    id_field, other
                )))
            }
            None => {
                return Err(DomainError::invalid_input(format!(
                    "Record is missing id field `{}`",
                    id_field
                )))
            }
        };

        Ok(Self { id, fields })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Result<&Value, DomainError> {
        self.fields
            .get(name)
            .ok_or_else(|| DomainError::extraction(name, format!("record {} has no such field", self.id)))
    }

    /// The field as text; non-string scalars use their JSON form.
    pub fn text(&self, name: &str) -> Result<String, DomainError> {
        match self.field(name)? {
            Value::String(s) => Ok(s.clone()),
            Value::Null => Err(DomainError::extraction(name, format!("record {} has null", self.id))),
            other => Ok(other.to_string()),
        }
    }

    pub fn scalar(&self, name: &str) -> Result<MetadataValue, DomainError> {
        let value = self.field(name)?;
        MetadataValue::from_json(value).ok_or_else(|| {
            DomainError::extraction(name, format!("record {} holds a non-scalar {}", self.id, value))
        })
    }
}

impl Entity for JsonRecord {
    const TYPE_NAME: &'static str = "JsonRecord";

    fn primary_key(&self) -> String {
        self.id.clone()
    }
}

/// Field-name based extraction settings for [`JsonRecord`]s.
#[derive(Debug, Clone, Default)]
pub struct JsonRecordRules {
    pub type_name: String,
    pub collection_name: Option<String>,
    pub document_field: Option<String>,
    pub metadata_fields: Vec<String>,
    pub keep_document: bool,
}

impl JsonRecordRules {
    pub fn collection_name(&self) -> String {
        self.collection_name
            .clone()
            .unwrap_or_else(|| default_collection_name(&self.type_name))
    }

    pub fn into_rules(
        self,
        embedder: Option<Arc<dyn EmbeddingService>>,
    ) -> Result<ExtractionRules<JsonRecord>, DomainError> {
        let mut builder = ExtractionRules::<JsonRecord>::builder()
            .collection_name(self.collection_name())
            .keep_document(self.keep_document);

        if let Some(field) = self.document_field {
            builder = builder.try_document(move |r: &JsonRecord| r.text(&field));
        }

        for field in self.metadata_fields {
            let name = field.clone();
            builder = builder.try_metadata(name, move |r: &JsonRecord| r.scalar(&field));
        }

        if let Some(embedder) = embedder {
            builder = builder.embedder(embedder);
        }

        builder.build()
    }
}

/// Read-only record store backed by a JSON-lines file.
pub struct JsonRecordStore {
    records: HashMap<String, JsonRecord>,
    order: Vec<String>,
}

impl JsonRecordStore {
    pub fn parse(content: &str, id_field: &str) -> Result<Self, DomainError> {
        let mut records = HashMap::new();
        let mut order = Vec::new();

        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(line).map_err(|e| {
                DomainError::invalid_input(format!("Line {}: invalid JSON: {}", line_no + 1, e))
            })?;
            let record = JsonRecord::from_value(value, id_field)
                .map_err(|e| DomainError::invalid_input(format!("Line {}: {}", line_no + 1, e)))?;

            if records.contains_key(record.id()) {
                debug!("Line {}: id {} repeats, later line wins", line_no + 1, record.id());
            } else {
                order.push(record.id().to_string());
            }
            records.insert(record.id().to_string(), record);
        }

        Ok(Self { records, order })
    }

    pub fn open(path: impl AsRef<Path>, id_field: &str) -> Result<Self, DomainError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let store = Self::parse(&content, id_field)?;
        info!("Loaded {} records from {}", store.len(), path.display());
        Ok(store)
    }

    /// Records in file order.
    pub fn records(&self) -> Vec<JsonRecord> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id).cloned())
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&JsonRecord> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl RecordStore<JsonRecord> for JsonRecordStore {
    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<JsonRecord>, DomainError> {
        Ok(ids.iter().filter_map(|id| self.records.get(id).cloned()).collect())
    }
}
