use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata stored next to a vector. Keys keep the order they were inserted in.
pub type Metadata = serde_json::Map<String, Value>;

/// A scalar metadata value, the only kind a collection accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl MetadataValue {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::Number((*i).into()),
            // Non-finite floats have no JSON form
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::String(s) => Value::String(s.clone()),
        }
    }

    /// Converts a JSON scalar back into a metadata value. Arrays, objects and
    /// null are rejected.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float)),
            Value::String(s) => Some(Self::String(s.clone())),
            _ => None,
        }
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for MetadataValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<u32> for MetadataValue {
    fn from(value: u32) -> Self {
        Self::Int(value.into())
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<f32> for MetadataValue {
    fn from(value: f32) -> Self {
        Self::Float(value.into())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

/// The id/document/vector/metadata bundle stored for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingPayload {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    document: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    embedding: Option<Vec<f32>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    metadata: Option<Metadata>,
}

impl EmbeddingPayload {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            document: None,
            embedding: None,
            metadata: None,
        }
    }

    pub fn with_document(mut self, document: impl Into<String>) -> Self {
        self.document = Some(document.into());
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }

    pub fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref()
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    /// True when the payload carries nothing besides its id.
    pub fn is_empty(&self) -> bool {
        self.document.is_none() && self.embedding.is_none() && self.metadata.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_value_json_scalars() {
        assert_eq!(MetadataValue::from(3).to_json(), serde_json::json!(3));
        assert_eq!(MetadataValue::from("x").to_json(), serde_json::json!("x"));
        assert_eq!(MetadataValue::from(true).to_json(), serde_json::json!(true));
        assert_eq!(MetadataValue::from(f64::NAN).to_json(), Value::Null);
    }

    #[test]
    fn test_metadata_value_rejects_composites() {
        assert!(MetadataValue::from_json(&serde_json::json!([1, 2])).is_none());
        assert!(MetadataValue::from_json(&serde_json::json!({"a": 1})).is_none());
        assert!(MetadataValue::from_json(&Value::Null).is_none());
        assert_eq!(
            MetadataValue::from_json(&serde_json::json!(1.5)),
            Some(MetadataValue::Float(1.5))
        );
    }

    #[test]
    fn test_empty_payload_is_still_valid() {
        let payload = EmbeddingPayload::new("42");
        assert_eq!(payload.id(), "42");
        assert!(payload.is_empty());

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json, serde_json::json!({"id": "42"}));
    }
}
