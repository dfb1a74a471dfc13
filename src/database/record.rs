use serde_json::{Map, Value};

use crate::schema::ModelSchema;
use crate::types::RecordKey;

/// Errors that can occur during Record operations
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Row has no usable primary key '{0}'")]
    MissingPrimaryKey(String),
    #[error("Invalid JSON format: {0}")]
    InvalidJson(String),
}

/// One persisted entity loaded for the lifetime of a request
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    model: String,
    key: RecordKey,
    fields: Map<String, Value>,
}

impl Record {
    pub fn new(model: impl Into<String>, key: RecordKey, fields: Map<String, Value>) -> Self {
        Self {
            model: model.into(),
            key,
            fields,
        }
    }

    /// Build from a database row, reading the key from the schema's primary key column
    pub fn from_row(schema: &ModelSchema, row: Value) -> Result<Self, RecordError> {
        let fields = match row {
            Value::Object(map) => map,
            _ => return Err(RecordError::InvalidJson("Expected JSON object".to_string())),
        };
        let key = fields
            .get(&schema.primary_key)
            .and_then(RecordKey::from_value)
            .ok_or_else(|| RecordError::MissingPrimaryKey(schema.primary_key.clone()))?;
        Ok(Self::new(schema.model.clone(), key, fields))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn key(&self) -> &RecordKey {
        &self.key
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Truthiness of a stored flag. Booleans may come back as `0/1` or
    /// `"0"/"1"` depending on the driver; missing and null read as false.
    pub fn get_bool(&self, field: &str) -> bool {
        match self.fields.get(field) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
            Some(Value::String(s)) => !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false")),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(Value::Object(o)) => !o.is_empty(),
            Some(Value::Null) | None => false,
        }
    }

    /// API representation: every column, password hashes stripped
    pub fn to_api_value(&self) -> Value {
        let mut out = self.fields.clone();
        out.remove("password");
        Value::Object(out)
    }
}
