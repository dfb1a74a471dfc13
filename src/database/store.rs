use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::schema::{FieldSchema, FieldType, ModelSchema, RelationshipKind, RelationshipSchema};
use crate::types::RecordKey;

use super::record::{Record, RecordError};

/// Errors raised by the base single-record layer
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid value for '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl StoreError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A single-field write request handed to the base layer
#[derive(Debug, Clone, PartialEq)]
pub struct FieldWrite {
    pub field: String,
    pub value: Value,
    /// When set, the write only applies if the stored value still equals this
    pub expected: Option<Value>,
    /// System writes may touch readonly columns
    pub system: bool,
}

impl FieldWrite {
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            expected: None,
            system: false,
        }
    }

    pub fn expecting(mut self, current: impl Into<Value>) -> Self {
        self.expected = Some(current.into());
        self
    }

    pub fn system(mut self) -> Self {
        self.system = true;
        self
    }
}

/// Base single-record CRUD primitive the dispatcher delegates to
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find(&self, schema: &ModelSchema, key: &RecordKey) -> Result<Record, StoreError>;

    /// Persist one field and return the refreshed record
    async fn update_field(
        &self,
        schema: &ModelSchema,
        record: &Record,
        write: FieldWrite,
    ) -> Result<Record, StoreError>;

    /// Link `ids` to `record`; returns the number of new links
    async fn attach_related(
        &self,
        schema: &ModelSchema,
        record: &Record,
        relationship: &RelationshipSchema,
        ids: &[RecordKey],
    ) -> Result<usize, StoreError>;

    /// Unlink `ids` from `record`; returns the number of removed links
    async fn detach_related(
        &self,
        schema: &ModelSchema,
        record: &Record,
        relationship: &RelationshipSchema,
        ids: &[RecordKey],
    ) -> Result<usize, StoreError>;
}

/// Validation shared by every store: the field must exist, be writable,
/// and the value must fit the declared type.
pub fn validate_write<'a>(schema: &'a ModelSchema, write: &FieldWrite) -> Result<&'a FieldSchema, StoreError> {
    let field = schema.field(&write.field).ok_or_else(|| {
        StoreError::NotFound(format!("Field '{}' not found on model '{}'", write.field, schema.model))
    })?;

    if write.field == schema.primary_key {
        return Err(StoreError::validation(&write.field, "primary key cannot be updated"));
    }
    if field.readonly && !write.system {
        return Err(StoreError::validation(&write.field, "field is read-only"));
    }

    validate_value(&write.field, field, &write.value)?;
    Ok(field)
}

fn validate_value(name: &str, field: &FieldSchema, value: &Value) -> Result<(), StoreError> {
    if value.is_null() {
        return if field.nullable {
            Ok(())
        } else {
            Err(StoreError::validation(name, "value is required"))
        };
    }

    let ok = match field.field_type {
        FieldType::Boolean => value.is_boolean(),
        FieldType::Integer => value.is_i64() || value.is_u64(),
        FieldType::Decimal => value.is_number(),
        FieldType::String | FieldType::Text | FieldType::Password | FieldType::Date | FieldType::Datetime => {
            value.is_string()
        }
        FieldType::Email => value.as_str().map(|s| s.contains('@')).unwrap_or(false),
        FieldType::Json | FieldType::Other => true,
    };
    if !ok {
        return Err(StoreError::validation(
            name,
            format!("expected {:?}, got {}", field.field_type, value),
        ));
    }

    if field.required && value.as_str().map(|s| s.trim().is_empty()).unwrap_or(false) {
        return Err(StoreError::validation(name, "value is required"));
    }
    Ok(())
}

/// Only direct many-to-many relationships can be attached or detached
pub fn ensure_direct(relationship: &RelationshipSchema) -> Result<(), StoreError> {
    match relationship.kind {
        RelationshipKind::ManyToMany => Ok(()),
        RelationshipKind::ManyToManyThrough => Err(StoreError::validation(
            &relationship.name,
            "indirect relationships are read-only",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> ModelSchema {
        serde_json::from_value(json!({
            "model": "users",
            "table": "users",
            "primary_key": "id",
            "fields": {
                "id": { "type": "integer", "readonly": true },
                "user_name": { "type": "string", "required": true },
                "email": { "type": "email" },
                "flag_enabled": { "type": "boolean", "toggle": true },
                "password_last_set": { "type": "datetime", "readonly": true, "nullable": true }
            }
        }))
        .unwrap()
    }

    #[test]
    fn unknown_field_is_not_found() {
        let err = validate_write(&schema(), &FieldWrite::new("nope", true)).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn boolean_fields_reject_non_boolean_values() {
        assert!(validate_write(&schema(), &FieldWrite::new("flag_enabled", false)).is_ok());
        let err = validate_write(&schema(), &FieldWrite::new("flag_enabled", "maybe")).unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }));
        assert!(validate_write(&schema(), &FieldWrite::new("flag_enabled", 2)).is_err());
    }

    #[test]
    fn readonly_fields_need_system_writes() {
        assert!(validate_write(&schema(), &FieldWrite::new("password_last_set", Value::Null)).is_err());
        assert!(validate_write(&schema(), &FieldWrite::new("password_last_set", Value::Null).system()).is_ok());
        assert!(validate_write(&schema(), &FieldWrite::new("id", 3).system()).is_err());
    }

    #[test]
    fn required_strings_cannot_be_blank() {
        assert!(validate_write(&schema(), &FieldWrite::new("user_name", " ")).is_err());
        assert!(validate_write(&schema(), &FieldWrite::new("user_name", Value::Null)).is_err());
        assert!(validate_write(&schema(), &FieldWrite::new("email", "no-at-sign")).is_err());
    }
}
