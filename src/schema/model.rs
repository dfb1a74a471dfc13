use serde::{Deserialize, Serialize};
use serde_json::Value;
use indexmap::IndexMap;
use std::collections::{BTreeMap, HashSet};

use crate::filter::SortDirection;

use super::error::SchemaError;

/// Declarative description of one model, parsed from `<model>.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSchema {
    pub model: String,
    pub table: String,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: SchemaPermissions,
    /// Applied in declaration order
    #[serde(default)]
    pub default_sort: IndexMap<String, SortDirection>,
    pub fields: BTreeMap<String, FieldSchema>,
    #[serde(default)]
    pub actions: Vec<ActionSchema>,
    #[serde(default)]
    pub relationships: Vec<RelationshipSchema>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaPermissions {
    pub read: Option<String>,
    pub create: Option<String>,
    pub update: Option<String>,
    pub delete: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Text,
    Email,
    Integer,
    Decimal,
    Boolean,
    Date,
    Datetime,
    Password,
    Json,
    #[serde(other)]
    Other,
}

impl FieldType {
    /// Types whose list filters match by substring rather than equality
    pub fn is_textual(&self) -> bool {
        matches!(self, FieldType::String | FieldType::Text | FieldType::Email)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSchema {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub listable: bool,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default)]
    pub filterable: bool,
    #[serde(default)]
    pub toggle: bool,
    #[serde(default)]
    pub readonly: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub nullable: bool,
    /// Overrides `permissions.update` for single-field updates
    #[serde(default)]
    pub permission: Option<String>,
}

impl FieldSchema {
    /// Boolean fields flagged `toggle` flip when the request omits a value
    pub fn is_toggle(&self) -> bool {
        self.field_type == FieldType::Boolean && self.toggle
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSchema {
    pub key: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub permission: Option<String>,
    #[serde(default)]
    pub confirm: Option<String>,
    #[serde(flatten)]
    pub kind: ActionKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    /// Sets a single field, either by flipping it or by writing a fixed value
    FieldUpdate {
        field: String,
        #[serde(default)]
        toggle: bool,
        #[serde(default)]
        value: Option<Value>,
    },
    /// Routed to a handler registered under the action key
    ApiCall {
        #[serde(default = "default_action_method")]
        method: String,
    },
}

fn default_action_method() -> String {
    "POST".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    ManyToMany,
    ManyToManyThrough,
}

/// A many-to-many relation declared on the owning model.
///
/// `pivot_table` joins the owner (`foreign_key`) to the related or
/// intermediate entity (`related_key`). For `many_to_many_through` the
/// second hop is described by `through`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: RelationshipKind,
    pub related_model: String,
    pub pivot_table: String,
    pub foreign_key: String,
    pub related_key: String,
    #[serde(default)]
    pub through: Option<ThroughSchema>,
    #[serde(default)]
    pub permission: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThroughSchema {
    /// Model name of the intermediate entity
    pub model: String,
    pub pivot_table: String,
    /// Intermediate column in the second pivot
    pub foreign_key: String,
    /// Target column in the second pivot
    pub related_key: String,
    /// Intermediate column rendered into the via list
    #[serde(default = "default_label_column")]
    pub label: String,
}

fn default_primary_key() -> String {
    "id".to_string()
}

fn default_label_column() -> String {
    "name".to_string()
}

impl ModelSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.get(name)
    }

    pub fn action(&self, key: &str) -> Option<&ActionSchema> {
        self.actions.iter().find(|a| a.key == key)
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipSchema> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// Permission slug required to update `field`
    pub fn update_permission_for<'a>(&'a self, field: &'a FieldSchema) -> Option<&'a str> {
        field
            .permission
            .as_deref()
            .or(self.permissions.update.as_deref())
    }

    /// Structural checks applied on load and by `c6admin schema check`
    pub fn validate(&self) -> Result<(), SchemaError> {
        let fail = |msg: String| Err(SchemaError::invalid(&self.model, msg));

        if self.model.is_empty() {
            return fail("model name cannot be empty".to_string());
        }
        if !is_identifier(&self.table) {
            return fail(format!("invalid table name '{}'", self.table));
        }
        if self.fields.is_empty() {
            return fail("schema must declare at least one field".to_string());
        }
        if !self.fields.contains_key(&self.primary_key) {
            return fail(format!("primary key '{}' is not a declared field", self.primary_key));
        }

        for (name, field) in &self.fields {
            if !is_identifier(name) {
                return fail(format!("invalid field name '{}'", name));
            }
            if !field.listable && (field.sortable || field.filterable) {
                return fail(format!("field '{}' is sortable or filterable but not listable", name));
            }
            if field.toggle && field.field_type != FieldType::Boolean {
                return fail(format!("field '{}' is flagged toggle but is not boolean", name));
            }
        }

        for name in self.default_sort.keys() {
            match self.fields.get(name) {
                Some(f) if f.listable && f.sortable => {}
                Some(_) => return fail(format!("default sort field '{}' must be listable and sortable", name)),
                None => return fail(format!("default sort field '{}' does not exist", name)),
            }
        }

        let mut keys = HashSet::new();
        for action in &self.actions {
            if !keys.insert(action.key.as_str()) {
                return fail(format!("duplicate action key '{}'", action.key));
            }
            // Fields shadow actions by name, so the action would be unreachable
            if self.fields.contains_key(&action.key) {
                return fail(format!("action key '{}' collides with a field name", action.key));
            }
            if let ActionKind::FieldUpdate { field, toggle, value } = &action.kind {
                match self.fields.get(field) {
                    None => return fail(format!("action '{}' targets unknown field '{}'", action.key, field)),
                    Some(f) if *toggle && f.field_type != FieldType::Boolean => {
                        return fail(format!("action '{}' toggles non-boolean field '{}'", action.key, field))
                    }
                    Some(_) if !*toggle && value.is_none() => {
                        return fail(format!("action '{}' needs either toggle or value", action.key))
                    }
                    Some(_) => {}
                }
            }
        }

        for rel in &self.relationships {
            for ident in [&rel.pivot_table, &rel.foreign_key, &rel.related_key] {
                if !is_identifier(ident) {
                    return fail(format!("relationship '{}' has invalid identifier '{}'", rel.name, ident));
                }
            }
            match (rel.kind, &rel.through) {
                (RelationshipKind::ManyToManyThrough, None) => {
                    return fail(format!("relationship '{}' is many_to_many_through without 'through'", rel.name))
                }
                (RelationshipKind::ManyToManyThrough, Some(t)) => {
                    for ident in [&t.pivot_table, &t.foreign_key, &t.related_key, &t.label] {
                        if !is_identifier(ident) {
                            return fail(format!("relationship '{}' has invalid identifier '{}'", rel.name, ident));
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }
}

/// SQL-safe identifier: leading letter or underscore, then alphanumerics/underscores
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
