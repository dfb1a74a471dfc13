use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

use crate::auth::{Authorizer, Principal};
use crate::filter::filter_where::render;
use crate::filter::Row;
use crate::provenance::{Intermediate, Link, RelationSpec, RelationStore};
use crate::schema::{ModelSchema, RelationshipSchema};
use crate::types::RecordKey;

use super::record::Record;
use super::store::{ensure_direct, validate_write, FieldWrite, RecordStore, StoreError};

/// In-process tables with the same semantics as the Postgres store.
/// Used by tests and `serve --memory`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Row>>>,
}

fn key_of(row: &Row, column: &str) -> Option<RecordKey> {
    row.get(column).and_then(RecordKey::from_value)
}

fn has_key(row: &Row, column: &str, key: &RecordKey) -> bool {
    key_of(row, column).as_ref() == Some(key)
}

fn table<'a>(tables: &'a HashMap<String, Vec<Row>>, name: &str) -> &'a [Row] {
    tables.get(name).map(Vec::as_slice).unwrap_or_default()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row; non-object values are ignored
    pub async fn insert(&self, table: &str, row: Value) {
        if let Value::Object(map) = row {
            self.tables.write().await.entry(table.to_string()).or_default().push(map);
        }
    }

    /// Load `{ "table": [rows...] }`; returns the number of rows inserted
    pub async fn seed(&self, fixtures: Value) -> usize {
        let Value::Object(tables) = fixtures else {
            return 0;
        };
        let mut inserted = 0;
        for (table, rows) in tables {
            if let Value::Array(rows) = rows {
                for row in rows {
                    if row.is_object() {
                        self.insert(&table, row).await;
                        inserted += 1;
                    }
                }
            }
        }
        inserted
    }

    pub async fn rows(&self, table: &str) -> Vec<Row> {
        self.tables.read().await.get(table).cloned().unwrap_or_default()
    }

    pub async fn get(&self, table: &str, column: &str, key: &RecordKey) -> Option<Row> {
        let tables = self.tables.read().await;
        tables.get(table)?.iter().find(|r| has_key(r, column, key)).cloned()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find(&self, schema: &ModelSchema, key: &RecordKey) -> Result<Record, StoreError> {
        let row = self
            .get(&schema.table, &schema.primary_key, key)
            .await
            .ok_or_else(|| StoreError::NotFound(format!("{} {} not found", schema.model, key)))?;
        Ok(Record::from_row(schema, Value::Object(row))?)
    }

    async fn update_field(
        &self,
        schema: &ModelSchema,
        record: &Record,
        write: FieldWrite,
    ) -> Result<Record, StoreError> {
        validate_write(schema, &write)?;

        let mut tables = self.tables.write().await;
        let row = tables
            .get_mut(&schema.table)
            .and_then(|rows| rows.iter_mut().find(|r| has_key(r, &schema.primary_key, record.key())))
            .ok_or_else(|| StoreError::NotFound(format!("{} {} not found", schema.model, record.key())))?;

        if let Some(expected) = &write.expected {
            let current = row.get(&write.field).unwrap_or(&Value::Null);
            if current != expected {
                return Err(StoreError::Conflict(format!(
                    "{} {} was modified concurrently",
                    record.model(),
                    record.key()
                )));
            }
        }

        row.insert(write.field, write.value);
        Ok(Record::from_row(schema, Value::Object(row.clone()))?)
    }

    async fn attach_related(
        &self,
        _schema: &ModelSchema,
        record: &Record,
        relationship: &RelationshipSchema,
        ids: &[RecordKey],
    ) -> Result<usize, StoreError> {
        ensure_direct(relationship)?;
        let mut tables = self.tables.write().await;
        let pivot = tables.entry(relationship.pivot_table.clone()).or_default();

        let mut attached = 0;
        for id in ids {
            let exists = pivot.iter().any(|r| {
                has_key(r, &relationship.foreign_key, record.key()) && has_key(r, &relationship.related_key, id)
            });
            if !exists {
                let mut row = Row::new();
                row.insert(relationship.foreign_key.clone(), record.key().to_value());
                row.insert(relationship.related_key.clone(), id.to_value());
                pivot.push(row);
                attached += 1;
            }
        }
        Ok(attached)
    }

    async fn detach_related(
        &self,
        _schema: &ModelSchema,
        record: &Record,
        relationship: &RelationshipSchema,
        ids: &[RecordKey],
    ) -> Result<usize, StoreError> {
        ensure_direct(relationship)?;
        let mut tables = self.tables.write().await;
        let Some(pivot) = tables.get_mut(&relationship.pivot_table) else {
            return Ok(0);
        };

        let before = pivot.len();
        pivot.retain(|r| {
            !(has_key(r, &relationship.foreign_key, record.key())
                && key_of(r, &relationship.related_key).map(|k| ids.contains(&k)).unwrap_or(false))
        });
        Ok(before - pivot.len())
    }
}

#[async_trait]
impl RelationStore for MemoryStore {
    async fn owner_exists(&self, spec: &RelationSpec, owner: &RecordKey) -> Result<bool, StoreError> {
        Ok(self.get(&spec.owner_table, &spec.owner_key, owner).await.is_some())
    }

    async fn intermediates(&self, spec: &RelationSpec, owner: &RecordKey) -> Result<Vec<Intermediate>, StoreError> {
        let tables = self.tables.read().await;
        let linked: HashSet<RecordKey> = tables
            .get(&spec.owner_pivot.table)
            .into_iter()
            .flatten()
            .filter(|r| has_key(r, &spec.owner_pivot.near_column, owner))
            .filter_map(|r| key_of(r, &spec.owner_pivot.far_column))
            .collect();

        Ok(tables
            .get(&spec.intermediate_table)
            .into_iter()
            .flatten()
            .filter_map(|r| {
                let key = key_of(r, &spec.intermediate_key)?;
                linked.contains(&key).then(|| Intermediate {
                    label: r.get(&spec.intermediate_label).map(render).unwrap_or_default(),
                    key,
                })
            })
            .collect())
    }

    async fn target_links(&self, spec: &RelationSpec, intermediates: &[RecordKey]) -> Result<Vec<Link>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(&spec.target_pivot.table)
            .into_iter()
            .flatten()
            .filter_map(|r| {
                let intermediate = key_of(r, &spec.target_pivot.near_column)?;
                if !intermediates.contains(&intermediate) {
                    return None;
                }
                let target = key_of(r, &spec.target_pivot.far_column)?;
                Some(Link { target, intermediate })
            })
            .collect())
    }

    async fn targets(&self, spec: &RelationSpec, targets: &[RecordKey]) -> Result<Vec<Row>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(&spec.target.table)
            .into_iter()
            .flatten()
            .filter(|r| key_of(r, &spec.target.primary_key).map(|k| targets.contains(&k)).unwrap_or(false))
            .cloned()
            .collect())
    }
}

/// Same role-based lookup as the Postgres authorizer
#[async_trait]
impl Authorizer for MemoryStore {
    async fn check_access(&self, principal: &Principal, permission: &str) -> Result<bool, StoreError> {
        let tables = self.tables.read().await;
        let roles: HashSet<RecordKey> = table(&tables, "role_users")
            .iter()
            .filter(|r| has_key(r, "user_id", &principal.user_id))
            .filter_map(|r| key_of(r, "role_id"))
            .collect();
        let permission_ids: HashSet<RecordKey> = table(&tables, "permission_roles")
            .iter()
            .filter(|r| key_of(r, "role_id").map(|k| roles.contains(&k)).unwrap_or(false))
            .filter_map(|r| key_of(r, "permission_id"))
            .collect();

        Ok(table(&tables, "permissions").iter().any(|r| {
            r.get("slug").and_then(Value::as_str) == Some(permission)
                && key_of(r, "id").map(|k| permission_ids.contains(&k)).unwrap_or(false)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn users() -> ModelSchema {
        serde_json::from_value(json!({
            "model": "users",
            "table": "users",
            "fields": {
                "id": { "type": "integer", "readonly": true },
                "flag_enabled": { "type": "boolean", "toggle": true }
            },
            "relationships": [{
                "name": "roles",
                "type": "many_to_many",
                "related_model": "roles",
                "pivot_table": "role_users",
                "foreign_key": "user_id",
                "related_key": "role_id"
            }]
        }))
        .unwrap()
    }

    async fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert("users", json!({ "id": 1, "flag_enabled": true })).await;
        store
    }

    #[tokio::test]
    async fn compare_and_swap_rejects_stale_expectation() {
        let store = store().await;
        let schema = users();
        let record = store.find(&schema, &RecordKey::Int(1)).await.unwrap();

        let write = FieldWrite::new("flag_enabled", false).expecting(true);
        let updated = store.update_field(&schema, &record, write.clone()).await.unwrap();
        assert_eq!(updated.get("flag_enabled"), Some(&json!(false)));

        let err = store.update_field(&schema, &record, write).await.unwrap_err();
        assert!(matches!(&err, StoreError::Conflict(msg) if msg.contains("users 1")), "{:?}", err);
    }

    #[tokio::test]
    async fn attach_is_idempotent_and_detach_counts() {
        let store = store().await;
        let schema = users();
        let record = store.find(&schema, &RecordKey::Int(1)).await.unwrap();
        let roles = schema.relationship("roles").unwrap();
        let ids = [RecordKey::Int(1), RecordKey::Int(2)];

        assert_eq!(store.attach_related(&schema, &record, roles, &ids).await.unwrap(), 2);
        assert_eq!(store.attach_related(&schema, &record, roles, &ids).await.unwrap(), 0);
        assert_eq!(store.detach_related(&schema, &record, roles, &ids[..1]).await.unwrap(), 1);
        assert_eq!(store.rows("role_users").await.len(), 1);
    }

    #[tokio::test]
    async fn authorizer_walks_roles_to_permission_slugs() {
        let store = MemoryStore::new();
        store.insert("role_users", json!({ "user_id": 2, "role_id": 10 })).await;
        store.insert("permission_roles", json!({ "role_id": 10, "permission_id": 100 })).await;
        store.insert("permissions", json!({ "id": 100, "slug": "update_user_field" })).await;

        let alex = Principal::new(2, "alex");
        assert!(store.check_access(&alex, "update_user_field").await.unwrap());
        assert!(!store.check_access(&alex, "delete_user").await.unwrap());
        assert!(!store.check_access(&Principal::new(3, "sam"), "update_user_field").await.unwrap());
    }
}
