use async_trait::async_trait;
use serde_json::Value;
use sqlx::Row as _;

use crate::database::manager::DatabaseManager;
use crate::database::postgres::{bind_key, key_predicate, log_sql, KeyList, PgStore};
use crate::database::StoreError;
use crate::filter::Row;
use crate::types::RecordKey;

use super::relation::RelationSpec;
use super::store::{Intermediate, Link, RelationStore};

fn q(name: &str) -> String {
    DatabaseManager::quote_identifier(name)
}

fn decode_key(value: Value, column: &str) -> Result<RecordKey, StoreError> {
    RecordKey::from_value(&value)
        .ok_or_else(|| StoreError::QueryError(format!("Column '{}' is not a usable key: {}", column, value)))
}

#[async_trait]
impl RelationStore for PgStore {
    async fn owner_exists(&self, spec: &RelationSpec, owner: &RecordKey) -> Result<bool, StoreError> {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE {}) AS found",
            q(&spec.owner_table),
            key_predicate(&q(&spec.owner_key), owner, 1)
        );
        log_sql(&sql);
        let row = bind_key(sqlx::query(&sql), owner).fetch_one(self.pool()).await?;
        Ok(row.try_get("found")?)
    }

    async fn intermediates(&self, spec: &RelationSpec, owner: &RecordKey) -> Result<Vec<Intermediate>, StoreError> {
        let sql = format!(
            "SELECT DISTINCT to_jsonb(i.{key}) AS key, i.{label}::text AS label \
             FROM {table} i JOIN {pivot} p ON p.{far} = i.{key} \
             WHERE {owner}",
            key = q(&spec.intermediate_key),
            label = q(&spec.intermediate_label),
            table = q(&spec.intermediate_table),
            pivot = q(&spec.owner_pivot.table),
            far = q(&spec.owner_pivot.far_column),
            owner = key_predicate(&format!("p.{}", q(&spec.owner_pivot.near_column)), owner, 1),
        );
        log_sql(&sql);
        let rows = bind_key(sqlx::query(&sql), owner).fetch_all(self.pool()).await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let key: Value = row.try_get("key")?;
            let label: Option<String> = row.try_get("label")?;
            out.push(Intermediate {
                key: decode_key(key, &spec.intermediate_key)?,
                label: label.unwrap_or_default(),
            });
        }
        Ok(out)
    }

    async fn target_links(&self, spec: &RelationSpec, intermediates: &[RecordKey]) -> Result<Vec<Link>, StoreError> {
        if intermediates.is_empty() {
            return Ok(Vec::new());
        }
        let keys = KeyList::from_keys(intermediates);
        let sql = format!(
            "SELECT to_jsonb(p.{far}) AS target, to_jsonb(p.{near}) AS intermediate FROM {pivot} p WHERE {pred}",
            far = q(&spec.target_pivot.far_column),
            near = q(&spec.target_pivot.near_column),
            pivot = q(&spec.target_pivot.table),
            pred = keys.any_predicate(&format!("p.{}", q(&spec.target_pivot.near_column)), 1),
        );
        log_sql(&sql);
        let rows = keys.bind(sqlx::query(&sql)).fetch_all(self.pool()).await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let target: Value = row.try_get("target")?;
            let intermediate: Value = row.try_get("intermediate")?;
            out.push(Link {
                target: decode_key(target, &spec.target_pivot.far_column)?,
                intermediate: decode_key(intermediate, &spec.target_pivot.near_column)?,
            });
        }
        Ok(out)
    }

    async fn targets(&self, spec: &RelationSpec, targets: &[RecordKey]) -> Result<Vec<Row>, StoreError> {
        if targets.is_empty() {
            return Ok(Vec::new());
        }
        let keys = KeyList::from_keys(targets);
        let sql = format!(
            "SELECT row_to_json(t) AS row FROM (SELECT * FROM {} WHERE {}) t",
            q(&spec.target.table),
            keys.any_predicate(&q(&spec.target.primary_key), 1),
        );
        log_sql(&sql);
        let rows = keys.bind(sqlx::query(&sql)).fetch_all(self.pool()).await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            match row.try_get::<Value, _>("row")? {
                Value::Object(map) => out.push(map),
                other => {
                    return Err(StoreError::QueryError(format!("Expected row object, got {}", other)));
                }
            }
        }
        Ok(out)
    }
}
