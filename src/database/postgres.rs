use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgArguments, PgPool, Postgres, Row};
use tracing::debug;

use crate::schema::{FieldType, ModelSchema, RelationshipSchema};
use crate::types::RecordKey;

use super::manager::DatabaseManager;
use super::record::Record;
use super::store::{ensure_direct, validate_write, FieldWrite, RecordStore, StoreError};

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

/// Postgres-backed implementation of the store traits
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Statement logging, gated by `database.enable_query_logging`
pub(crate) fn log_sql(sql: &str) {
    if crate::config::config().database.enable_query_logging {
        debug!(target: "sql", "{}", sql);
    }
}

/// Bind a record key with its natural Postgres type
pub(crate) fn bind_key<'q>(q: PgQuery<'q>, key: &RecordKey) -> PgQuery<'q> {
    match key {
        RecordKey::Int(i) => q.bind(*i),
        RecordKey::Str(s) => q.bind(s.clone()),
    }
}

/// `col = $n` for a single key. String keys compare as text so a non-numeric
/// path segment against an integer column matches nothing instead of failing.
pub(crate) fn key_predicate(column: &str, key: &RecordKey, param: usize) -> String {
    match key {
        RecordKey::Int(_) => format!("{} = ${}", column, param),
        RecordKey::Str(_) => format!("{}::text = ${}", column, param),
    }
}

/// Keys split by representation so they can be bound as a typed array
pub(crate) enum KeyList {
    Ints(Vec<i64>),
    Strs(Vec<String>),
}

impl KeyList {
    pub(crate) fn from_keys(keys: &[RecordKey]) -> Self {
        let ints: Option<Vec<i64>> = keys
            .iter()
            .map(|k| match k {
                RecordKey::Int(i) => Some(*i),
                RecordKey::Str(_) => None,
            })
            .collect();
        match ints {
            Some(ints) => KeyList::Ints(ints),
            None => KeyList::Strs(keys.iter().map(|k| k.to_string()).collect()),
        }
    }

    /// `col = ANY($n)` predicate matching the bound array type
    pub(crate) fn any_predicate(&self, column: &str, param: usize) -> String {
        match self {
            KeyList::Ints(_) => format!("{} = ANY(${})", column, param),
            KeyList::Strs(_) => format!("{}::text = ANY(${})", column, param),
        }
    }

    pub(crate) fn bind<'q>(self, q: PgQuery<'q>) -> PgQuery<'q> {
        match self {
            KeyList::Ints(v) => q.bind(v),
            KeyList::Strs(v) => q.bind(v),
        }
    }
}

/// Render a JSON value as the text literal Postgres will CAST
fn text_param(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn pg_cast(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Boolean => "boolean",
        FieldType::Integer => "bigint",
        FieldType::Decimal => "numeric",
        FieldType::Date => "date",
        FieldType::Datetime => "timestamptz",
        FieldType::Json => "jsonb",
        _ => "text",
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn find(&self, schema: &ModelSchema, key: &RecordKey) -> Result<Record, StoreError> {
        let sql = format!(
            "SELECT row_to_json(t) AS row FROM (SELECT * FROM {} WHERE {}) t",
            DatabaseManager::quote_identifier(&schema.table),
            key_predicate(&DatabaseManager::quote_identifier(&schema.primary_key), key, 1),
        );
        log_sql(&sql);
        let row = bind_key(sqlx::query(&sql), key)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("{} {} not found", schema.model, key)))?;
        let value: Value = row.try_get("row")?;
        Ok(Record::from_row(schema, value)?)
    }

    async fn update_field(
        &self,
        schema: &ModelSchema,
        record: &Record,
        write: FieldWrite,
    ) -> Result<Record, StoreError> {
        let field = validate_write(schema, &write)?;
        let cast = pg_cast(field.field_type);
        let column = DatabaseManager::quote_identifier(&write.field);

        let mut sql = format!(
            "UPDATE {} AS t SET {} = CAST($1 AS {}) WHERE {}",
            DatabaseManager::quote_identifier(&schema.table),
            column,
            cast,
            key_predicate(&DatabaseManager::quote_identifier(&schema.primary_key), record.key(), 2),
        );
        if write.expected.is_some() {
            sql.push_str(&format!(" AND {} IS NOT DISTINCT FROM CAST($3 AS {})", column, cast));
        }
        sql.push_str(" RETURNING row_to_json(t) AS row");

        let mut q = sqlx::query(&sql).bind(text_param(&write.value));
        q = bind_key(q, record.key());
        if let Some(expected) = &write.expected {
            q = q.bind(text_param(expected));
        }

        log_sql(&sql);
        match q.fetch_optional(&self.pool).await? {
            Some(row) => {
                let value: Value = row.try_get("row")?;
                Ok(Record::from_row(schema, value)?)
            }
            None if write.expected.is_some() => {
                // Distinguish a lost compare-and-swap from a vanished row
                self.find(schema, record.key()).await?;
                Err(StoreError::Conflict(format!(
                    "{} {} was modified concurrently",
                    record.model(),
                    record.key()
                )))
            }
            None => Err(StoreError::NotFound(format!("{} {} not found", schema.model, record.key()))),
        }
    }

    async fn attach_related(
        &self,
        _schema: &ModelSchema,
        record: &Record,
        relationship: &RelationshipSchema,
        ids: &[RecordKey],
    ) -> Result<usize, StoreError> {
        ensure_direct(relationship)?;
        let pivot = DatabaseManager::quote_identifier(&relationship.pivot_table);
        let fk = DatabaseManager::quote_identifier(&relationship.foreign_key);
        let rk = DatabaseManager::quote_identifier(&relationship.related_key);
        let owner = key_predicate(&fk, record.key(), 1);

        let mut tx = self.pool.begin().await?;
        let mut attached = 0;
        for id in ids {
            let sql = format!(
                "INSERT INTO {pivot} ({fk}, {rk}) SELECT $1, $2 \
                 WHERE NOT EXISTS (SELECT 1 FROM {pivot} WHERE {owner} AND {related})",
                related = key_predicate(&rk, id, 2),
            );
            log_sql(&sql);
            let q = bind_key(bind_key(sqlx::query(&sql), record.key()), id);
            attached += q.execute(&mut *tx).await?.rows_affected() as usize;
        }
        tx.commit().await?;
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
        if ids.is_empty() {
            return Ok(0);
        }
        let keys = KeyList::from_keys(ids);
        let sql = format!(
            "DELETE FROM {} WHERE {} AND {}",
            DatabaseManager::quote_identifier(&relationship.pivot_table),
            key_predicate(&DatabaseManager::quote_identifier(&relationship.foreign_key), record.key(), 1),
            keys.any_predicate(&DatabaseManager::quote_identifier(&relationship.related_key), 2),
        );
        log_sql(&sql);
        let q = keys.bind(bind_key(sqlx::query(&sql), record.key()));
        Ok(q.execute(&self.pool).await?.rows_affected() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_params_render_scalars() {
        assert_eq!(text_param(&json!(true)), Some("true".to_string()));
        assert_eq!(text_param(&json!(12)), Some("12".to_string()));
        assert_eq!(text_param(&json!("x")), Some("x".to_string()));
        assert_eq!(text_param(&Value::Null), None);
    }

    #[test]
    fn string_keys_compare_as_text() {
        assert_eq!(key_predicate("\"id\"", &RecordKey::Int(7), 1), "\"id\" = $1");
        assert_eq!(key_predicate("\"id\"", &RecordKey::parse("abc"), 2), "\"id\"::text = $2");
    }

    #[test]
    fn key_lists_pick_array_type() {
        let ints = KeyList::from_keys(&[RecordKey::Int(1), RecordKey::Int(2)]);
        assert_eq!(ints.any_predicate("\"role_id\"", 2), "\"role_id\" = ANY($2)");
        let mixed = KeyList::from_keys(&[RecordKey::Int(1), RecordKey::Str("a".into())]);
        assert!(matches!(&mixed, KeyList::Strs(v) if v == &vec!["1".to_string(), "a".to_string()]));
        assert_eq!(mixed.any_predicate("\"role_id\"", 1), "\"role_id\"::text = ANY($1)");
    }
}
