use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::database::FieldWrite;
use crate::dispatch::{DispatchError, DispatchOutcome};

use super::{ActionContext, ActionHandler};

pub const ACTION_KEY: &str = "reset-password";

/// Column whose null value forces a password change at next login
pub const PASSWORD_SET_COLUMN: &str = "password_last_set";

/// Expires a user's password so they must pick a new one on next login
pub struct PasswordResetHandler;

#[async_trait]
impl ActionHandler for PasswordResetHandler {
    async fn handle(&self, ctx: ActionContext<'_>) -> Result<DispatchOutcome, DispatchError> {
        if ctx.schema.field(PASSWORD_SET_COLUMN).is_none() {
            return Err(DispatchError::Handler(format!(
                "model '{}' has no '{}' column",
                ctx.schema.model, PASSWORD_SET_COLUMN
            )));
        }

        let write = FieldWrite::new(PASSWORD_SET_COLUMN, Value::Null).system();
        let record = ctx.store.update_field(ctx.schema, ctx.record, write).await?;

        let name = record
            .get("user_name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| record.key().to_string());
        info!("Password for {} {} expired", ctx.schema.model, record.key());

        Ok(DispatchOutcome::with_message(
            record,
            format!("Password for {} has been reset", name),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{MemoryStore, RecordStore};
    use crate::schema::ModelSchema;
    use crate::types::RecordKey;
    use serde_json::json;

    fn users() -> ModelSchema {
        serde_json::from_value(json!({
            "model": "users",
            "table": "users",
            "fields": {
                "id": { "type": "integer", "readonly": true },
                "user_name": { "type": "string" },
                "password_last_set": { "type": "datetime", "readonly": true, "nullable": true }
            },
            "actions": [{ "key": "reset-password", "type": "api_call", "permission": "update_user_field" }]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn clears_password_last_set() {
        let store = MemoryStore::new();
        store
            .insert("users", json!({ "id": 7, "user_name": "alex", "password_last_set": "2024-01-01T00:00:00Z" }))
            .await;
        let schema = users();
        let record = store.find(&schema, &RecordKey::Int(7)).await.unwrap();

        let outcome = PasswordResetHandler
            .handle(ActionContext {
                store: &store,
                schema: &schema,
                action: schema.action(ACTION_KEY).unwrap(),
                record: &record,
                payload: &json!({}),
            })
            .await
            .unwrap();

        assert_eq!(outcome.record.get(PASSWORD_SET_COLUMN), Some(&Value::Null));
        assert_eq!(outcome.message.as_deref(), Some("Password for alex has been reset"));
    }
}
