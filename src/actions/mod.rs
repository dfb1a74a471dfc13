//! Handlers for schema-declared `api_call` actions

pub mod password_reset;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::database::{Record, RecordStore};
use crate::dispatch::{DispatchError, DispatchOutcome};
use crate::schema::{ActionSchema, ModelSchema};

pub use password_reset::PasswordResetHandler;

/// Everything a handler may read while running an action
pub struct ActionContext<'a> {
    pub store: &'a dyn RecordStore,
    pub schema: &'a ModelSchema,
    pub action: &'a ActionSchema,
    pub record: &'a Record,
    pub payload: &'a Value,
}

/// A custom action. Handlers persist only through `ctx.store`.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(&self, ctx: ActionContext<'_>) -> Result<DispatchOutcome, DispatchError>;
}

/// Action key → handler
#[derive(Clone, Default)]
pub struct ActionRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in handlers
    pub fn with_defaults() -> Self {
        Self::new().register(password_reset::ACTION_KEY, Arc::new(PasswordResetHandler))
    }

    pub fn register(mut self, key: impl Into<String>, handler: Arc<dyn ActionHandler>) -> Self {
        self.handlers.insert(key.into(), handler);
        self
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry").field("keys", &self.keys()).finish()
    }
}
