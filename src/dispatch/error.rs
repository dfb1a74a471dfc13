use thiserror::Error;

use crate::database::StoreError;
use crate::schema::SchemaError;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Unknown action, relationship, or handler
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller lacks the declared permission
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Failure raised by the base store, passed through unchanged
    #[error(transparent)]
    Delegated(#[from] StoreError),

    /// A custom action handler failed on its own terms
    #[error("Action failed: {0}")]
    Handler(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}
