use thiserror::Error;

use crate::database::StoreError;
use crate::filter::FilterError;
use crate::schema::SchemaError;

#[derive(Debug, Error)]
pub enum ProvenanceError {
    /// Unknown owner id or relationship name
    #[error("Not found: {0}")]
    NotFound(String),

    /// Filter or sort names a column the target does not expose
    #[error("Invalid argument: {0}")]
    InvalidArgument(#[from] FilterError),

    /// Relationship declarations that cannot form a two-hop relation
    #[error("Invalid relationship: {0}")]
    Relation(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
