use async_trait::async_trait;

use crate::database::StoreError;
use crate::filter::Row;
use crate::types::RecordKey;

use super::relation::RelationSpec;

/// An intermediate entity linked to the owner, with its display label
#[derive(Debug, Clone, PartialEq)]
pub struct Intermediate {
    pub key: RecordKey,
    pub label: String,
}

/// One (target, intermediate) pair from the second pivot
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub target: RecordKey,
    pub intermediate: RecordKey,
}

/// Read-only access to the tables a provenance query walks
#[async_trait]
pub trait RelationStore: Send + Sync {
    async fn owner_exists(&self, spec: &RelationSpec, owner: &RecordKey) -> Result<bool, StoreError>;

    /// Intermediates linked to `owner` through the first pivot
    async fn intermediates(&self, spec: &RelationSpec, owner: &RecordKey) -> Result<Vec<Intermediate>, StoreError>;

    /// Second-pivot rows for any of `intermediates`
    async fn target_links(&self, spec: &RelationSpec, intermediates: &[RecordKey]) -> Result<Vec<Link>, StoreError>;

    /// Full target rows for `targets`; unknown keys are skipped
    async fn targets(&self, spec: &RelationSpec, targets: &[RecordKey]) -> Result<Vec<Row>, StoreError>;
}
