//! Many-to-many-through queries that explain *why* each target is reachable.
//!
//! Given an owner, an intermediate model and a target model, the engine
//! lists each distinct target once with the names of the intermediates
//! linking it to the owner, e.g. a user's permissions via roles.

pub mod engine;
pub mod error;
pub mod postgres;
pub mod relation;
pub mod store;

pub use engine::{group_links, ProvenanceEngine, ProvenanceRow};
pub use error::ProvenanceError;
pub use relation::{PivotSpec, RelationSpec};
pub use store::{Intermediate, Link, RelationStore};
