pub mod error;
pub mod loader;
pub mod model;

pub use error::SchemaError;
pub use loader::{FileSchemaLoader, SchemaLoader, StaticSchemaLoader};
pub use model::{
    ActionKind, ActionSchema, FieldSchema, FieldType, ModelSchema, RelationshipKind,
    RelationshipSchema, SchemaPermissions, ThroughSchema,
};
