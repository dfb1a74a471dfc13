use std::sync::Arc;

use crate::schema::{ModelSchema, RelationshipKind, SchemaLoader};

use super::error::ProvenanceError;

/// One pivot table hop: `near_column` points back, `far_column` forward
#[derive(Debug, Clone, PartialEq)]
pub struct PivotSpec {
    pub table: String,
    pub near_column: String,
    pub far_column: String,
}

/// Owner → intermediate → target, many-to-many at each hop
#[derive(Debug, Clone)]
pub struct RelationSpec {
    /// Relationship name on the owner, e.g. `permissions`
    pub name: String,
    pub owner_model: String,
    pub owner_table: String,
    pub owner_key: String,
    pub owner_pivot: PivotSpec,
    /// Intermediate model name; also the via column prefix
    pub intermediate_model: String,
    pub intermediate_table: String,
    pub intermediate_key: String,
    pub intermediate_label: String,
    pub target_pivot: PivotSpec,
    pub target: Arc<ModelSchema>,
}

impl RelationSpec {
    pub fn from_schemas(
        owner: &ModelSchema,
        relationship: &str,
        intermediate: &ModelSchema,
        target: Arc<ModelSchema>,
    ) -> Result<Self, ProvenanceError> {
        let rel = owner.relationship(relationship).ok_or_else(|| {
            ProvenanceError::NotFound(format!("Relationship '{}' not found on '{}'", relationship, owner.model))
        })?;
        let through = match (rel.kind, &rel.through) {
            (RelationshipKind::ManyToManyThrough, Some(t)) => t,
            _ => {
                return Err(ProvenanceError::Relation(format!(
                    "'{}.{}' is not a many_to_many_through relationship",
                    owner.model, rel.name
                )))
            }
        };

        if through.model != intermediate.model {
            return Err(ProvenanceError::Relation(format!(
                "'{}.{}' goes through '{}', got '{}'",
                owner.model, rel.name, through.model, intermediate.model
            )));
        }
        if rel.related_model != target.model {
            return Err(ProvenanceError::Relation(format!(
                "'{}.{}' targets '{}', got '{}'",
                owner.model, rel.name, rel.related_model, target.model
            )));
        }
        if intermediate.field(&through.label).is_none() {
            return Err(ProvenanceError::Relation(format!(
                "label column '{}' is not a field of '{}'",
                through.label, intermediate.model
            )));
        }

        Ok(Self {
            name: rel.name.clone(),
            owner_model: owner.model.clone(),
            owner_table: owner.table.clone(),
            owner_key: owner.primary_key.clone(),
            owner_pivot: PivotSpec {
                table: rel.pivot_table.clone(),
                near_column: rel.foreign_key.clone(),
                far_column: rel.related_key.clone(),
            },
            intermediate_model: intermediate.model.clone(),
            intermediate_table: intermediate.table.clone(),
            intermediate_key: intermediate.primary_key.clone(),
            intermediate_label: through.label.clone(),
            target_pivot: PivotSpec {
                table: through.pivot_table.clone(),
                near_column: through.foreign_key.clone(),
                far_column: through.related_key.clone(),
            },
            target,
        })
    }

    /// Load the three schemas involved in `owner_model.relationship`
    pub async fn resolve(
        loader: &dyn SchemaLoader,
        owner_model: &str,
        relationship: &str,
    ) -> Result<Self, ProvenanceError> {
        let owner = loader.get_schema(owner_model).await?;
        let rel = owner.relationship(relationship).ok_or_else(|| {
            ProvenanceError::NotFound(format!("Relationship '{}' not found on '{}'", relationship, owner_model))
        })?;
        let through = rel.through.as_ref().ok_or_else(|| {
            ProvenanceError::Relation(format!("'{}.{}' has no intermediate", owner_model, relationship))
        })?;
        let intermediate = loader.get_schema(&through.model).await?;
        let target = loader.get_schema(&rel.related_model).await?;
        Self::from_schemas(&owner, relationship, &intermediate, target)
    }

    /// Column carrying the via list in each result row, e.g. `roles_via`
    pub fn via_column(&self) -> String {
        format!("{}_via", self.intermediate_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FileSchemaLoader, StaticSchemaLoader};
    use serde_json::json;
    use std::path::PathBuf;

    fn loader() -> FileSchemaLoader {
        FileSchemaLoader::new(vec![PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("schema/crud6")], true)
    }

    #[tokio::test]
    async fn resolves_user_permissions_through_roles() {
        let spec = RelationSpec::resolve(&loader(), "users", "permissions").await.unwrap();
        assert_eq!(spec.owner_table, "users");
        assert_eq!(spec.owner_pivot.table, "role_users");
        assert_eq!(spec.owner_pivot.near_column, "user_id");
        assert_eq!(spec.target_pivot.table, "permission_roles");
        assert_eq!(spec.target_pivot.far_column, "permission_id");
        assert_eq!(spec.target.model, "permissions");
        assert_eq!(spec.via_column(), "roles_via");
    }

    #[tokio::test]
    async fn resolves_permission_users_through_roles() {
        let spec = RelationSpec::resolve(&loader(), "permissions", "users").await.unwrap();
        assert_eq!(spec.owner_pivot.table, "permission_roles");
        assert_eq!(spec.target_pivot.table, "role_users");
        assert_eq!(spec.target_pivot.far_column, "user_id");
        assert_eq!(spec.target.model, "users");
    }

    fn model(raw: serde_json::Value) -> ModelSchema {
        serde_json::from_value(raw).unwrap()
    }

    fn team_skills(label: &str) -> StaticSchemaLoader {
        StaticSchemaLoader::new()
            .with(model(json!({
                "model": "teams",
                "table": "teams",
                "primary_key": "team_id",
                "fields": { "team_id": { "type": "integer" } },
                "relationships": [{
                    "name": "skills",
                    "type": "many_to_many_through",
                    "related_model": "skills",
                    "pivot_table": "team_squads",
                    "foreign_key": "team_id",
                    "related_key": "squad_id",
                    "through": {
                        "model": "squads",
                        "pivot_table": "squad_skills",
                        "foreign_key": "squad_id",
                        "related_key": "skill_id",
                        "label": label
                    }
                }]
            })))
            .with(model(json!({
                "model": "squads",
                "table": "squads",
                "fields": { "id": { "type": "integer" }, "title": { "type": "string" } }
            })))
            .with(model(json!({
                "model": "skills",
                "table": "skills",
                "fields": { "id": { "type": "integer" } }
            })))
    }

    #[tokio::test]
    async fn label_column_comes_from_the_through_declaration() {
        let spec = RelationSpec::resolve(&team_skills("title"), "teams", "skills").await.unwrap();
        assert_eq!(spec.owner_key, "team_id");
        assert_eq!(spec.intermediate_label, "title");
        assert_eq!(spec.via_column(), "squads_via");

        let err = RelationSpec::resolve(&team_skills("nickname"), "teams", "skills").await.unwrap_err();
        assert!(matches!(err, ProvenanceError::Relation(_)));
    }

    #[tokio::test]
    async fn direct_relationships_are_rejected() {
        let err = RelationSpec::resolve(&loader(), "users", "roles").await.unwrap_err();
        assert!(matches!(err, ProvenanceError::Relation(_)));
        let err = RelationSpec::resolve(&loader(), "users", "gadgets").await.unwrap_err();
        assert!(matches!(err, ProvenanceError::NotFound(_)));
    }
}
