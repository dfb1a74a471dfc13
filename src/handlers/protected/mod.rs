// handlers/protected - JWT authentication required
//
// Every handler receives the `Principal` injected by `jwt_auth_middleware`.

pub mod crud6;
pub mod permissions;
pub mod users;

use std::sync::Arc;

use crate::auth::{authorize, Principal};
use crate::database::Record;
use crate::error::ApiError;
use crate::filter::{ListQuery, Page};
use crate::handlers::AppState;
use crate::provenance::RelationSpec;
use crate::schema::ModelSchema;
use crate::types::RecordKey;

/// Load the schema for `model` and the record keyed by `id`
pub(crate) async fn load_record(
    state: &AppState,
    model: &str,
    id: &str,
) -> Result<(Arc<ModelSchema>, Record), ApiError> {
    let schema = state.schemas.get_schema(model).await?;
    let record = state.store.find(&schema, &RecordKey::parse(id)).await?;
    Ok((schema, record))
}

/// Run a provenance query for `model/id/relation` with Sprunje query params
pub(crate) async fn provenance_page(
    state: &AppState,
    principal: &Principal,
    model: &str,
    id: &str,
    relation: &str,
    params: &[(String, String)],
) -> Result<Page, ApiError> {
    let owner = state.schemas.get_schema(model).await?;
    if let Some(slug) = owner.permissions.read.as_deref() {
        if !authorize(state.authorizer.as_ref(), principal, slug).await? {
            tracing::warn!("{} denied '{}' reading {}", principal.user_name, slug, model);
            return Err(ApiError::forbidden(format!("Access denied: '{}' is required", slug)));
        }
    }

    let spec = RelationSpec::resolve(state.schemas.as_ref(), model, relation).await?;
    let query = ListQuery::from_params(params)?;
    Ok(state.engine.query(&RecordKey::parse(id), &spec, &query).await?)
}
