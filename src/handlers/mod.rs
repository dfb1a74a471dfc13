// handlers/mod.rs - Route table and shared request state
//
// Public (no auth): /health
// Protected (JWT):  /api/crud6/*, /api/users/*, /api/permissions/*

pub mod protected;
pub mod public;

use axum::{
    middleware,
    routing::{get, post, put},
    Extension, Router,
};
use sqlx::PgPool;
use std::sync::Arc;

use crate::actions::ActionRegistry;
use crate::auth::Authorizer;
use crate::database::RecordStore;
use crate::dispatch::Dispatcher;
use crate::middleware::jwt_auth_middleware;
use crate::provenance::{ProvenanceEngine, RelationStore};
use crate::schema::SchemaLoader;

/// Collaborators shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub schemas: Arc<dyn SchemaLoader>,
    pub store: Arc<dyn RecordStore>,
    pub authorizer: Arc<dyn Authorizer>,
    pub dispatcher: Dispatcher,
    pub engine: Arc<ProvenanceEngine>,
    /// Present when backed by Postgres; used by /health
    pub pool: Option<PgPool>,
}

impl AppState {
    /// Wire every collaborator to one backing store
    pub fn new<S>(schemas: Arc<dyn SchemaLoader>, store: Arc<S>, actions: ActionRegistry) -> Self
    where
        S: RecordStore + RelationStore + Authorizer + 'static,
    {
        let records: Arc<dyn RecordStore> = store.clone();
        let authorizer: Arc<dyn Authorizer> = store.clone();
        let relations: Arc<dyn RelationStore> = store;
        Self {
            schemas,
            dispatcher: Dispatcher::new(records.clone(), authorizer.clone(), actions),
            engine: Arc::new(ProvenanceEngine::new(relations)),
            store: records,
            authorizer,
            pool: None,
        }
    }

    pub fn with_pool(mut self, pool: PgPool) -> Self {
        self.pool = Some(pool);
        self
    }
}

pub fn router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route(
            "/api/crud6/:model/:id/:name",
            put(protected::crud6::field_put)
                .post(protected::crud6::relation_post)
                .delete(protected::crud6::relation_delete),
        )
        .route("/api/crud6/:model/:id/:name/via", get(protected::crud6::via_get))
        .route("/api/crud6/:model/:id/a/:action", post(protected::crud6::action_post))
        .route("/api/users/:id/permissions", get(protected::users::permissions_get))
        .route("/api/users/:id/password-reset", post(protected::users::password_reset_post))
        .route("/api/permissions/:id/users", get(protected::permissions::users_get))
        .layer(middleware::from_fn(jwt_auth_middleware));

    Router::new()
        .route("/health", get(public::health::get))
        .merge(protected_routes)
        .layer(Extension(state))
}
