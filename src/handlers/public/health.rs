use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::database::DatabaseManager;
use crate::handlers::AppState;

/// GET /health - Liveness plus database reachability
pub async fn get(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    let database = match &state.pool {
        None => "memory",
        Some(pool) => match DatabaseManager::health_check(pool).await {
            Ok(()) => "ok",
            Err(e) => {
                tracing::error!("Health check failed: {}", e);
                return (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({
                        "success": false,
                        "error": "Database unreachable",
                        "data": { "status": "degraded", "timestamp": now }
                    })),
                );
            }
        },
    };

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "data": {
                "status": "ok",
                "timestamp": now,
                "database": database,
                "version": env!("CARGO_PKG_VERSION")
            }
        })),
    )
}
