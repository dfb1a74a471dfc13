use anyhow::Context;
use axum::http::HeaderValue;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::actions::ActionRegistry;
use crate::config;
use crate::database::{DatabaseManager, MemoryStore, PgStore};
use crate::handlers::{self, AppState};
use crate::schema::{FileSchemaLoader, SchemaLoader};

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(long, help = "Port to listen on (defaults to $PORT, then 3000)")]
    pub port: Option<u16>,

    #[arg(long, help = "Use in-process tables instead of Postgres")]
    pub memory: bool,

    #[arg(long, requires = "memory", help = "JSON file of {table: [rows]} to preload")]
    pub seed: Option<PathBuf>,
}

pub async fn handle(args: ServeArgs) -> anyhow::Result<()> {
    let cfg = config::config();
    info!("Starting c6admin in {:?} mode", cfg.environment);
    if cfg.security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set outside development");
    }
    if crate::is_development!() {
        warn!("Running in development mode");
    }

    let schemas: Arc<dyn SchemaLoader> = Arc::new(FileSchemaLoader::from_config());
    let actions = ActionRegistry::with_defaults();

    let state = if args.memory {
        let store = Arc::new(MemoryStore::new());
        if let Some(path) = &args.seed {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading seed file {}", path.display()))?;
            let fixtures = serde_json::from_str(&raw).context("parsing seed file")?;
            let rows = store.seed(fixtures).await;
            info!("Seeded {} rows from {}", rows, path.display());
        }
        warn!("Serving from in-memory tables; changes are lost on exit");
        AppState::new(schemas, store, actions)
    } else {
        let pool = DatabaseManager::connect().await.context("connecting to Postgres")?;
        AppState::new(schemas, Arc::new(PgStore::new(pool.clone())), actions).with_pool(pool)
    };

    let app = handlers::router(state)
        .layer(cors_layer(&cfg.security.cors_origins))
        .layer(TraceLayer::new_for_http());

    let port = args
        .port
        .or_else(|| std::env::var("PORT").ok().and_then(|s| s.parse().ok()))
        .unwrap_or(3000);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!("c6admin listening on http://{}", bind_addr);
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

/// `*` allows any origin; otherwise only the listed ones
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", o);
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
