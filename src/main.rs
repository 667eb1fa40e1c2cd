mod config;
mod db;
mod error;
mod handlers;
mod metrics;
mod middleware;
mod models;
mod services;
mod storage;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::Database;
use crate::services::ReconcileWorker;
use crate::storage::StorageManager;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub storage: Arc<StorageManager>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stratus=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Stratus...");

    // Load configuration
    let config = Config::load()?;
    let config = Arc::new(config);
    tracing::info!("Configuration loaded");

    // Initialize database
    let db = Database::new(&config.database.path).await?;
    db.run_migrations().await?;
    tracing::info!("Database initialized");

    // Initialize storage backends
    let storage = Arc::new(StorageManager::from_config(&config.storage)?);

    // Create app state
    let state = AppState {
        db: db.clone(),
        config: config.clone(),
        storage: storage.clone(),
    };

    // Background sweep for orphaned uploads and expired soft-deletes
    ReconcileWorker::new(db, storage, &config.reconcile).spawn();

    // Build router
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        // Auth
        .route("/auth/me", get(handlers::auth::me))
        // Workspaces
        .route(
            "/workspaces",
            get(handlers::workspace::list_workspaces).post(handlers::workspace::create_workspace),
        )
        .route(
            "/workspaces/:id",
            get(handlers::workspace::get_workspace)
                .patch(handlers::workspace::update_workspace)
                .delete(handlers::workspace::delete_workspace),
        )
        .route(
            "/workspaces/:id/members",
            get(handlers::workspace::list_members),
        )
        .route(
            "/workspaces/:id/members/:user_id",
            put(handlers::workspace::upsert_member).delete(handlers::workspace::remove_member),
        )
        // Files
        .route(
            "/workspaces/:id/files",
            get(handlers::file::list_files).post(handlers::file::upload_file),
        )
        .route(
            "/workspaces/:id/files/:file_id",
            get(handlers::file::get_file).delete(handlers::file::delete_file),
        )
        .route(
            "/workspaces/:id/files/:file_id/content",
            get(handlers::file::download_file),
        )
        .route(
            "/workspaces/:id/files/:file_id/url",
            get(handlers::file::get_download_url),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    // Health and metrics stay outside /api/v1
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/health/detailed", get(handlers::health::health_detailed))
        .route("/metrics", get(handlers::health::metrics_export))
        .nest("/api/v1", public_routes.merge(protected_routes))
        .layer(DefaultBodyLimit::max(state.config.server.max_upload_bytes))
        .layer(axum::middleware::from_fn(metrics::track_http))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
