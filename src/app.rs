use axum::{extract::Extension, routing::get, Router};
use std::path::Path;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::backup::BackupService;
use crate::routes::backup::backup_router;
use crate::routes::users::users_router;
use crate::store::SharedStore;

/// Every API route with the store and backup service attached.
pub fn router(store: SharedStore, backups: Arc<BackupService>) -> Router {
    with_layers(api_routes(), store, backups)
}

/// API routes plus a built frontend served for every other path.
pub fn router_with_frontend(
    store: SharedStore,
    backups: Arc<BackupService>,
    dist: &Path,
) -> Router {
    let serve_dir = ServeDir::new(dist).not_found_service(ServeFile::new(dist.join("index.html")));
    with_layers(api_routes().fallback_service(serve_dir), store, backups)
}

fn api_routes() -> Router {
    Router::new()
        // Users CRUD
        .nest("/users", users_router())
        // Backup & restore
        .nest("/backup", backup_router())
        .route("/health", get(|| async { "ok" }))
}

// Layers go on last so the fallback is wrapped too
fn with_layers(app: Router, store: SharedStore, backups: Arc<BackupService>) -> Router {
    app.layer(Extension(store))
        .layer(Extension(backups))
        .layer(TraceLayer::new_for_http())
        // Add CORS for frontend
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
}
