use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};

use super::{convert, download, handlers, middleware::metrics_middleware};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let static_dir = state.config().server.static_dir.clone();
    let max_upload = state.config().limits.max_upload_bytes as usize;

    // API routes
    let api_routes = Router::new()
        .route(
            "/convert",
            post(convert::convert).layer(DefaultBodyLimit::max(max_upload)),
        )
        .route("/download/{filename}", get(download::download))
        .route("/health", get(handlers::health))
        .route("/queue-status", get(handlers::queue_status))
        .route("/config", get(handlers::get_config))
        .route("/metrics", get(handlers::metrics))
        .with_state(state);

    // Serve the upload frontend with an index fallback
    let index_path = static_dir.join("index.html");
    let serve_dir = ServeDir::new(&static_dir).fallback(ServeFile::new(index_path));

    Router::new()
        .nest("/api", api_routes)
        .fallback_service(serve_dir)
        .layer(middleware::from_fn(metrics_middleware))
}
