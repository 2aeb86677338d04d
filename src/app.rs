use std::path::Path;
use std::sync::Arc;

use axum::routing::post;
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::db::store::DocumentStore;

/// Shared application state: the dependency-injected storage gateway.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
}

/// Build the Axum router for the service.
///
/// When `static_dir` is given, unmatched paths are served from it as static
/// assets.
pub fn router(state: AppState, static_dir: Option<&Path>) -> Router {
    let mut app = Router::new()
        .route("/save", post(api::save::save_handler))
        .route("/load", post(api::load::load_handler));

    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}
