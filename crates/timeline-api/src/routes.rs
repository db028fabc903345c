use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::auth;
use crate::middleware::require_auth;
use crate::photos;
use crate::state::AppState;

/// Build the full application router.
///
/// Auth routes and `/uploads` are public; everything else goes through
/// `require_auth`.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/health", get(health));

    let protected_routes = Router::new()
        .route("/user", get(auth::current_user))
        .route("/photos", get(photos::list_photos).post(photos::create_photo))
        .route("/photos/{id}", delete(photos::delete_photo))
        .route("/photos/{id}/like", post(photos::like_photo))
        .layer(DefaultBodyLimit::max(photos::MAX_BODY_SIZE))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state.clone())
        .nest_service("/uploads", ServeDir::new(state.uploads.dir()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// GET /health — liveness check (no auth).
async fn health() -> &'static str {
    "ok"
}
