//! Router assembly. `/health` is public; every other route sits behind the
//! bearer-session middleware and receives the shared [`services::AppServices`].

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::config::AppConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router from process configuration.
pub fn build_app(config: &AppConfig) -> Router {
    let services = Arc::new(services::AppServices::in_memory(config.engine.clone()));
    build_router(services, config.jwt_secret.as_bytes())
}

/// Router over already-built engines.
pub fn build_router(services: Arc<services::AppServices>, jwt_secret: &[u8]) -> Router {
    let auth_state = middleware::AuthState::hs256(jwt_secret);

    let protected = routes::router().layer(
        ServiceBuilder::new()
            .layer(axum::middleware::from_fn_with_state(
                auth_state,
                middleware::auth_middleware,
            ))
            .layer(Extension(services)),
    );

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
}
