//! HTTP route handlers.

pub mod collection;
pub mod health;
pub mod metrics;

use axum::Router;

use crate::state::AppState;

/// Build the application router with every kernel route.
///
/// Transport layers (CORS, tracing) are added by the caller.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(metrics::router())
        .merge(collection::router(state.base_path()))
        .with_state(state)
}
