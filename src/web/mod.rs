pub mod analytics;
pub mod dashboard;
pub mod error;
pub mod updates;

use crate::state::SharedState;
use axum::{routing::get, Router};

async fn health() -> &'static str {
    "OK"
}

pub fn routes(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/analytics", analytics::router(state.clone()))
        .merge(dashboard::router(state.clone()))
        .merge(updates::router(state))
}
