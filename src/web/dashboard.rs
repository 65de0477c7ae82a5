use super::error::ApiError;
use crate::analytics::dashboard::{summarize, DashboardSummary};
use crate::domain::filters::FilterError;
use crate::state::SharedState;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use chrono::Datelike;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct DashboardQuery {
    year: Option<i32>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/dashboard", get(dashboard))
        .with_state(state)
}

async fn dashboard(
    State(state): State<SharedState>,
    query: Result<Query<DashboardQuery>, QueryRejection>,
) -> Result<Json<DashboardSummary>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let year = query
        .year
        .unwrap_or_else(|| state.settings.zone.today().year());
    if !(1970..=9999).contains(&year) {
        return Err(FilterError::Year(year).into());
    }
    Ok(Json(
        summarize(state.source.as_ref(), year, &state.settings).await,
    ))
}
