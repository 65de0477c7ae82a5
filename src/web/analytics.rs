use super::error::ApiError;
use crate::analytics::{build_report, RateReport, ReportKind};
use crate::domain::filters::{ReportParams, ReportQuery};
use crate::export::csv::{export_filename, render_csv};
use crate::services::markdown::{format_recommendation, FormattedRecommendation};
use crate::state::SharedState;
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Datelike;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct RecommendationsResponse {
    loading: bool,
    recommendations: Vec<String>,
    formatted: Vec<FormattedRecommendation>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/:kind", get(report))
        .route("/:kind/export", get(export))
        .route("/:kind/recommendations", get(recommendations))
        .with_state(state)
}

fn resolve(
    state: &SharedState,
    kind: &str,
    params: Result<Query<ReportParams>, QueryRejection>,
) -> Result<(ReportKind, ReportQuery), ApiError> {
    let kind: ReportKind = kind.parse()?;
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let query = ReportQuery::from_params(&params, state.settings.zone.today().year())?;
    Ok((kind, query))
}

fn slot_key(kind: ReportKind, query: &ReportQuery) -> String {
    format!("{}|{}", kind.slug(), query.cache_key())
}

async fn report(
    State(state): State<SharedState>,
    Path(kind): Path<String>,
    params: Result<Query<ReportParams>, QueryRejection>,
) -> Result<Json<RateReport>, ApiError> {
    let (kind, query) = resolve(&state, &kind, params)?;
    let report = build_report(state.source.as_ref(), kind, &query, &state.settings).await;
    // Narrative generation runs beside the response, never in front of it.
    state
        .slots
        .spawn(slot_key(kind, &query), state.narrator.clone(), report.clone())
        .await;
    Ok(Json(report))
}

async fn export(
    State(state): State<SharedState>,
    Path(kind): Path<String>,
    params: Result<Query<ReportParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let (kind, query) = resolve(&state, &kind, params)?;
    let report = build_report(state.source.as_ref(), kind, &query, &state.settings).await;
    let body = render_csv(&report).map_err(|e| {
        tracing::error!(error = %e, "Failed to render CSV");
        ApiError::Internal("failed to render export".to_string())
    })?;
    let filename = export_filename(kind, &query);
    tracing::info!(%filename, rows = report.buckets.len(), "Exported report");
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    ))
}

/// Polled by the dashboard. A filter nobody has reported on yet starts its
/// own job.
async fn recommendations(
    State(state): State<SharedState>,
    Path(kind): Path<String>,
    params: Result<Query<ReportParams>, QueryRejection>,
) -> Result<Json<RecommendationsResponse>, ApiError> {
    let (kind, query) = resolve(&state, &kind, params)?;
    let key = slot_key(kind, &query);
    let status = match state.slots.status(&key).await {
        Some(status) => status,
        None => {
            let report = build_report(state.source.as_ref(), kind, &query, &state.settings).await;
            state.slots.spawn(key.clone(), state.narrator.clone(), report).await;
            state.slots.status(&key).await.unwrap_or_default()
        }
    };
    let formatted = if status.loading {
        Vec::new()
    } else {
        status
            .recommendations
            .iter()
            .map(|r| format_recommendation(r))
            .collect()
    };
    Ok(Json(RecommendationsResponse {
        loading: status.loading,
        recommendations: status.recommendations,
        formatted,
    }))
}

#[cfg(test)]
mod tests {
    use crate::analytics::fixtures::{at, staff};
    use crate::analytics::ReportSettings;
    use crate::db::memory::{MemorySource, Tables};
    use crate::domain::models::AttendanceEvent;
    use crate::services::narrative::testing::ScriptedNarrator;
    use crate::services::narrative::PLACEHOLDER;
    use crate::state::AppState;
    use crate::web::routes;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(narrator: ScriptedNarrator) -> Router {
        let employees = staff("Sales", 10);
        let attendances = (0..22)
            .map(|i| AttendanceEvent {
                user_id: employees[i % 10].id,
                check_in: at(2024, 12, 2, 9),
            })
            .collect();
        let source = MemorySource::new(Tables {
            employees,
            attendances,
            ..Tables::default()
        });
        let state = AppState::new(Arc::new(source), Arc::new(narrator), ReportSettings::default());
        routes(Arc::new(state))
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>, Option<String>) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let disposition = resp
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .map(|v| v.to_str().unwrap().to_string());
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap().to_vec();
        (status, body, disposition)
    }

    #[tokio::test]
    async fn report_returns_json_buckets() {
        let (status, body, _) = get(
            app(ScriptedNarrator::replying(&[])),
            "/api/analytics/attendance?year=2024&month=Dec&department=Sales",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["kind"], "attendance");
        assert_eq!(json["buckets"].as_array().unwrap().len(), 22);
        assert_eq!(json["buckets"][0]["label"], "Dec 2");
        assert_eq!(json["buckets"][0]["rate"], 220.0);
        assert_eq!(json["summary"]["totalCount"], 22);
        assert!(json["summary"]["overallRate"].is_number());
        assert!(json["summary"].get("total_count").is_none());
    }

    #[tokio::test]
    async fn bad_filters_are_rejected_with_json() {
        let (status, body, _) = get(
            app(ScriptedNarrator::replying(&[])),
            "/api/analytics/attendance?year=2024&month=Smarch",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert!(json["error"].as_str().unwrap().contains("Smarch"));

        let (status, _, _) = get(app(ScriptedNarrator::replying(&[])), "/api/analytics/attendance?year=abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, _) = get(app(ScriptedNarrator::replying(&[])), "/api/analytics/payroll").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn export_sets_download_headers() {
        let (status, body, disposition) = get(
            app(ScriptedNarrator::replying(&[])),
            "/api/analytics/attendance/export?year=2024&department=Sales&month=Month",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            disposition.as_deref(),
            Some("attachment; filename=\"Attendance_Rate_Analytics_2024_Sales_All_Months.csv\"")
        );
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with("Period,Attendance Rate (%),Count,Maximum\n"));
        assert!(text.contains("\nDepartment,Employees,Count,"));
    }

    #[tokio::test]
    async fn recommendations_are_polled_until_ready() {
        let app = app(ScriptedNarrator::replying(&[
            "**Celebrate** Sales attendance: 1) share the numbers 2) thank the team",
        ]));
        let uri = "/api/analytics/recognition/recommendations?year=2024";

        let mut json = Value::Null;
        for _ in 0..50 {
            let (status, body, _) = get(app.clone(), uri).await;
            assert_eq!(status, StatusCode::OK);
            json = serde_json::from_slice(&body).unwrap();
            if json["loading"] == false {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(json["loading"], false);
        assert_eq!(json["recommendations"].as_array().unwrap().len(), 1);
        assert_eq!(json["formatted"][0]["steps"][1][0]["text"], "thank the team");
        assert_eq!(json["formatted"][0]["segments"][0]["bold"], true);
    }

    #[tokio::test]
    async fn failed_narrative_still_finishes() {
        let app = app(ScriptedNarrator::replying(&["short"]));
        let uri = "/api/analytics/engagement/recommendations?year=2024";
        let mut json = Value::Null;
        for _ in 0..50 {
            let (_, body, _) = get(app.clone(), uri).await;
            json = serde_json::from_slice(&body).unwrap();
            if json["loading"] == false {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(json["recommendations"][0], PLACEHOLDER);
    }
}
