use super::error::ApiError;
use crate::domain::models::{ApprovalStatus, SurveyStatus};
use crate::state::SharedState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::patch,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct StatusPayload {
    status: String,
}

#[derive(Debug, Serialize)]
struct StatusUpdated {
    id: Uuid,
    status: String,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/leaves/:id", patch(update_leave))
        .route("/api/recognitions/:id", patch(update_recognition))
        .route("/api/surveys/:id", patch(update_survey))
        .with_state(state)
}

fn payload(body: Result<Json<StatusPayload>, JsonRejection>) -> Result<String, ApiError> {
    body.map(|Json(p)| p.status)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

fn not_found(table: &str, id: Uuid) -> ApiError {
    ApiError::NotFound(format!("no {table} row with id {id}"))
}

async fn update_leave(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    body: Result<Json<StatusPayload>, JsonRejection>,
) -> Result<Json<StatusUpdated>, ApiError> {
    let to: ApprovalStatus = payload(body)?.parse()?;
    let current = state
        .source
        .leave(id)
        .await?
        .ok_or_else(|| not_found("leaves", id))?;
    let next = current.status.transition(to)?;
    state.source.set_leave_status(id, current.status, next).await?;
    tracing::info!(%id, from = %current.status, to = %next, "Leave status updated");
    Ok(Json(StatusUpdated {
        id,
        status: next.to_string(),
    }))
}

async fn update_recognition(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    body: Result<Json<StatusPayload>, JsonRejection>,
) -> Result<Json<StatusUpdated>, ApiError> {
    let to: ApprovalStatus = payload(body)?.parse()?;
    let current = state
        .source
        .recognition(id)
        .await?
        .ok_or_else(|| not_found("recognitions", id))?;
    let next = current.status.transition(to)?;
    state.source.set_recognition_status(id, current.status, next).await?;
    tracing::info!(%id, from = %current.status, to = %next, "Recognition status updated");
    Ok(Json(StatusUpdated {
        id,
        status: next.to_string(),
    }))
}

async fn update_survey(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    body: Result<Json<StatusPayload>, JsonRejection>,
) -> Result<Json<StatusUpdated>, ApiError> {
    let to: SurveyStatus = payload(body)?.parse()?;
    let current = state
        .source
        .survey(id)
        .await?
        .ok_or_else(|| not_found("surveys", id))?;
    let next = current.status.transition(to)?;
    state.source.set_survey_status(id, current.status, next).await?;
    tracing::info!(%id, from = %current.status, to = %next, "Survey status updated");
    Ok(Json(StatusUpdated {
        id,
        status: next.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use crate::analytics::fixtures::at;
    use crate::analytics::ReportSettings;
    use crate::db::memory::{MemorySource, Tables};
    use crate::domain::models::{ApprovalStatus, LeaveRequest, Survey, SurveyStatus};
    use crate::services::narrative::DisabledNarrator;
    use crate::state::AppState;
    use crate::web::routes;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use axum::Router;
    use chrono::NaiveDate;
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn leave(id: Uuid, status: ApprovalStatus) -> LeaveRequest {
        LeaveRequest {
            id,
            user_id: Uuid::new_v4(),
            leave_type: "Sick".to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            status,
            created_at: at(2024, 3, 1, 8),
        }
    }

    fn app(source: MemorySource) -> Router {
        routes(Arc::new(AppState::new(
            Arc::new(source),
            Arc::new(DisabledNarrator),
            ReportSettings::default(),
        )))
    }

    async fn patch(app: Router, uri: &str, body: &str) -> (StatusCode, Value) {
        let resp = app
            .oneshot(
                Request::builder()
                    .method(Method::PATCH)
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn pending_leave_can_be_approved_once() {
        let id = Uuid::new_v4();
        let app = app(MemorySource::new(Tables {
            leaves: vec![leave(id, ApprovalStatus::Pending)],
            ..Tables::default()
        }));
        let uri = format!("/api/leaves/{id}");

        let (status, json) = patch(app.clone(), &uri, r#"{"status":"Approved"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "Approved");

        let (status, json) = patch(app, &uri, r#"{"status":"Rejected"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("Approved"));
    }

    #[tokio::test]
    async fn concurrent_decisions_let_only_one_through() {
        let id = Uuid::new_v4();
        let source = Arc::new(
            MemorySource::new(Tables {
                leaves: vec![leave(id, ApprovalStatus::Pending)],
                ..Tables::default()
            })
            .with_read_delay(Duration::from_millis(50)),
        );
        let app = routes(Arc::new(AppState::new(
            source.clone(),
            Arc::new(DisabledNarrator),
            ReportSettings::default(),
        )));
        let uri = format!("/api/leaves/{id}");

        let (approve, reject) = tokio::join!(
            patch(app.clone(), &uri, r#"{"status":"Approved"}"#),
            patch(app, &uri, r#"{"status":"Rejected"}"#),
        );
        let (winner, loser) = if approve.0 == StatusCode::OK {
            (approve, reject)
        } else {
            (reject, approve)
        };
        assert_eq!(winner.0, StatusCode::OK);
        assert_eq!(loser.0, StatusCode::CONFLICT);
        assert!(loser.1["error"].as_str().unwrap().contains("Pending"));

        let stored = source.tables.read().await.leaves[0].status;
        assert_eq!(stored.as_str(), winner.1["status"]);
    }

    #[tokio::test]
    async fn unknown_ids_and_bad_bodies() {
        let app = app(MemorySource::new(Tables::default()));
        let (status, _) = patch(
            app.clone(),
            &format!("/api/recognitions/{}", Uuid::new_v4()),
            r#"{"status":"Approved"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = patch(
            app.clone(),
            &format!("/api/leaves/{}", Uuid::new_v4()),
            r#"{"state":"Approved"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, json) = patch(
            app,
            &format!("/api/leaves/{}", Uuid::new_v4()),
            r#"{"status":"Maybe"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("Maybe"));
    }

    #[tokio::test]
    async fn survey_lifecycle_is_enforced() {
        let id = Uuid::new_v4();
        let app = app(MemorySource::new(Tables {
            surveys: vec![Survey {
                id,
                title: "Pulse".to_string(),
                status: SurveyStatus::Draft,
                created_at: at(2024, 1, 1, 0),
            }],
            ..Tables::default()
        }));
        let uri = format!("/api/surveys/{id}");

        let (status, _) = patch(app.clone(), &uri, r#"{"status":"Closed"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = patch(app.clone(), &uri, r#"{"status":"active"}"#).await;
        assert_eq!(status, StatusCode::OK);
        let (status, json) = patch(app, &uri, r#"{"status":"Closed"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "Closed");
    }

    #[tokio::test]
    async fn store_failure_on_write_is_a_server_error() {
        let app = app(MemorySource::failing());
        let (status, json) = patch(
            app,
            &format!("/api/leaves/{}", Uuid::new_v4()),
            r#"{"status":"Approved"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["error"].is_string());
    }
}
