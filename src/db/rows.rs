//! Loose row shapes as the REST layer returns them, and their conversion into
//! domain types. Missing optional columns fall back to defaults; rows whose
//! ids or timestamps cannot be read are dropped with a warning.

use crate::domain::models::{
    ApprovalStatus, AttendanceEvent, Employee, LeaveRequest, QuestionKind, RecognitionEvent,
    Survey, SurveyQuestion, SurveyResponse, SurveyStatus,
};
use crate::time_utils::parse_timestamp;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

pub(crate) fn decode_rows<R, T>(table: &str, rows: Vec<Value>, convert: impl Fn(R) -> Option<T>) -> Vec<T>
where
    R: DeserializeOwned,
{
    let total = rows.len();
    let decoded: Vec<T> = rows
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<R>(value) {
            Ok(raw) => convert(raw),
            Err(e) => {
                tracing::warn!(table, error = %e, "Skipping malformed row");
                None
            }
        })
        .collect();
    if decoded.len() < total {
        tracing::warn!(table, dropped = total - decoded.len(), "Rejected rows with unusable fields");
    }
    decoded
}

fn uuid(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw.trim()).ok()
}

fn text(value: Option<Value>) -> String {
    match value {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawUser {
    id: String,
    #[serde(default)]
    department: Option<String>,
}

impl RawUser {
    pub(crate) fn into_domain(self) -> Option<Employee> {
        Some(Employee {
            id: uuid(&self.id)?,
            department: non_empty(self.department),
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawAttendance {
    user_id: String,
    check_in: String,
}

impl RawAttendance {
    pub(crate) fn into_domain(self) -> Option<AttendanceEvent> {
        Some(AttendanceEvent {
            user_id: uuid(&self.user_id)?,
            check_in: parse_timestamp(&self.check_in)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawRecognition {
    id: String,
    receiver: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    category: Option<String>,
    created_at: String,
}

impl RawRecognition {
    pub(crate) fn into_domain(self) -> Option<RecognitionEvent> {
        Some(RecognitionEvent {
            id: uuid(&self.id)?,
            receiver: uuid(&self.receiver)?,
            status: self
                .status
                .and_then(|s| s.parse().ok())
                .unwrap_or(ApprovalStatus::Pending),
            category: non_empty(self.category),
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSurvey {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    status: Option<String>,
    created_at: String,
}

impl RawSurvey {
    pub(crate) fn into_domain(self) -> Option<Survey> {
        Some(Survey {
            id: uuid(&self.id)?,
            title: self.title.unwrap_or_else(|| "Untitled survey".to_string()),
            status: self
                .status
                .and_then(|s| s.parse().ok())
                .unwrap_or(SurveyStatus::Draft),
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawQuestion {
    id: String,
    survey_id: String,
    #[serde(default)]
    question_type: Option<String>,
    #[serde(default)]
    question_text: Option<String>,
}

impl RawQuestion {
    pub(crate) fn into_domain(self) -> Option<SurveyQuestion> {
        Some(SurveyQuestion {
            id: uuid(&self.id)?,
            survey_id: uuid(&self.survey_id)?,
            kind: self
                .question_type
                .and_then(|s| s.parse().ok())
                .unwrap_or(QuestionKind::Text),
            prompt: self.question_text.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawResponse {
    question_id: String,
    user_id: String,
    #[serde(default)]
    response: Option<Value>,
    created_at: String,
}

impl RawResponse {
    pub(crate) fn into_domain(self) -> Option<SurveyResponse> {
        Some(SurveyResponse {
            question_id: uuid(&self.question_id)?,
            user_id: uuid(&self.user_id)?,
            response: text(self.response),
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawLeave {
    id: String,
    user_id: String,
    #[serde(default)]
    leave_type: Option<String>,
    start_date: String,
    end_date: String,
    #[serde(default)]
    status: Option<String>,
    created_at: String,
}

impl RawLeave {
    pub(crate) fn into_domain(self) -> Option<LeaveRequest> {
        Some(LeaveRequest {
            id: uuid(&self.id)?,
            user_id: uuid(&self.user_id)?,
            leave_type: self.leave_type.unwrap_or_else(|| "General".to_string()),
            start_date: NaiveDate::parse_from_str(self.start_date.trim(), "%Y-%m-%d").ok()?,
            end_date: NaiveDate::parse_from_str(self.end_date.trim(), "%Y-%m-%d").ok()?,
            status: self
                .status
                .and_then(|s| s.parse().ok())
                .unwrap_or(ApprovalStatus::Pending),
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_missing_columns_and_rejects_bad_ids() {
        let id = Uuid::new_v4();
        let rows = vec![
            json!({ "id": id.to_string(), "department": "  " }),
            json!({ "id": "not-a-uuid", "department": "Sales" }),
            json!({ "department": "Sales" }),
        ];
        let employees = decode_rows("users", rows, RawUser::into_domain);
        assert_eq!(employees, vec![Employee { id, department: None }]);
    }

    #[test]
    fn numeric_responses_become_text() {
        let rows = vec![json!({
            "question_id": Uuid::new_v4().to_string(),
            "user_id": Uuid::new_v4().to_string(),
            "response": 4,
            "created_at": "2024-06-03T10:00:00+00:00"
        })];
        let responses = decode_rows("survey_responses", rows, RawResponse::into_domain);
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].rating(), Some(4));
    }

    #[test]
    fn unknown_recognition_status_stays_pending() {
        let rows = vec![json!({
            "id": Uuid::new_v4().to_string(),
            "receiver": Uuid::new_v4().to_string(),
            "status": "escalated",
            "created_at": "2024-06-03T10:00:00Z"
        })];
        let events = decode_rows("recognitions", rows, RawRecognition::into_domain);
        assert_eq!(events[0].status, ApprovalStatus::Pending);
        assert_eq!(events[0].category, None);
    }
}
