use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: Uuid,
    pub department: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    pub user_id: Uuid,
    pub check_in: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionEvent {
    pub id: Uuid,
    pub receiver: Uuid,
    pub status: ApprovalStatus,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Survey {
    pub id: Uuid,
    pub title: String,
    pub status: SurveyStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    Rating,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyQuestion {
    pub id: Uuid,
    pub survey_id: Uuid,
    pub kind: QuestionKind,
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyResponse {
    pub question_id: Uuid,
    pub user_id: Uuid,
    pub response: String,
    pub created_at: DateTime<Utc>,
}

impl SurveyResponse {
    /// Likert answer on the 1..=5 scale, if the response holds one.
    pub fn rating(&self) -> Option<u8> {
        let raw = self.response.trim();
        let value = raw
            .parse::<u8>()
            .ok()
            .or_else(|| raw.parse::<f64>().ok().filter(|v| v.fract() == 0.0).map(|v| v as u8))?;
        (1..=5).contains(&value).then_some(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub leave_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: ApprovalStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("unknown status `{0}`")]
    Unknown(String),
    #[error("cannot move from {from} to {to}")]
    Transition { from: String, to: String },
}

/// Review state shared by leave requests and recognitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "Pending",
            ApprovalStatus::Approved => "Approved",
            ApprovalStatus::Rejected => "Rejected",
        }
    }

    /// Only pending items can be decided, and a decision is final.
    pub fn transition(self, to: ApprovalStatus) -> Result<ApprovalStatus, TransitionError> {
        match (self, to) {
            (ApprovalStatus::Pending, ApprovalStatus::Approved | ApprovalStatus::Rejected) => Ok(to),
            _ => Err(TransitionError::Transition {
                from: self.to_string(),
                to: to.to_string(),
            }),
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalStatus {
    type Err = TransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "rejected" => Ok(ApprovalStatus::Rejected),
            _ => Err(TransitionError::Unknown(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SurveyStatus {
    Draft,
    Scheduled,
    Active,
    Closed,
}

impl SurveyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurveyStatus::Draft => "Draft",
            SurveyStatus::Scheduled => "Scheduled",
            SurveyStatus::Active => "Active",
            SurveyStatus::Closed => "Closed",
        }
    }

    pub fn transition(self, to: SurveyStatus) -> Result<SurveyStatus, TransitionError> {
        use SurveyStatus::*;
        match (self, to) {
            (Draft, Scheduled | Active) | (Scheduled, Active | Draft) | (Active, Closed) => Ok(to),
            _ => Err(TransitionError::Transition {
                from: self.to_string(),
                to: to.to_string(),
            }),
        }
    }
}

impl fmt::Display for SurveyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SurveyStatus {
    type Err = TransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(SurveyStatus::Draft),
            "scheduled" => Ok(SurveyStatus::Scheduled),
            "active" => Ok(SurveyStatus::Active),
            "closed" => Ok(SurveyStatus::Closed),
            _ => Err(TransitionError::Unknown(s.to_string())),
        }
    }
}

impl FromStr for QuestionKind {
    type Err = TransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rating" => Ok(QuestionKind::Rating),
            "text" => Ok(QuestionKind::Text),
            _ => Err(TransitionError::Unknown(s.to_string())),
        }
    }
}
