use super::{attendance, engagement, recognition, responses, load_survey_rows, ReportSettings};
use crate::db::{fetch_or_empty, RecordSource, TimeRange};
use crate::domain::filters::ReportQuery;
use crate::domain::models::{ApprovalStatus, SurveyStatus};
use serde::Serialize;

/// Year-level headline numbers for the landing page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub year: i32,
    pub employees: u64,
    pub attendance_rate: f64,
    pub recognition_rate: f64,
    pub engagement_score: f64,
    pub response_rate: f64,
    pub pending_leaves: u64,
    pub active_surveys: u64,
}

/// Every table is read once and shared across the four aggregations.
pub async fn summarize(source: &dyn RecordSource, year: i32, settings: &ReportSettings) -> DashboardSummary {
    let query = ReportQuery::year(year);
    let range = TimeRange::for_year(&query.period, &settings.zone);

    let (employees, check_ins, recognitions, surveys, rows, leaves) = futures::join!(
        fetch_or_empty("users", source.employees()),
        fetch_or_empty("attendances", source.attendances(&range)),
        fetch_or_empty("recognitions", source.recognitions(&range)),
        fetch_or_empty("surveys", source.surveys()),
        load_survey_rows(source, &query, &range),
        fetch_or_empty("leaves", source.leaves(&range)),
    );

    let attendance = attendance::aggregate(&employees, &check_ins, &query, settings);
    let recognition = recognition::aggregate(&employees, &recognitions, &query, settings);
    let engagement = engagement::aggregate(&employees, &rows.questions, &rows.responses, &query, settings);
    let response = responses::aggregate(
        &employees,
        &surveys,
        &rows.questions,
        &rows.responses,
        &query,
        settings,
    );

    let pending_leaves = leaves
        .iter()
        .filter(|l| l.status == ApprovalStatus::Pending)
        .count() as u64;
    let active_surveys = surveys
        .iter()
        .filter(|s| s.status == SurveyStatus::Active)
        .count() as u64;

    DashboardSummary {
        year,
        employees: employees.len() as u64,
        attendance_rate: attendance.summary.overall_rate,
        recognition_rate: recognition.summary.overall_rate,
        engagement_score: engagement.summary.overall_rate,
        response_rate: response.summary.overall_rate,
        pending_leaves,
        active_surveys,
    }
}
