pub mod attendance;
pub mod dashboard;
pub mod engagement;
pub mod rates;
pub mod recognition;
pub mod responses;
mod scope;

use crate::db::{fetch_or_empty, RecordSource, TimeRange};
use crate::domain::filters::ReportQuery;
use crate::domain::models::{SurveyQuestion, SurveyResponse};
use crate::time_utils::ReportZone;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

pub use attendance::AttendanceCounting;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportKind {
    Attendance,
    Recognition,
    Engagement,
    SurveyResponse,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown report `{0}`")]
pub struct UnknownReport(pub String);

impl ReportKind {
    pub const ALL: [ReportKind; 4] = [
        ReportKind::Attendance,
        ReportKind::Recognition,
        ReportKind::Engagement,
        ReportKind::SurveyResponse,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            ReportKind::Attendance => "attendance",
            ReportKind::Recognition => "recognition",
            ReportKind::Engagement => "engagement",
            ReportKind::SurveyResponse => "survey-response",
        }
    }

    /// Prefix used in export filenames.
    pub fn export_title(&self) -> &'static str {
        match self {
            ReportKind::Attendance => "Attendance_Rate",
            ReportKind::Recognition => "Recognition_Rate",
            ReportKind::Engagement => "Engagement_Score",
            ReportKind::SurveyResponse => "Survey_Response_Rate",
        }
    }

    pub fn rate_label(&self) -> &'static str {
        match self {
            ReportKind::Attendance => "Attendance Rate (%)",
            ReportKind::Recognition => "Recognition Rate (%)",
            ReportKind::Engagement => "Engagement Score (%)",
            ReportKind::SurveyResponse => "Response Rate (%)",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for ReportKind {
    type Err = UnknownReport;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReportKind::ALL
            .into_iter()
            .find(|kind| kind.slug() == s)
            .ok_or_else(|| UnknownReport(s.to_string()))
    }
}

/// Knobs every aggregation shares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportSettings {
    pub zone: ReportZone,
    pub counting: AttendanceCounting,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub label: String,
    pub rate: f64,
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<u64>,
}

impl Bucket {
    /// Whether the bucket had any denominator to measure against.
    fn measurable(&self) -> bool {
        self.maximum.unwrap_or(self.count) > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentRow {
    pub department: String,
    pub employees: u64,
    pub count: u64,
    pub rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub categories: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketRef {
    pub label: String,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub overall_rate: f64,
    pub total_count: u64,
    pub employees: u64,
    pub possible: u64,
    pub best: Option<BucketRef>,
    pub worst: Option<BucketRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateReport {
    pub kind: ReportKind,
    pub year: i32,
    pub month: Option<u32>,
    pub department: String,
    pub summary: ReportSummary,
    pub buckets: Vec<Bucket>,
    pub departments: Vec<DepartmentRow>,
}

impl RateReport {
    /// Union of category keys across department rows, sorted.
    pub fn category_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = self
            .departments
            .iter()
            .flat_map(|row| row.categories.keys().cloned())
            .collect();
        columns.sort();
        columns.dedup();
        columns
    }
}

/// Highest and lowest measurable buckets; ties keep the earlier bucket.
pub(crate) fn extremes(buckets: &[Bucket]) -> (Option<BucketRef>, Option<BucketRef>) {
    let mut best: Option<&Bucket> = None;
    let mut worst: Option<&Bucket> = None;
    for bucket in buckets.iter().filter(|b| b.measurable()) {
        if best.map_or(true, |b| bucket.rate > b.rate) {
            best = Some(bucket);
        }
        if worst.map_or(true, |w| bucket.rate < w.rate) {
            worst = Some(bucket);
        }
    }
    let as_ref = |b: &Bucket| BucketRef {
        label: b.label.clone(),
        rate: b.rate,
    };
    (best.map(as_ref), worst.map(as_ref))
}

/// A record reduced to who it concerns and the local day it happened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Dated {
    pub user: Uuid,
    pub date: NaiveDate,
}

pub(crate) struct SurveyRows {
    pub questions: Vec<SurveyQuestion>,
    pub responses: Vec<SurveyResponse>,
}

/// Questions for the selected survey (or all), then the year's responses to
/// them. With no survey selected every response in range is fetched.
pub(crate) async fn load_survey_rows(
    source: &dyn RecordSource,
    query: &ReportQuery,
    range: &TimeRange,
) -> SurveyRows {
    let questions = fetch_or_empty("survey_questions", source.survey_questions(query.survey)).await;
    let narrowed: Option<Vec<Uuid>> = query
        .survey
        .map(|_| questions.iter().map(|q| q.id).collect());
    let responses = fetch_or_empty(
        "survey_responses",
        source.survey_responses(range, narrowed.as_deref()),
    )
    .await;
    SurveyRows {
        questions,
        responses,
    }
}

/// Runs the aggregation for `kind`.
pub async fn build_report(
    source: &dyn RecordSource,
    kind: ReportKind,
    query: &ReportQuery,
    settings: &ReportSettings,
) -> RateReport {
    match kind {
        ReportKind::Attendance => attendance::load(source, query, settings).await,
        ReportKind::Recognition => recognition::load(source, query, settings).await,
        ReportKind::Engagement => engagement::load(source, query, settings).await,
        ReportKind::SurveyResponse => responses::load(source, query, settings).await,
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(label: &str, rate: f64, count: u64, maximum: Option<u64>) -> Bucket {
        Bucket {
            label: label.to_string(),
            rate,
            count,
            maximum,
        }
    }

    #[test]
    fn extremes_skip_empty_denominators_and_prefer_earliest() {
        let buckets = vec![
            bucket("Jan", 0.0, 0, Some(0)),
            bucket("Feb", 40.0, 4, Some(10)),
            bucket("Mar", 90.0, 9, Some(10)),
            bucket("Apr", 90.0, 9, Some(10)),
            bucket("May", 10.0, 1, Some(10)),
        ];
        let (best, worst) = extremes(&buckets);
        assert_eq!(best.unwrap().label, "Mar");
        assert_eq!(worst.unwrap().label, "May");
    }

    #[test]
    fn extremes_of_nothing_are_none() {
        let (best, worst) = extremes(&[bucket("Jan", 0.0, 0, None)]);
        assert!(best.is_none());
        assert!(worst.is_none());
    }

    #[test]
    fn report_kind_round_trips_through_slug() {
        for kind in ReportKind::ALL {
            assert_eq!(kind.slug().parse::<ReportKind>(), Ok(kind));
        }
        assert!("payroll".parse::<ReportKind>().is_err());
    }
}
