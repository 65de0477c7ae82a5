use crate::domain::period::{ReportPeriod, MONTH_ABBREVIATIONS, MONTH_NAMES};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Sentinel the dashboard uses for "no department filter".
pub const ALL_DEPARTMENTS: &str = "All";
/// Sentinel the dashboard uses for "no month filter".
pub const ALL_MONTHS: &str = "Month";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("year {0} is out of range")]
    Year(i32),
    #[error("unrecognised month `{0}`")]
    Month(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DepartmentFilter {
    All,
    Named(String),
}

impl DepartmentFilter {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => DepartmentFilter::All,
            Some(value) if value.eq_ignore_ascii_case(ALL_DEPARTMENTS) => DepartmentFilter::All,
            Some(value) => DepartmentFilter::Named(value.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            DepartmentFilter::All => ALL_DEPARTMENTS,
            DepartmentFilter::Named(name) => name,
        }
    }
}

/// Accepts the dashboard's month values: the `Month` sentinel, 1..=12, or an
/// English month name / abbreviation.
pub fn parse_month(raw: Option<&str>) -> Result<Option<u32>, FilterError> {
    let Some(value) = raw.map(str::trim) else {
        return Ok(None);
    };
    if value.is_empty() || value.eq_ignore_ascii_case(ALL_MONTHS) {
        return Ok(None);
    }
    if let Ok(number) = value.parse::<u32>() {
        return if (1..=12).contains(&number) {
            Ok(Some(number))
        } else {
            Err(FilterError::Month(value.to_string()))
        };
    }
    MONTH_NAMES
        .iter()
        .zip(MONTH_ABBREVIATIONS.iter())
        .position(|(full, short)| value.eq_ignore_ascii_case(full) || value.eq_ignore_ascii_case(short))
        .map(|idx| Some(idx as u32 + 1))
        .ok_or_else(|| FilterError::Month(value.to_string()))
}

/// Raw query-string shape shared by every analytics endpoint.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ReportParams {
    pub year: Option<i32>,
    pub department: Option<String>,
    pub month: Option<String>,
    pub survey: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportQuery {
    pub period: ReportPeriod,
    pub department: DepartmentFilter,
    pub survey: Option<Uuid>,
}

impl ReportQuery {
    pub fn from_params(params: &ReportParams, default_year: i32) -> Result<Self, FilterError> {
        let year = params.year.unwrap_or(default_year);
        if !(1970..=9999).contains(&year) {
            return Err(FilterError::Year(year));
        }
        Ok(Self {
            period: ReportPeriod::new(year, parse_month(params.month.as_deref())?),
            department: DepartmentFilter::parse(params.department.as_deref()),
            survey: params.survey,
        })
    }

    pub fn year(year: i32) -> Self {
        Self {
            period: ReportPeriod::new(year, None),
            department: DepartmentFilter::All,
            survey: None,
        }
    }

    /// Stable identity of the filter combination, used to key background work.
    pub fn cache_key(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.period.year,
            self.period.month.map(|m| m.to_string()).unwrap_or_default(),
            self.department.label(),
            self.survey.map(|s| s.to_string()).unwrap_or_default()
        )
    }
}
