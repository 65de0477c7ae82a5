use super::rates::attendance_rate;
use super::scope::EmployeeScope;
use super::{extremes, Bucket, Dated, DepartmentRow, RateReport, ReportKind, ReportSettings, ReportSummary};
use crate::db::{fetch_or_empty, RecordSource, TimeRange};
use crate::domain::filters::ReportQuery;
use crate::domain::models::{AttendanceEvent, Employee};
use crate::domain::period::is_workday;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;

/// How check-in rows turn into attended days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceCounting {
    /// Every check-in row counts, duplicates included.
    #[default]
    Raw,
    /// At most one check-in per employee per local day.
    UniquePerDay,
}

impl FromStr for AttendanceCounting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" => Ok(AttendanceCounting::Raw),
            "unique_per_day" | "unique" => Ok(AttendanceCounting::UniquePerDay),
            other => Err(format!("unknown attendance counting mode `{other}`")),
        }
    }
}

pub async fn load(source: &dyn RecordSource, query: &ReportQuery, settings: &ReportSettings) -> RateReport {
    let range = TimeRange::for_year(&query.period, &settings.zone);
    let (employees, events) = futures::join!(
        fetch_or_empty("users", source.employees()),
        fetch_or_empty("attendances", source.attendances(&range)),
    );
    aggregate(&employees, &events, query, settings)
}

/// Attendance rate per bucket: check-ins over `employees × workdays`.
///
/// In daily mode only weekdays form buckets, and weekend check-ins are left
/// out of the totals so the buckets still add up to the summary count.
pub fn aggregate(
    employees: &[Employee],
    events: &[AttendanceEvent],
    query: &ReportQuery,
    settings: &ReportSettings,
) -> RateReport {
    let period = &query.period;
    let scope = EmployeeScope::resolve(employees, &query.department);
    let range = TimeRange::for_year(period, &settings.zone);
    let whole = period.span();
    let daily = period.month.is_some();

    let mut attended: Vec<Dated> = events
        .iter()
        .filter(|e| scope.contains(&e.user_id) && range.contains(e.check_in))
        .map(|e| Dated {
            user: e.user_id,
            date: settings.zone.local_date(e.check_in),
        })
        .filter(|d| whole.contains(d.date) && (!daily || is_workday(d.date)))
        .collect();

    if settings.counting == AttendanceCounting::UniquePerDay {
        let mut seen = HashSet::new();
        attended.retain(|d| seen.insert(*d));
    }

    let headcount = scope.size();
    let buckets: Vec<Bucket> = period
        .buckets(true)
        .into_iter()
        .map(|span| {
            let count = attended.iter().filter(|d| span.contains(d.date)).count() as u64;
            let workdays = u64::from(span.workdays());
            Bucket {
                rate: attendance_rate(count, headcount, workdays),
                count,
                maximum: Some(headcount * workdays),
                label: span.label,
            }
        })
        .collect();

    let period_workdays = u64::from(whole.workdays());
    let departments = scope
        .departments()
        .iter()
        .map(|(name, ids)| {
            let count = attended.iter().filter(|d| ids.contains(&d.user)).count() as u64;
            let members = ids.len() as u64;
            DepartmentRow {
                department: name.clone(),
                employees: members,
                count,
                rate: attendance_rate(count, members, period_workdays),
                maximum: Some(members * period_workdays),
                categories: BTreeMap::new(),
            }
        })
        .collect();

    let total = attended.len() as u64;
    let (best, worst) = extremes(&buckets);
    tracing::debug!(
        year = period.year,
        month = ?period.month,
        department = query.department.label(),
        total,
        headcount,
        "attendance aggregated"
    );

    RateReport {
        kind: ReportKind::Attendance,
        year: period.year,
        month: period.month,
        department: query.department.label().to_string(),
        summary: ReportSummary {
            overall_rate: attendance_rate(total, headcount, period_workdays),
            total_count: total,
            employees: headcount,
            possible: headcount * period_workdays,
            best,
            worst,
        },
        buckets,
        departments,
    }
}
