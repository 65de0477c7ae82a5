use super::rates::recognition_rate;
use super::scope::EmployeeScope;
use super::{extremes, Bucket, Dated, DepartmentRow, RateReport, ReportKind, ReportSettings, ReportSummary};
use crate::db::{fetch_or_empty, RecordSource, TimeRange};
use crate::domain::filters::ReportQuery;
use crate::domain::models::{ApprovalStatus, Employee, RecognitionEvent};
use std::collections::{BTreeMap, HashSet};

pub const UNCATEGORIZED: &str = "Uncategorized";

pub async fn load(source: &dyn RecordSource, query: &ReportQuery, settings: &ReportSettings) -> RateReport {
    let range = TimeRange::for_year(&query.period, &settings.zone);
    let (employees, events) = futures::join!(
        fetch_or_empty("users", source.employees()),
        fetch_or_empty("recognitions", source.recognitions(&range)),
    );
    aggregate(&employees, &events, query, settings)
}

struct Received<'a> {
    at: Dated,
    category: &'a str,
}

fn unique_receivers<'a>(items: impl Iterator<Item = &'a Received<'a>>) -> u64 {
    items.map(|r| r.at.user).collect::<HashSet<_>>().len() as u64
}

/// Share of employees who received at least one approved recognition. Bucket
/// counts are the number of approved recognitions; weekends are kept.
pub fn aggregate(
    employees: &[Employee],
    events: &[RecognitionEvent],
    query: &ReportQuery,
    settings: &ReportSettings,
) -> RateReport {
    let period = &query.period;
    let scope = EmployeeScope::resolve(employees, &query.department);
    let range = TimeRange::for_year(period, &settings.zone);
    let whole = period.span();

    let received: Vec<Received<'_>> = events
        .iter()
        .filter(|e| e.status == ApprovalStatus::Approved)
        .filter(|e| scope.contains(&e.receiver) && range.contains(e.created_at))
        .map(|e| Received {
            at: Dated {
                user: e.receiver,
                date: settings.zone.local_date(e.created_at),
            },
            category: e.category.as_deref().unwrap_or(UNCATEGORIZED),
        })
        .filter(|r| whole.contains(r.at.date))
        .collect();

    let headcount = scope.size();
    let buckets: Vec<Bucket> = period
        .buckets(false)
        .into_iter()
        .map(|span| {
            let count = received.iter().filter(|r| span.contains(r.at.date)).count() as u64;
            let unique = unique_receivers(received.iter().filter(|r| span.contains(r.at.date)));
            Bucket {
                rate: recognition_rate(unique, headcount),
                count,
                maximum: Some(headcount),
                label: span.label,
            }
        })
        .collect();

    let departments = scope
        .departments()
        .iter()
        .map(|(name, ids)| {
            let mut categories: BTreeMap<String, u64> = BTreeMap::new();
            let mut count = 0u64;
            for r in received.iter().filter(|r| ids.contains(&r.at.user)) {
                count += 1;
                *categories.entry(r.category.to_string()).or_insert(0) += 1;
            }
            let unique = unique_receivers(received.iter().filter(|r| ids.contains(&r.at.user)));
            let members = ids.len() as u64;
            DepartmentRow {
                department: name.clone(),
                employees: members,
                count,
                rate: recognition_rate(unique, members),
                maximum: Some(members),
                categories,
            }
        })
        .collect();

    let total = received.len() as u64;
    let (best, worst) = extremes(&buckets);
    tracing::debug!(year = period.year, month = ?period.month, total, headcount, "recognition aggregated");

    RateReport {
        kind: ReportKind::Recognition,
        year: period.year,
        month: period.month,
        department: query.department.label().to_string(),
        summary: ReportSummary {
            overall_rate: recognition_rate(unique_receivers(received.iter()), headcount),
            total_count: total,
            employees: headcount,
            possible: headcount,
            best,
            worst,
        },
        buckets,
        departments,
    }
}
