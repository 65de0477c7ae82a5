use super::rates::engagement_score;
use super::scope::EmployeeScope;
use super::{
    extremes, load_survey_rows, Bucket, Dated, DepartmentRow, RateReport, ReportKind,
    ReportSettings, ReportSummary,
};
use crate::db::{fetch_or_empty, RecordSource, TimeRange};
use crate::domain::filters::ReportQuery;
use crate::domain::models::{Employee, QuestionKind, SurveyQuestion, SurveyResponse};
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

pub async fn load(source: &dyn RecordSource, query: &ReportQuery, settings: &ReportSettings) -> RateReport {
    let range = TimeRange::for_year(&query.period, &settings.zone);
    let (employees, rows) = futures::join!(
        fetch_or_empty("users", source.employees()),
        load_survey_rows(source, query, &range),
    );
    aggregate(&employees, &rows.questions, &rows.responses, query, settings)
}

/// Mean rating × 20 per bucket, over answers to rating questions. Text
/// answers and anything outside 1..=5 are ignored.
pub fn aggregate(
    employees: &[Employee],
    questions: &[SurveyQuestion],
    responses: &[SurveyResponse],
    query: &ReportQuery,
    settings: &ReportSettings,
) -> RateReport {
    let period = &query.period;
    let scope = EmployeeScope::resolve(employees, &query.department);
    let range = TimeRange::for_year(period, &settings.zone);
    let whole = period.span();

    let rating_questions: HashSet<Uuid> = questions
        .iter()
        .filter(|q| q.kind == QuestionKind::Rating)
        .filter(|q| query.survey.map_or(true, |id| q.survey_id == id))
        .map(|q| q.id)
        .collect();

    let ratings: Vec<(Dated, u8)> = responses
        .iter()
        .filter(|r| rating_questions.contains(&r.question_id))
        .filter(|r| scope.contains(&r.user_id) && range.contains(r.created_at))
        .filter_map(|r| {
            let at = Dated {
                user: r.user_id,
                date: settings.zone.local_date(r.created_at),
            };
            r.rating().map(|value| (at, value))
        })
        .filter(|(at, _)| whole.contains(at.date))
        .collect();

    let collect = |keep: &dyn Fn(&Dated) -> bool| -> Vec<u8> {
        ratings
            .iter()
            .filter(|(at, _)| keep(at))
            .map(|(_, value)| *value)
            .collect()
    };

    let buckets: Vec<Bucket> = period
        .buckets(false)
        .into_iter()
        .map(|span| {
            let values = collect(&|at| span.contains(at.date));
            Bucket {
                rate: engagement_score(&values),
                count: values.len() as u64,
                maximum: None,
                label: span.label,
            }
        })
        .collect();

    let departments = scope
        .departments()
        .iter()
        .map(|(name, ids)| {
            let values = collect(&|at| ids.contains(&at.user));
            DepartmentRow {
                department: name.clone(),
                employees: ids.len() as u64,
                count: values.len() as u64,
                rate: engagement_score(&values),
                maximum: None,
                categories: BTreeMap::new(),
            }
        })
        .collect();

    let all: Vec<u8> = ratings.iter().map(|(_, value)| *value).collect();
    let (best, worst) = extremes(&buckets);

    RateReport {
        kind: ReportKind::Engagement,
        year: period.year,
        month: period.month,
        department: query.department.label().to_string(),
        summary: ReportSummary {
            overall_rate: engagement_score(&all),
            total_count: all.len() as u64,
            employees: scope.size(),
            possible: all.len() as u64,
            best,
            worst,
        },
        buckets,
        departments,
    }
}
