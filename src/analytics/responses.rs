use super::rates::response_rate;
use super::scope::EmployeeScope;
use super::{
    extremes, load_survey_rows, Bucket, Dated, DepartmentRow, RateReport, ReportKind,
    ReportSettings, ReportSummary,
};
use crate::db::{fetch_or_empty, RecordSource, TimeRange};
use crate::domain::filters::ReportQuery;
use crate::domain::models::{Employee, Survey, SurveyQuestion, SurveyResponse};
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

pub async fn load(source: &dyn RecordSource, query: &ReportQuery, settings: &ReportSettings) -> RateReport {
    let range = TimeRange::for_year(&query.period, &settings.zone);
    let (employees, surveys, rows) = futures::join!(
        fetch_or_empty("users", source.employees()),
        fetch_or_empty("surveys", source.surveys()),
        load_survey_rows(source, query, &range),
    );
    aggregate(&employees, &surveys, &rows.questions, &rows.responses, query, settings)
}

struct Answered<'a> {
    at: Dated,
    survey: &'a str,
}

fn unique_responders<'a>(items: impl Iterator<Item = &'a Answered<'a>>) -> u64 {
    items.map(|a| a.at.user).collect::<HashSet<_>>().len() as u64
}

/// Share of employees who answered at least one question. Bucket counts are
/// response rows; department rows break responders down by survey title.
pub fn aggregate(
    employees: &[Employee],
    surveys: &[Survey],
    questions: &[SurveyQuestion],
    responses: &[SurveyResponse],
    query: &ReportQuery,
    settings: &ReportSettings,
) -> RateReport {
    let period = &query.period;
    let scope = EmployeeScope::resolve(employees, &query.department);
    let range = TimeRange::for_year(period, &settings.zone);
    let whole = period.span();

    let titles: HashMap<Uuid, String> = surveys
        .iter()
        .map(|s| (s.id, s.title.clone()))
        .collect();
    let question_survey: HashMap<Uuid, String> = questions
        .iter()
        .filter(|q| query.survey.map_or(true, |id| q.survey_id == id))
        .map(|q| {
            let title = titles
                .get(&q.survey_id)
                .cloned()
                .unwrap_or_else(|| q.survey_id.to_string());
            (q.id, title)
        })
        .collect();

    let answered: Vec<Answered<'_>> = responses
        .iter()
        .filter(|r| scope.contains(&r.user_id) && range.contains(r.created_at))
        .filter_map(|r| {
            question_survey.get(&r.question_id).map(|survey| Answered {
                at: Dated {
                    user: r.user_id,
                    date: settings.zone.local_date(r.created_at),
                },
                survey: survey.as_str(),
            })
        })
        .filter(|a| whole.contains(a.at.date))
        .collect();

    let headcount = scope.size();
    let buckets: Vec<Bucket> = period
        .buckets(false)
        .into_iter()
        .map(|span| {
            let count = answered.iter().filter(|a| span.contains(a.at.date)).count() as u64;
            let unique = unique_responders(answered.iter().filter(|a| span.contains(a.at.date)));
            Bucket {
                rate: response_rate(unique, headcount),
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
            let mine: Vec<&Answered<'_>> = answered.iter().filter(|a| ids.contains(&a.at.user)).collect();
            let mut per_survey: BTreeMap<&str, HashSet<Uuid>> = BTreeMap::new();
            for a in &mine {
                per_survey.entry(a.survey).or_default().insert(a.at.user);
            }
            let categories = per_survey
                .into_iter()
                .map(|(title, users)| (title.to_string(), users.len() as u64))
                .collect();
            let members = ids.len() as u64;
            DepartmentRow {
                department: name.clone(),
                employees: members,
                count: mine.len() as u64,
                rate: response_rate(unique_responders(mine.iter().copied()), members),
                maximum: Some(members),
                categories,
            }
        })
        .collect();

    let total = answered.len() as u64;
    let (best, worst) = extremes(&buckets);

    RateReport {
        kind: ReportKind::SurveyResponse,
        year: period.year,
        month: period.month,
        department: query.department.label().to_string(),
        summary: ReportSummary {
            overall_rate: response_rate(unique_responders(answered.iter()), headcount),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::fixtures::{at, staff};
    use crate::domain::filters::DepartmentFilter;
    use crate::domain::models::{QuestionKind, SurveyStatus};
    use crate::domain::period::ReportPeriod;
    use chrono::{DateTime, Utc};

    fn survey(title: &str) -> Survey {
        Survey {
            id: Uuid::new_v4(),
            title: title.to_string(),
            status: SurveyStatus::Active,
            created_at: at(2024, 1, 1, 0),
        }
    }

    fn question(survey: &Survey, kind: QuestionKind) -> SurveyQuestion {
        SurveyQuestion {
            id: Uuid::new_v4(),
            survey_id: survey.id,
            kind,
            prompt: "Anything to add?".to_string(),
        }
    }

    fn answer(question: &SurveyQuestion, user: Uuid, when: DateTime<Utc>) -> SurveyResponse {
        SurveyResponse {
            question_id: question.id,
            user_id: user,
            response: "fine".to_string(),
            created_at: when,
        }
    }

    fn query(month: Option<u32>, survey: Option<Uuid>) -> ReportQuery {
        ReportQuery {
            period: ReportPeriod::new(2024, month),
            department: DepartmentFilter::All,
            survey,
        }
    }

    #[test]
    fn responders_are_counted_once_per_bucket() {
        let employees = staff("Sales", 4);
        let pulse = survey("Q2 Pulse");
        let q1 = question(&pulse, QuestionKind::Rating);
        let q2 = question(&pulse, QuestionKind::Text);
        let responses = vec![
            answer(&q1, employees[0].id, at(2024, 4, 2, 9)),
            answer(&q2, employees[0].id, at(2024, 4, 2, 9)),
            answer(&q1, employees[1].id, at(2024, 4, 3, 9)),
        ];
        let report = aggregate(
            &employees,
            &[pulse],
            &[q1, q2],
            &responses,
            &query(None, None),
            &ReportSettings::default(),
        );

        let april = &report.buckets[3];
        assert_eq!(april.count, 3);
        assert_eq!(april.rate, 50.0);
        assert_eq!(april.maximum, Some(4));
        assert_eq!(report.summary.overall_rate, 50.0);
        assert_eq!(report.departments[0].categories.get("Q2 Pulse"), Some(&2));
    }

    #[test]
    fn daily_mode_keeps_weekends() {
        let employees = staff("Sales", 2);
        let pulse = survey("Pulse");
        let q = question(&pulse, QuestionKind::Text);
        // 2024-06-01 is a Saturday.
        let responses = vec![answer(&q, employees[0].id, at(2024, 6, 1, 9))];
        let report = aggregate(
            &employees,
            &[pulse],
            &[q],
            &responses,
            &query(Some(6), None),
            &ReportSettings::default(),
        );
        assert_eq!(report.buckets.len(), 30);
        assert_eq!(report.buckets[0].label, "Jun 1");
        assert_eq!(report.buckets[0].rate, 50.0);
    }

    #[test]
    fn survey_filter_and_missing_titles() {
        let employees = staff("Sales", 2);
        let chosen = survey("Onboarding");
        let other = survey("Exit");
        let q_chosen = question(&chosen, QuestionKind::Text);
        let q_other = question(&other, QuestionKind::Text);
        let responses = vec![
            answer(&q_chosen, employees[0].id, at(2024, 8, 5, 9)),
            answer(&q_other, employees[1].id, at(2024, 8, 5, 9)),
        ];
        let chosen_id = chosen.id;

        let filtered = aggregate(
            &employees,
            &[chosen, other],
            &[q_chosen.clone(), q_other.clone()],
            &responses,
            &query(None, Some(chosen_id)),
            &ReportSettings::default(),
        );
        assert_eq!(filtered.summary.overall_rate, 50.0);
        assert_eq!(filtered.summary.total_count, 1);

        let untitled = aggregate(
            &employees,
            &[],
            &[q_chosen],
            &responses[..1],
            &query(None, None),
            &ReportSettings::default(),
        );
        assert_eq!(
            untitled.departments[0].categories.get(&chosen_id.to_string()),
            Some(&1)
        );
    }

    #[test]
    fn unknown_department_has_zero_rate() {
        let employees = staff("Sales", 3);
        let pulse = survey("Pulse");
        let q = question(&pulse, QuestionKind::Text);
        let responses = vec![answer(&q, employees[0].id, at(2024, 2, 1, 9))];
        let report = aggregate(
            &employees,
            &[pulse],
            &[q],
            &responses,
            &ReportQuery {
                period: ReportPeriod::new(2024, None),
                department: DepartmentFilter::Named("Engineering".to_string()),
                survey: None,
            },
            &ReportSettings::default(),
        );
        assert_eq!(report.summary.overall_rate, 0.0);
        assert!(report.buckets.iter().all(|b| b.rate == 0.0));
        assert_eq!(report.departments.len(), 1);
    }
}
