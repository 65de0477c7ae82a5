use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;

pub const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// The calendar window a report covers: a whole year, or one month of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportPeriod {
    pub year: i32,
    pub month: Option<u32>,
}

/// One time bucket, inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSpan {
    pub label: String,
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl BucketSpan {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.first <= date && date <= self.last
    }

    pub fn workdays(&self) -> u32 {
        workdays_between(self.first, self.last)
    }
}

impl ReportPeriod {
    pub fn new(year: i32, month: Option<u32>) -> Self {
        Self { year, month }
    }

    /// Half-open `[Jan 1, next Jan 1)` window every fetch is filtered on.
    pub fn year_bounds(&self) -> (NaiveDate, NaiveDate) {
        (year_start(self.year), year_start(self.year + 1))
    }

    /// The whole period as a single span: the year, or the selected month.
    pub fn span(&self) -> BucketSpan {
        match self.month {
            Some(month) => BucketSpan {
                label: month_name(month).to_string(),
                first: month_start(self.year, month),
                last: month_end(self.year, month),
            },
            None => BucketSpan {
                label: self.year.to_string(),
                first: year_start(self.year),
                last: month_end(self.year, 12),
            },
        }
    }

    /// Twelve month buckets when no month is selected, otherwise one bucket
    /// per day of the month. `weekdays_only` drops Saturdays and Sundays from
    /// the daily set.
    pub fn buckets(&self, weekdays_only: bool) -> Vec<BucketSpan> {
        match self.month {
            None => (1..=12)
                .map(|month| BucketSpan {
                    label: MONTH_ABBREVIATIONS[month as usize - 1].to_string(),
                    first: month_start(self.year, month),
                    last: month_end(self.year, month),
                })
                .collect(),
            Some(month) => month_start(self.year, month)
                .iter_days()
                .take_while(|day| *day <= month_end(self.year, month))
                .filter(|day| !weekdays_only || is_workday(*day))
                .map(|day| BucketSpan {
                    label: day.format("%b %-d").to_string(),
                    first: day,
                    last: day,
                })
                .collect(),
        }
    }
}

pub fn month_name(month: u32) -> &'static str {
    MONTH_NAMES[(month.clamp(1, 12) - 1) as usize]
}

pub fn is_workday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Mon–Fri dates in `[first, last]`.
pub fn workdays_between(first: NaiveDate, last: NaiveDate) -> u32 {
    if last < first {
        return 0;
    }
    first
        .iter_days()
        .take_while(|day| *day <= last)
        .filter(|day| is_workday(*day))
        .count() as u32
}

fn year_start(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(NaiveDate::MIN)
}

fn month_start(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

fn month_end(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}
