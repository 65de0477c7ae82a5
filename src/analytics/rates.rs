//! Rate formulas. Every rate is `occurred / possible * 100` rounded to two
//! decimals, and is `0.0` whenever `possible` is zero. Values are not clamped:
//! duplicate check-ins can push a rate past 100.

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn rate(occurred: u64, possible: u64) -> f64 {
    if possible == 0 {
        return 0.0;
    }
    round2(occurred as f64 / possible as f64 * 100.0)
}

pub fn attendance_rate(check_ins: u64, employees: u64, workdays: u64) -> f64 {
    rate(check_ins, employees * workdays)
}

pub fn recognition_rate(unique_receivers: u64, employees: u64) -> f64 {
    rate(unique_receivers, employees)
}

pub fn response_rate(unique_responders: u64, eligible: u64) -> f64 {
    rate(unique_responders, eligible)
}

/// Mean of 1..=5 ratings mapped onto 0..=100.
pub fn engagement_score(ratings: &[u8]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    let sum: u64 = ratings.iter().map(|r| u64::from(*r)).sum();
    round2(sum as f64 / ratings.len() as f64 * 20.0)
}
