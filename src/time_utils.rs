use chrono::{
    DateTime, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone,
    Utc,
};
use chrono_tz::Tz;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParsedTimezone {
    Named(Tz),
    Fixed(FixedOffset),
}

/// Timezone used to decide which calendar day (and month) a timestamp belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportZone {
    zone: ParsedTimezone,
}

impl Default for ReportZone {
    fn default() -> Self {
        Self::utc()
    }
}

impl ReportZone {
    pub fn utc() -> Self {
        Self {
            zone: ParsedTimezone::Fixed(Utc.fix()),
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        parse_timezone(raw).map(|zone| Self { zone })
    }

    pub fn local_date(&self, utc_dt: DateTime<Utc>) -> NaiveDate {
        match self.zone {
            ParsedTimezone::Named(tz) => utc_dt.with_timezone(&tz).date_naive(),
            ParsedTimezone::Fixed(offset) => utc_dt.with_timezone(&offset).date_naive(),
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.local_date(Utc::now())
    }

    /// UTC instant of local midnight on `date`. A midnight skipped by a DST
    /// jump resolves to the first valid instant after it.
    pub fn midnight_utc(&self, date: NaiveDate) -> DateTime<Utc> {
        let local = date.and_time(NaiveTime::MIN);
        match self.zone {
            ParsedTimezone::Named(tz) => resolve_local(&tz, local),
            ParsedTimezone::Fixed(offset) => resolve_local(&offset, local),
        }
    }
}

fn resolve_local<T: TimeZone>(tz: &T, local: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            let shifted = local + chrono::Duration::hours(1);
            tz.from_local_datetime(&shifted)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|| Utc.from_utc_datetime(&local))
        }
    }
}

fn parse_fixed_offset(raw: &str) -> Option<FixedOffset> {
    let trimmed = raw.trim();
    let (sign, rest) = match trimmed.chars().next()? {
        '+' => (1, &trimmed[1..]),
        '-' => (-1, &trimmed[1..]),
        _ => return None,
    };

    let rest = rest.trim();
    if rest.is_empty() {
        return None;
    }

    let (hours, minutes) = if let Some((h, m)) = rest.split_once(':') {
        (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?)
    } else if rest.len() > 2 {
        let (h, m) = rest.split_at(rest.len() - 2);
        (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?)
    } else {
        (rest.parse::<i32>().ok()?, 0)
    };

    if hours > 14 || minutes > 59 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn parse_timezone(raw: &str) -> Option<ParsedTimezone> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let upper = trimmed.to_uppercase();
    if upper == "UTC" || upper == "GMT" || upper == "Z" {
        return FixedOffset::east_opt(0).map(ParsedTimezone::Fixed);
    }

    if let Some(offset) = upper.strip_prefix("UTC").or_else(|| upper.strip_prefix("GMT")) {
        return parse_fixed_offset(offset).map(ParsedTimezone::Fixed);
    }

    if let Some(offset) = parse_fixed_offset(trimmed) {
        return Some(ParsedTimezone::Fixed(offset));
    }

    trimmed.parse::<Tz>().ok().map(ParsedTimezone::Named)
}

/// Parses the timestamp shapes the data store hands back: RFC 3339 with an
/// offset, or a bare `timestamp without time zone` which is taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)))
}
