use crate::analytics::RateReport;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::Duration;
use thiserror::Error;

pub const PLACEHOLDER: &str = "Unable to generate recommendations at this time";
pub const SEPARATOR: &str = "###";
/// Entries this short are fragments of a split, not recommendations.
pub const MIN_LENGTH: usize = 20;
pub const MAX_RECOMMENDATIONS: usize = 5;

#[derive(Debug, Error)]
pub enum NarrativeError {
    #[error("narrative relay is not configured")]
    Disabled,
    #[error("narrative request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("narrative relay returned no usable recommendations")]
    Empty,
}

/// Turns a prompt into raw recommendation entries.
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Vec<String>, NarrativeError>;
}

#[derive(Serialize)]
struct RelayRequest<'a> {
    prompt: &'a str,
}

/// The relay answers with either a list or a single `###`-separated blob.
#[derive(Deserialize)]
#[serde(untagged)]
enum RelayBody {
    List(Vec<String>),
    Blob(String),
}

#[derive(Deserialize)]
struct RelayResponse {
    recommendations: RelayBody,
}

/// Client for the recommendation relay: `POST {url}` with `{prompt}`.
#[derive(Clone)]
pub struct HttpNarrator {
    client: reqwest::Client,
    url: String,
}

impl HttpNarrator {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NarrativeError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NarrativeGenerator for HttpNarrator {
    async fn generate(&self, prompt: &str) -> Result<Vec<String>, NarrativeError> {
        let resp = self
            .client
            .post(&self.url)
            .json(&RelayRequest { prompt })
            .send()
            .await?
            .error_for_status()?;
        let body: RelayResponse = resp.json().await?;
        Ok(match body.recommendations {
            RelayBody::List(items) => items,
            RelayBody::Blob(text) => vec![text],
        })
    }
}

/// Used when no relay URL is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledNarrator;

#[async_trait]
impl NarrativeGenerator for DisabledNarrator {
    async fn generate(&self, _prompt: &str) -> Result<Vec<String>, NarrativeError> {
        Err(NarrativeError::Disabled)
    }
}

/// Splits every entry on `###`, trims, drops fragments and caps the list.
pub fn split_recommendations<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    raw.iter()
        .flat_map(|entry| entry.as_ref().split(SEPARATOR))
        .map(str::trim)
        .filter(|item| item.chars().count() > MIN_LENGTH)
        .take(MAX_RECOMMENDATIONS)
        .map(str::to_string)
        .collect()
}

pub fn placeholder() -> Vec<String> {
    vec![PLACEHOLDER.to_string()]
}

/// Renders the summary statistics and breakdowns the relay works from.
pub fn build_prompt(report: &RateReport) -> String {
    let s = &report.summary;
    let month = report
        .month
        .map(crate::domain::period::month_name)
        .unwrap_or("All months");
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "You are an HR analyst. Give up to {MAX_RECOMMENDATIONS} concrete recommendations, \
         separated by {SEPARATOR}. Use **bold** for key points and 1) 2) for steps."
    );
    let _ = writeln!(prompt, "Metric: {}", report.kind.rate_label());
    let _ = writeln!(
        prompt,
        "Scope: year {}, {}, department {}",
        report.year, month, report.department
    );
    let _ = writeln!(
        prompt,
        "Overall: {:.2} (count {}, possible {}, employees {})",
        s.overall_rate, s.total_count, s.possible, s.employees
    );
    if let Some(best) = &s.best {
        let _ = writeln!(prompt, "Best period: {} at {:.2}", best.label, best.rate);
    }
    if let Some(worst) = &s.worst {
        let _ = writeln!(prompt, "Worst period: {} at {:.2}", worst.label, worst.rate);
    }
    let _ = writeln!(prompt, "Periods:");
    for bucket in &report.buckets {
        let _ = writeln!(prompt, "- {}: {:.2} ({})", bucket.label, bucket.rate, bucket.count);
    }
    if !report.departments.is_empty() {
        let _ = writeln!(prompt, "Departments:");
        for row in &report.departments {
            let _ = writeln!(
                prompt,
                "- {}: {:.2} ({} employees, {} records)",
                row.department, row.rate, row.employees, row.count
            );
        }
    }
    prompt
}

/// Never fails: any relay problem, or an answer with nothing usable in it,
/// becomes the placeholder list.
pub async fn recommend(narrator: &dyn NarrativeGenerator, report: &RateReport) -> Vec<String> {
    let prompt = build_prompt(report);
    let outcome = narrator
        .generate(&prompt)
        .await
        .map(|raw| split_recommendations(&raw))
        .and_then(|items| {
            if items.is_empty() {
                Err(NarrativeError::Empty)
            } else {
                Ok(items)
            }
        });
    match outcome {
        Ok(items) => items,
        Err(NarrativeError::Disabled) => {
            tracing::debug!(kind = %report.kind, "narrative relay disabled");
            placeholder()
        }
        Err(e) => {
            tracing::warn!(kind = %report.kind, error = %e, "Failed to generate recommendations");
            placeholder()
        }
    }
}
