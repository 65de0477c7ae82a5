use super::rows::{
    decode_rows, RawAttendance, RawLeave, RawQuestion, RawRecognition, RawResponse, RawSurvey,
    RawUser,
};
use super::{RecordSource, StoreError, TimeRange};
use crate::domain::models::{
    ApprovalStatus, AttendanceEvent, Employee, LeaveRequest, RecognitionEvent, Survey,
    SurveyQuestion, SurveyResponse, SurveyStatus,
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{header, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// Rows requested per page. Deployments cap responses (Supabase defaults to
/// 1000 rows), so reads walk pages until one comes back empty.
pub const PAGE_SIZE: usize = 1000;

/// PostgREST-style filter set for one table.
#[derive(Debug, Clone)]
pub struct RestQuery {
    table: &'static str,
    params: Vec<(String, String)>,
}

impl RestQuery {
    pub fn table(table: &'static str) -> Self {
        Self {
            table,
            params: vec![("select".to_string(), "*".to_string())],
        }
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.params[0].1 = columns.to_string();
        self
    }

    fn filter(mut self, column: &str, op: &str, value: impl AsRef<str>) -> Self {
        self.params
            .push((column.to_string(), format!("{op}.{}", value.as_ref())));
        self
    }

    pub fn eq(self, column: &str, value: impl AsRef<str>) -> Self {
        self.filter(column, "eq", value)
    }

    pub fn gte(self, column: &str, value: impl AsRef<str>) -> Self {
        self.filter(column, "gte", value)
    }

    pub fn lt(self, column: &str, value: impl AsRef<str>) -> Self {
        self.filter(column, "lt", value)
    }

    pub fn lte(self, column: &str, value: impl AsRef<str>) -> Self {
        self.filter(column, "lte", value)
    }

    pub fn in_list<I, S>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = values
            .into_iter()
            .map(|v| v.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.filter(column, "in", format!("({joined})"))
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.params
            .push(("order".to_string(), format!("{column}.{direction}")));
        self
    }

    /// Copy of this query limited to `limit` rows starting at `offset`.
    pub fn page(&self, offset: usize, limit: usize) -> Self {
        let mut paged = self.clone();
        paged.params.push(("limit".to_string(), limit.to_string()));
        paged.params.push(("offset".to_string(), offset.to_string()));
        paged
    }

    pub fn within(self, column: &str, range: &TimeRange) -> Self {
        self.gte(column, timestamp(range.start))
            .lt(column, timestamp(range.end))
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }
}

fn timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Client for a Supabase/PostgREST deployment.
#[derive(Clone)]
pub struct RestSource {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestSource {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, method: reqwest::Method, query: &RestQuery) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(query.table))
            .query(query.params())
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn fetch_page(&self, query: &RestQuery) -> Result<Vec<Value>, StoreError> {
        let resp = self.request(reqwest::Method::GET, query).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(StoreError::Status {
                table: query.table.to_string(),
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        Ok(resp.json().await?)
    }

    /// All rows matching `query`. Callers give it an `order` so pages do not
    /// shift between requests.
    async fn fetch(&self, query: RestQuery) -> Result<Vec<Value>, StoreError> {
        let mut rows = Vec::new();
        loop {
            let page = self.fetch_page(&query.page(rows.len(), PAGE_SIZE)).await?;
            if page.is_empty() {
                break;
            }
            rows.extend(page);
        }
        if rows.len() > PAGE_SIZE {
            tracing::debug!(table = query.table, rows = rows.len(), "Fetched across pages");
        }
        Ok(rows)
    }

    /// Singleton fetch. PostgREST answers 406 when no row matched.
    async fn fetch_one(&self, query: RestQuery) -> Result<Option<Value>, StoreError> {
        let resp = self
            .request(reqwest::Method::GET, &query)
            .header(header::ACCEPT, SINGLE_OBJECT)
            .send()
            .await?;
        match resp.status() {
            StatusCode::NOT_ACCEPTABLE | StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(resp.json().await?)),
            status => Err(StoreError::Status {
                table: query.table.to_string(),
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            }),
        }
    }

    /// PATCH guarded by the expected current status. An empty representation
    /// means nothing matched, and a follow-up read tells a missing row from one
    /// that another writer already moved.
    async fn update_status(&self, table: &'static str, id: Uuid, from: &str, to: &str) -> Result<(), StoreError> {
        let query = RestQuery::table(table)
            .select("id")
            .eq("id", id.to_string())
            .eq("status", from);
        let resp = self
            .request(reqwest::Method::PATCH, &query)
            .header("Prefer", "return=representation")
            .json(&json!({ "status": to }))
            .send()
            .await?;
        let code = resp.status();
        if !code.is_success() {
            return Err(StoreError::Status {
                table: table.to_string(),
                status: code.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        let updated: Vec<Value> = resp.json().await?;
        if updated.is_empty() {
            let exists = self
                .fetch_one(RestQuery::table(table).select("id").eq("id", id.to_string()))
                .await?;
            return Err(match exists {
                Some(_) => StoreError::Conflict {
                    table,
                    id,
                    expected: from.to_string(),
                },
                None => StoreError::NotFound { table, id },
            });
        }
        tracing::info!(table, %id, from, to, "Status updated");
        Ok(())
    }

    async fn one<R, T>(&self, table: &'static str, id: Uuid, convert: impl Fn(R) -> Option<T>) -> Result<Option<T>, StoreError>
    where
        R: serde::de::DeserializeOwned,
    {
        let row = self
            .fetch_one(RestQuery::table(table).eq("id", id.to_string()))
            .await?;
        Ok(row.and_then(|value| decode_rows(table, vec![value], &convert).into_iter().next()))
    }
}

#[async_trait]
impl RecordSource for RestSource {
    async fn employees(&self) -> Result<Vec<Employee>, StoreError> {
        let rows = self
            .fetch(
                RestQuery::table("users")
                    .select("id,department")
                    .eq("role", "employee")
                    .order("id", true),
            )
            .await?;
        Ok(decode_rows("users", rows, RawUser::into_domain))
    }

    async fn attendances(&self, range: &TimeRange) -> Result<Vec<AttendanceEvent>, StoreError> {
        let rows = self
            .fetch(
                RestQuery::table("attendances")
                    .select("user_id,check_in")
                    .within("check_in", range)
                    .order("check_in", true),
            )
            .await?;
        Ok(decode_rows("attendances", rows, RawAttendance::into_domain))
    }

    async fn recognitions(&self, range: &TimeRange) -> Result<Vec<RecognitionEvent>, StoreError> {
        let rows = self
            .fetch(
                RestQuery::table("recognitions")
                    .within("created_at", range)
                    .order("created_at", true),
            )
            .await?;
        Ok(decode_rows("recognitions", rows, RawRecognition::into_domain))
    }

    async fn surveys(&self) -> Result<Vec<Survey>, StoreError> {
        let rows = self
            .fetch(RestQuery::table("surveys").order("created_at", true))
            .await?;
        Ok(decode_rows("surveys", rows, RawSurvey::into_domain))
    }

    async fn survey_questions(&self, survey: Option<Uuid>) -> Result<Vec<SurveyQuestion>, StoreError> {
        let mut query = RestQuery::table("survey_questions").order("id", true);
        if let Some(survey_id) = survey {
            query = query.eq("survey_id", survey_id.to_string());
        }
        let rows = self.fetch(query).await?;
        Ok(decode_rows("survey_questions", rows, RawQuestion::into_domain))
    }

    async fn survey_responses(
        &self,
        range: &TimeRange,
        questions: Option<&[Uuid]>,
    ) -> Result<Vec<SurveyResponse>, StoreError> {
        let mut query = RestQuery::table("survey_responses")
            .select("question_id,user_id,response,created_at")
            .within("created_at", range)
            .order("created_at", true);
        if let Some(ids) = questions {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            query = query.in_list("question_id", ids.iter().map(Uuid::to_string));
        }
        let rows = self.fetch(query).await?;
        Ok(decode_rows("survey_responses", rows, RawResponse::into_domain))
    }

    async fn leaves(&self, range: &TimeRange) -> Result<Vec<LeaveRequest>, StoreError> {
        let rows = self
            .fetch(
                RestQuery::table("leaves")
                    .within("created_at", range)
                    .order("created_at", false),
            )
            .await?;
        Ok(decode_rows("leaves", rows, RawLeave::into_domain))
    }

    async fn leave(&self, id: Uuid) -> Result<Option<LeaveRequest>, StoreError> {
        self.one("leaves", id, RawLeave::into_domain).await
    }

    async fn recognition(&self, id: Uuid) -> Result<Option<RecognitionEvent>, StoreError> {
        self.one("recognitions", id, RawRecognition::into_domain).await
    }

    async fn survey(&self, id: Uuid) -> Result<Option<Survey>, StoreError> {
        self.one("surveys", id, RawSurvey::into_domain).await
    }

    async fn set_leave_status(&self, id: Uuid, from: ApprovalStatus, to: ApprovalStatus) -> Result<(), StoreError> {
        self.update_status("leaves", id, from.as_str(), to.as_str()).await
    }

    async fn set_recognition_status(
        &self,
        id: Uuid,
        from: ApprovalStatus,
        to: ApprovalStatus,
    ) -> Result<(), StoreError> {
        self.update_status("recognitions", id, from.as_str(), to.as_str()).await
    }

    async fn set_survey_status(&self, id: Uuid, from: SurveyStatus, to: SurveyStatus) -> Result<(), StoreError> {
        self.update_status("surveys", id, from.as_str(), to.as_str()).await
    }
}
