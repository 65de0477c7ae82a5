use super::{RecordSource, StoreError, TimeRange};
use crate::domain::models::{
    ApprovalStatus, AttendanceEvent, Employee, LeaveRequest, QuestionKind, RecognitionEvent,
    Survey, SurveyQuestion, SurveyResponse, SurveyStatus,
};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use uuid::Uuid;

/// Direct Postgres access to the same tables the REST layer exposes.
#[derive(Clone)]
pub struct PgSource {
    pool: PgPool,
}

impl PgSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn update_status(&self, table: &'static str, id: Uuid, from: &str, to: &str) -> Result<(), StoreError> {
        // Table names come from the fixed set below, never from input.
        let sql = format!("UPDATE {table} SET status = $2 WHERE id = $1 AND status = $3");
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(to)
            .bind(from)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            let exists = format!("SELECT 1 FROM {table} WHERE id = $1");
            let row = sqlx::query(&exists).bind(id).fetch_optional(&self.pool).await?;
            return Err(match row {
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
}

fn map_rows<T>(table: &str, rows: Vec<PgRow>, convert: impl Fn(&PgRow) -> Result<T, sqlx::Error>) -> Vec<T> {
    let total = rows.len();
    let out: Vec<T> = rows
        .iter()
        .filter_map(|row| match convert(row) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(table, error = %e, "Skipping malformed row");
                None
            }
        })
        .collect();
    if out.len() < total {
        tracing::warn!(table, dropped = total - out.len(), "Rejected rows with unusable fields");
    }
    out
}

fn approval(row: &PgRow) -> Result<ApprovalStatus, sqlx::Error> {
    let raw: Option<String> = row.try_get("status")?;
    Ok(raw
        .and_then(|s| s.parse().ok())
        .unwrap_or(ApprovalStatus::Pending))
}

fn employee(row: &PgRow) -> Result<Employee, sqlx::Error> {
    let department: Option<String> = row.try_get("department")?;
    Ok(Employee {
        id: row.try_get("id")?,
        department: department.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()),
    })
}

fn attendance(row: &PgRow) -> Result<AttendanceEvent, sqlx::Error> {
    Ok(AttendanceEvent {
        user_id: row.try_get("user_id")?,
        check_in: row.try_get("check_in")?,
    })
}

fn recognition(row: &PgRow) -> Result<RecognitionEvent, sqlx::Error> {
    let category: Option<String> = row.try_get("category")?;
    Ok(RecognitionEvent {
        id: row.try_get("id")?,
        receiver: row.try_get("receiver")?,
        status: approval(row)?,
        category: category.filter(|c| !c.trim().is_empty()),
        created_at: row.try_get("created_at")?,
    })
}

fn survey(row: &PgRow) -> Result<Survey, sqlx::Error> {
    let title: Option<String> = row.try_get("title")?;
    let status: Option<String> = row.try_get("status")?;
    Ok(Survey {
        id: row.try_get("id")?,
        title: title.unwrap_or_else(|| "Untitled survey".to_string()),
        status: status
            .and_then(|s| s.parse().ok())
            .unwrap_or(SurveyStatus::Draft),
        created_at: row.try_get("created_at")?,
    })
}

fn question(row: &PgRow) -> Result<SurveyQuestion, sqlx::Error> {
    let kind: Option<String> = row.try_get("question_type")?;
    let prompt: Option<String> = row.try_get("question_text")?;
    Ok(SurveyQuestion {
        id: row.try_get("id")?,
        survey_id: row.try_get("survey_id")?,
        kind: kind.and_then(|k| k.parse().ok()).unwrap_or(QuestionKind::Text),
        prompt: prompt.unwrap_or_default(),
    })
}

fn response(row: &PgRow) -> Result<SurveyResponse, sqlx::Error> {
    let text: Option<String> = row.try_get("response")?;
    Ok(SurveyResponse {
        question_id: row.try_get("question_id")?,
        user_id: row.try_get("user_id")?,
        response: text.unwrap_or_default(),
        created_at: row.try_get("created_at")?,
    })
}

fn leave(row: &PgRow) -> Result<LeaveRequest, sqlx::Error> {
    let leave_type: Option<String> = row.try_get("leave_type")?;
    Ok(LeaveRequest {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        leave_type: leave_type.unwrap_or_else(|| "General".to_string()),
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        status: approval(row)?,
        created_at: row.try_get("created_at")?,
    })
}

const RECOGNITION_COLUMNS: &str = "id, receiver, status, category, created_at";
const SURVEY_COLUMNS: &str = "id, title, status, created_at";
const LEAVE_COLUMNS: &str = "id, user_id, leave_type, start_date, end_date, status, created_at";

/// `#>> '{}'` yields the bare string for jsonb string values and the plain
/// value for text columns, so answers are never wrapped in JSON quotes.
const RESPONSES_SQL: &str = r#"
    SELECT question_id, user_id, to_jsonb(response) #>> '{}' AS response, created_at
    FROM survey_responses
    WHERE created_at >= $1 AND created_at < $2
      AND ($3::uuid[] IS NULL OR question_id = ANY($3))
    ORDER BY created_at ASC
"#;

#[async_trait]
impl RecordSource for PgSource {
    async fn employees(&self) -> Result<Vec<Employee>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, department
            FROM users
            WHERE role = 'employee'
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(map_rows("users", rows, employee))
    }

    async fn attendances(&self, range: &TimeRange) -> Result<Vec<AttendanceEvent>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, check_in
            FROM attendances
            WHERE check_in >= $1 AND check_in < $2
            ORDER BY check_in ASC
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;
        Ok(map_rows("attendances", rows, attendance))
    }

    async fn recognitions(&self, range: &TimeRange) -> Result<Vec<RecognitionEvent>, StoreError> {
        let sql = format!(
            "SELECT {RECOGNITION_COLUMNS} FROM recognitions \
             WHERE created_at >= $1 AND created_at < $2 ORDER BY created_at ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(range.start)
            .bind(range.end)
            .fetch_all(&self.pool)
            .await?;
        Ok(map_rows("recognitions", rows, recognition))
    }

    async fn surveys(&self) -> Result<Vec<Survey>, StoreError> {
        let sql = format!("SELECT {SURVEY_COLUMNS} FROM surveys ORDER BY created_at ASC");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        Ok(map_rows("surveys", rows, survey))
    }

    async fn survey_questions(&self, survey_id: Option<Uuid>) -> Result<Vec<SurveyQuestion>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, survey_id, question_type, question_text
            FROM survey_questions
            WHERE ($1::uuid IS NULL OR survey_id = $1)
            ORDER BY id
            "#,
        )
        .bind(survey_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(map_rows("survey_questions", rows, question))
    }

    async fn survey_responses(
        &self,
        range: &TimeRange,
        questions: Option<&[Uuid]>,
    ) -> Result<Vec<SurveyResponse>, StoreError> {
        let rows = sqlx::query(RESPONSES_SQL)
            .bind(range.start)
            .bind(range.end)
            .bind(questions.map(|ids| ids.to_vec()))
            .fetch_all(&self.pool)
            .await?;
        Ok(map_rows("survey_responses", rows, response))
    }

    async fn leaves(&self, range: &TimeRange) -> Result<Vec<LeaveRequest>, StoreError> {
        let sql = format!(
            "SELECT {LEAVE_COLUMNS} FROM leaves \
             WHERE created_at >= $1 AND created_at < $2 ORDER BY created_at DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(range.start)
            .bind(range.end)
            .fetch_all(&self.pool)
            .await?;
        Ok(map_rows("leaves", rows, leave))
    }

    async fn leave(&self, id: Uuid) -> Result<Option<LeaveRequest>, StoreError> {
        let sql = format!("SELECT {LEAVE_COLUMNS} FROM leaves WHERE id = $1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(|r| leave(&r)).transpose()?)
    }

    async fn recognition(&self, id: Uuid) -> Result<Option<RecognitionEvent>, StoreError> {
        let sql = format!("SELECT {RECOGNITION_COLUMNS} FROM recognitions WHERE id = $1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(|r| recognition(&r)).transpose()?)
    }

    async fn survey(&self, id: Uuid) -> Result<Option<Survey>, StoreError> {
        let sql = format!("SELECT {SURVEY_COLUMNS} FROM surveys WHERE id = $1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(|r| survey(&r)).transpose()?)
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
