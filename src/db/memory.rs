use super::{RecordSource, StoreError, TimeRange};
use crate::domain::models::{
    ApprovalStatus, AttendanceEvent, Employee, LeaveRequest, RecognitionEvent, Survey,
    SurveyQuestion, SurveyResponse, SurveyStatus,
};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default, Clone)]
pub struct Tables {
    pub employees: Vec<Employee>,
    pub attendances: Vec<AttendanceEvent>,
    pub recognitions: Vec<RecognitionEvent>,
    pub surveys: Vec<Survey>,
    pub questions: Vec<SurveyQuestion>,
    pub responses: Vec<SurveyResponse>,
    pub leaves: Vec<LeaveRequest>,
}

/// In-process stand-in for the hosted store. `failing` makes every read fail.
/// `read_delay` holds single-row reads open after the row is copied, so two
/// requests can observe the same status before either writes.
#[derive(Debug, Default)]
pub struct MemorySource {
    pub tables: RwLock<Tables>,
    pub failing: bool,
    pub read_delay: Option<Duration>,
}

impl MemorySource {
    pub fn new(tables: Tables) -> Self {
        Self {
            tables: RwLock::new(tables),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    async fn settle(&self) {
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing {
            Err(StoreError::Unavailable("memory source offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RecordSource for MemorySource {
    async fn employees(&self) -> Result<Vec<Employee>, StoreError> {
        self.check()?;
        Ok(self.tables.read().await.employees.clone())
    }

    async fn attendances(&self, range: &TimeRange) -> Result<Vec<AttendanceEvent>, StoreError> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables
            .attendances
            .iter()
            .filter(|a| range.contains(a.check_in))
            .cloned()
            .collect())
    }

    async fn recognitions(&self, range: &TimeRange) -> Result<Vec<RecognitionEvent>, StoreError> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables
            .recognitions
            .iter()
            .filter(|r| range.contains(r.created_at))
            .cloned()
            .collect())
    }

    async fn surveys(&self) -> Result<Vec<Survey>, StoreError> {
        self.check()?;
        Ok(self.tables.read().await.surveys.clone())
    }

    async fn survey_questions(&self, survey: Option<Uuid>) -> Result<Vec<SurveyQuestion>, StoreError> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables
            .questions
            .iter()
            .filter(|q| survey.map_or(true, |id| q.survey_id == id))
            .cloned()
            .collect())
    }

    async fn survey_responses(
        &self,
        range: &TimeRange,
        questions: Option<&[Uuid]>,
    ) -> Result<Vec<SurveyResponse>, StoreError> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables
            .responses
            .iter()
            .filter(|r| range.contains(r.created_at))
            .filter(|r| questions.map_or(true, |ids| ids.contains(&r.question_id)))
            .cloned()
            .collect())
    }

    async fn leaves(&self, range: &TimeRange) -> Result<Vec<LeaveRequest>, StoreError> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables
            .leaves
            .iter()
            .filter(|l| range.contains(l.created_at))
            .cloned()
            .collect())
    }

    async fn leave(&self, id: Uuid) -> Result<Option<LeaveRequest>, StoreError> {
        self.check()?;
        let row = self.tables.read().await.leaves.iter().find(|l| l.id == id).cloned();
        self.settle().await;
        Ok(row)
    }

    async fn recognition(&self, id: Uuid) -> Result<Option<RecognitionEvent>, StoreError> {
        self.check()?;
        let row = self
            .tables
            .read()
            .await
            .recognitions
            .iter()
            .find(|r| r.id == id)
            .cloned();
        self.settle().await;
        Ok(row)
    }

    async fn survey(&self, id: Uuid) -> Result<Option<Survey>, StoreError> {
        self.check()?;
        let row = self.tables.read().await.surveys.iter().find(|s| s.id == id).cloned();
        self.settle().await;
        Ok(row)
    }

    async fn set_leave_status(&self, id: Uuid, from: ApprovalStatus, to: ApprovalStatus) -> Result<(), StoreError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let row = tables
            .leaves
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or(StoreError::NotFound { table: "leaves", id })?;
        if row.status != from {
            return Err(conflict("leaves", id, from));
        }
        row.status = to;
        Ok(())
    }

    async fn set_recognition_status(
        &self,
        id: Uuid,
        from: ApprovalStatus,
        to: ApprovalStatus,
    ) -> Result<(), StoreError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let row = tables
            .recognitions
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound { table: "recognitions", id })?;
        if row.status != from {
            return Err(conflict("recognitions", id, from));
        }
        row.status = to;
        Ok(())
    }

    async fn set_survey_status(&self, id: Uuid, from: SurveyStatus, to: SurveyStatus) -> Result<(), StoreError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let row = tables
            .surveys
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(StoreError::NotFound { table: "surveys", id })?;
        if row.status != from {
            return Err(conflict("surveys", id, from));
        }
        row.status = to;
        Ok(())
    }
}

fn conflict(table: &'static str, id: Uuid, expected: impl std::fmt::Display) -> StoreError {
    StoreError::Conflict {
        table,
        id,
        expected: expected.to_string(),
    }
}
