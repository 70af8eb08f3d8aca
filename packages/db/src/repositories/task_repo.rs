//! Task repository: the durable copy of the task queue.

use jobfeed_core::{ImportTask, Priority, QueuedTask, TaskId, TaskOutcome, TaskStatus};
use serde::{Deserialize, Serialize};
use surrealdb::sql::{Datetime as SurrealDatetime, Thing};

use crate::{Database, DbError};

const TABLE: &str = "task";

/// Internal record type for SurrealDB.
#[derive(Debug, Serialize, Deserialize)]
struct TaskRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Thing>,
    name: String,
    data: ImportTask,
    priority: Priority,
    status: TaskStatus,
    attempts_made: u32,
    max_attempts: u32,
    failed_reason: Option<String>,
    return_value: Option<TaskOutcome>,
    retry_at: Option<SurrealDatetime>,
    created_at: SurrealDatetime,
    processed_on: Option<SurrealDatetime>,
    finished_on: Option<SurrealDatetime>,
}

impl TaskRecord {
    fn from_task(task: &QueuedTask) -> Self {
        Self {
            id: None,
            name: task.name.clone(),
            data: task.data.clone(),
            priority: task.priority,
            status: task.status,
            attempts_made: task.attempts_made,
            max_attempts: task.max_attempts,
            failed_reason: task.failed_reason.clone(),
            return_value: task.return_value.clone(),
            retry_at: task.retry_at.map(SurrealDatetime::from),
            created_at: SurrealDatetime::from(task.created_at),
            processed_on: task.processed_on.map(SurrealDatetime::from),
            finished_on: task.finished_on.map(SurrealDatetime::from),
        }
    }

    fn into_task(self) -> Result<QueuedTask, DbError> {
        let raw = self
            .id
            .map(|t| t.id.to_raw())
            .ok_or_else(|| DbError::InvalidId("task record without id".into()))?;
        let id = TaskId::parse(&raw).map_err(|_| DbError::InvalidId(raw))?;
        Ok(QueuedTask {
            id,
            name: self.name,
            data: self.data,
            priority: self.priority,
            status: self.status,
            attempts_made: self.attempts_made,
            max_attempts: self.max_attempts,
            failed_reason: self.failed_reason,
            return_value: self.return_value,
            retry_at: self.retry_at.map(|d| d.0),
            created_at: self.created_at.0,
            processed_on: self.processed_on.map(|d| d.0),
            finished_on: self.finished_on.map(|d| d.0),
        })
    }
}

/// Repository for queued task persistence operations.
#[derive(Debug, Clone)]
pub struct TaskRepository {
    db: Database,
}

impl TaskRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert or overwrite a task record.
    pub async fn save(&self, task: &QueuedTask) -> Result<(), DbError> {
        let _: Option<TaskRecord> = self
            .db
            .upsert((TABLE, task.id.to_string()))
            .content(TaskRecord::from_task(task))
            .await?;

        Ok(())
    }

    /// Get a task by ID.
    pub async fn get(&self, id: TaskId) -> Result<Option<QueuedTask>, DbError> {
        let record: Option<TaskRecord> = self.db.select((TABLE, id.to_string())).await?;

        record.map(TaskRecord::into_task).transpose()
    }

    /// Every stored task, oldest first.
    pub async fn list_all(&self) -> Result<Vec<QueuedTask>, DbError> {
        let mut result = self
            .db
            .query("SELECT * FROM task ORDER BY created_at ASC")
            .await?;

        let records: Vec<TaskRecord> = result.take(0)?;

        records.into_iter().map(TaskRecord::into_task).collect()
    }

    /// Tasks with the given status, newest first.
    pub async fn list_by_status(
        &self,
        status: TaskStatus,
        limit: usize,
    ) -> Result<Vec<QueuedTask>, DbError> {
        let mut result = self
            .db
            .query("SELECT * FROM task WHERE status = $status ORDER BY created_at DESC LIMIT $limit")
            .bind(("status", status.as_str()))
            .bind(("limit", limit as i64))
            .await?;

        let records: Vec<TaskRecord> = result.take(0)?;

        records.into_iter().map(TaskRecord::into_task).collect()
    }

    /// Delete a task.
    pub async fn delete(&self, id: TaskId) -> Result<(), DbError> {
        let _: Option<TaskRecord> = self.db.delete((TABLE, id.to_string())).await?;

        Ok(())
    }

    /// Delete every task.
    pub async fn clear(&self) -> Result<(), DbError> {
        self.db.query("DELETE task").await?.check()?;

        Ok(())
    }
}
