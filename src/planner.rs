use axum::async_trait;
use axum::extract::Path;
use axum::{Extension, Json};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::auth::CurrentStudent;
use crate::err::Error;
use crate::models::PlannerTask;
use crate::records::{self, OwnedRecord};
use crate::scores::DeletedRecord;
use crate::{proceeds, Payload};

#[derive(Debug, Clone, Deserialize)]
pub struct TaskPayload {
    pub date: Option<String>,
    pub time: Option<String>,
    pub subject: Option<String>,
    pub task: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TaskFields {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub subject: Option<String>,
    pub task: String,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub status: String,
    pub notes: String,
}

#[async_trait]
impl OwnedRecord for PlannerTask {
    type Payload = TaskPayload;
    type Fields = TaskFields;

    const TABLE: &'static str = "planner";
    const ORDER_BY: &'static str = "date ASC, time ASC";

    fn validate(payload: TaskPayload) -> Result<TaskFields, Error> {
        let date = records::required_str("date", &payload.date)?;
        let date = records::parse_date("date", &date)?;
        let task = records::required_str("task", &payload.task)?;
        let time = match records::optional_str(&payload.time) {
            Some(raw) => Some(records::parse_time("time", &raw)?),
            None => None,
        };
        Ok(TaskFields {
            date,
            time,
            subject: records::optional_str(&payload.subject),
            task,
            category: records::optional_str(&payload.category),
            priority: records::optional_str(&payload.priority),
            status: records::optional_str(&payload.status)
                .unwrap_or_else(|| "Pending".to_string()),
            notes: records::optional_str(&payload.notes).unwrap_or_default(),
        })
    }

    async fn insert(
        pg: &PgPool,
        student_id: i64,
        fields: TaskFields,
    ) -> Result<PlannerTask, Error> {
        sqlx::query_as::<_, PlannerTask>(
            "INSERT INTO planner (student_id, date, time, subject, task, category, priority, status, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING *",
        )
        .bind(student_id)
        .bind(fields.date)
        .bind(fields.time)
        .bind(&fields.subject)
        .bind(&fields.task)
        .bind(&fields.category)
        .bind(&fields.priority)
        .bind(&fields.status)
        .bind(&fields.notes)
        .fetch_one(pg)
        .await
        .map_err(Error::from)
    }

    async fn apply_update(pg: &PgPool, id: i64, fields: TaskFields) -> Result<PlannerTask, Error> {
        let updated = sqlx::query_as::<_, PlannerTask>(
            "UPDATE planner SET date = $1, time = $2, subject = $3, task = $4, category = $5, \
             priority = $6, status = $7, notes = $8 WHERE id = $9 \
             RETURNING *",
        )
        .bind(fields.date)
        .bind(fields.time)
        .bind(&fields.subject)
        .bind(&fields.task)
        .bind(&fields.category)
        .bind(&fields.priority)
        .bind(&fields.status)
        .bind(&fields.notes)
        .bind(id)
        .fetch_optional(pg)
        .await?;
        updated.ok_or_else(Error::not_found)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskList {
    pub tasks: Vec<PlannerTask>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedTask {
    pub task: PlannerTask,
}

pub async fn list_tasks(
    CurrentStudent(student): CurrentStudent,
    Extension(pg): Extension<PgPool>,
) -> Payload<TaskList> {
    let tasks = records::list::<PlannerTask>(&pg, student.id).await?;
    proceeds(TaskList { tasks })
}

pub async fn create_task(
    CurrentStudent(student): CurrentStudent,
    Extension(pg): Extension<PgPool>,
    Json(payload): Json<TaskPayload>,
) -> Payload<SavedTask> {
    let task = records::create::<PlannerTask>(&pg, student.id, payload).await?;
    proceeds(SavedTask { task })
}

pub async fn update_task(
    CurrentStudent(student): CurrentStudent,
    Path(id): Path<i64>,
    Extension(pg): Extension<PgPool>,
    Json(payload): Json<TaskPayload>,
) -> Payload<SavedTask> {
    let task = records::update::<PlannerTask>(&pg, student.id, id, payload).await?;
    proceeds(SavedTask { task })
}

pub async fn delete_task(
    CurrentStudent(student): CurrentStudent,
    Path(id): Path<i64>,
    Extension(pg): Extension<PgPool>,
) -> Payload<DeletedRecord> {
    let deleted_id = records::delete::<PlannerTask>(&pg, student.id, id).await?;
    proceeds(DeletedRecord { deleted_id })
}
