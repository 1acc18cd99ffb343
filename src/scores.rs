use axum::async_trait;
use axum::extract::Path;
use axum::{Extension, Json};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::auth::CurrentStudent;
use crate::err::Error;
use crate::models::Score;
use crate::records::{self, OwnedRecord};
use crate::{proceeds, Payload};

#[derive(Debug, Clone, Deserialize)]
pub struct ScorePayload {
    pub subject: Option<String>,
    pub exam_type: Option<String>,
    pub score: Option<f64>,
    pub max_score: Option<f64>,
    pub exam_date: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ScoreFields {
    pub subject: String,
    pub exam_type: String,
    pub score: f64,
    pub max_score: f64,
    pub exam_date: NaiveDate,
    pub notes: Option<String>,
}

#[async_trait]
impl OwnedRecord for Score {
    type Payload = ScorePayload;
    type Fields = ScoreFields;

    const TABLE: &'static str = "scores";
    const ORDER_BY: &'static str = "exam_date DESC, created_at DESC";

    fn validate(payload: ScorePayload) -> Result<ScoreFields, Error> {
        let subject = records::required_str("subject", &payload.subject)?;
        let exam_type = records::required_str("exam_type", &payload.exam_type)?;
        let score = records::required_number("score", payload.score)?;
        let max_score = records::required_number("max_score", payload.max_score)?;
        let exam_date = records::required_str("exam_date", &payload.exam_date)?;
        let exam_date = records::parse_date("exam_date", &exam_date)?;
        Ok(ScoreFields {
            subject,
            exam_type,
            score,
            max_score,
            exam_date,
            notes: records::optional_str(&payload.notes),
        })
    }

    async fn insert(pg: &PgPool, student_id: i64, fields: ScoreFields) -> Result<Score, Error> {
        sqlx::query_as::<_, Score>(
            "INSERT INTO scores (student_id, subject, exam_type, score, max_score, exam_date, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING *",
        )
        .bind(student_id)
        .bind(&fields.subject)
        .bind(&fields.exam_type)
        .bind(fields.score)
        .bind(fields.max_score)
        .bind(fields.exam_date)
        .bind(&fields.notes)
        .fetch_one(pg)
        .await
        .map_err(Error::from)
    }

    async fn apply_update(pg: &PgPool, id: i64, fields: ScoreFields) -> Result<Score, Error> {
        let updated = sqlx::query_as::<_, Score>(
            "UPDATE scores SET subject = $1, exam_type = $2, score = $3, max_score = $4, \
             exam_date = $5, notes = $6 WHERE id = $7 \
             RETURNING *",
        )
        .bind(&fields.subject)
        .bind(&fields.exam_type)
        .bind(fields.score)
        .bind(fields.max_score)
        .bind(fields.exam_date)
        .bind(&fields.notes)
        .bind(id)
        .fetch_optional(pg)
        .await?;
        updated.ok_or_else(Error::not_found)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreList {
    pub scores: Vec<Score>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedScore {
    pub score: Score,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeletedRecord {
    #[serde(rename = "deletedId")]
    pub deleted_id: i64,
}

pub async fn list_scores(
    CurrentStudent(student): CurrentStudent,
    Extension(pg): Extension<PgPool>,
) -> Payload<ScoreList> {
    let scores = records::list::<Score>(&pg, student.id).await?;
    proceeds(ScoreList { scores })
}

pub async fn create_score(
    CurrentStudent(student): CurrentStudent,
    Extension(pg): Extension<PgPool>,
    Json(payload): Json<ScorePayload>,
) -> Payload<SavedScore> {
    let score = records::create::<Score>(&pg, student.id, payload).await?;
    proceeds(SavedScore { score })
}

pub async fn update_score(
    CurrentStudent(student): CurrentStudent,
    Path(id): Path<i64>,
    Extension(pg): Extension<PgPool>,
    Json(payload): Json<ScorePayload>,
) -> Payload<SavedScore> {
    let score = records::update::<Score>(&pg, student.id, id, payload).await?;
    proceeds(SavedScore { score })
}

pub async fn delete_score(
    CurrentStudent(student): CurrentStudent,
    Path(id): Path<i64>,
    Extension(pg): Extension<PgPool>,
) -> Payload<DeletedRecord> {
    let deleted_id = records::delete::<Score>(&pg, student.id, id).await?;
    proceeds(DeletedRecord { deleted_id })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> ScorePayload {
        ScorePayload {
            subject: Some("Math".to_string()),
            exam_type: Some("midterm".to_string()),
            score: Some(85.0),
            max_score: Some(100.0),
            exam_date: Some("2024-03-01".to_string()),
            notes: None,
        }
    }

    #[test]
    fn full_payload_validates() {
        let fields = Score::validate(payload()).unwrap();
        assert_eq!(fields.subject, "Math");
        assert_eq!(fields.exam_date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(fields.notes, None);
    }

    #[test]
    fn first_missing_field_is_named() {
        let mut body = payload();
        body.subject = None;
        body.score = None;
        assert_eq!(
            Score::validate(body).unwrap_err().message(),
            "Missing required field: subject"
        );

        let mut body = payload();
        body.score = None;
        assert_eq!(
            Score::validate(body).unwrap_err().message(),
            "Missing required field: score"
        );

        let mut body = payload();
        body.max_score = None;
        assert_eq!(
            Score::validate(body).unwrap_err().message(),
            "Missing required field: max_score"
        );
    }

    #[test]
    fn unparseable_exam_date_is_a_validation_error() {
        let mut body = payload();
        body.exam_date = Some("03/01/2024".to_string());
        let err = Score::validate(body).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn deleted_record_uses_camel_case_key() {
        let value = serde_json::to_value(DeletedRecord { deleted_id: 7 }).unwrap();
        assert_eq!(value["deletedId"], 7);
    }
}
