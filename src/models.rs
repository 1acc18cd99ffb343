use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

/// Full credential row. Never serialized; the password hash stays
/// server-side.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Student {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub course: String,
    pub semester: String,
    pub created_at: DateTime<Utc>,
}

/// The snapshot held by a session and returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StudentView {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub course: String,
    pub semester: String,
}

impl From<&Student> for StudentView {
    fn from(student: &Student) -> Self {
        Self {
            id: student.id,
            full_name: student.full_name.clone(),
            email: student.email.clone(),
            phone: student.phone.clone(),
            course: student.course.clone(),
            semester: student.semester.clone(),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StudentSession {
    pub token: String,
    pub student_id: i64,
    pub student: Json<StudentView>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Score {
    pub id: i64,
    pub student_id: i64,
    pub subject: String,
    pub exam_type: String,
    pub score: f64,
    pub max_score: f64,
    pub exam_date: NaiveDate,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PlannerTask {
    pub id: i64,
    pub student_id: i64,
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub subject: Option<String>,
    pub task: String,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub status: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DiaryEntry {
    pub id: i64,
    pub student_id: i64,
    pub date: NaiveDate,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}
