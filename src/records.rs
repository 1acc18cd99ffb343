//! Generic store for records that belong to exactly one student.
//!
//! Scores, planner tasks and diary entries share the same access-control
//! shape: every read is filtered by the owning student id, and every
//! update/delete runs two ordered checks — does the row exist at all
//! (404), and does it belong to the caller (403). The kind-specific parts
//! (field set, validation, insert/update SQL, ordering) live behind the
//! [`OwnedRecord`] trait; the checks live here, once.

use axum::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool};

use crate::err::Error;

#[async_trait]
pub trait OwnedRecord:
    Sized + Send + Unpin + Serialize + for<'r> FromRow<'r, PgRow> + 'static
{
    /// Raw request body. All fields optional so that a missing field is a
    /// 400 naming the field, not a deserialization failure.
    type Payload: DeserializeOwned + Send + Sync + 'static;
    /// Validated, typed field set produced by [`Self::validate`].
    type Fields: Send + Sync;

    const TABLE: &'static str;
    const ORDER_BY: &'static str;

    fn validate(payload: Self::Payload) -> Result<Self::Fields, Error>;

    async fn insert(pg: &PgPool, student_id: i64, fields: Self::Fields)
        -> Result<Self, Error>;

    async fn apply_update(pg: &PgPool, id: i64, fields: Self::Fields)
        -> Result<Self, Error>;
}

/// All records owned by `student_id`, in the kind's domain order. An empty
/// result is not an error.
pub async fn list<R: OwnedRecord>(pg: &PgPool, student_id: i64) -> Result<Vec<R>, Error> {
    let sql = format!(
        "SELECT * FROM {} WHERE student_id = $1 ORDER BY {}",
        R::TABLE,
        R::ORDER_BY
    );
    sqlx::query_as::<_, R>(&sql)
        .bind(student_id)
        .fetch_all(pg)
        .await
        .map_err(Error::from)
}

/// Validates and inserts, then returns the freshly read-back row. The
/// owner id always comes from the session layer, never the payload.
pub async fn create<R: OwnedRecord>(
    pg: &PgPool,
    student_id: i64,
    payload: R::Payload,
) -> Result<R, Error> {
    let fields = R::validate(payload)?;
    R::insert(pg, student_id, fields).await
}

pub async fn update<R: OwnedRecord>(
    pg: &PgPool,
    student_id: i64,
    id: i64,
    payload: R::Payload,
) -> Result<R, Error> {
    let fields = R::validate(payload)?;
    check_owner(owner_of::<R>(pg, id).await?, student_id)?;
    R::apply_update(pg, id, fields).await
}

pub async fn delete<R: OwnedRecord>(
    pg: &PgPool,
    student_id: i64,
    id: i64,
) -> Result<i64, Error> {
    check_owner(owner_of::<R>(pg, id).await?, student_id)?;
    let sql = format!(
        "DELETE FROM {} WHERE id = $1 AND student_id = $2",
        R::TABLE
    );
    let result = sqlx::query(&sql)
        .bind(id)
        .bind(student_id)
        .execute(pg)
        .await?;
    if result.rows_affected() < 1 {
        // Deleted concurrently between the owner check and the delete.
        return Err(Error::not_found());
    }
    Ok(id)
}

async fn owner_of<R: OwnedRecord>(pg: &PgPool, id: i64) -> Result<Option<i64>, Error> {
    let sql = format!("SELECT student_id FROM {} WHERE id = $1 LIMIT 1", R::TABLE);
    let row = sqlx::query_as::<_, (i64,)>(&sql)
        .bind(id)
        .fetch_optional(pg)
        .await?;
    Ok(row.map(|(owner,)| owner))
}

/// The two ordered checks behind update/delete: a row must exist before
/// ownership is even considered, so an unknown id is 404 and someone
/// else's row is 403 — never collapsed into one.
fn check_owner(found: Option<i64>, student_id: i64) -> Result<(), Error> {
    match found {
        None => Err(Error::not_found()),
        Some(owner) if owner != student_id => Err(Error::forbidden()),
        Some(_) => Ok(()),
    }
}

// ---- shared field validation helpers ----

pub fn required_str(field: &str, value: &Option<String>) -> Result<String, Error> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(Error::missing_field(field)),
    }
}

pub fn optional_str(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn required_number(field: &str, value: Option<f64>) -> Result<f64, Error> {
    value.ok_or_else(|| Error::missing_field(field))
}

pub fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, Error> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| Error::validation(format!("Invalid date in `{}`: {}", field, raw)))
}

/// Accepts both `HH:MM:SS` and the `HH:MM` that HTML time inputs send.
pub fn parse_time(field: &str, raw: &str) -> Result<NaiveTime, Error> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| Error::validation(format!("Invalid time in `{}`: {}", field, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_record_passes_the_owner_check() {
        assert!(check_owner(Some(1), 1).is_ok());
    }

    #[test]
    fn foreign_record_is_forbidden() {
        let err = check_owner(Some(2), 1).unwrap_err();
        assert!(matches!(err, Error::Forbidden { .. }));
    }

    #[test]
    fn missing_record_is_not_found_before_ownership() {
        // Existence is checked first: an unknown id is 404 for every
        // caller, never 403.
        for student_id in [1, 2] {
            let err = check_owner(None, student_id).unwrap_err();
            assert!(matches!(err, Error::NotFound { .. }));
        }
    }

    #[test]
    fn required_str_trims_and_rejects_blank() {
        assert_eq!(
            required_str("subject", &Some("  Math ".to_string())).unwrap(),
            "Math"
        );
        let err = required_str("subject", &Some("   ".to_string())).unwrap_err();
        assert_eq!(err.message(), "Missing required field: subject");
        assert!(required_str("subject", &None).is_err());
    }

    #[test]
    fn optional_str_maps_blank_to_none() {
        assert_eq!(optional_str(&Some("".to_string())), None);
        assert_eq!(optional_str(&None), None);
        assert_eq!(
            optional_str(&Some(" notes ".to_string())),
            Some("notes".to_string())
        );
    }

    #[test]
    fn parse_date_accepts_iso_only() {
        assert_eq!(
            parse_date("exam_date", "2024-03-01").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        assert!(parse_date("exam_date", "01/03/2024").is_err());
        assert!(parse_date("exam_date", "yesterday").is_err());
    }

    #[test]
    fn parse_time_accepts_html_input_format() {
        assert_eq!(
            parse_time("time", "09:30").unwrap(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap()
        );
        assert_eq!(
            parse_time("time", "09:30:15").unwrap(),
            NaiveTime::from_hms_opt(9, 30, 15).unwrap()
        );
        assert!(parse_time("time", "9 am").is_err());
    }
}
