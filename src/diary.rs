//! Diary is the one surface served as HTML: a page listing the student's
//! entries plus form posts that redirect back to the page, in the shape the
//! frontend forms expect.

use axum::async_trait;
use axum::extract::{Form, Path};
use axum::response::{Html, Redirect};
use axum::Extension;
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::PgPool;

use crate::auth::PageStudent;
use crate::err::Error;
use crate::models::{DiaryEntry, StudentView};
use crate::records::{self, OwnedRecord};

#[derive(Debug, Clone, Deserialize)]
pub struct EntryPayload {
    pub date: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EntryFields {
    pub date: NaiveDate,
    pub title: String,
    pub description: Option<String>,
}

#[async_trait]
impl OwnedRecord for DiaryEntry {
    type Payload = EntryPayload;
    type Fields = EntryFields;

    const TABLE: &'static str = "diary";
    const ORDER_BY: &'static str = "date DESC";

    fn validate(payload: EntryPayload) -> Result<EntryFields, Error> {
        let date = records::required_str("date", &payload.date)?;
        let date = records::parse_date("date", &date)?;
        let title = records::required_str("title", &payload.title)?;
        Ok(EntryFields {
            date,
            title,
            description: records::optional_str(&payload.description),
        })
    }

    async fn insert(
        pg: &PgPool,
        student_id: i64,
        fields: EntryFields,
    ) -> Result<DiaryEntry, Error> {
        sqlx::query_as::<_, DiaryEntry>(
            "INSERT INTO diary (student_id, date, title, description) \
             VALUES ($1, $2, $3, $4) \
             RETURNING *",
        )
        .bind(student_id)
        .bind(fields.date)
        .bind(&fields.title)
        .bind(&fields.description)
        .fetch_one(pg)
        .await
        .map_err(Error::from)
    }

    async fn apply_update(pg: &PgPool, id: i64, fields: EntryFields) -> Result<DiaryEntry, Error> {
        let updated = sqlx::query_as::<_, DiaryEntry>(
            "UPDATE diary SET title = $1, description = $2, date = $3 WHERE id = $4 \
             RETURNING *",
        )
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(fields.date)
        .bind(id)
        .fetch_optional(pg)
        .await?;
        updated.ok_or_else(Error::not_found)
    }
}

pub async fn diary_page(
    PageStudent(student): PageStudent,
    Extension(pg): Extension<PgPool>,
) -> Result<Html<String>, Error> {
    let entries = records::list::<DiaryEntry>(&pg, student.id).await?;
    Ok(Html(render_diary(&student, &entries)))
}

pub async fn create_entry(
    PageStudent(student): PageStudent,
    Extension(pg): Extension<PgPool>,
    Form(payload): Form<EntryPayload>,
) -> Result<Redirect, Error> {
    records::create::<DiaryEntry>(&pg, student.id, payload).await?;
    Ok(Redirect::to("/diary"))
}

pub async fn update_entry(
    PageStudent(student): PageStudent,
    Path(id): Path<i64>,
    Extension(pg): Extension<PgPool>,
    Form(payload): Form<EntryPayload>,
) -> Result<Redirect, Error> {
    records::update::<DiaryEntry>(&pg, student.id, id, payload).await?;
    Ok(Redirect::to("/diary"))
}

pub async fn delete_entry(
    PageStudent(student): PageStudent,
    Path(id): Path<i64>,
    Extension(pg): Extension<PgPool>,
) -> Result<Redirect, Error> {
    records::delete::<DiaryEntry>(&pg, student.id, id).await?;
    Ok(Redirect::to("/diary"))
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn render_diary(student: &StudentView, entries: &[DiaryEntry]) -> String {
    let mut rows = String::new();
    for entry in entries {
        let title = escape_html(&entry.title);
        let description = escape_html(entry.description.as_deref().unwrap_or(""));
        rows.push_str(&format!(
            "<tr><td>{date}</td><td>{title}</td><td>{description}</td>\
             <td><form method='post' action='/diary/update/{id}'>\
             <input type='date' name='date' value='{date}' required> \
             <input type='text' name='title' value='{title}' required> \
             <input type='text' name='description' value='{description}'> \
             <button type='submit'>Save</button></form>\
             <form method='post' action='/diary/delete/{id}'>\
             <button type='submit'>Delete</button></form></td></tr>",
            date = entry.date,
            title = title,
            description = description,
            id = entry.id
        ));
    }
    format!(
        "<!DOCTYPE html><html><head><title>Daily Academic Diary</title></head><body>\
         <h1>Daily Academic Diary</h1>\
         <p>Signed in as {}</p>\
         <form method='post' action='/diary'>\
         <input type='date' name='date' required> \
         <input type='text' name='title' placeholder='Title' required> \
         <input type='text' name='description' placeholder='Description'> \
         <button type='submit'>Add entry</button></form>\
         <table><tr><th>Date</th><th>Title</th><th>Description</th><th></th></tr>{}</table>\
         </body></html>",
        escape_html(&student.full_name),
        rows
    )
}
