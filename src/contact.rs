//! Public contact form. Keeps the frontend's `success`/`message` response
//! shape instead of the API's `ok` envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use sqlx::PgPool;

#[derive(Debug, Deserialize)]
pub struct ContactMessage {
    pub name: Option<String>,
    pub email: Option<String>,
    pub message: Option<String>,
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn contact_response(status: StatusCode, success: bool, message: &str) -> Response {
    (
        status,
        Json(serde_json::json!({ "success": success, "message": message })),
    )
        .into_response()
}

pub async fn submit(
    Extension(pg): Extension<PgPool>,
    Json(body): Json<ContactMessage>,
) -> Response {
    let (name, email, message) = match (clean(body.name), clean(body.email), clean(body.message)) {
        (Some(name), Some(email), Some(message)) => (name, email, message),
        _ => {
            return contact_response(
                StatusCode::BAD_REQUEST,
                false,
                "All fields are required.",
            )
        }
    };

    let result = sqlx::query("INSERT INTO contacts (name, email, message) VALUES ($1, $2, $3)")
        .bind(&name)
        .bind(&email)
        .bind(&message)
        .execute(&pg)
        .await;
    match result {
        Ok(_) => contact_response(StatusCode::OK, true, "Message sent successfully!"),
        Err(err) => {
            log::error!("Contact form error: {:?}", err);
            contact_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                false,
                "Server error. Please try again.",
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_rejects_blank_values() {
        assert_eq!(clean(Some("  ".to_string())), None);
        assert_eq!(clean(None), None);
        assert_eq!(clean(Some(" hi ".to_string())), Some("hi".to_string()));
    }

    #[test]
    fn responses_carry_success_flag() {
        let response = contact_response(StatusCode::BAD_REQUEST, false, "All fields are required.");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let response = contact_response(StatusCode::OK, true, "Message sent successfully!");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
