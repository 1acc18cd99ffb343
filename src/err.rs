use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;

use serde::Serialize;
use serde_json::Value;

pub async fn handler404(path: Uri) -> Error {
    Error::NotFound {
        message: format!("Invalid path: {}", path),
    }
}

/// Successful JSON envelope: `{"ok": true, ...value}`.
#[derive(Debug, Clone, Serialize)]
pub struct Success<V> {
    ok: bool,
    #[serde(flatten)]
    value: V,
}

impl<V: Serialize> Success<V> {
    pub fn of(value: V) -> Self {
        Self { ok: true, value }
    }
}

impl<V: Serialize> IntoResponse for Success<V> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "error")]
pub enum Error {
    Validation { message: String },
    NotAuthenticated { message: String },
    NotRegistered { message: String },
    InvalidCredentials { message: String },
    Forbidden { message: String },
    NotFound { message: String },
    Duplicate { message: String },
    Internal { kind: &'static str, message: String },
}

impl Error {
    pub fn validation<S: Into<String>>(msg: S) -> Error {
        Error::Validation {
            message: msg.into(),
        }
    }

    pub fn missing_field(field: &str) -> Error {
        Error::Validation {
            message: format!("Missing required field: {}", field),
        }
    }

    pub fn not_authenticated() -> Error {
        Error::NotAuthenticated {
            message: "Not authenticated".to_string(),
        }
    }

    pub fn forbidden() -> Error {
        Error::Forbidden {
            message: "Forbidden".to_string(),
        }
    }

    pub fn not_found() -> Error {
        Error::NotFound {
            message: "Not found".to_string(),
        }
    }

    pub fn internal(kind: &'static str, msg: &str) -> Error {
        Error::Internal {
            kind,
            message: msg.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::NotAuthenticated { .. }
            | Error::NotRegistered { .. }
            | Error::InvalidCredentials { .. } => StatusCode::UNAUTHORIZED,
            Error::Forbidden { .. } => StatusCode::FORBIDDEN,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Duplicate { .. } => StatusCode::CONFLICT,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Error::Validation { message }
            | Error::NotAuthenticated { message }
            | Error::NotRegistered { message }
            | Error::InvalidCredentials { message }
            | Error::Forbidden { message }
            | Error::NotFound { message }
            | Error::Duplicate { message }
            | Error::Internal { message, .. } => message,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = serde_json::to_value(&self).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut body {
            map.insert("ok".to_string(), Value::Bool(false));
        }
        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            // 23505 = unique_violation
            if db.code().as_deref() == Some("23505") {
                return Error::Duplicate {
                    message: "Duplicate record".to_string(),
                };
            }
        }
        log::error!("Database error: {:?}", err);
        Error::Internal {
            kind: "DatabaseError",
            message: "Database error".to_string(),
        }
    }
}

impl From<pbkdf2::password_hash::Error> for Error {
    fn from(err: pbkdf2::password_hash::Error) -> Self {
        log::error!("Password hash error: {:?}", err);
        Error::Internal {
            kind: "HashError",
            message: "Could not process credentials".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_taxonomy() {
        assert_eq!(Error::validation("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::not_authenticated().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            Error::NotRegistered {
                message: "x".to_string()
            }
            .status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            Error::InvalidCredentials {
                message: "x".to_string()
            }
            .status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(Error::forbidden().status(), StatusCode::FORBIDDEN);
        assert_eq!(Error::not_found().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            Error::Duplicate {
                message: "x".to_string()
            }
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::internal("DatabaseError", "x").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn error_serializes_with_tag_and_message() {
        let value = serde_json::to_value(Error::missing_field("subject")).unwrap();
        assert_eq!(value["error"], "Validation");
        assert_eq!(value["message"], "Missing required field: subject");
    }

    #[test]
    fn forbidden_and_not_found_are_distinct() {
        let forbidden = serde_json::to_value(Error::forbidden()).unwrap();
        let missing = serde_json::to_value(Error::not_found()).unwrap();
        assert_ne!(forbidden["error"], missing["error"]);
    }

    #[test]
    fn success_envelope_flattens_value() {
        #[derive(Serialize)]
        struct Reply {
            redirect: &'static str,
        }

        let value = serde_json::to_value(Success::of(Reply {
            redirect: "/pages/index.html",
        }))
        .unwrap();
        assert_eq!(value["ok"], true);
        assert_eq!(value["redirect"], "/pages/index.html");
    }
}
