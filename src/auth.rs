use axum::async_trait;
use axum::extract::{FromRequest, RequestParts};
use axum::headers::Cookie;
use axum::http::header::{HeaderValue, SET_COOKIE};
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Extension, Json, TypedHeader};
use chrono::{Duration, Utc};
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::Pbkdf2;
use rand::{thread_rng, Rng};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use crate::err::{Error, Success};
use crate::models::{Student, StudentSession, StudentView};

pub const SESSION_COOKIE: &str = "edutrack_sid";
const SESSION_TTL_SECS: i64 = 60 * 60 * 24;

// ---- credential store ----

pub fn hash_password(password: &str) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Pbkdf2
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, Error> {
    let hash = PasswordHash::new(password_hash)?;
    Ok(Pbkdf2.verify_password(password.as_bytes(), &hash).is_ok())
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

fn valid_email(email: &str) -> bool {
    email.len() >= 5 && email.contains('@') && email.contains('.')
}

fn valid_phone(phone: &str) -> bool {
    phone.len() >= 7
        && phone
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'))
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterStudent {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub course: Option<String>,
    pub semester: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub course: String,
    pub semester: String,
}

/// Checks fields in declaration order; the first bad one wins.
pub fn validate_registration(body: RegisterStudent) -> Result<Registration, Error> {
    let full_name = match body.full_name.as_deref().map(str::trim) {
        Some(name) if name.len() >= 3 => name.to_string(),
        _ => return Err(Error::validation("Full name is required")),
    };

    let email = match body.email.as_deref() {
        Some(raw) if valid_email(raw.trim()) => normalize_email(raw),
        _ => return Err(Error::validation("Valid email required")),
    };

    let password = match body.password {
        Some(pw) if pw.len() >= 6 => {
            if !pw.chars().any(|c| c.is_ascii_digit()) {
                return Err(Error::validation("Password must contain a number"));
            }
            pw
        }
        _ => return Err(Error::validation("Password must be at least 6 chars")),
    };

    let phone = body
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string);
    if let Some(p) = &phone {
        if !valid_phone(p) {
            return Err(Error::validation("Valid phone required"));
        }
    }

    let course = match body.course.as_deref().map(str::trim) {
        Some(c) if !c.is_empty() => c.to_string(),
        _ => return Err(Error::validation("Course required")),
    };
    let semester = match body.semester.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => return Err(Error::validation("Semester required")),
    };

    Ok(Registration {
        full_name,
        email,
        password,
        phone,
        course,
        semester,
    })
}

// ---- session manager ----

pub fn new_session_token() -> String {
    let token_bytes: [u8; 32] = thread_rng().gen();
    let mut hasher: Sha256 = Digest::new();
    hasher.update(token_bytes);
    hex::encode(hasher.finalize())
}

pub fn session_cookie(token: &str) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, SESSION_TTL_SECS
    )
}

pub fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

fn with_cookie(cookie: &str, body: impl IntoResponse) -> Response {
    let mut response = body.into_response();
    if let Ok(value) = HeaderValue::from_str(cookie) {
        response.headers_mut().insert(SET_COOKIE, value);
    }
    response
}

/// Inserts a session row holding the denormalized snapshot and returns the
/// opaque token. Fixed 24h window, no sliding extension.
pub async fn establish_session(pg: &PgPool, student: &StudentView) -> Result<String, Error> {
    let token = new_session_token();
    let expires_at = Utc::now() + Duration::seconds(SESSION_TTL_SECS);
    sqlx::query(
        "INSERT INTO sessions (token, student_id, student, expires_at) VALUES ($1, $2, $3, $4)",
    )
    .bind(&token)
    .bind(student.id)
    .bind(sqlx::types::Json(student))
    .bind(expires_at)
    .execute(pg)
    .await?;
    Ok(token)
}

/// Looks up the session for a cookie token. "Not logged in" is a value,
/// not an error; expired rows are deleted on sight and resolve as absent.
pub async fn resolve_session(pg: &PgPool, token: &str) -> Result<Option<StudentView>, Error> {
    if token.is_empty() {
        return Ok(None);
    }
    let session =
        sqlx::query_as::<_, StudentSession>("SELECT * FROM sessions WHERE token = $1 LIMIT 1")
            .bind(token)
            .fetch_optional(pg)
            .await?;
    let session = match session {
        Some(session) => session,
        None => return Ok(None),
    };
    if Utc::now() > session.expires_at {
        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(pg)
            .await?;
        return Ok(None);
    }
    Ok(Some(session.student.0))
}

/// Idempotent: dropping an unknown or already-dropped token is fine.
pub async fn drop_session(pg: &PgPool, token: &str) -> Result<(), Error> {
    sqlx::query("DELETE FROM sessions WHERE token = $1")
        .bind(token)
        .execute(pg)
        .await?;
    Ok(())
}

// ---- extractors ----

/// Resolves the session if there is one. Never rejects for absence.
pub struct MaybeStudent(pub Option<StudentView>);

/// Requires a session; API routes get a 401 JSON error otherwise.
pub struct CurrentStudent(pub StudentView);

/// Requires a session; page routes get redirected to the login page.
pub struct PageStudent(pub StudentView);

pub struct LoginRedirect;

impl IntoResponse for LoginRedirect {
    fn into_response(self) -> Response {
        Redirect::to("/pages/login.html").into_response()
    }
}

#[async_trait]
impl<B> FromRequest<B> for MaybeStudent
where
    B: Send,
{
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let Extension(pg) = Extension::<PgPool>::from_request(req)
            .await
            .map_err(|_| Error::internal("Extension", "Database pool missing"))?;
        let token = Option::<TypedHeader<Cookie>>::from_request(req)
            .await
            .ok()
            .flatten()
            .and_then(|jar| jar.get(SESSION_COOKIE).map(str::to_string));
        match token {
            Some(token) => Ok(MaybeStudent(resolve_session(&pg, &token).await?)),
            None => Ok(MaybeStudent(None)),
        }
    }
}

#[async_trait]
impl<B> FromRequest<B> for CurrentStudent
where
    B: Send,
{
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let MaybeStudent(student) = MaybeStudent::from_request(req).await?;
        student
            .map(CurrentStudent)
            .ok_or_else(Error::not_authenticated)
    }
}

#[async_trait]
impl<B> FromRequest<B> for PageStudent
where
    B: Send,
{
    type Rejection = LoginRedirect;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        match MaybeStudent::from_request(req).await {
            Ok(MaybeStudent(Some(student))) => Ok(PageStudent(student)),
            _ => Err(LoginRedirect),
        }
    }
}

// ---- handlers ----

#[derive(Debug, Clone, Serialize)]
pub struct AuthRedirect {
    redirect: &'static str,
}

pub async fn register(
    Json(body): Json<RegisterStudent>,
    Extension(pg): Extension<PgPool>,
) -> Result<Response, Error> {
    let registration = validate_registration(body)?;

    let existing = sqlx::query_as::<_, (i64,)>("SELECT id FROM students WHERE email = $1 LIMIT 1")
        .bind(&registration.email)
        .fetch_optional(&pg)
        .await?;
    if existing.is_some() {
        return Err(Error::Duplicate {
            message: "Email already registered. Please login.".to_string(),
        });
    }

    let password_hash = hash_password(&registration.password)?;
    // Unique-violation in the race window still surfaces as a 409 via the
    // sqlx error mapping.
    let student = sqlx::query_as::<_, StudentView>(
        "INSERT INTO students (full_name, email, password_hash, phone, course, semester) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING id, full_name, email, phone, course, semester",
    )
    .bind(&registration.full_name)
    .bind(&registration.email)
    .bind(&password_hash)
    .bind(&registration.phone)
    .bind(&registration.course)
    .bind(&registration.semester)
    .fetch_one(&pg)
    .await?;

    // Auto-login after registration.
    let token = establish_session(&pg, &student).await?;
    Ok(with_cookie(
        &session_cookie(&token),
        Json(Success::of(AuthRedirect {
            redirect: "/pages/index.html",
        })),
    ))
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginStudent {
    pub email: Option<String>,
    pub password: Option<String>,
}

pub async fn login(
    Json(body): Json<LoginStudent>,
    Extension(pg): Extension<PgPool>,
) -> Result<Response, Error> {
    let email = match body.email.as_deref() {
        Some(raw) if valid_email(raw.trim()) => normalize_email(raw),
        _ => return Err(Error::validation("Valid email required")),
    };
    let password = match body.password {
        Some(pw) if !pw.is_empty() => pw,
        _ => return Err(Error::validation("Password is required")),
    };

    let student =
        sqlx::query_as::<_, Student>("SELECT * FROM students WHERE email = $1 LIMIT 1")
            .bind(&email)
            .fetch_optional(&pg)
            .await?;
    let student = match student {
        Some(student) => student,
        None => {
            return Err(Error::NotRegistered {
                message: "Not registered. Please sign up.".to_string(),
            })
        }
    };

    if !verify_password(&password, &student.password_hash)? {
        return Err(Error::InvalidCredentials {
            message: "Invalid credentials.".to_string(),
        });
    }

    let view = StudentView::from(&student);
    let token = establish_session(&pg, &view).await?;
    Ok(with_cookie(
        &session_cookie(&token),
        Json(Success::of(AuthRedirect {
            redirect: "/pages/index.html",
        })),
    ))
}

pub async fn logout(
    cookies: Option<TypedHeader<Cookie>>,
    Extension(pg): Extension<PgPool>,
) -> Result<Response, Error> {
    if let Some(token) = cookies.as_ref().and_then(|jar| jar.get(SESSION_COOKIE)) {
        drop_session(&pg, token).await?;
    }
    Ok(with_cookie(
        &clear_session_cookie(),
        Json(Success::of(AuthRedirect {
            redirect: "/pages/login.html",
        })),
    ))
}

pub async fn me(MaybeStudent(student): MaybeStudent) -> Json<serde_json::Value> {
    match student {
        Some(student) => Json(serde_json::json!({ "ok": true, "student": student })),
        None => Json(serde_json::json!({ "ok": false })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration_body() -> RegisterStudent {
        RegisterStudent {
            full_name: Some("Jane Doe".to_string()),
            email: Some("jane@x.com".to_string()),
            password: Some("abc123".to_string()),
            phone: None,
            course: Some("CS".to_string()),
            semester: Some("3".to_string()),
        }
    }

    #[test]
    fn password_hash_verifies_and_rejects_mutations() {
        let hash = hash_password("abc123").unwrap();
        assert_ne!(hash, "abc123");
        assert!(verify_password("abc123", &hash).unwrap());
        assert!(!verify_password("abc124", &hash).unwrap());
        assert!(!verify_password("Abc123", &hash).unwrap());
    }

    #[test]
    fn malformed_stored_hash_is_an_internal_fault() {
        // A corrupt hash is a server problem, not bad credentials.
        let err = verify_password("abc123", "not-a-phc-string").unwrap_err();
        assert!(matches!(err, Error::Internal { .. }));
    }

    #[test]
    fn salts_make_hashes_unique() {
        let a = hash_password("abc123").unwrap();
        let b = hash_password("abc123").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn session_tokens_are_opaque_hex() {
        let token = new_session_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, new_session_token());
    }

    #[test]
    fn session_cookie_is_http_only_and_lax() {
        let cookie = session_cookie("deadbeef");
        assert!(cookie.starts_with("edutrack_sid=deadbeef;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=86400"));

        let cleared = clear_session_cookie();
        assert!(cleared.contains("Max-Age=0"));
    }

    #[test]
    fn registration_normalizes_email() {
        let mut body = registration_body();
        body.email = Some("  Jane@X.COM ".to_string());
        let reg = validate_registration(body).unwrap();
        assert_eq!(reg.email, "jane@x.com");
    }

    #[test]
    fn registration_rejects_in_field_order() {
        let mut body = registration_body();
        body.full_name = Some("JD".to_string());
        assert_eq!(
            validate_registration(body).unwrap_err().message(),
            "Full name is required"
        );

        let mut body = registration_body();
        body.email = Some("not-an-email".to_string());
        assert_eq!(
            validate_registration(body).unwrap_err().message(),
            "Valid email required"
        );

        let mut body = registration_body();
        body.password = Some("a1".to_string());
        assert_eq!(
            validate_registration(body).unwrap_err().message(),
            "Password must be at least 6 chars"
        );

        let mut body = registration_body();
        body.password = Some("abcdef".to_string());
        assert_eq!(
            validate_registration(body).unwrap_err().message(),
            "Password must contain a number"
        );

        let mut body = registration_body();
        body.course = None;
        assert_eq!(
            validate_registration(body).unwrap_err().message(),
            "Course required"
        );

        let mut body = registration_body();
        body.semester = Some("  ".to_string());
        assert_eq!(
            validate_registration(body).unwrap_err().message(),
            "Semester required"
        );
    }

    #[test]
    fn blank_phone_is_treated_as_absent() {
        let mut body = registration_body();
        body.phone = Some("".to_string());
        assert_eq!(validate_registration(body).unwrap().phone, None);

        let mut body = registration_body();
        body.phone = Some("+1 (555) 123-4567".to_string());
        assert!(validate_registration(body).unwrap().phone.is_some());

        let mut body = registration_body();
        body.phone = Some("abc".to_string());
        assert_eq!(
            validate_registration(body).unwrap_err().message(),
            "Valid phone required"
        );
    }
}
