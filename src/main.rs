pub mod auth;
pub mod chat;
pub mod config;
pub mod contact;
pub mod db;
pub mod diary;
pub mod err;
pub mod models;
pub mod planner;
pub mod records;
pub mod scores;

use std::net::SocketAddr;

use axum::handler::Handler;
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use serde::Serialize;

use crate::chat::ChatRelay;
use crate::config::Config;
use crate::err::{Error, Success};

pub type Payload<T> = Result<Json<Success<T>>, Error>;

pub fn proceeds<V>(value: V) -> Payload<V>
where
    V: Serialize,
{
    Ok(Json(Success::of(value)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env()?;
    let pg = db::connect(&config.database_url).await?;
    db::prepare_schema(&pg).await?;
    let relay = ChatRelay::new(config.groq_api_key.clone());

    let app = Router::new()
        .route("/api/register", post(auth::register))
        .route("/api/login", post(auth::login))
        .route("/api/logout", post(auth::logout))
        .route("/api/me", get(auth::me))
        .route("/api/scores", get(scores::list_scores).post(scores::create_score))
        .route(
            "/api/scores/:id",
            put(scores::update_score).delete(scores::delete_score),
        )
        .route("/api/planner", get(planner::list_tasks).post(planner::create_task))
        .route(
            "/api/planner/:id",
            put(planner::update_task).delete(planner::delete_task),
        )
        .route("/diary", get(diary::diary_page).post(diary::create_entry))
        .route("/diary/update/:id", post(diary::update_entry))
        .route("/diary/delete/:id", post(diary::delete_entry))
        .route("/api/chat", post(chat::chat))
        .route("/contact", post(contact::submit))
        .fallback(err::handler404.into_service())
        .layer(Extension(pg))
        .layer(Extension(relay));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    log::info!("Starting EduTrack HTTP server on http://{}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}
