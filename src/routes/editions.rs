//! Edition pipeline handlers: assemble, generate, preview, send

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::errors::AppError;
use crate::services::AppState;

#[derive(Deserialize)]
pub struct AssembleRequest {
    /// Defaults to today (UTC)
    pub edition_date: Option<NaiveDate>,
}

#[derive(Serialize)]
pub struct AssembleResponse {
    pub edition_id: Uuid,
    pub edition_date: NaiveDate,
    pub status: String,
}

#[instrument(skip(state, payload))]
pub async fn assemble_edition(
    State(state): State<AppState>,
    Json(payload): Json<AssembleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let date = payload
        .edition_date
        .unwrap_or_else(|| chrono::Utc::now().date_naive());

    let edition = state.assembler.assemble(date).await?;

    Ok((
        StatusCode::CREATED,
        Json(AssembleResponse {
            edition_id: edition.id,
            edition_date: edition.edition_date,
            status: edition.status,
        }),
    ))
}

#[derive(Serialize)]
pub struct StoryView {
    pub position: i32,
    pub article_id: Uuid,
    pub title: String,
    pub category: String,
    pub summary: Option<String>,
}

#[derive(Serialize)]
pub struct EditionResponse {
    #[serde(flatten)]
    pub edition: crate::db::models::Edition,
    pub stories: Vec<StoryView>,
}

#[instrument(skip(state))]
pub async fn get_edition(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let edition = state
        .repo
        .find_edition(id)
        .await?
        .ok_or_else(|| crate::not_found!("edition", id))?;

    let stories = state
        .repo
        .stories_with_articles(id)
        .await?
        .into_iter()
        .filter_map(|(story, article)| {
            let article = article?;
            Some(StoryView {
                position: story.position,
                article_id: article.id,
                title: article.title,
                category: article.category,
                summary: story.summary,
            })
        })
        .collect();

    Ok(Json(EditionResponse { edition, stories }))
}

#[instrument(skip(state))]
pub async fn generate_content(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let report = state.generator.generate(id).await?;
    Ok(Json(report))
}

#[instrument(skip(state))]
pub async fn preview_edition(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let html = state.sender.render_preview(id).await?;
    Ok(Html(html))
}

#[derive(Deserialize, Default)]
pub struct SendRequest {
    /// When set, deliver a single test email instead of the real batch
    pub test_email: Option<String>,
}

#[instrument(skip(state, payload))]
pub async fn send_edition(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SendRequest>,
) -> Result<impl IntoResponse, AppError> {
    let report = state.sender.send_edition(id, payload.test_email).await?;
    Ok(Json(report))
}
