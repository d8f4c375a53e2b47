//! Subscriber lifecycle handlers (public)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use crate::db::models::Subscriber;
use crate::errors::AppError;
use crate::services::AppState;

#[derive(Deserialize)]
pub struct SubscribeRequest {
    pub email: String,
}

#[derive(Serialize)]
pub struct SubscribeResponse {
    pub id: Uuid,
    pub email: String,
    pub confirmed: bool,
}

impl From<Subscriber> for SubscribeResponse {
    fn from(subscriber: Subscriber) -> Self {
        Self {
            id: subscriber.id,
            email: subscriber.email,
            confirmed: subscriber.confirmed,
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn subscribe(
    State(state): State<AppState>,
    Json(payload): Json<SubscribeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = payload.email.trim().to_lowercase();
    if !is_plausible_email(&email) {
        return Err(AppError::ValidationError(format!(
            "'{}' is not an email address",
            email
        )));
    }

    // Idempotent on duplicate email
    if let Some(existing) = state.repo.find_subscriber_by_email(&email).await? {
        return Ok((StatusCode::OK, Json(SubscribeResponse::from(existing))));
    }

    let subscriber = state.repo.create_subscriber(&email).await?;
    tracing::info!(subscriber_id = %subscriber.id, "Subscriber created");

    Ok((StatusCode::CREATED, Json(SubscribeResponse::from(subscriber))))
}

#[instrument(skip(state))]
pub async fn confirm(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let subscriber = state
        .repo
        .confirm_subscriber(&token)
        .await?
        .ok_or_else(|| crate::not_found!("subscription", token))?;

    tracing::info!(subscriber_id = %subscriber.id, "Subscriber confirmed");
    Ok(Json(json!({ "status": "confirmed" })))
}

#[instrument(skip(state))]
pub async fn unsubscribe(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let subscriber = state
        .repo
        .unsubscribe_subscriber(&token)
        .await?
        .ok_or_else(|| crate::not_found!("subscription", token))?;

    tracing::info!(subscriber_id = %subscriber.id, "Subscriber unsubscribed");
    Ok(Json(json!({ "status": "unsubscribed" })))
}

fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plausible_emails() {
        assert!(is_plausible_email("reader@example.com"));
        assert!(is_plausible_email("a.b+tag@news.example.co"));
    }

    #[test]
    fn test_implausible_emails() {
        assert!(!is_plausible_email("not-an-email"));
        assert!(!is_plausible_email("@example.com"));
        assert!(!is_plausible_email("reader@nodot"));
        assert!(!is_plausible_email("reader@.com"));
    }
}
