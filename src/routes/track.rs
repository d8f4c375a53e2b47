//! Open/click tracking handlers
//!
//! These serve email clients, so they degrade rather than error: the
//! pixel always renders and the click always redirects when the target is
//! well-formed, even for unknown send ids.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::services::AppState;

/// 1x1 transparent GIF
const PIXEL: [u8; 43] = [
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

pub async fn track_open(
    State(state): State<AppState>,
    Path(send_id): Path<Uuid>,
) -> impl IntoResponse {
    // Never fail the pixel; an unknown id is a zero-row update.
    if let Err(e) = state.repo.record_open(send_id).await {
        tracing::debug!(send_id = %send_id, error = %e, "Failed to record open");
    } else {
        metrics::counter!("newsdesk_opens_total").increment(1);
    }

    (
        [
            (header::CONTENT_TYPE, "image/gif"),
            (header::CACHE_CONTROL, "no-store, max-age=0"),
        ],
        PIXEL.as_slice(),
    )
}

#[derive(Deserialize)]
pub struct ClickParams {
    pub url: Option<String>,
}

pub async fn track_click(
    State(state): State<AppState>,
    Path(send_id): Path<Uuid>,
    Query(params): Query<ClickParams>,
) -> Result<impl IntoResponse, AppError> {
    let target = params
        .url
        .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
        .ok_or_else(|| AppError::ValidationError("missing or non-http url".to_string()))?;

    if let Err(e) = state.repo.record_click(send_id).await {
        tracing::debug!(send_id = %send_id, error = %e, "Failed to record click");
    } else {
        metrics::counter!("newsdesk_clicks_total").increment(1);
    }

    Ok(found(target))
}

/// 302 Found redirect
fn found(target: String) -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, target)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn test_click_redirect_is_302() {
        let response = found("https://news.example.com/articles/x".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "https://news.example.com/articles/x"
        );
    }
}
