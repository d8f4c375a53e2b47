pub mod editions;
pub mod health;
pub mod subscribers;
pub mod track;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::middleware as app_middleware;
use crate::metrics;
use crate::services::AppState;

pub fn create_router(state: AppState) -> anyhow::Result<Router> {
    let metrics_router = metrics::setup_metrics()?;

    // Admin routes (bearer auth)
    let admin_routes = Router::new()
        .route("/editions/assemble", post(editions::assemble_edition))
        .route("/editions/{id}", get(editions::get_edition))
        .route("/editions/{id}/generate", post(editions::generate_content))
        .route("/editions/{id}/preview", get(editions::preview_edition))
        .route("/editions/{id}/send", post(editions::send_edition))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            app_middleware::require_admin,
        ));

    // Public routes: health, tracking, subscriber lifecycle
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/readiness", get(health::readiness_check))
        .route("/track/open/{send_id}", get(track::track_open))
        .route("/track/click/{send_id}", get(track::track_click))
        .route("/subscribers", post(subscribers::subscribe))
        .route("/subscribers/confirm/{token}", get(subscribers::confirm))
        .route(
            "/subscribers/unsubscribe/{token}",
            get(subscribers::unsubscribe),
        );

    // Email clients and the admin UI hit this from anywhere
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = Router::new()
        .merge(admin_routes)
        .merge(public_routes)
        .merge(metrics_router)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TimeoutLayer::new(state.config.request_timeout()))
                .layer(ConcurrencyLimitLayer::new(
                    state.config.server.max_concurrent_requests,
                ))
                .layer(cors),
        )
        .with_state(state);

    Ok(router)
}
