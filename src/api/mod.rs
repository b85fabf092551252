// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{AccountView, LinkRequest, LinkResponse},
    state::AppState,
};

pub mod health;
pub mod link;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new().route("/link", post(link::link_identity));

    Router::new()
        .nest("/v1", v1_routes)
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        link::link_identity,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            LinkRequest,
            LinkResponse,
            AccountView,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Link", description = "Identity assertion verification and account linking"),
        (name = "Health", description = "Service health and readiness")
    )
)]
struct ApiDoc;
