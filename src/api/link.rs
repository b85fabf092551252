// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The link endpoint: verify a presented assertion and bind the identity
//! it attests to an internal account.

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};

use crate::auth::RawAssertion;
use crate::error::ApiError;
use crate::models::{LinkRequest, LinkResponse};
use crate::state::AppState;

/// Request header carrying the assertion; takes precedence over the body.
pub const ID_TOKEN_HEADER: &str = "x-id-token";

/// Verify an identity assertion and link it to an account.
///
/// The assertion is taken from the `x-id-token` header or, failing that,
/// from the JSON body. The raw token is owned by this handler for the
/// duration of one call and discarded after verification.
#[utoipa::path(
    post,
    path = "/v1/link",
    tag = "Link",
    request_body = LinkRequest,
    responses(
        (status = 200, description = "Identity verified and linked", body = LinkResponse),
        (status = 400, description = "Assertion failed verification"),
        (status = 401, description = "No assertion supplied"),
        (status = 503, description = "Provider not configured, or transient failure"),
    )
)]
pub async fn link_identity(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<LinkResponse>, ApiError> {
    let Some(service) = state.link.as_ref() else {
        return Err(ApiError::not_configured());
    };

    // Header takes precedence over the body
    let token = headers
        .get(ID_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .or_else(|| {
            serde_json::from_slice::<LinkRequest>(&body)
                .ok()
                .map(|r| r.id_token)
                .filter(|t| !t.is_empty())
        });

    let Some(token) = token else {
        return Err(ApiError::missing_token());
    };

    let result = service.link(&RawAssertion::new(token)).await?;

    Ok(Json(LinkResponse {
        user: result.account.into(),
        newly_created: result.newly_created,
    }))
}
