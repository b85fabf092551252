// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transport-level error responses.
//!
//! Domain errors stay typed (`VerifyError`, `StoreError`, `LinkError`)
//! through every internal layer; this module is the only place they are
//! converted to wire format. Bodies never carry token material or
//! internal identifiers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::link::LinkError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    /// Non-sensitive diagnostic code for the client
    pub diagnostic: Option<&'static str>,
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            diagnostic: None,
        }
    }

    /// 401 for requests carrying no assertion at all.
    pub fn missing_token() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Missing id token")
    }

    /// 503 for calls arriving before the provider is configured.
    pub fn not_configured() -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "Not configured")
    }
}

impl From<LinkError> for ApiError {
    fn from(e: LinkError) -> Self {
        let status = match &e {
            // Transient failures are retryable by the caller
            LinkError::Verification(v) if v.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            LinkError::StoreUnavailable(_) | LinkError::Timeout => StatusCode::SERVICE_UNAVAILABLE,
            // Integrity failures surface opaquely
            LinkError::IdentityConflict => StatusCode::INTERNAL_SERVER_ERROR,
            LinkError::Verification(_) => StatusCode::BAD_REQUEST,
        };
        let message = match &e {
            LinkError::IdentityConflict => "Internal error",
            _ => "Failed to link identity",
        };
        Self {
            status,
            message: message.to_string(),
            diagnostic: Some(e.code()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            message: self.message,
            error: self.diagnostic,
        });
        (self.status, body).into_response()
    }
}
