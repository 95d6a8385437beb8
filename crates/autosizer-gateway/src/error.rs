// SPDX-FileCopyrightText: 2026 Autosizer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP mapping for [`AutosizerError`].

use autosizer_core::AutosizerError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::warn;

/// Response body for failed requests.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message.
    pub error: String,
}

/// Handler error: an [`AutosizerError`] rendered as `{"error": ...}`.
#[derive(Debug)]
pub struct ApiError(pub AutosizerError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        if self.0.is_gateway_failure() {
            StatusCode::BAD_GATEWAY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<AutosizerError> for ApiError {
    fn from(err: AutosizerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        warn!(status = status.as_u16(), error = %self.0, "request failed");
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}
