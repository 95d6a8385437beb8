// SPDX-FileCopyrightText: 2026 Autosizer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers.
//!
//! Handles GET /healthz, POST /api/generate, POST /api/chat, and forwards
//! everything else to the backend.

use autosizer_core::types::GenerationRequest;
use autosizer_core::{AutosizerError, InterceptedResponse};
use axum::{
    body::Body,
    extract::State,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderMap, HeaderValue, Method, StatusCode, Uri,
    },
    response::Response,
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::debug;

use crate::error::ApiError;
use crate::server::GatewayState;
use crate::upstream::relay_stream;

/// Response body for GET /healthz.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    /// Backend base URL requests are forwarded to.
    pub target: String,
}

/// GET /healthz
pub async fn healthz(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        target: state.upstream.base_url().to_string(),
    })
}

/// POST /api/generate
pub async fn post_generate(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request = GenerationRequest::from_slice(&body);
    dispatch(&state, "/api/generate", request, &headers).await
}

/// POST /api/chat
///
/// The configured interceptor, if any, gets the first look at the request.
pub async fn post_chat(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request = GenerationRequest::from_slice(&body);

    if let Some(interceptor) = &state.interceptor
        && let Some(reply) = interceptor.intercept(&request).await
    {
        debug!(interceptor = interceptor.name(), "chat request intercepted");
        return intercepted(reply).map_err(ApiError::from);
    }

    dispatch(&state, "/api/chat", request, &headers).await
}

/// Any other method and path: forwarded to the backend as-is.
pub async fn passthrough(
    State(state): State<GatewayState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());
    let response = state
        .upstream
        .forward(method, path_and_query, &headers, body)
        .await?;
    Ok(relay_stream(response))
}

async fn dispatch(
    state: &GatewayState,
    path: &str,
    request: GenerationRequest,
    headers: &HeaderMap,
) -> Result<Response, ApiError> {
    let planned = state.planner.prepare(request);

    let response = state
        .upstream
        .post_model(path, &planned.body, headers.get(AUTHORIZATION))
        .await?;

    if planned.stream {
        Ok(relay_stream(response))
    } else {
        Ok(state
            .upstream
            .relay_buffered(response, planned.trim_plan.as_ref())
            .await?)
    }
}

fn intercepted(reply: InterceptedResponse) -> Result<Response, AutosizerError> {
    let status = StatusCode::from_u16(reply.status)
        .map_err(|e| AutosizerError::Internal(format!("interceptor returned bad status: {e}")))?;
    let content_type = HeaderValue::from_str(&reply.content_type).map_err(|e| {
        AutosizerError::Internal(format!("interceptor returned bad content type: {e}"))
    })?;

    let mut response = Response::new(Body::from(reply.body));
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, content_type);
    Ok(response)
}
