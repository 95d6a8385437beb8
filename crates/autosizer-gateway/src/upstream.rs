// SPDX-FileCopyrightText: 2026 Autosizer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the inference backend and relaying of its replies.

use std::time::Duration;

use autosizer_config::model::UpstreamConfig;
use autosizer_core::types::{GenerationRequest, TrimPlan};
use autosizer_core::AutosizerError;
use autosizer_finisher::{finish_json_body, repair_ndjson_stream};
use axum::{
    body::Body,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE},
        HeaderMap, HeaderValue, Method,
    },
    response::Response,
};
use bytes::Bytes;
use tracing::debug;

/// Headers never copied between the client and backend connections.
const HOP_BY_HOP: &[&str] = &["connection", "transfer-encoding"];

/// Client for the Ollama-compatible backend.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: String,
    read_timeout: Duration,
}

impl UpstreamClient {
    /// Build a client with the configured connect and read timeouts.
    pub fn new(config: &UpstreamConfig) -> Result<Self, AutosizerError> {
        let read_timeout = Duration::from_secs(config.read_timeout_secs);
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(read_timeout)
            .build()
            .map_err(|e| AutosizerError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            read_timeout,
        })
    }

    /// The backend base URL, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path_and_query: &str) -> String {
        format!("{}{}", self.base_url, path_and_query)
    }

    /// POST a planned model request as JSON.
    pub async fn post_model(
        &self,
        path: &str,
        body: &GenerationRequest,
        authorization: Option<&HeaderValue>,
    ) -> Result<reqwest::Response, AutosizerError> {
        let mut request = self
            .client
            .post(self.url(path))
            .header(ACCEPT, "application/json")
            .json(body.as_map());
        if let Some(auth) = authorization {
            request = request.header(AUTHORIZATION, auth.clone());
        }

        let response = request.send().await.map_err(|e| self.map_error(e))?;
        debug!(path, status = %response.status(), "backend responded");
        Ok(response)
    }

    /// Forward an arbitrary request unchanged, minus `Host` and hop-by-hop headers.
    pub async fn forward(
        &self,
        method: Method,
        path_and_query: &str,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<reqwest::Response, AutosizerError> {
        let mut forwarded = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            if name == "host" || HOP_BY_HOP.contains(&name.as_str()) {
                continue;
            }
            forwarded.append(name.clone(), value.clone());
        }

        let response = self
            .client
            .request(method, self.url(path_and_query))
            .headers(forwarded)
            .body(body)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;
        debug!(path = path_and_query, status = %response.status(), "passthrough responded");
        Ok(response)
    }

    fn map_error(&self, err: reqwest::Error) -> AutosizerError {
        if err.is_timeout() {
            AutosizerError::Timeout {
                duration: self.read_timeout,
            }
        } else {
            AutosizerError::Upstream {
                message: format!("backend request failed: {err}"),
                source: Some(Box::new(err)),
            }
        }
    }

    /// Buffer a non-streaming reply and run the JSON finishers over it.
    pub async fn relay_buffered(
        &self,
        response: reqwest::Response,
        plan: Option<&TrimPlan>,
    ) -> Result<Response, AutosizerError> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| self.map_error(e))?;

        let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
        let (body, rewritten) = match finish_json_body(content_type, &body, plan) {
            Some(finished) => (Bytes::from(finished), true),
            None => (body, false),
        };

        let mut relayed = Response::new(Body::from(body));
        *relayed.status_mut() = status;
        copy_headers(&headers, relayed.headers_mut(), rewritten);
        Ok(relayed)
    }
}

/// Relay a reply as a stream, repairing a length cut-off at its end.
pub fn relay_stream(response: reqwest::Response) -> Response {
    let status = response.status();
    let headers = response.headers().clone();
    let lines = repair_ndjson_stream(Box::pin(response.bytes_stream()));

    let mut relayed = Response::new(Body::from_stream(lines));
    *relayed.status_mut() = status;
    copy_headers(&headers, relayed.headers_mut(), true);
    relayed
}

fn copy_headers(from: &HeaderMap, to: &mut HeaderMap, drop_length: bool) {
    for (name, value) in from {
        if HOP_BY_HOP.contains(&name.as_str()) || (drop_length && name == CONTENT_LENGTH) {
            continue;
        }
        to.append(name.clone(), value.clone());
    }
}
