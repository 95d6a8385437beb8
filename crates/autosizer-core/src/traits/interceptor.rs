// SPDX-FileCopyrightText: 2026 Autosizer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat request interceptor trait.

use async_trait::async_trait;

use crate::types::GenerationRequest;

/// A pre-built response returned by an interceptor instead of calling the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedResponse {
    /// HTTP status code.
    pub status: u16,
    /// Value for the `Content-Type` header.
    pub content_type: String,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl InterceptedResponse {
    /// Builds a `200 OK` JSON response from a serializable value.
    pub fn json(value: &serde_json::Value) -> Self {
        Self {
            status: 200,
            content_type: "application/json".to_string(),
            body: value.to_string().into_bytes(),
        }
    }
}

/// Hook that may answer a chat request before it reaches the inference backend.
///
/// Used to route command-style chat messages (e.g. desktop automation
/// actions) to another service. Returning `None` lets the request continue
/// through the budget pipeline unchanged.
#[async_trait]
pub trait ChatInterceptor: Send + Sync + 'static {
    /// Returns the human-readable name of this interceptor.
    fn name(&self) -> &str;

    /// Inspects the chat request and optionally produces a complete response.
    async fn intercept(&self, request: &GenerationRequest) -> Option<InterceptedResponse>;
}
