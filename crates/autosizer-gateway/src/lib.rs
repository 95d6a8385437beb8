// SPDX-FileCopyrightText: 2026 Autosizer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Autosizer proxy.
//!
//! Accepts Ollama API calls, plans generate/chat requests against the budget
//! presets, and relays the backend's replies through the finishers. Any
//! other path is forwarded untouched.

pub mod error;
pub mod handlers;
pub mod server;
pub mod upstream;

pub use error::{ApiError, ErrorResponse};
pub use server::{build_router, start_server, GatewayState, ServerConfig};
pub use upstream::UpstreamClient;
