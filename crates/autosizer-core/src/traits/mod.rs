// SPDX-FileCopyrightText: 2026 Autosizer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Extension-point traits consumed by the gateway.
//!
//! Implementations live outside this workspace and are wired in by the
//! embedding binary.

pub mod interceptor;

pub use interceptor::{ChatInterceptor, InterceptedResponse};
