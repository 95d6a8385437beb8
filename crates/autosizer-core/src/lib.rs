// SPDX-FileCopyrightText: 2026 Autosizer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Autosizer inference proxy.
//!
//! This crate provides the error type, the request/preset/plan/stream-event
//! data model, and the extension traits used throughout the workspace.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::AutosizerError;
pub use traits::{ChatInterceptor, InterceptedResponse};
pub use types::{
    BudgetMode, BudgetPreset, ChatMessage, EffectiveOptions, FragmentField, GenerationRequest,
    MessageContent, StreamEvent, TrimPlan,
};
