// SPDX-FileCopyrightText: 2026 Autosizer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generation-budget selection for the Autosizer proxy.
//!
//! This crate provides:
//! - [`BudgetCatalog`]: read-only mode-to-preset lookup
//! - [`PromptClassifier`]: word-count classification with keyword promotion
//! - [`normalize`]: client option extraction and clamping
//! - [`ModelDowngradePolicy`]: cheaper model for small budgets
//! - [`TrimPlanner`] and [`RequestPlanner`]: the per-request pipeline
//!
//! The planner runs before every generate/chat call, bounding the backend's
//! output and context so that short questions get short, cheap answers.

pub mod catalog;
pub mod classifier;
pub mod downgrade;
pub mod options;
pub mod planner;
pub mod prompt;

pub use catalog::BudgetCatalog;
pub use classifier::{prompt_excerpt, ClassificationResult, PromptClassifier};
pub use downgrade::{DowngradeDecision, ModelDowngradePolicy};
pub use options::{clamp_options, extract_client_options, normalize};
pub use planner::{PlannedRequest, RequestPlanner, TrimPlanner};
pub use prompt::{ConcisePrompt, Injection};
