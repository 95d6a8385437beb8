// SPDX-FileCopyrightText: 2026 Autosizer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only mode-to-preset lookup built once at startup.

use autosizer_config::model::BudgetConfig;
use autosizer_core::types::{BudgetMode, BudgetPreset};

/// The three generation presets, indexed by [`BudgetMode`].
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetCatalog {
    short: BudgetPreset,
    normal: BudgetPreset,
    deep: BudgetPreset,
}

impl BudgetCatalog {
    /// Build the catalog from the `[budget]` configuration section.
    pub fn from_config(config: &BudgetConfig) -> Self {
        Self {
            short: config.short.to_preset(BudgetMode::Short),
            normal: config.normal.to_preset(BudgetMode::Normal),
            deep: config.deep.to_preset(BudgetMode::Deep),
        }
    }

    /// The preset for `mode`.
    pub fn get(&self, mode: BudgetMode) -> &BudgetPreset {
        match mode {
            BudgetMode::Short => &self.short,
            BudgetMode::Normal => &self.normal,
            BudgetMode::Deep => &self.deep,
        }
    }
}

impl Default for BudgetCatalog {
    fn default() -> Self {
        Self::from_config(&BudgetConfig::default())
    }
}
