// SPDX-FileCopyrightText: 2026 Autosizer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use autosizer_config::model::{AutosizerConfig, ClassifierConfig};
use autosizer_core::types::{as_limit, BudgetMode, GenerationRequest};
use autosizer_router::{normalize, BudgetCatalog, PromptClassifier, RequestPlanner};
use proptest::prelude::*;
use serde_json::{json, Value};

fn classifier() -> PromptClassifier {
    PromptClassifier::new(Arc::new(BudgetCatalog::default()), &ClassifierConfig::default())
}

fn words(n: usize) -> String {
    vec!["lorem"; n].join(" ")
}

/// Arbitrary JSON a client might put in a limit field.
fn limit_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::from),
        (0u64..100_000).prop_map(Value::from),
        (-1e6f64..1e6).prop_map(|f| json!(f)),
        "[0-9]{1,6}".prop_map(Value::from),
        "[a-z ]{0,8}".prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        Just(Value::Null),
    ]
}

proptest! {
    #[test]
    fn retrieval_markers_always_select_deep(
        n in 0usize..200,
        marker in prop::sample::select(vec!["files", "collection", "collections"]),
    ) {
        let req = GenerationRequest::from_value(json!({
            "prompt": words(n),
            marker: ["doc"],
        }));
        prop_assert_eq!(classifier().classify(&req).mode(), BudgetMode::Deep);
    }

    #[test]
    fn word_count_bounds_the_mode(n in 0usize..200, keyword in any::<bool>()) {
        let mut text = words(n);
        if keyword && n > 0 {
            text = format!("{} explain", words(n - 1));
        }
        let req = GenerationRequest::from_value(json!({ "prompt": text }));
        let mode = classifier().classify(&req).mode();

        if n <= 12 {
            prop_assert!(matches!(mode, BudgetMode::Short | BudgetMode::Normal));
        } else if n <= 60 {
            prop_assert!(matches!(mode, BudgetMode::Normal | BudgetMode::Deep));
        } else {
            prop_assert_eq!(mode, BudgetMode::Deep);
        }
    }

    #[test]
    fn client_can_only_tighten_output_limit(
        nested in limit_value(),
        max_tokens in limit_value(),
        mode in prop::sample::select(vec![BudgetMode::Short, BudgetMode::Normal, BudgetMode::Deep]),
    ) {
        let catalog = BudgetCatalog::default();
        let preset = catalog.get(mode);
        let req = GenerationRequest::from_value(json!({
            "max_tokens": max_tokens,
            "options": { "num_predict": nested.clone() },
        }));

        let effective = normalize(&req, preset).output_limit();
        let ceiling = preset.max_output_tokens.unwrap();
        prop_assert!(effective.is_some_and(|l| l <= ceiling));

        if let Some(requested) = as_limit(&nested) {
            prop_assert!(effective.is_some_and(|l| l <= requested));
        }
    }

    #[test]
    fn planned_body_never_exceeds_preset_plus_tail(
        n in 0usize..80,
        nested in limit_value(),
        stream in any::<bool>(),
        tail in 0u64..64,
    ) {
        let mut config = AutosizerConfig::default();
        config.trim.tail_tokens = tail;
        let planner = RequestPlanner::from_config(&config);

        let planned = planner.prepare(GenerationRequest::from_value(json!({
            "prompt": words(n),
            "stream": stream,
            "options": { "num_predict": nested },
        })));

        let ceiling = planned.preset().max_output_tokens.unwrap();
        let sent = as_limit(&planned.body.as_map()["options"]["num_predict"]).unwrap();
        prop_assert!(sent <= ceiling + tail);
        prop_assert_eq!(&planned.body.as_map()["stream"], &json!(planned.stream));
    }
}
