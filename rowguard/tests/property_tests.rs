//! Property-based tests for validation, naming, and persistence.

use proptest::prelude::*;
use rowguard::prelude::*;
use rowguard::rules::normalize_name;
use serde_json::{json, Value};

fn valid_spec(column: &str) -> Value {
    json!({
        "criticality": "warn",
        "check": {"function": "is_not_null", "arguments": {"col_name": column}}
    })
}

fn invalid_specs() -> Vec<Value> {
    vec![
        json!({"check": {"function": "no_such_function"}}),
        json!({"criticality": "fatal", "check": {"function": "is_not_null", "arguments": {"col_name": "x"}}}),
        json!({"criticality": "error"}),
    ]
}

proptest! {
    /// Shuffling a spec batch never changes how many errors are detected,
    /// and every invalid spec is always reported.
    #[test]
    fn validation_is_order_independent(indices in proptest::sample::subsequence(vec![0usize, 1, 2], 0..=3), shuffle_seed in 0u64..100) {
        let mut specs: Vec<Value> = vec![valid_spec("a"), valid_spec("b")];
        let bad = invalid_specs();
        for i in &indices {
            specs.push(bad[*i].clone());
        }

        let baseline = validate_checks(&specs, None).errors().len();
        prop_assert_eq!(baseline, indices.len());

        // Deterministic pseudo-shuffle.
        let mut shuffled = specs.clone();
        let len = shuffled.len();
        for i in 0..len {
            let j = (shuffle_seed as usize + i * 7) % len;
            shuffled.swap(i, j);
        }
        let reshuffled = validate_checks(&shuffled, None).errors().len();
        prop_assert_eq!(reshuffled, baseline);
    }

    /// Normalized names are identifier-safe and normalization is
    /// idempotent.
    #[test]
    fn normalize_name_is_identifier_safe(raw in ".{0,40}") {
        let name = normalize_name(&raw);
        prop_assert!(name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
        prop_assert!(!name.starts_with('_'));
        prop_assert!(!name.ends_with('_'));
        prop_assert_eq!(normalize_name(&name), name);
    }

    /// Saving and reloading a spec list returns a deep-equal list, in
    /// both YAML and JSON renderings.
    #[test]
    fn storage_round_trips(columns in proptest::collection::vec("[a-z]{1,8}", 1..6)) {
        let specs: Vec<Value> = columns.iter().map(|c| valid_spec(c)).collect();
        let dir = tempfile::tempdir().unwrap();

        let yaml_path = dir.path().join("checks.yml");
        save_checks_to_file(&yaml_path, &specs).unwrap();
        prop_assert_eq!(&load_checks_from_file(&yaml_path).unwrap(), &specs);

        let json_path = dir.path().join("checks.json");
        save_checks_to_file(&json_path, &specs).unwrap();
        prop_assert_eq!(&load_checks_from_file(&json_path).unwrap(), &specs);
    }

    /// Expanding a col_names spec yields one rule per column, in order,
    /// all sharing the spec's criticality.
    #[test]
    fn col_names_expansion_is_order_preserving(columns in proptest::collection::vec("[a-z]{1,8}", 1..6)) {
        let spec = json!({
            "criticality": "warn",
            "check": {"function": "is_not_null", "arguments": {"col_names": columns.clone()}}
        });
        let rules = DqEngine::build_checks_by_metadata(&[spec], None).unwrap();
        prop_assert_eq!(rules.len(), columns.len());
        for (rule, column) in rules.iter().zip(&columns) {
            prop_assert_eq!(rule.column(), Some(column.as_str()));
            prop_assert_eq!(rule.criticality_str(), "warn");
        }
    }
}
