//! Conversion of profiler candidates into consumable artifacts.
//!
//! Candidates become either check specifications (fed back into the
//! validation/build pipeline) or standalone named SQL predicates for
//! engines that take expectation strings.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

use crate::profiler::DqProfile;
use crate::rules::Criticality;

static EXPECTATION_SANITIZE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9]+").unwrap_or_else(|_| unreachable!()));

/// A named SQL predicate derived from one profile candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlExpectation {
    /// Sanitized expectation name (`<column>_<kind>`).
    pub name: String,
    /// Boolean SQL predicate that holds for conforming rows.
    pub expression: String,
}

/// Converts profile candidates into check specifications.
///
/// Unknown kinds are skipped with a log line rather than failing the
/// whole batch. All generated specs default to `error` criticality.
pub fn generate_checks(profiles: &[DqProfile]) -> Vec<Value> {
    let mut specs = Vec::with_capacity(profiles.len());
    for profile in profiles {
        let check = match profile.kind.as_str() {
            "is_not_null" => json!({
                "function": "is_not_null",
                "arguments": {"col_name": profile.column}
            }),
            "is_in" => json!({
                "function": "is_in_list",
                "arguments": {
                    "col_name": profile.column,
                    "allowed": parameter(profile, "in"),
                }
            }),
            "is_not_null_or_empty" => json!({
                "function": "is_not_null_and_not_empty",
                "arguments": {
                    "col_name": profile.column,
                    "trim_strings": parameter(profile, "trim_strings"),
                }
            }),
            "min_max" => json!({
                "function": "is_in_range",
                "arguments": {
                    "col_name": profile.column,
                    "min_limit": parameter(profile, "min"),
                    "max_limit": parameter(profile, "max"),
                }
            }),
            other => {
                tracing::info!(kind = other, column = %profile.column, "no check for profile kind, skipping");
                continue;
            }
        };
        let mut spec = Map::new();
        spec.insert("check".to_string(), check);
        spec.insert(
            "criticality".to_string(),
            json!(Criticality::Error.as_str()),
        );
        spec.insert("name".to_string(), json!(expectation_name(profile)));
        if let Some(description) = &profile.description {
            spec.insert("description".to_string(), json!(description));
        }
        specs.push(Value::Object(spec));
    }
    specs
}

/// Renders profile candidates as named SQL predicates.
///
/// Kinds without an SQL rendering, and renderings that come out empty,
/// are skipped with a log line.
pub fn generate_sql_expectations(profiles: &[DqProfile]) -> Vec<SqlExpectation> {
    let mut expectations = Vec::with_capacity(profiles.len());
    for profile in profiles {
        let column = &profile.column;
        let expression = match profile.kind.as_str() {
            "is_not_null" => format!("{column} is not null"),
            "is_in" => render_is_in(profile),
            "is_not_null_or_empty" => render_not_empty(profile),
            "min_max" => render_min_max(profile),
            other => {
                tracing::info!(kind = other, column = %column, "no SQL rendering for profile kind, skipping");
                continue;
            }
        };
        if expression.is_empty() {
            tracing::info!(kind = %profile.kind, column = %column, "empty expression generated, skipping");
            continue;
        }
        expectations.push(SqlExpectation {
            name: expectation_name(profile),
            expression,
        });
    }
    expectations
}

fn expectation_name(profile: &DqProfile) -> String {
    let raw = format!("{}_{}", profile.column, profile.kind);
    EXPECTATION_SANITIZE.replace_all(&raw, "_").to_string()
}

fn parameter(profile: &DqProfile, name: &str) -> Value {
    profile
        .parameters
        .as_ref()
        .and_then(|p| p.get(name))
        .cloned()
        .unwrap_or(Value::Null)
}

fn render_is_in(profile: &DqProfile) -> String {
    let values = match parameter(profile, "in") {
        Value::Array(values) => values,
        _ => return String::new(),
    };
    let rendered: Vec<String> = values.iter().map(render_sql_value).collect();
    format!("{} in ({})", profile.column, rendered.join(", "))
}

fn render_not_empty(profile: &DqProfile) -> String {
    let column = &profile.column;
    let trim = parameter(profile, "trim_strings")
        .as_bool()
        .unwrap_or(true);
    if trim {
        format!("{column} is not null and trim({column}) <> ''")
    } else {
        format!("{column} is not null and {column} <> ''")
    }
}

fn render_min_max(profile: &DqProfile) -> String {
    let column = &profile.column;
    let min = parameter(profile, "min");
    let max = parameter(profile, "max");
    match (min.is_null(), max.is_null()) {
        (false, false) => format!(
            "{column} >= {} and {column} <= {}",
            render_sql_value(&min),
            render_sql_value(&max)
        ),
        (true, false) => format!("{column} <= {}", render_sql_value(&max)),
        (false, true) => format!("{column} >= {}", render_sql_value(&min)),
        (true, true) => String::new(),
    }
}

fn render_sql_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn min_max(column: &str, min: Value, max: Value) -> DqProfile {
        DqProfile::new("min_max", column).with_parameters(BTreeMap::from([
            ("min".to_string(), min),
            ("max".to_string(), max),
        ]))
    }

    #[test]
    fn test_generate_checks_kind_mapping() {
        let profiles = vec![
            DqProfile::new("is_not_null", "a"),
            DqProfile::new("is_in", "b").with_parameters(BTreeMap::from([(
                "in".to_string(),
                json!(["x", "y"]),
            )])),
            min_max("c", json!(0), json!(10)),
            DqProfile::new("unknown_kind", "d"),
        ];
        let specs = generate_checks(&profiles);
        assert_eq!(specs.len(), 3);
        assert_eq!(specs[0]["check"]["function"], "is_not_null");
        assert_eq!(specs[0]["criticality"], "error");
        assert_eq!(specs[1]["check"]["function"], "is_in_list");
        assert_eq!(specs[1]["check"]["arguments"]["allowed"], json!(["x", "y"]));
        assert_eq!(specs[2]["check"]["function"], "is_in_range");
        assert_eq!(specs[2]["check"]["arguments"]["min_limit"], json!(0));
    }

    #[test]
    fn test_generated_checks_pass_validation() {
        let profiles = vec![
            DqProfile::new("is_not_null", "a"),
            DqProfile::new("is_not_null_or_empty", "b").with_parameters(BTreeMap::from([(
                "trim_strings".to_string(),
                json!(true),
            )])),
        ];
        let specs = generate_checks(&profiles);
        let status = crate::rules::validation::validate_checks(&specs, None);
        assert!(!status.has_errors(), "{status}");
    }

    #[test]
    fn test_sql_expectations() {
        let profiles = vec![
            DqProfile::new("is_not_null", "a"),
            DqProfile::new("is_in", "b").with_parameters(BTreeMap::from([(
                "in".to_string(),
                json!(["x", "it's"]),
            )])),
            min_max("t.s", json!("2024-01-01"), json!("2024-02-01")),
        ];
        let expectations = generate_sql_expectations(&profiles);
        assert_eq!(expectations.len(), 3);
        assert_eq!(expectations[0].name, "a_is_not_null");
        assert_eq!(expectations[0].expression, "a is not null");
        assert_eq!(expectations[1].expression, "b in ('x', 'it''s')");
        assert_eq!(expectations[2].name, "t_s_min_max");
        assert_eq!(
            expectations[2].expression,
            "t.s >= '2024-01-01' and t.s <= '2024-02-01'"
        );
    }

    #[test]
    fn test_one_sided_range() {
        let profile = min_max("a", Value::Null, json!(5));
        let expectations = generate_sql_expectations(&[profile]);
        assert_eq!(expectations[0].expression, "a <= 5");
    }

    #[test]
    fn test_not_empty_without_trim() {
        let profile = DqProfile::new("is_not_null_or_empty", "a").with_parameters(
            BTreeMap::from([("trim_strings".to_string(), json!(false))]),
        );
        let expectations = generate_sql_expectations(&[profile]);
        assert_eq!(expectations[0].expression, "a is not null and a <> ''");
    }
}
