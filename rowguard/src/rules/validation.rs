//! Static validation of raw check specifications.
//!
//! Specs are validated as plain JSON values before any rule object is
//! built. Errors accumulate across all specs; every invalid spec in a
//! batch is reported, with the offending spec echoed back so it can be
//! located in the source file.

use serde_json::{Map, Value};
use tracing::instrument;

use crate::checks::{CheckFunction, FunctionRegistry};
use crate::rules::ValidationStatus;

/// Validates a batch of raw check specifications against the function
/// registry and the declared parameter schemas.
///
/// Never short-circuits: all errors across all specs are accumulated
/// into the returned status, in spec order. When `overrides` is given
/// it replaces the built-in registry entirely.
#[instrument(skip_all, fields(specs = specs.len()))]
pub fn validate_checks(specs: &[Value], overrides: Option<&FunctionRegistry>) -> ValidationStatus {
    let mut status = ValidationStatus::new();
    for spec in specs {
        status.add_errors(validate_one(spec, overrides));
    }
    if status.has_errors() {
        tracing::warn!(errors = status.errors().len(), "check validation failed");
    }
    status
}

fn validate_one(spec: &Value, overrides: Option<&FunctionRegistry>) -> Vec<String> {
    let mut errors = Vec::new();

    let spec_obj = match spec.as_object() {
        Some(obj) => obj,
        None => {
            errors.push(format!("check specification should be a mapping: {spec}"));
            return errors;
        }
    };

    if let Some(criticality) = spec_obj.get("criticality") {
        let recognized = criticality
            .as_str()
            .map(|c| crate::rules::Criticality::parse(c).is_some())
            .unwrap_or(false);
        if !recognized {
            errors.push(format!("Invalid value for 'criticality' field: {spec}"));
        }
    }

    match spec_obj.get("check") {
        None => errors.push(format!("'check' field is missing: {spec}")),
        Some(check) if !check.is_object() => {
            errors.push(format!("'check' field should be a mapping: {spec}"));
        }
        Some(check) => {
            let block = check.as_object().unwrap_or_else(|| unreachable!());
            errors.extend(validate_check_block(spec, block, overrides));
        }
    }

    errors
}

fn validate_check_block(
    spec: &Value,
    block: &Map<String, Value>,
    overrides: Option<&FunctionRegistry>,
) -> Vec<String> {
    let func_name = match block.get("function").and_then(Value::as_str) {
        Some(name) => name,
        None => return vec![format!("'function' field is missing in the 'check' block: {spec}")],
    };

    let function = match FunctionRegistry::resolve(func_name, overrides, false) {
        Ok(Some(function)) => function,
        _ => return vec![format!("function '{func_name}' is not defined: {spec}")],
    };

    let arguments = block.get("arguments").cloned().unwrap_or(Value::Null);
    validate_arguments(spec, &arguments, &function)
}

fn validate_arguments(spec: &Value, arguments: &Value, function: &CheckFunction) -> Vec<String> {
    let arguments = match arguments {
        Value::Null => Map::new(),
        Value::Object(map) => map.clone(),
        _ => {
            return vec![format!(
                "'arguments' should be a mapping in the 'check' block: {spec}"
            )]
        }
    };

    // A col_names list is validated once, as if the first column were
    // passed as col_name. Expansion to per-column rules happens later.
    if let Some(col_names) = arguments.get("col_names") {
        let col_names = match col_names.as_array() {
            Some(list) => list,
            None => {
                return vec![format!(
                    "'col_names' should be a list in the 'arguments' block: {spec}"
                )]
            }
        };
        if col_names.is_empty() {
            return vec![format!(
                "'col_names' should not be empty in the 'arguments' block: {spec}"
            )];
        }
        let mut substituted = Map::new();
        for (key, value) in &arguments {
            if key == "col_names" {
                substituted.insert("col_name".to_string(), col_names[0].clone());
            } else {
                substituted.insert(key.clone(), value.clone());
            }
        }
        return validate_against_schema(spec, &substituted, function);
    }

    validate_against_schema(spec, &arguments, function)
}

fn validate_against_schema(
    spec: &Value,
    arguments: &Map<String, Value>,
    function: &CheckFunction,
) -> Vec<String> {
    let mut errors = Vec::new();
    let func_name = function.name();

    if arguments.is_empty() && function.params().iter().any(|p| p.required) {
        errors.push(format!(
            "No arguments provided for function '{func_name}' in the 'arguments' block: {spec}. \
             Expected arguments are: {}",
            format_params(function)
        ));
    }

    for (arg, value) in arguments {
        match function.params().iter().find(|p| p.name == arg.as_str()) {
            None => errors.push(format!(
                "Unexpected argument '{arg}' for function '{func_name}' in the 'arguments' \
                 block: {spec}. Expected arguments are: {}",
                format_params(function)
            )),
            Some(param) if !param.kind.matches(value) => errors.push(format!(
                "Argument '{arg}' should be of type '{}' for function '{func_name}' in the \
                 'arguments' block: {spec}",
                param.kind.name()
            )),
            Some(_) => {}
        }
    }

    errors
}

fn format_params(function: &CheckFunction) -> String {
    let names: Vec<String> = function
        .params()
        .iter()
        .map(|p| format!("'{}'", p.name))
        .collect();
    format!("[{}]", names.join(", "))
}
