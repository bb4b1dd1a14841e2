//! Built-in check functions (predicate builders).
//!
//! A check function turns a target column name plus keyword arguments into a
//! row-level expression that evaluates to a descriptive message string when
//! the check fails and to null when it passes. The engine never inspects the
//! expression internals; it only composes them with filters and
//! null-coalescing (see [`crate::engine`]).

mod registry;

pub use registry::{CheckArgs, CheckBuilder, CheckFunction, FunctionRegistry, ParamKind, ParamSpec};

use datafusion::common::ScalarValue;
use datafusion::functions::expr_fn::{btrim, concat};
use datafusion::prelude::*;
use serde_json::Value;

use crate::error::{DqError, Result};

/// A compiled check expression.
///
/// Most builders produce a ready logical expression. Checks written as raw
/// SQL fragments (and row filters) can only be bound to a schema once a
/// dataset is available, so those are carried as text and resolved by the
/// engine at compile time.
#[derive(Debug, Clone)]
pub enum CheckColumn {
    /// A fully built message-or-null expression.
    Expr(Expr),
    /// A SQL fragment resolved against the dataset schema when the check
    /// is compiled.
    Sql {
        /// Boolean SQL expression; the check fails on rows where it holds.
        expression: String,
        /// Message reported for failing rows.
        message: String,
        /// Alias used for auto-naming the resulting rule.
        name: String,
        /// Invert the expression before evaluating.
        negate: bool,
    },
}

impl CheckColumn {
    /// The alias the check carries, used to derive rule names.
    pub fn alias(&self) -> Option<String> {
        match self {
            CheckColumn::Expr(expr) => match expr {
                Expr::Alias(alias) => Some(alias.name.clone()),
                _ => None,
            },
            CheckColumn::Sql { name, .. } => Some(name.clone()),
        }
    }

    /// Binds the check to a dataset, yielding the message-or-null expression.
    pub fn to_expr(&self, df: &DataFrame) -> Result<Expr> {
        match self {
            CheckColumn::Expr(expr) => Ok(expr.clone()),
            CheckColumn::Sql {
                expression,
                message,
                name,
                negate,
            } => {
                let mut condition = df.parse_sql_expr(expression)?;
                if *negate {
                    condition = !condition;
                }
                make_condition(condition, lit(message.clone()), name)
            }
        }
    }
}

/// Builds the canonical message-or-null shape every check shares:
/// the message when `condition` holds, a null string otherwise.
pub fn make_condition(condition: Expr, message: Expr, alias: &str) -> Result<Expr> {
    Ok(when(condition, message)
        .otherwise(lit(ScalarValue::Utf8(None)))?
        .alias(alias))
}

/// Fails when the column is null.
pub fn is_not_null(args: &CheckArgs) -> Result<CheckColumn> {
    let column = args.column()?;
    let condition = ident(column).is_null();
    let message = lit(format!("Column {column} is null"));
    Ok(CheckColumn::Expr(make_condition(
        condition,
        message,
        &format!("{column}_is_null"),
    )?))
}

/// Fails when the column's string form is empty (nulls pass).
pub fn is_not_empty(args: &CheckArgs) -> Result<CheckColumn> {
    let column = args.column()?;
    let condition = cast(ident(column), arrow::datatypes::DataType::Utf8).eq(lit(""));
    let message = lit(format!("Column {column} is empty"));
    Ok(CheckColumn::Expr(make_condition(
        condition,
        message,
        &format!("{column}_is_empty"),
    )?))
}

/// Fails when the column is null or its string form is empty. With
/// `trim_strings`, surrounding whitespace is stripped before the
/// emptiness test.
pub fn is_not_null_and_not_empty(args: &CheckArgs) -> Result<CheckColumn> {
    let column = args.column()?;
    let mut value = cast(ident(column), arrow::datatypes::DataType::Utf8);
    if args.bool_or("trim_strings", false) {
        value = btrim(vec![value]);
    }
    let condition = ident(column).is_null().or(value.eq(lit("")));
    let message = lit(format!("Column {column} is null or empty"));
    Ok(CheckColumn::Expr(make_condition(
        condition,
        message,
        &format!("{column}_is_null_or_empty"),
    )?))
}

/// Fails when the column value is outside the allowed list (nulls pass).
pub fn is_in_list(args: &CheckArgs) -> Result<CheckColumn> {
    let column = args.column()?;
    let allowed = args.required_list("allowed")?;
    if allowed.is_empty() {
        return Err(DqError::InvalidArguments(
            "'allowed' must be a non-empty list".to_string(),
        ));
    }
    let list = allowed.iter().map(json_to_lit).collect::<Result<Vec<_>>>()?;
    let rendered = allowed.iter().map(render_value).collect::<Vec<_>>().join(", ");
    let condition = in_list(ident(column), list, true);
    let message = concat(vec![
        lit("Value "),
        cast(ident(column), arrow::datatypes::DataType::Utf8),
        lit(format!(" is not in the allowed list: [{rendered}]")),
    ]);
    Ok(CheckColumn::Expr(make_condition(
        condition,
        message,
        &format!("{column}_is_not_in_the_list"),
    )?))
}

/// Fails when the column value lies outside `[min_limit, max_limit]`
/// (nulls pass).
pub fn is_in_range(args: &CheckArgs) -> Result<CheckColumn> {
    let column = args.column()?;
    let min_value = args.required_value("min_limit")?;
    let max_value = args.required_value("max_limit")?;
    let min_lit = json_to_lit(min_value)?;
    let max_lit = json_to_lit(max_value)?;
    let condition = ident(column).lt(min_lit).or(ident(column).gt(max_lit));
    let message = concat(vec![
        lit("Value "),
        cast(ident(column), arrow::datatypes::DataType::Utf8),
        lit(format!(
            " not in range [{}, {}]",
            render_value(min_value),
            render_value(max_value)
        )),
    ]);
    Ok(CheckColumn::Expr(make_condition(
        condition,
        message,
        &format!("{column}_not_in_range"),
    )?))
}

/// Expression-level check: fails on rows where the SQL expression holds
/// (or does not hold, with `negate`). Not bound to a single column.
pub fn sql_expression(args: &CheckArgs) -> Result<CheckColumn> {
    let expression = args.required_str("expression")?.to_string();
    let negate = args.bool_or("negate", false);
    let message = match args.optional_str("msg") {
        Some(msg) => msg.to_string(),
        None if negate => format!("Value does not match expression: {expression}"),
        None => format!("Value matches expression: {expression}"),
    };
    let name = match args.optional_str("name") {
        Some(name) => name.to_string(),
        None => crate::rules::normalize_name(&expression),
    };
    Ok(CheckColumn::Sql {
        expression,
        message,
        name,
        negate,
    })
}

/// Converts a JSON scalar into a literal expression.
fn json_to_lit(value: &Value) -> Result<Expr> {
    match value {
        Value::Bool(b) => Ok(lit(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(lit(i))
            } else if let Some(f) = n.as_f64() {
                Ok(lit(f))
            } else {
                Err(DqError::InvalidArguments(format!(
                    "unsupported numeric literal: {n}"
                )))
            }
        }
        Value::String(s) => Ok(lit(s.clone())),
        other => Err(DqError::InvalidArguments(format!(
            "unsupported literal in check arguments: {other}"
        ))),
    }
}

/// Renders a JSON scalar for inclusion in a message string.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn args(column: Option<&str>, kwargs: Value) -> CheckArgs {
        let map = match kwargs {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        CheckArgs::new(column, map)
    }

    #[test]
    fn test_is_not_null_alias() {
        let check = is_not_null(&args(Some("a"), json!({}))).unwrap();
        assert_eq!(check.alias().as_deref(), Some("a_is_null"));
    }

    #[test]
    fn test_is_not_null_and_not_empty_alias() {
        let check = is_not_null_and_not_empty(&args(Some("city"), json!({}))).unwrap();
        assert_eq!(check.alias().as_deref(), Some("city_is_null_or_empty"));
    }

    #[test]
    fn test_is_in_list_requires_values() {
        let err = is_in_list(&args(Some("a"), json!({"allowed": []}))).unwrap_err();
        assert!(err.to_string().contains("non-empty"));
    }

    #[test]
    fn test_missing_column_is_reported() {
        let err = is_not_null(&args(None, json!({}))).unwrap_err();
        assert!(matches!(err, DqError::InvalidArguments(_)));
    }

    #[test]
    fn test_sql_expression_defaults() {
        let check = sql_expression(&args(None, json!({"expression": "a > b"}))).unwrap();
        match check {
            CheckColumn::Sql {
                expression,
                message,
                name,
                negate,
            } => {
                assert_eq!(expression, "a > b");
                assert_eq!(message, "Value matches expression: a > b");
                assert_eq!(name, "a_b");
                assert!(!negate);
            }
            CheckColumn::Expr(_) => panic!("expected sql check"),
        }
    }

    #[test]
    fn test_sql_expression_negate_message() {
        let check =
            sql_expression(&args(None, json!({"expression": "a > b", "negate": true}))).unwrap();
        match check {
            CheckColumn::Sql { message, .. } => {
                assert_eq!(message, "Value does not match expression: a > b");
            }
            CheckColumn::Expr(_) => panic!("expected sql check"),
        }
    }
}
