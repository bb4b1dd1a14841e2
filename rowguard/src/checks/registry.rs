//! Function registry and declared parameter schemas.
//!
//! Check functions are resolved by name from an explicit, injectable
//! registry. Each function carries a declared parameter schema, so argument
//! validation is a pure schema match with no reflection involved. Built-ins
//! live in a process-wide registry; callers may supply an override registry
//! which then takes total precedence.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde_json::{Map, Value};

use crate::checks::CheckColumn;
use crate::error::{DqError, Result};

/// Expected kind of a check function argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// String value.
    Str,
    /// Integer value.
    Int,
    /// Floating point value (integers accepted).
    Float,
    /// Boolean value.
    Bool,
    /// List value; element types are the builder's concern.
    List,
    /// Any JSON value.
    Any,
}

impl ParamKind {
    /// Whether `value` satisfies this kind. Containers are checked by
    /// type only; element types are not recursed into.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParamKind::Str => value.is_string(),
            ParamKind::Int => value.is_i64() || value.is_u64(),
            ParamKind::Float => value.is_number(),
            ParamKind::Bool => value.is_boolean(),
            ParamKind::List => value.is_array(),
            ParamKind::Any => true,
        }
    }

    /// Human-readable kind name for validation messages.
    pub fn name(&self) -> &'static str {
        match self {
            ParamKind::Str => "string",
            ParamKind::Int => "integer",
            ParamKind::Float => "number",
            ParamKind::Bool => "boolean",
            ParamKind::List => "list",
            ParamKind::Any => "any",
        }
    }
}

/// One declared parameter of a check function.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    /// Argument name as it appears in check specifications.
    pub name: &'static str,
    /// Expected value kind.
    pub kind: ParamKind,
    /// Whether the argument must be present.
    pub required: bool,
}

impl ParamSpec {
    /// A required parameter.
    pub fn required(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    /// An optional parameter.
    pub fn optional(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// Arguments handed to a check builder: the target column (when the check
/// is column-bound) plus the remaining keyword arguments.
#[derive(Debug, Clone, Default)]
pub struct CheckArgs {
    column: Option<String>,
    kwargs: Map<String, Value>,
}

impl CheckArgs {
    /// Creates arguments for a builder invocation.
    pub fn new(column: Option<&str>, kwargs: Map<String, Value>) -> Self {
        Self {
            column: column.map(str::to_string),
            kwargs,
        }
    }

    /// The target column; errors for column-bound checks invoked without one.
    pub fn column(&self) -> Result<&str> {
        self.column
            .as_deref()
            .ok_or_else(|| DqError::InvalidArguments("missing target column name".to_string()))
    }

    /// The target column, if any.
    pub fn column_opt(&self) -> Option<&str> {
        self.column.as_deref()
    }

    /// A required string argument.
    pub fn required_str(&self, name: &str) -> Result<&str> {
        self.kwargs
            .get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| DqError::InvalidArguments(format!("missing string argument '{name}'")))
    }

    /// An optional string argument.
    pub fn optional_str(&self, name: &str) -> Option<&str> {
        self.kwargs.get(name).and_then(Value::as_str)
    }

    /// A boolean argument with a default.
    pub fn bool_or(&self, name: &str, default: bool) -> bool {
        self.kwargs
            .get(name)
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }

    /// A required list argument.
    pub fn required_list(&self, name: &str) -> Result<&Vec<Value>> {
        self.kwargs
            .get(name)
            .and_then(Value::as_array)
            .ok_or_else(|| DqError::InvalidArguments(format!("missing list argument '{name}'")))
    }

    /// A required argument of any kind.
    pub fn required_value(&self, name: &str) -> Result<&Value> {
        self.kwargs
            .get(name)
            .ok_or_else(|| DqError::InvalidArguments(format!("missing argument '{name}'")))
    }
}

/// A predicate-builder closure: column + keyword arguments to a compiled
/// check expression.
pub type CheckBuilder = Arc<dyn Fn(&CheckArgs) -> Result<CheckColumn> + Send + Sync>;

/// A named check function: builder plus declared parameter schema.
#[derive(Clone)]
pub struct CheckFunction {
    name: String,
    params: Vec<ParamSpec>,
    builder: CheckBuilder,
}

impl CheckFunction {
    /// Creates a check function from a builder and its parameter schema.
    pub fn new(
        name: impl Into<String>,
        params: Vec<ParamSpec>,
        builder: impl Fn(&CheckArgs) -> Result<CheckColumn> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            builder: Arc::new(builder),
        }
    }

    /// The function's registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared parameter schema.
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// The declared parameter names, in declaration order.
    pub fn param_names(&self) -> Vec<&'static str> {
        self.params.iter().map(|p| p.name).collect()
    }

    /// Invokes the builder.
    pub fn build(&self, args: &CheckArgs) -> Result<CheckColumn> {
        (self.builder)(args)
    }
}

impl fmt::Debug for CheckFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckFunction")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

/// An ordered mapping of function name to check function.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, Arc<CheckFunction>>,
}

impl FunctionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a function, replacing any previous registration of that name.
    pub fn with_function(mut self, function: CheckFunction) -> Self {
        self.functions
            .insert(function.name().to_string(), Arc::new(function));
        self
    }

    /// Looks up a function by name.
    pub fn get(&self, name: &str) -> Option<Arc<CheckFunction>> {
        self.functions.get(name).cloned()
    }

    /// Registered function names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// The built-in check function library.
    pub fn builtin() -> &'static FunctionRegistry {
        static BUILTIN: Lazy<FunctionRegistry> = Lazy::new(|| {
            FunctionRegistry::new()
                .with_function(CheckFunction::new(
                    "is_not_null",
                    vec![ParamSpec::required("col_name", ParamKind::Str)],
                    crate::checks::is_not_null,
                ))
                .with_function(CheckFunction::new(
                    "is_not_empty",
                    vec![ParamSpec::required("col_name", ParamKind::Str)],
                    crate::checks::is_not_empty,
                ))
                .with_function(CheckFunction::new(
                    "is_not_null_and_not_empty",
                    vec![
                        ParamSpec::required("col_name", ParamKind::Str),
                        ParamSpec::optional("trim_strings", ParamKind::Bool),
                    ],
                    crate::checks::is_not_null_and_not_empty,
                ))
                .with_function(CheckFunction::new(
                    "is_in_list",
                    vec![
                        ParamSpec::required("col_name", ParamKind::Str),
                        ParamSpec::required("allowed", ParamKind::List),
                    ],
                    crate::checks::is_in_list,
                ))
                .with_function(CheckFunction::new(
                    "is_in_range",
                    vec![
                        ParamSpec::required("col_name", ParamKind::Str),
                        ParamSpec::required("min_limit", ParamKind::Any),
                        ParamSpec::required("max_limit", ParamKind::Any),
                    ],
                    crate::checks::is_in_range,
                ))
                .with_function(CheckFunction::new(
                    "sql_expression",
                    vec![
                        ParamSpec::required("expression", ParamKind::Str),
                        ParamSpec::optional("msg", ParamKind::Str),
                        ParamSpec::optional("name", ParamKind::Str),
                        ParamSpec::optional("negate", ParamKind::Bool),
                    ],
                    crate::checks::sql_expression,
                ))
        });
        &BUILTIN
    }

    /// Resolves a function name.
    ///
    /// When `overrides` is supplied the lookup happens there only: the
    /// caller-provided namespace takes total precedence over built-ins.
    /// With `fail_on_missing` an unknown name is an [`DqError::UnknownFunction`]
    /// error; otherwise `None` is returned so validation can report it as a
    /// plain error string.
    pub fn resolve(
        name: &str,
        overrides: Option<&FunctionRegistry>,
        fail_on_missing: bool,
    ) -> Result<Option<Arc<CheckFunction>>> {
        tracing::debug!(function = name, "resolving check function");
        let found = match overrides {
            Some(registry) => registry.get(name),
            None => Self::builtin().get(name),
        };
        match found {
            Some(function) => Ok(Some(function)),
            None if fail_on_missing => Err(DqError::UnknownFunction(name.to_string())),
            None => Ok(None),
        }
    }
}
