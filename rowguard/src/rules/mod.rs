//! Rule types: one evaluable check, multi-column rule sets, and the
//! validation status accumulator.

pub mod validation;

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::checks::{CheckArgs, CheckColumn, CheckFunction};
use crate::error::{DqError, Result};

/// Severity tier of a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criticality {
    /// Critical problem; the row is excluded from the "valid" output.
    Error,
    /// Potential problem; the row is annotated but stays valid.
    Warn,
}

impl Criticality {
    /// Parses the string form (`error` / `warn`).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "error" => Some(Criticality::Error),
            "warn" => Some(Criticality::Warn),
            _ => None,
        }
    }

    /// The string form used in check specifications.
    pub fn as_str(&self) -> &'static str {
        match self {
            Criticality::Error => "error",
            Criticality::Warn => "warn",
        }
    }
}

/// Default name of the appended error-results column.
pub const DEFAULT_ERRORS_COLUMN: &str = "_errors";
/// Default name of the appended warning-results column.
pub const DEFAULT_WARNINGS_COLUMN: &str = "_warnings";

static NAME_SANITIZE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap_or_else(|_| unreachable!()));

/// Normalizes a derived rule name into an identifier-safe string:
/// lowercased, runs of non-alphanumerics collapsed to underscores.
pub fn normalize_name(raw: &str) -> String {
    NAME_SANITIZE
        .replace_all(&raw.to_lowercase(), "_")
        .trim_matches('_')
        .to_string()
}

/// One evaluable data quality rule.
///
/// Immutable after construction; build instances through
/// [`DqRule::from_function`] (or by expanding a [`DqRuleSet`]), which
/// computes the derived name before the value is created.
#[derive(Debug, Clone)]
pub struct DqRule {
    name: String,
    criticality: String,
    column: Option<String>,
    filter: Option<String>,
    function: String,
    check: CheckColumn,
}

impl DqRule {
    /// Builds a rule by invoking a check function.
    ///
    /// The column name, when present, is passed to the builder as the
    /// first (positional) argument. `name` overrides the auto-derived
    /// name (`col_` + the check expression's normalized alias).
    /// `criticality` is kept verbatim and validated at evaluation time.
    pub fn from_function(
        function: &Arc<CheckFunction>,
        column: Option<&str>,
        name: Option<&str>,
        criticality: &str,
        filter: Option<&str>,
        kwargs: Map<String, Value>,
    ) -> Result<Self> {
        let args = CheckArgs::new(column, kwargs);
        let check = function.build(&args)?;
        let name = match name {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                let alias = check
                    .alias()
                    .unwrap_or_else(|| function.name().to_string());
                format!("col_{}", normalize_name(&alias))
            }
        };
        Ok(Self {
            name,
            criticality: criticality.to_string(),
            column: column.map(str::to_string),
            filter: filter.map(str::to_string),
            function: function.name().to_string(),
            check,
        })
    }

    /// The rule's name; non-empty by construction.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parsed criticality.
    ///
    /// Validated lazily: a rule constructed with an unrecognized
    /// criticality fails here, at evaluation time.
    pub fn criticality(&self) -> Result<Criticality> {
        Criticality::parse(&self.criticality)
            .ok_or_else(|| DqError::InvalidCriticality(self.criticality.clone()))
    }

    /// The raw criticality string.
    pub fn criticality_str(&self) -> &str {
        &self.criticality
    }

    /// The target column, absent for expression-level checks.
    pub fn column(&self) -> Option<&str> {
        self.column.as_deref()
    }

    /// The optional row filter expression.
    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// The check function name (reported as `rule_kind` in results).
    pub fn function(&self) -> &str {
        &self.function
    }

    /// The compiled check expression.
    pub fn check(&self) -> &CheckColumn {
        &self.check
    }
}

/// A rule template applied to multiple columns: expands to one
/// independent [`DqRule`] per column with shared criticality, filter,
/// and arguments. Discarded after expansion.
#[derive(Debug, Clone)]
pub struct DqRuleSet {
    columns: Vec<String>,
    function: Arc<CheckFunction>,
    name: Option<String>,
    criticality: String,
    filter: Option<String>,
    kwargs: Map<String, Value>,
}

impl DqRuleSet {
    /// Creates a rule set over the given columns.
    pub fn new<I, S>(columns: I, function: Arc<CheckFunction>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            function,
            name: None,
            criticality: Criticality::Error.as_str().to_string(),
            filter: None,
            kwargs: Map::new(),
        }
    }

    /// Overrides the derived per-column name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the shared criticality.
    pub fn with_criticality(mut self, criticality: impl Into<String>) -> Self {
        self.criticality = criticality.into();
        self
    }

    /// Sets the shared row filter.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Sets the shared keyword arguments.
    pub fn with_kwargs(mut self, kwargs: Map<String, Value>) -> Self {
        self.kwargs = kwargs;
        self
    }

    /// Expands into one rule per column, preserving column order. An
    /// empty column list yields no rules.
    pub fn into_rules(self) -> Result<Vec<DqRule>> {
        self.columns
            .iter()
            .map(|column| {
                DqRule::from_function(
                    &self.function,
                    Some(column),
                    self.name.as_deref(),
                    &self.criticality,
                    self.filter.as_deref(),
                    self.kwargs.clone(),
                )
            })
            .collect()
    }
}

/// Accumulated validation errors for a batch of check specifications.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationStatus {
    errors: Vec<String>,
}

impl ValidationStatus {
    /// Creates an empty status.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one error.
    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Records several errors.
    pub fn add_errors<I, S>(&mut self, errors: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.errors.extend(errors.into_iter().map(Into::into));
    }

    /// Whether any error was recorded.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// The recorded errors, in report order.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.has_errors() {
            write!(f, "{}", self.errors.join("\n"))
        } else {
            write!(f, "No errors found")
        }
    }
}
