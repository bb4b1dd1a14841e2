//! Profiler configuration and output types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-column summary statistics: column name to metric name to value.
pub type SummaryStats = BTreeMap<String, BTreeMap<String, Value>>;

/// A candidate rule proposed by the profiler.
///
/// `kind` is one of `is_not_null`, `is_in`, `is_not_null_or_empty`,
/// `min_max`. The description records which branch of the bound
/// derivation produced the rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DqProfile {
    /// Rule kind.
    pub kind: String,
    /// Column the rule applies to (dotted path for nested fields).
    pub column: String,
    /// Human-readable justification for the proposed rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Rule parameters, when the kind takes any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<BTreeMap<String, Value>>,
}

impl DqProfile {
    /// A parameterless profile.
    pub fn new(kind: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            column: column.into(),
            description: None,
            parameters: None,
        }
    }

    /// Attaches a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attaches parameters.
    pub fn with_parameters(mut self, parameters: BTreeMap<String, Value>) -> Self {
        self.parameters = Some(parameters);
        self
    }
}

/// Profiling options, merged over these defaults by the builder setters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileOptions {
    /// Round derived bounds to whole units.
    pub round: bool,
    /// Maximum distinct values before an allowed-set rule is skipped.
    pub max_in_count: usize,
    /// Maximum distinct/total ratio to still consider a column enumerable.
    pub distinct_ratio: f64,
    /// Null-ratio tolerance before a not-null rule is skipped.
    pub max_null_ratio: f64,
    /// Cap numeric ranges to exclude statistical outliers.
    pub remove_outliers: bool,
    /// Columns eligible for outlier removal; empty means all eligible
    /// columns.
    pub outlier_columns: Vec<String>,
    /// Width of the accepted range in standard deviations.
    pub num_sigmas: f64,
    /// Trim whitespace from strings before emptiness checks.
    pub trim_strings: bool,
    /// Empty-string ratio tolerance before a not-empty rule is skipped.
    pub max_empty_ratio: f64,
}

impl Default for ProfileOptions {
    fn default() -> Self {
        Self {
            round: true,
            max_in_count: 10,
            distinct_ratio: 0.05,
            max_null_ratio: 0.01,
            remove_outliers: true,
            outlier_columns: Vec::new(),
            num_sigmas: 3.0,
            trim_strings: true,
            max_empty_ratio: 0.01,
        }
    }
}

impl ProfileOptions {
    /// Sets whether derived bounds are rounded.
    pub fn with_round(mut self, round: bool) -> Self {
        self.round = round;
        self
    }

    /// Sets the distinct-value cutoff for allowed-set rules.
    pub fn with_max_in_count(mut self, max_in_count: usize) -> Self {
        self.max_in_count = max_in_count;
        self
    }

    /// Sets the distinct/total ratio cutoff.
    pub fn with_distinct_ratio(mut self, distinct_ratio: f64) -> Self {
        self.distinct_ratio = distinct_ratio;
        self
    }

    /// Sets the null-ratio tolerance.
    pub fn with_max_null_ratio(mut self, max_null_ratio: f64) -> Self {
        self.max_null_ratio = max_null_ratio;
        self
    }

    /// Enables or disables outlier removal.
    pub fn with_remove_outliers(mut self, remove_outliers: bool) -> Self {
        self.remove_outliers = remove_outliers;
        self
    }

    /// Restricts outlier removal to the given columns.
    pub fn with_outlier_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outlier_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the sigma width of the accepted range.
    pub fn with_num_sigmas(mut self, num_sigmas: f64) -> Self {
        self.num_sigmas = num_sigmas;
        self
    }

    /// Sets whether strings are trimmed before emptiness checks.
    pub fn with_trim_strings(mut self, trim_strings: bool) -> Self {
        self.trim_strings = trim_strings;
        self
    }

    /// Sets the empty-string ratio tolerance.
    pub fn with_max_empty_ratio(mut self, max_empty_ratio: f64) -> Self {
        self.max_empty_ratio = max_empty_ratio;
        self
    }

    /// Whether outlier removal applies to the given column.
    pub fn outliers_apply_to(&self, column: &str) -> bool {
        self.remove_outliers
            && (self.outlier_columns.is_empty()
                || self.outlier_columns.iter().any(|c| c == column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ProfileOptions::default();
        assert!(options.round);
        assert_eq!(options.max_in_count, 10);
        assert_eq!(options.distinct_ratio, 0.05);
        assert_eq!(options.max_null_ratio, 0.01);
        assert!(options.remove_outliers);
        assert!(options.outlier_columns.is_empty());
        assert_eq!(options.num_sigmas, 3.0);
        assert!(options.trim_strings);
        assert_eq!(options.max_empty_ratio, 0.01);
    }

    #[test]
    fn test_outlier_allow_list() {
        let options = ProfileOptions::default();
        assert!(options.outliers_apply_to("any_column"));

        let options = options.with_outlier_columns(vec!["a"]);
        assert!(options.outliers_apply_to("a"));
        assert!(!options.outliers_apply_to("b"));

        let options = ProfileOptions::default().with_remove_outliers(false);
        assert!(!options.outliers_apply_to("a"));
    }
}
