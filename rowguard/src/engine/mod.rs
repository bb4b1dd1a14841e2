//! Rule compilation and evaluation.
//!
//! [`DqEngine`] turns raw check specifications into [`DqRule`]s, evaluates
//! them against a DataFrame, and appends the two structured result columns.
//! Evaluation is a pure function of (dataset, rules): expressions are built
//! once and handed to DataFusion, which owns all parallelism.

mod results;

pub use results::{build_result_array, result_column_type, result_item_fields, ResultEntry};

use std::sync::Arc;

use arrow::array::{new_null_array, Array, ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use datafusion::common::ScalarValue;
use datafusion::datasource::MemTable;
use datafusion::prelude::*;
use serde_json::Value;
use tracing::instrument;

use crate::checks::FunctionRegistry;
use crate::error::{DqError, Result};
use crate::rules::validation::validate_checks;
use crate::rules::{Criticality, DqRule, DqRuleSet, DEFAULT_ERRORS_COLUMN, DEFAULT_WARNINGS_COLUMN};

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Name of the appended error-results column.
    pub errors_column: String,
    /// Name of the appended warning-results column.
    pub warnings_column: String,
    /// Timestamp stamped into every result entry's `evaluated_at`. Fixed at
    /// construction so all entries of one run carry the same instant.
    pub run_time: DateTime<Utc>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            errors_column: DEFAULT_ERRORS_COLUMN.to_string(),
            warnings_column: DEFAULT_WARNINGS_COLUMN.to_string(),
            run_time: Utc::now(),
        }
    }
}

/// The data quality engine.
///
/// Holds a [`SessionContext`] for re-materializing evaluated results and
/// the result-column configuration. Cheap to clone.
#[derive(Clone)]
pub struct DqEngine {
    ctx: SessionContext,
    options: EngineOptions,
}

impl DqEngine {
    /// Creates an engine with default options.
    pub fn new(ctx: SessionContext) -> Self {
        Self::with_options(ctx, EngineOptions::default())
    }

    /// Creates an engine with explicit options.
    pub fn with_options(ctx: SessionContext, options: EngineOptions) -> Self {
        Self { ctx, options }
    }

    /// The engine's options.
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Builds rules from raw check specifications.
    ///
    /// Validation runs first over the whole batch; any error aborts with
    /// [`DqError::InvalidCheckSpec`] carrying the full error listing. Specs
    /// with a `col_names` argument expand to one rule per column, in the
    /// declared column order.
    pub fn build_checks_by_metadata(
        specs: &[Value],
        overrides: Option<&FunctionRegistry>,
    ) -> Result<Vec<DqRule>> {
        let status = validate_checks(specs, overrides);
        if status.has_errors() {
            return Err(DqError::InvalidCheckSpec(status.to_string()));
        }

        let mut rules = Vec::new();
        for spec in specs {
            rules.extend(Self::build_one_spec(spec, overrides)?);
        }
        Ok(rules)
    }

    fn build_one_spec(
        spec: &Value,
        overrides: Option<&FunctionRegistry>,
    ) -> Result<Vec<DqRule>> {
        // Shape errors were caught by validation; a mismatch here is a bug.
        let obj = spec
            .as_object()
            .ok_or_else(|| DqError::Internal("validated spec is not a mapping".to_string()))?;
        let check = obj
            .get("check")
            .and_then(Value::as_object)
            .ok_or_else(|| DqError::Internal("validated spec lacks a check block".to_string()))?;
        let func_name = check
            .get("function")
            .and_then(Value::as_str)
            .ok_or_else(|| DqError::Internal("validated spec lacks a function name".to_string()))?;
        let function = FunctionRegistry::resolve(func_name, overrides, true)?
            .ok_or_else(|| DqError::UnknownFunction(func_name.to_string()))?;

        let name = obj.get("name").and_then(Value::as_str);
        let criticality = obj
            .get("criticality")
            .and_then(Value::as_str)
            .unwrap_or(Criticality::Error.as_str());
        let filter = obj.get("filter").and_then(Value::as_str);
        let mut kwargs = check
            .get("arguments")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        if let Some(col_names) = kwargs.remove("col_names") {
            // Validation type-checks only the first entry; the rest are
            // checked here so a bad entry fails instead of vanishing.
            let entries = col_names.as_array().cloned().unwrap_or_default();
            let mut columns = Vec::with_capacity(entries.len());
            for entry in &entries {
                let column = entry.as_str().ok_or_else(|| {
                    DqError::InvalidArguments(format!(
                        "'col_names' entry {entry} is not a string for function '{func_name}'"
                    ))
                })?;
                columns.push(column.to_string());
            }
            let mut set = DqRuleSet::new(columns, function)
                .with_criticality(criticality)
                .with_kwargs(kwargs);
            if let Some(name) = name {
                set = set.with_name(name);
            }
            if let Some(filter) = filter {
                set = set.with_filter(filter);
            }
            set.into_rules()
        } else {
            let column = kwargs
                .remove("col_name")
                .and_then(|v| v.as_str().map(str::to_string));
            let rule =
                DqRule::from_function(&function, column.as_deref(), name, criticality, filter, kwargs)?;
            Ok(vec![rule])
        }
    }

    /// Expands programmatically constructed rule sets into a flat rule list,
    /// failing fast on unrecognized criticality values.
    pub fn build_checks(rule_sets: Vec<DqRuleSet>) -> Result<Vec<DqRule>> {
        let mut rules = Vec::new();
        for set in rule_sets {
            rules.extend(set.into_rules()?);
        }
        for rule in &rules {
            rule.criticality()?;
        }
        Ok(rules)
    }

    /// Evaluates rules against a DataFrame, appending the error and warning
    /// result columns.
    ///
    /// Per row and per tier, entries appear in rule-declaration order. A row
    /// where no rule of a tier fired carries a null (not empty) list. An
    /// empty rule list appends typed-null columns without evaluating
    /// anything.
    #[instrument(skip_all, fields(rules = rules.len()))]
    pub async fn apply_checks(&self, df: DataFrame, rules: &[DqRule]) -> Result<DataFrame> {
        if rules.is_empty() {
            return self.append_empty_results(df).await;
        }

        let tiers: Vec<Criticality> = rules
            .iter()
            .map(|rule| rule.criticality())
            .collect::<Result<_>>()?;

        let input_schema = Schema::from(df.schema());
        let n_input = input_schema.fields().len();
        let mut select: Vec<Expr> = input_schema
            .fields()
            .iter()
            .map(|f| ident(f.name()))
            .collect();
        for (i, rule) in rules.iter().enumerate() {
            select.push(self.check_column(&df, rule)?.alias(format!("__dq_check_{i}")));
        }

        let batches = df.select(select)?.collect().await?;
        let out_schema = self.output_schema(&input_schema);

        let mut out_batches = Vec::with_capacity(batches.len());
        for batch in &batches {
            out_batches.push(self.assemble_batch(batch, rules, &tiers, n_input, &out_schema)?);
        }
        self.materialize(out_schema, out_batches)
    }

    /// Runs [`Self::apply_checks`] then splits into (valid, invalid).
    pub async fn apply_checks_and_split(
        &self,
        df: DataFrame,
        rules: &[DqRule],
    ) -> Result<(DataFrame, DataFrame)> {
        let checked = self.apply_checks(df, rules).await?;
        let valid = self.get_valid(checked.clone())?;
        let invalid = self.get_invalid(checked)?;
        Ok((valid, invalid))
    }

    /// Builds rules from raw specs and evaluates them in one step.
    pub async fn apply_checks_by_metadata(
        &self,
        df: DataFrame,
        specs: &[Value],
        overrides: Option<&FunctionRegistry>,
    ) -> Result<DataFrame> {
        let rules = Self::build_checks_by_metadata(specs, overrides)?;
        self.apply_checks(df, &rules).await
    }

    /// Builds rules from raw specs, evaluates, and splits in one step.
    pub async fn apply_checks_by_metadata_and_split(
        &self,
        df: DataFrame,
        specs: &[Value],
        overrides: Option<&FunctionRegistry>,
    ) -> Result<(DataFrame, DataFrame)> {
        let rules = Self::build_checks_by_metadata(specs, overrides)?;
        self.apply_checks_and_split(df, &rules).await
    }

    /// Rows with no errors, with both result columns dropped. Warning-only
    /// rows are valid.
    pub fn get_valid(&self, df: DataFrame) -> Result<DataFrame> {
        let filtered = df.filter(ident(&self.options.errors_column).is_null())?;
        Ok(filtered.drop_columns(&[
            self.options.errors_column.as_str(),
            self.options.warnings_column.as_str(),
        ])?)
    }

    /// Rows with errors or warnings, result columns retained. Warning-only
    /// rows appear here as well as in [`Self::get_valid`].
    pub fn get_invalid(&self, df: DataFrame) -> Result<DataFrame> {
        Ok(df.filter(
            ident(&self.options.errors_column)
                .is_not_null()
                .or(ident(&self.options.warnings_column).is_not_null()),
        )?)
    }

    /// The message-or-null expression for one rule, gated by its filter.
    /// Rows excluded by the filter yield null regardless of the predicate.
    fn check_column(&self, df: &DataFrame, rule: &DqRule) -> Result<Expr> {
        let check = rule.check().to_expr(df)?.unalias();
        match rule.filter() {
            Some(filter) => {
                let condition = df.parse_sql_expr(filter)?;
                Ok(when(condition, check).otherwise(lit(ScalarValue::Utf8(None)))?)
            }
            None => Ok(check),
        }
    }

    fn output_schema(&self, input: &Schema) -> SchemaRef {
        let mut fields: Vec<Field> = input
            .fields()
            .iter()
            .map(|f| f.as_ref().clone())
            .collect();
        fields.push(Field::new(
            &self.options.errors_column,
            result_column_type(),
            true,
        ));
        fields.push(Field::new(
            &self.options.warnings_column,
            result_column_type(),
            true,
        ));
        Arc::new(Schema::new(fields))
    }

    fn assemble_batch(
        &self,
        batch: &RecordBatch,
        rules: &[DqRule],
        tiers: &[Criticality],
        n_input: usize,
        out_schema: &SchemaRef,
    ) -> Result<RecordBatch> {
        let rows = batch.num_rows();
        let mut errors: Vec<Option<Vec<ResultEntry>>> = vec![None; rows];
        let mut warnings: Vec<Option<Vec<ResultEntry>>> = vec![None; rows];

        for (i, rule) in rules.iter().enumerate() {
            let raw = arrow::compute::cast(batch.column(n_input + i), &DataType::Utf8)?;
            let messages = raw
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| {
                    DqError::Internal(format!("check column for rule '{}' is not a string", rule.name()))
                })?;
            let tier = match tiers[i] {
                Criticality::Error => &mut errors,
                Criticality::Warn => &mut warnings,
            };
            for row in 0..rows {
                if messages.is_null(row) {
                    continue;
                }
                tier[row].get_or_insert_with(Vec::new).push(ResultEntry {
                    name: rule.name().to_string(),
                    message: messages.value(row).to_string(),
                    column: rule.column().map(str::to_string),
                    filter: rule.filter().map(str::to_string),
                    rule_kind: rule.function().to_string(),
                });
            }
        }

        let mut columns: Vec<ArrayRef> = batch.columns()[..n_input].to_vec();
        columns.push(build_result_array(&errors, self.options.run_time)?);
        columns.push(build_result_array(&warnings, self.options.run_time)?);
        Ok(RecordBatch::try_new(out_schema.clone(), columns)?)
    }

    async fn append_empty_results(&self, df: DataFrame) -> Result<DataFrame> {
        let input_schema = Schema::from(df.schema());
        let out_schema = self.output_schema(&input_schema);
        let batches = df.collect().await?;

        let mut out_batches = Vec::with_capacity(batches.len());
        for batch in batches {
            let rows = batch.num_rows();
            let mut columns = batch.columns().to_vec();
            columns.push(new_null_array(&result_column_type(), rows));
            columns.push(new_null_array(&result_column_type(), rows));
            out_batches.push(RecordBatch::try_new(out_schema.clone(), columns)?);
        }
        self.materialize(out_schema, out_batches)
    }

    fn materialize(
        &self,
        schema: SchemaRef,
        mut batches: Vec<RecordBatch>,
    ) -> Result<DataFrame> {
        if batches.is_empty() {
            batches.push(RecordBatch::new_empty(schema.clone()));
        }
        let table = MemTable::try_new(schema, vec![batches])?;
        Ok(self.ctx.read_table(Arc::new(table))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_checks_by_metadata_expands_col_names() {
        let specs = vec![
            json!({
                "criticality": "warn",
                "check": {"function": "is_not_null", "arguments": {"col_names": ["a", "b"]}}
            }),
            json!({
                "check": {"function": "sql_expression", "arguments": {"expression": "a > b"}}
            }),
        ];
        let rules = DqEngine::build_checks_by_metadata(&specs, None).unwrap();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[0].name(), "col_a_is_null");
        assert_eq!(rules[0].criticality_str(), "warn");
        assert_eq!(rules[1].name(), "col_b_is_null");
        assert_eq!(rules[2].name(), "col_a_b");
        assert_eq!(rules[2].column(), None);
    }

    #[test]
    fn test_build_checks_by_metadata_rejects_invalid_specs() {
        let specs = vec![
            json!({"check": {"function": "no_such_check"}}),
            json!({"criticality": "fatal", "check": {"function": "is_not_null", "arguments": {"col_name": "a"}}}),
        ];
        let err = DqEngine::build_checks_by_metadata(&specs, None).unwrap_err();
        match err {
            DqError::InvalidCheckSpec(listing) => {
                assert!(listing.contains("'no_such_check' is not defined"));
                assert!(listing.contains("Invalid value for 'criticality' field"));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_build_checks_by_metadata_rejects_non_string_col_names_entry() {
        let specs = vec![json!({
            "check": {"function": "is_not_null", "arguments": {"col_names": ["a", 2]}}
        })];
        let err = DqEngine::build_checks_by_metadata(&specs, None).unwrap_err();
        assert!(matches!(err, DqError::InvalidArguments(_)), "{err}");
        assert!(err.to_string().contains("'col_names' entry 2"));
    }

    #[test]
    fn test_build_checks_validates_criticality() {
        let set = DqRuleSet::new(
            vec!["a"],
            FunctionRegistry::builtin().get("is_not_null").unwrap(),
        )
        .with_criticality("fatal");
        let err = DqEngine::build_checks(vec![set]).unwrap_err();
        assert!(matches!(err, DqError::InvalidCriticality(_)));
    }

    #[test]
    fn test_default_options() {
        let options = EngineOptions::default();
        assert_eq!(options.errors_column, "_errors");
        assert_eq!(options.warnings_column, "_warnings");
    }
}
