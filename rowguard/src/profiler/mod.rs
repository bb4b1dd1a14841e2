//! Statistical profiling and candidate rule synthesis.
//!
//! [`DqProfiler::profile`] walks a DataFrame column by column (struct
//! columns flattened to dotted names), computes summary statistics, and
//! proposes candidate rules: not-null, allowed-set, not-empty, and
//! outlier-aware value ranges. Every proposed rule carries a description
//! naming the branch that produced its bounds.

pub mod generator;
mod types;

pub use types::{DqProfile, ProfileOptions, SummaryStats};

use std::collections::BTreeMap;

use arrow::datatypes::{DataType, Fields, TimeUnit};
use chrono::DateTime;
use datafusion::common::ScalarValue;
use datafusion::functions::core::expr_ext::FieldAccessor;
use datafusion::functions_aggregate::expr_fn::{avg, max, min, stddev};
use datafusion::prelude::*;
use serde_json::{json, Value};
use tracing::instrument;

use crate::error::Result;

/// How a min/max-capable column is classified for bound derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumericClass {
    Integer,
    Float,
    Date,
    Timestamp,
}

fn numeric_class(data_type: &DataType) -> Option<NumericClass> {
    match data_type {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => Some(NumericClass::Integer),
        DataType::Float32 | DataType::Float64 | DataType::Decimal128(_, _) => {
            Some(NumericClass::Float)
        }
        DataType::Date32 | DataType::Date64 => Some(NumericClass::Date),
        DataType::Timestamp(_, _) => Some(NumericClass::Timestamp),
        _ => None,
    }
}

fn supports_distinct(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Utf8
            | DataType::LargeUtf8
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

fn is_string(data_type: &DataType) -> bool {
    matches!(data_type, DataType::Utf8 | DataType::LargeUtf8)
}

/// The dataset profiler.
#[derive(Debug, Clone, Default)]
pub struct DqProfiler {
    options: ProfileOptions,
}

impl DqProfiler {
    /// Creates a profiler with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a profiler with explicit options.
    pub fn with_options(options: ProfileOptions) -> Self {
        Self { options }
    }

    /// The profiler's options.
    pub fn options(&self) -> &ProfileOptions {
        &self.options
    }

    /// Profiles a DataFrame, returning per-column summary statistics and
    /// candidate rules.
    ///
    /// `columns` restricts profiling to the named top-level columns; `None`
    /// profiles everything. Candidate order follows column order, then
    /// rule-kind order within a column (not-null, allowed-set, not-empty,
    /// range). A zero-row dataset yields base counts and no candidates.
    #[instrument(skip_all)]
    pub async fn profile(
        &self,
        df: DataFrame,
        columns: Option<&[String]>,
    ) -> Result<(SummaryStats, Vec<DqProfile>)> {
        let schema = arrow::datatypes::Schema::from(df.schema());
        let targets = flatten_columns(&schema, columns);
        let total = df.clone().count().await?;
        tracing::debug!(total, columns = targets.len(), "profiling dataset");

        let mut summary = SummaryStats::new();
        let mut candidates = Vec::new();

        if total == 0 {
            for (name, _, _) in &targets {
                let metrics = summary.entry(name.clone()).or_default();
                metrics.insert("count".to_string(), json!(0));
                metrics.insert("count_non_null".to_string(), json!(0));
                metrics.insert("count_null".to_string(), json!(0));
            }
            return Ok((summary, candidates));
        }

        for (name, data_type, expr) in &targets {
            let mut metrics = BTreeMap::new();
            self.profile_column(&df, name, data_type, expr, total, &mut metrics, &mut candidates)
                .await?;
            summary.insert(name.clone(), metrics);
        }

        Ok((summary, candidates))
    }

    #[allow(clippy::too_many_arguments)]
    async fn profile_column(
        &self,
        df: &DataFrame,
        name: &str,
        data_type: &DataType,
        expr: &Expr,
        total: usize,
        metrics: &mut BTreeMap<String, Value>,
        candidates: &mut Vec<DqProfile>,
    ) -> Result<()> {
        let mut dst = df
            .clone()
            .select(vec![expr.clone().alias(name)])?
            .filter(ident(name).is_not_null())?;
        if is_string(data_type) && self.options.trim_strings {
            dst = dst.select(vec![btrim_expr(name).alias(name)])?;
        }

        let count_non_null = dst.clone().count().await?;
        metrics.insert("count".to_string(), json!(total));
        metrics.insert("count_non_null".to_string(), json!(count_non_null));
        metrics.insert("count_null".to_string(), json!(total - count_non_null));

        if count_non_null as f64 >= total as f64 * (1.0 - self.options.max_null_ratio) {
            if count_non_null != total {
                let null_percentage = 1.0 - count_non_null as f64 / total as f64;
                candidates.push(DqProfile::new("is_not_null", name).with_description(format!(
                    "Column {name} has {:.1}% of null values (allowed {:.1}%)",
                    null_percentage * 100.0,
                    self.options.max_null_ratio * 100.0
                )));
            } else {
                candidates.push(DqProfile::new("is_not_null", name));
            }
        }

        if supports_distinct(data_type) {
            self.propose_allowed_set(&dst, name, total, candidates).await?;
        }

        if is_string(data_type) {
            let empties = dst
                .clone()
                .filter(ident(name).eq(lit("")))?
                .count()
                .await?;
            if empties as f64 <= total as f64 * self.options.max_empty_ratio {
                candidates.push(
                    DqProfile::new("is_not_null_or_empty", name).with_parameters(BTreeMap::from([(
                        "trim_strings".to_string(),
                        json!(self.options.trim_strings),
                    )])),
                );
            }
        }

        if count_non_null > 0 {
            if let Some(class) = numeric_class(data_type) {
                if let Some(rule) = self.extract_min_max(dst, name, class, metrics).await? {
                    candidates.push(rule);
                }
            } else if is_string(data_type) {
                extract_string_min_max(&dst, name, metrics).await?;
            }
        }

        Ok(())
    }

    async fn propose_allowed_set(
        &self,
        dst: &DataFrame,
        name: &str,
        total: usize,
        candidates: &mut Vec<DqProfile>,
    ) -> Result<()> {
        let distinct = dst.clone().distinct()?;
        let count = distinct.clone().count().await?;
        if count == 0
            || count as f64 >= total as f64 * self.options.distinct_ratio
            || count >= self.options.max_in_count
        {
            return Ok(());
        }

        // Sorted for deterministic output across runs and partitionings.
        let batches = distinct
            .sort(vec![ident(name).sort(true, false)])?
            .collect()
            .await?;
        let mut values = Vec::with_capacity(count);
        for batch in &batches {
            let array = batch.column(0);
            for row in 0..batch.num_rows() {
                values.push(scalar_to_json(&ScalarValue::try_from_array(array, row)?));
            }
        }
        candidates.push(
            DqProfile::new("is_in", name)
                .with_parameters(BTreeMap::from([("in".to_string(), Value::Array(values))])),
        );
        Ok(())
    }

    /// Derives a value-range candidate, capping bounds to
    /// `mean ± num_sigmas · stddev` when outlier removal applies.
    async fn extract_min_max(
        &self,
        dst: DataFrame,
        name: &str,
        class: NumericClass,
        metrics: &mut BTreeMap<String, Value>,
    ) -> Result<Option<DqProfile>> {
        // Temporal columns do the arithmetic on epoch seconds.
        let dst = match class {
            NumericClass::Date | NumericClass::Timestamp => dst.select(vec![cast(
                cast(ident(name), DataType::Timestamp(TimeUnit::Second, None)),
                DataType::Int64,
            )
            .alias(name)])?,
            _ => dst,
        };

        if self.options.outliers_apply_to(name) {
            let batches = dst
                .aggregate(
                    vec![],
                    vec![
                        min(ident(name)).alias("min"),
                        max(ident(name)).alias("max"),
                        avg(ident(name)).alias("mean"),
                        stddev(ident(name)).alias("stddev"),
                    ],
                )?
                .collect()
                .await?;
            let Some(batch) = batches.first().filter(|b| b.num_rows() > 0) else {
                tracing::info!(column = name, "can't get min/max for field");
                return Ok(None);
            };
            let true_min = scalar_to_f64(&ScalarValue::try_from_array(batch.column(0), 0)?);
            let true_max = scalar_to_f64(&ScalarValue::try_from_array(batch.column(1), 0)?);
            let mean = scalar_to_f64(&ScalarValue::try_from_array(batch.column(2), 0)?);
            let stddev = scalar_to_f64(&ScalarValue::try_from_array(batch.column(3), 0)?);

            let (Some(true_min), Some(true_max)) = (true_min, true_max) else {
                tracing::info!(column = name, "can't get min/max for field");
                return Ok(None);
            };
            metrics.insert("min".to_string(), render_bound(class, true_min, Rounding::None));
            metrics.insert("max".to_string(), render_bound(class, true_max, Rounding::None));

            let (Some(mean), Some(stddev)) = (mean, stddev) else {
                return Ok(None);
            };
            metrics.insert("mean".to_string(), render_mean(class, mean));
            metrics.insert("stddev".to_string(), json!(stddev));

            let sigmas = self.options.num_sigmas;
            let mut lower = mean - sigmas * stddev;
            let mut upper = mean + sigmas * stddev;

            let description = if lower > true_min && upper < true_max {
                format!(
                    "Range doesn't include outliers, capped by {sigmas} sigmas. avg={mean}, \
                     stddev={stddev}, min={true_min}, max={true_max}"
                )
            } else if lower < true_min && upper > true_max {
                lower = true_min;
                upper = true_max;
                "Real min/max values were used".to_string()
            } else if lower < true_min {
                lower = true_min;
                format!(
                    "Real min value was used. Max was capped by {sigmas} sigmas. avg={mean}, \
                     stddev={stddev}, max={true_max}"
                )
            } else if upper > true_max {
                upper = true_max;
                format!(
                    "Real max value was used. Min was capped by {sigmas} sigmas. avg={mean}, \
                     stddev={stddev}, min={true_min}"
                )
            } else {
                return Ok(None);
            };

            // Integer and temporal bounds are forced back onto the column's
            // unit grid; float bounds keep the capped values exactly.
            let (down, up) = match class {
                NumericClass::Float => (Rounding::None, Rounding::None),
                _ => (Rounding::Down, Rounding::Up),
            };
            let min_value = render_bound(class, lower, down);
            let max_value = render_bound(class, upper, up);
            Ok(Some(min_max_profile(name, min_value, max_value, description)))
        } else {
            let batches = dst
                .aggregate(
                    vec![],
                    vec![
                        min(ident(name)).alias("min"),
                        max(ident(name)).alias("max"),
                        avg(ident(name)).alias("mean"),
                        stddev(ident(name)).alias("stddev"),
                    ],
                )?
                .collect()
                .await?;
            let Some(batch) = batches.first().filter(|b| b.num_rows() > 0) else {
                tracing::info!(column = name, "can't get min/max for field");
                return Ok(None);
            };
            let true_min = scalar_to_f64(&ScalarValue::try_from_array(batch.column(0), 0)?);
            let true_max = scalar_to_f64(&ScalarValue::try_from_array(batch.column(1), 0)?);
            let (Some(true_min), Some(true_max)) = (true_min, true_max) else {
                tracing::info!(column = name, "can't get min/max for field");
                return Ok(None);
            };
            metrics.insert("min".to_string(), render_bound(class, true_min, Rounding::None));
            metrics.insert("max".to_string(), render_bound(class, true_max, Rounding::None));
            if let Some(mean) = scalar_to_f64(&ScalarValue::try_from_array(batch.column(2), 0)?) {
                metrics.insert("mean".to_string(), render_mean(class, mean));
            }
            if let Some(sd) = scalar_to_f64(&ScalarValue::try_from_array(batch.column(3), 0)?) {
                metrics.insert("stddev".to_string(), json!(sd));
            }

            let (down, up) = if self.options.round {
                (Rounding::Down, Rounding::Up)
            } else {
                (Rounding::None, Rounding::None)
            };
            let min_value = render_bound(class, true_min, down);
            let max_value = render_bound(class, true_max, up);
            Ok(Some(min_max_profile(
                name,
                min_value,
                max_value,
                "Real min/max values were used".to_string(),
            )))
        }
    }
}

/// Records lexicographic min/max for a string column so the summary
/// carries the same metric set as numeric columns.
async fn extract_string_min_max(
    dst: &DataFrame,
    name: &str,
    metrics: &mut BTreeMap<String, Value>,
) -> Result<()> {
    let batches = dst
        .clone()
        .aggregate(
            vec![],
            vec![min(ident(name)).alias("min"), max(ident(name)).alias("max")],
        )?
        .collect()
        .await?;
    let Some(batch) = batches.first().filter(|b| b.num_rows() > 0) else {
        return Ok(());
    };
    let low = scalar_to_json(&ScalarValue::try_from_array(batch.column(0), 0)?);
    let high = scalar_to_json(&ScalarValue::try_from_array(batch.column(1), 0)?);
    if !low.is_null() {
        metrics.insert("min".to_string(), low);
    }
    if !high.is_null() {
        metrics.insert("max".to_string(), high);
    }
    Ok(())
}

fn min_max_profile(name: &str, min: Value, max: Value, description: String) -> DqProfile {
    DqProfile::new("min_max", name)
        .with_description(description)
        .with_parameters(BTreeMap::from([
            ("min".to_string(), min),
            ("max".to_string(), max),
        ]))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rounding {
    None,
    Down,
    Up,
}

/// Renders a derived bound in the column's own unit: integers floor/ceil
/// to whole numbers, temporals map epoch seconds back to dates, with
/// timestamps snapped to day boundaries when rounding.
fn render_bound(class: NumericClass, value: f64, rounding: Rounding) -> Value {
    match class {
        NumericClass::Integer => {
            let rounded = match rounding {
                Rounding::Down => value.floor(),
                Rounding::Up => value.ceil(),
                Rounding::None => value,
            };
            json!(rounded as i64)
        }
        NumericClass::Float => match rounding {
            Rounding::Down => json!(value.floor()),
            Rounding::Up => json!(value.ceil()),
            Rounding::None => json!(value),
        },
        NumericClass::Date => json!(epoch_to_date(value as i64)),
        NumericClass::Timestamp => {
            let mut seconds = value as i64;
            match rounding {
                Rounding::Down => seconds -= seconds.rem_euclid(86_400),
                Rounding::Up => {
                    let rem = seconds.rem_euclid(86_400);
                    if rem != 0 {
                        seconds += 86_400 - rem;
                    }
                }
                Rounding::None => {}
            }
            json!(epoch_to_datetime(seconds))
        }
    }
}

fn render_mean(class: NumericClass, mean: f64) -> Value {
    match class {
        NumericClass::Date => json!(epoch_to_date(mean as i64)),
        NumericClass::Timestamp => json!(epoch_to_datetime(mean as i64)),
        _ => json!(mean),
    }
}

fn epoch_to_date(seconds: i64) -> String {
    DateTime::from_timestamp(seconds, 0)
        .map(|dt| dt.date_naive().format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| seconds.to_string())
}

fn epoch_to_datetime(seconds: i64) -> String {
    DateTime::from_timestamp(seconds, 0)
        .map(|dt| dt.naive_utc().format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_else(|| seconds.to_string())
}

fn btrim_expr(name: &str) -> Expr {
    datafusion::functions::expr_fn::btrim(vec![ident(name)])
}

/// Flattens struct columns to dotted leaf names. List and map columns are
/// unsupported and skipped.
fn flatten_columns(
    schema: &arrow::datatypes::Schema,
    selected: Option<&[String]>,
) -> Vec<(String, DataType, Expr)> {
    let mut out = Vec::new();
    for field in schema.fields() {
        if let Some(selected) = selected {
            if !selected.iter().any(|s| s == field.name()) {
                continue;
            }
        }
        match field.data_type() {
            DataType::Struct(children) => {
                flatten_struct(field.name(), &ident(field.name()), children, &mut out);
            }
            DataType::List(_) | DataType::LargeList(_) | DataType::Map(_, _) => {}
            data_type => out.push((field.name().clone(), data_type.clone(), ident(field.name()))),
        }
    }
    out
}

fn flatten_struct(
    prefix: &str,
    base: &Expr,
    children: &Fields,
    out: &mut Vec<(String, DataType, Expr)>,
) {
    for child in children {
        let name = format!("{prefix}.{}", child.name());
        let accessor = base.clone().field(child.name());
        match child.data_type() {
            DataType::Struct(grandchildren) => {
                flatten_struct(&name, &accessor, grandchildren, out);
            }
            DataType::List(_) | DataType::LargeList(_) | DataType::Map(_, _) => {}
            data_type => out.push((name, data_type.clone(), accessor)),
        }
    }
}

fn scalar_to_f64(scalar: &ScalarValue) -> Option<f64> {
    match scalar {
        ScalarValue::Float32(Some(v)) => Some(*v as f64),
        ScalarValue::Float64(Some(v)) => Some(*v),
        ScalarValue::Int8(Some(v)) => Some(*v as f64),
        ScalarValue::Int16(Some(v)) => Some(*v as f64),
        ScalarValue::Int32(Some(v)) => Some(*v as f64),
        ScalarValue::Int64(Some(v)) => Some(*v as f64),
        ScalarValue::UInt8(Some(v)) => Some(*v as f64),
        ScalarValue::UInt16(Some(v)) => Some(*v as f64),
        ScalarValue::UInt32(Some(v)) => Some(*v as f64),
        ScalarValue::UInt64(Some(v)) => Some(*v as f64),
        ScalarValue::Decimal128(Some(v), _, scale) => {
            Some(*v as f64 / 10f64.powi(*scale as i32))
        }
        _ => None,
    }
}

fn scalar_to_json(scalar: &ScalarValue) -> Value {
    match scalar {
        ScalarValue::Utf8(Some(s)) | ScalarValue::LargeUtf8(Some(s)) => json!(s),
        ScalarValue::Boolean(Some(b)) => json!(b),
        ScalarValue::Int8(Some(v)) => json!(v),
        ScalarValue::Int16(Some(v)) => json!(v),
        ScalarValue::Int32(Some(v)) => json!(v),
        ScalarValue::Int64(Some(v)) => json!(v),
        ScalarValue::UInt8(Some(v)) => json!(v),
        ScalarValue::UInt16(Some(v)) => json!(v),
        ScalarValue::UInt32(Some(v)) => json!(v),
        ScalarValue::UInt64(Some(v)) => json!(v),
        ScalarValue::Float32(Some(v)) => json!(v),
        ScalarValue::Float64(Some(v)) => json!(v),
        ScalarValue::Null => Value::Null,
        other if other.is_null() => Value::Null,
        other => json!(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::{Field, Schema};

    #[test]
    fn test_numeric_class() {
        assert_eq!(numeric_class(&DataType::Int64), Some(NumericClass::Integer));
        assert_eq!(numeric_class(&DataType::Float64), Some(NumericClass::Float));
        assert_eq!(numeric_class(&DataType::Date32), Some(NumericClass::Date));
        assert_eq!(
            numeric_class(&DataType::Timestamp(TimeUnit::Microsecond, None)),
            Some(NumericClass::Timestamp)
        );
        assert_eq!(numeric_class(&DataType::Utf8), None);
    }

    #[test]
    fn test_integer_bounds_floor_and_ceil() {
        assert_eq!(render_bound(NumericClass::Integer, 1.2, Rounding::Down), json!(1));
        assert_eq!(render_bound(NumericClass::Integer, 1.2, Rounding::Up), json!(2));
        assert_eq!(render_bound(NumericClass::Integer, -1.2, Rounding::Down), json!(-2));
    }

    #[test]
    fn test_timestamp_bounds_snap_to_day() {
        // 2024-05-01T13:45:00 UTC
        let value = 1_714_571_100.0;
        assert_eq!(
            render_bound(NumericClass::Timestamp, value, Rounding::Down),
            json!("2024-05-01T00:00:00")
        );
        assert_eq!(
            render_bound(NumericClass::Timestamp, value, Rounding::Up),
            json!("2024-05-02T00:00:00")
        );
    }

    #[test]
    fn test_date_bounds() {
        let value = 1_714_571_100.0;
        assert_eq!(
            render_bound(NumericClass::Date, value, Rounding::None),
            json!("2024-05-01")
        );
    }

    #[test]
    fn test_flatten_skips_lists_and_recurses_structs() {
        let address = DataType::Struct(Fields::from(vec![
            Field::new("city", DataType::Utf8, true),
            Field::new("zip", DataType::Int32, true),
        ]));
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("address", address, true),
            Field::new(
                "tags",
                DataType::List(std::sync::Arc::new(Field::new_list_field(
                    DataType::Utf8,
                    true,
                ))),
                true,
            ),
        ]);
        let columns = flatten_columns(&schema, None);
        let names: Vec<&str> = columns.iter().map(|(n, _, _)| n.as_str()).collect();
        assert_eq!(names, vec!["id", "address.city", "address.zip"]);
    }

    #[test]
    fn test_flatten_respects_selection() {
        let schema = Schema::new(vec![
            Field::new("a", DataType::Int64, true),
            Field::new("b", DataType::Int64, true),
        ]);
        let selected = vec!["b".to_string()];
        let columns = flatten_columns(&schema, Some(&selected));
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].0, "b");
    }
}
