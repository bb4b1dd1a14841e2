//! Construction of the structured result columns.
//!
//! Each result column (`_errors` / `_warnings`) is a list of structs, one
//! struct per rule that fired on the row. A row where no rule of the tier
//! fired carries a null list, never an empty one, so "no rule fired" stays
//! distinguishable from "rule fired with an empty message".

use std::sync::Arc;

use arrow::array::{
    ArrayRef, ListBuilder, StringBuilder, StructBuilder, TimestampMicrosecondBuilder,
};
use arrow::datatypes::{DataType, Field, Fields, TimeUnit};
use chrono::{DateTime, Utc};

use crate::error::{DqError, Result};

/// One entry of a result column: a single rule firing on a single row.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultEntry {
    /// Rule name.
    pub name: String,
    /// Message produced by the check expression.
    pub message: String,
    /// Target column, when the rule is column-bound.
    pub column: Option<String>,
    /// Row filter of the rule, when present.
    pub filter: Option<String>,
    /// Check function name.
    pub rule_kind: String,
}

/// Fields of the per-entry struct, in serialization order.
pub fn result_item_fields() -> Fields {
    Fields::from(vec![
        Field::new("name", DataType::Utf8, true),
        Field::new("message", DataType::Utf8, true),
        Field::new("column", DataType::Utf8, true),
        Field::new("filter", DataType::Utf8, true),
        Field::new("rule_kind", DataType::Utf8, true),
        Field::new(
            "evaluated_at",
            DataType::Timestamp(TimeUnit::Microsecond, None),
            true,
        ),
    ])
}

/// Arrow type of a result column: nullable list of result structs.
pub fn result_column_type() -> DataType {
    DataType::List(Arc::new(Field::new_list_field(
        DataType::Struct(result_item_fields()),
        true,
    )))
}

/// Builds one result column from per-row entry lists.
///
/// `rows[i]` is `None` when no rule of the tier fired on row `i`.
/// `run_time` stamps every entry's `evaluated_at`.
pub fn build_result_array(
    rows: &[Option<Vec<ResultEntry>>],
    run_time: DateTime<Utc>,
) -> Result<ArrayRef> {
    let fields = result_item_fields();
    let struct_builder = StructBuilder::from_fields(fields.clone(), rows.len());
    let mut builder = ListBuilder::new(struct_builder).with_field(Field::new_list_field(
        DataType::Struct(fields),
        true,
    ));
    let evaluated_at = run_time.timestamp_micros();

    for row in rows {
        match row {
            None => builder.append(false),
            Some(entries) => {
                for entry in entries {
                    append_entry(builder.values(), entry, evaluated_at)?;
                }
                builder.append(true);
            }
        }
    }

    Ok(Arc::new(builder.finish()))
}

fn append_entry(
    builder: &mut StructBuilder,
    entry: &ResultEntry,
    evaluated_at: i64,
) -> Result<()> {
    string_field(builder, 0)?.append_value(&entry.name);
    string_field(builder, 1)?.append_value(&entry.message);
    string_field(builder, 2)?.append_option(entry.column.as_deref());
    string_field(builder, 3)?.append_option(entry.filter.as_deref());
    string_field(builder, 4)?.append_value(&entry.rule_kind);
    builder
        .field_builder::<TimestampMicrosecondBuilder>(5)
        .ok_or_else(|| DqError::Internal("result struct field 5 is not a timestamp".to_string()))?
        .append_value(evaluated_at);
    builder.append(true);
    Ok(())
}

fn string_field(builder: &mut StructBuilder, index: usize) -> Result<&mut StringBuilder> {
    builder.field_builder::<StringBuilder>(index).ok_or_else(|| {
        DqError::Internal(format!("result struct field {index} is not a string"))
    })
}
