//! Integration tests for the profiler: candidate synthesis, sigma
//! capping, and feeding generated checks back into the engine.

use std::sync::Arc;

use arrow::array::{Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use datafusion::datasource::MemTable;
use datafusion::prelude::*;
use rowguard::prelude::*;
use serde_json::json;

async fn register_batch(ctx: &SessionContext, name: &str, batch: RecordBatch) -> DataFrame {
    let schema = batch.schema();
    let table = MemTable::try_new(schema, vec![vec![batch]]).unwrap();
    ctx.register_table(name, Arc::new(table)).unwrap();
    ctx.table(name).await.unwrap()
}

fn find<'a>(candidates: &'a [DqProfile], kind: &str, column: &str) -> Option<&'a DqProfile> {
    candidates
        .iter()
        .find(|p| p.kind == kind && p.column == column)
}

#[tokio::test]
async fn test_sigma_capping_tie_break() {
    // 0..=100 plus one outlier: the lower capped bound undershoots the
    // real minimum while the upper capped bound cuts off the outlier.
    let mut values: Vec<Option<i64>> = (0..=100).map(Some).collect();
    values.push(Some(10_000));
    let schema = Arc::new(Schema::new(vec![Field::new("v", DataType::Int64, true)]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![Arc::new(Int64Array::from(values))],
    )
    .unwrap();

    let ctx = SessionContext::new();
    let df = register_batch(&ctx, "t", batch).await;

    let profiler = DqProfiler::with_options(ProfileOptions::default().with_num_sigmas(3.0));
    let (summary, candidates) = profiler.profile(df, None).await.unwrap();

    let rule = find(&candidates, "min_max", "v").expect("range rule proposed");
    let parameters = rule.parameters.as_ref().unwrap();
    assert_eq!(parameters["min"], json!(0));
    let upper = parameters["max"].as_i64().unwrap();
    assert!(upper < 10_000, "upper bound {upper} should cut off the outlier");
    assert!(
        rule.description
            .as_ref()
            .unwrap()
            .starts_with("Real min value was used. Max was capped by 3 sigmas."),
        "{:?}",
        rule.description
    );

    let metrics = &summary["v"];
    assert_eq!(metrics["min"], json!(0));
    assert_eq!(metrics["max"], json!(10_000));
    assert_eq!(metrics["count"], json!(102));
}

#[tokio::test]
async fn test_outliers_excluded_on_both_sides() {
    let mut values: Vec<Option<i64>> = (0..=100).map(Some).collect();
    values.push(Some(10_000));
    values.push(Some(-10_000));
    let schema = Arc::new(Schema::new(vec![Field::new("v", DataType::Int64, true)]));
    let batch = RecordBatch::try_new(
        schema,
        vec![Arc::new(Int64Array::from(values))],
    )
    .unwrap();

    let ctx = SessionContext::new();
    let df = register_batch(&ctx, "t", batch).await;

    let profiler = DqProfiler::new();
    let (_, candidates) = profiler.profile(df, None).await.unwrap();

    let rule = find(&candidates, "min_max", "v").expect("range rule proposed");
    assert!(rule
        .description
        .as_ref()
        .unwrap()
        .starts_with("Range doesn't include outliers, capped by 3 sigmas."));
    let parameters = rule.parameters.as_ref().unwrap();
    assert!(parameters["min"].as_i64().unwrap() > -10_000);
    assert!(parameters["max"].as_i64().unwrap() < 10_000);
}

#[tokio::test]
async fn test_true_min_max_without_outlier_removal() {
    let schema = Arc::new(Schema::new(vec![Field::new("v", DataType::Int64, true)]));
    let batch = RecordBatch::try_new(
        schema,
        vec![Arc::new(Int64Array::from(vec![Some(3), Some(7), Some(5)]))],
    )
    .unwrap();

    let ctx = SessionContext::new();
    let df = register_batch(&ctx, "t", batch).await;

    let profiler =
        DqProfiler::with_options(ProfileOptions::default().with_remove_outliers(false));
    let (summary, candidates) = profiler.profile(df, None).await.unwrap();

    let rule = find(&candidates, "min_max", "v").unwrap();
    assert_eq!(rule.description.as_deref(), Some("Real min/max values were used"));
    let parameters = rule.parameters.as_ref().unwrap();
    assert_eq!(parameters["min"], json!(3));
    assert_eq!(parameters["max"], json!(7));

    // Mean and stddev are reported whether or not outlier capping ran.
    let metrics = &summary["v"];
    assert_eq!(metrics["mean"], json!(5.0));
    assert_eq!(metrics["stddev"], json!(2.0));
}

#[tokio::test]
async fn test_string_column_candidates() {
    // 3 distinct values across 100 rows: enumerable, never empty, no nulls.
    let values: Vec<Option<&str>> = (0..100)
        .map(|i| Some(["red", "green", "blue"][i % 3]))
        .collect();
    let schema = Arc::new(Schema::new(vec![Field::new("color", DataType::Utf8, true)]));
    let batch = RecordBatch::try_new(
        schema,
        vec![Arc::new(StringArray::from(values))],
    )
    .unwrap();

    let ctx = SessionContext::new();
    let df = register_batch(&ctx, "t", batch).await;

    let profiler = DqProfiler::new();
    let (summary, candidates) = profiler.profile(df, None).await.unwrap();

    assert!(find(&candidates, "is_not_null", "color").is_some());

    // String columns report lexicographic min/max like numeric ones.
    assert_eq!(summary["color"]["min"], json!("blue"));
    assert_eq!(summary["color"]["max"], json!("red"));

    let in_rule = find(&candidates, "is_in", "color").expect("allowed-set rule proposed");
    let allowed = in_rule.parameters.as_ref().unwrap()["in"].as_array().unwrap();
    // Sorted for determinism.
    assert_eq!(allowed, &vec![json!("blue"), json!("green"), json!("red")]);

    let empty_rule =
        find(&candidates, "is_not_null_or_empty", "color").expect("not-empty rule proposed");
    assert_eq!(
        empty_rule.parameters.as_ref().unwrap()["trim_strings"],
        json!(true)
    );

    // Candidate order within a column: not-null, allowed-set, not-empty.
    let kinds: Vec<&str> = candidates.iter().map(|p| p.kind.as_str()).collect();
    assert_eq!(kinds, vec!["is_not_null", "is_in", "is_not_null_or_empty"]);
}

#[tokio::test]
async fn test_nullish_column_skips_not_null_rule() {
    let values: Vec<Option<i64>> = (0..10).map(|i| if i < 5 { Some(i) } else { None }).collect();
    let schema = Arc::new(Schema::new(vec![Field::new("v", DataType::Int64, true)]));
    let batch = RecordBatch::try_new(
        schema,
        vec![Arc::new(Int64Array::from(values))],
    )
    .unwrap();

    let ctx = SessionContext::new();
    let df = register_batch(&ctx, "t", batch).await;

    let (summary, candidates) = DqProfiler::new().profile(df, None).await.unwrap();
    assert!(find(&candidates, "is_not_null", "v").is_none());
    assert_eq!(summary["v"]["count_null"], json!(5));
}

#[tokio::test]
async fn test_zero_row_dataset() {
    let schema = Arc::new(Schema::new(vec![
        Field::new("a", DataType::Int64, true),
        Field::new("b", DataType::Utf8, true),
    ]));
    let batch = RecordBatch::new_empty(schema);

    let ctx = SessionContext::new();
    let df = register_batch(&ctx, "t", batch).await;

    let (summary, candidates) = DqProfiler::new().profile(df, None).await.unwrap();
    assert!(candidates.is_empty());
    assert_eq!(summary["a"]["count"], json!(0));
    assert_eq!(summary["b"]["count"], json!(0));
}

#[tokio::test]
async fn test_generated_checks_run_through_engine() {
    let schema = Arc::new(Schema::new(vec![Field::new("v", DataType::Int64, true)]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![Arc::new(Int64Array::from(vec![Some(1), Some(2), Some(3)]))],
    )
    .unwrap();

    let ctx = SessionContext::new();
    let df = register_batch(&ctx, "t", batch).await;

    let (_, candidates) = DqProfiler::new().profile(df.clone(), None).await.unwrap();
    let specs = generate_checks(&candidates);
    assert!(!specs.is_empty());

    let status = validate_checks(&specs, None);
    assert!(!status.has_errors(), "{status}");

    let engine = DqEngine::new(ctx);
    let (valid, invalid) = engine
        .apply_checks_by_metadata_and_split(df, &specs, None)
        .await
        .unwrap();
    let valid_rows: usize = valid.collect().await.unwrap().iter().map(|b| b.num_rows()).sum();
    let invalid_rows: usize = invalid.collect().await.unwrap().iter().map(|b| b.num_rows()).sum();
    assert_eq!(valid_rows, 3);
    assert_eq!(invalid_rows, 0);
}
