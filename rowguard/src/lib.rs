//! # Rowguard - Declarative Data Quality Checks for Rust
//!
//! Rowguard is a data quality rule engine built on DataFusion. It turns
//! declarative check specifications (function name plus arguments) into
//! evaluable per-row predicates, applies them to a DataFrame, and
//! aggregates failures into structured error and warning columns, with
//! an optional split of the dataset into valid and invalid partitions.
//! A companion profiler inspects a dataset's statistical shape and
//! proposes candidate checks automatically.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rowguard::prelude::*;
//! use datafusion::prelude::*;
//! use serde_json::json;
//!
//! # async fn example() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let ctx = SessionContext::new();
//! // ... register your data tables ...
//! let df = ctx.table("users").await?;
//!
//! // Declarative check specifications, typically loaded from YAML.
//! let specs = vec![
//!     json!({
//!         "criticality": "error",
//!         "check": {"function": "is_not_null", "arguments": {"col_names": ["user_id", "email"]}}
//!     }),
//!     json!({
//!         "criticality": "warn",
//!         "check": {
//!             "function": "is_in_range",
//!             "arguments": {"col_name": "age", "min_limit": 0, "max_limit": 120}
//!         }
//!     }),
//! ];
//!
//! let engine = DqEngine::new(ctx);
//! let (valid, invalid) = engine
//!     .apply_checks_by_metadata_and_split(df, &specs, None)
//!     .await?;
//!
//! valid.show().await?;
//! invalid.show().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`checks`**: built-in check functions and the injectable
//!   [`checks::FunctionRegistry`] with declared parameter schemas
//! - **`rules`**: [`rules::DqRule`], multi-column rule sets, and static
//!   validation of raw specifications
//! - **`engine`**: rule evaluation, result-column aggregation, and the
//!   valid/invalid splitter
//! - **`profiler`**: per-column summary statistics and candidate rule
//!   synthesis, plus generators for check specs and SQL expectations
//! - **`storage`**: YAML/JSON persistence of check specifications
//!
//! Evaluation is a pure function of (dataset, rules): expressions are
//! built once, side-effect free, and DataFusion owns all parallelism.

pub mod checks;
pub mod engine;
pub mod error;
pub mod logging;
pub mod prelude;
pub mod profiler;
pub mod rules;
pub mod storage;

pub use error::{DqError, Result};
