//! Convenience re-exports of the most commonly used types.

pub use crate::checks::{
    CheckArgs, CheckColumn, CheckFunction, FunctionRegistry, ParamKind, ParamSpec,
};
pub use crate::engine::{DqEngine, EngineOptions, ResultEntry};
pub use crate::error::{DqError, Result};
pub use crate::logging::{init_logging, LoggingConfig};
pub use crate::profiler::generator::{generate_checks, generate_sql_expectations, SqlExpectation};
pub use crate::profiler::{DqProfile, DqProfiler, ProfileOptions, SummaryStats};
pub use crate::rules::validation::validate_checks;
pub use crate::rules::{Criticality, DqRule, DqRuleSet, ValidationStatus};
pub use crate::storage::{load_checks_from_file, save_checks_to_file};
