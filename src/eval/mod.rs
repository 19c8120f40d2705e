//! Evaluation of answer backends over a fixture.
//!
//! - [`Evaluator`] runs one backend and grades each answer with a judge
//! - [`Comparator`] runs the remote and local backends over the same fixture
//!   and aligns their verdicts row by row
//! - report helpers print summaries and export JSON/CSV

mod compare;
mod evaluator;
mod report;

pub use compare::{Comparator, ComparisonReport, ComparisonRow};
pub use evaluator::{EvaluationRun, Evaluator, MAX_CONCURRENCY, ProgressSink, Verdict};
