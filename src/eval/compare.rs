//! Side-by-side comparison of the remote and local backends.

use super::evaluator::{EvaluationRun, Evaluator, ProgressSink};
use crate::backend::AnswerBackend;
use crate::fixture::FixtureItem;
use crate::judge::{BoundedJudge, Judge};
use serde::{Deserialize, Serialize};

/// One fixture item with both backends' outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub source_id: String,
    pub question: String,
    pub expected_answer: String,
    pub remote_answer: String,
    pub remote_correct: bool,
    pub remote_failed: bool,
    pub local_answer: String,
    pub local_correct: bool,
    pub local_failed: bool,
}

/// Rows plus the aggregate score of each backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub remote_label: String,
    pub local_label: String,
    pub remote_accuracy: f64,
    pub local_accuracy: f64,
    pub remote_elapsed_secs: f64,
    pub local_elapsed_secs: f64,
    pub rows: Vec<ComparisonRow>,
}

impl ComparisonReport {
    pub fn new(remote: &EvaluationRun, local: &EvaluationRun, fixture: &[FixtureItem]) -> Self {
        Self {
            remote_label: remote.backend.clone(),
            local_label: local.backend.clone(),
            remote_accuracy: remote.accuracy,
            local_accuracy: local.accuracy,
            remote_elapsed_secs: remote.elapsed_secs,
            local_elapsed_secs: local.elapsed_secs,
            rows: Comparator::compare(remote, local, fixture),
        }
    }
}

/// Aligns two runs over the same fixture.
pub struct Comparator {
    evaluator: Evaluator,
}

impl Comparator {
    pub fn new(evaluator: Evaluator) -> Self {
        Self { evaluator }
    }

    /// Zip both runs with the fixture, one row per index.
    ///
    /// # Panics
    ///
    /// When the runs and the fixture do not all have the same length, or a
    /// verdict's question differs from the fixture item at its position; both
    /// runs must come from evaluating that same fixture.
    pub fn compare(
        remote: &EvaluationRun,
        local: &EvaluationRun,
        fixture: &[FixtureItem],
    ) -> Vec<ComparisonRow> {
        assert_eq!(
            remote.verdicts.len(),
            local.verdicts.len(),
            "remote and local runs have different lengths"
        );
        assert_eq!(
            remote.verdicts.len(),
            fixture.len(),
            "runs do not match the fixture length"
        );

        fixture
            .iter()
            .zip(remote.verdicts.iter().zip(&local.verdicts))
            .enumerate()
            .map(|(i, (item, (r, l)))| {
                assert!(
                    r.question == item.question && l.question == item.question,
                    "verdict {} does not answer fixture question {:?}",
                    i + 1,
                    item.question
                );
                (item, r, l)
            })
            .map(|(item, r, l)| ComparisonRow {
                source_id: item.source_id.clone(),
                question: item.question.clone(),
                expected_answer: item.expected_answer.clone(),
                remote_answer: r.produced_answer.clone(),
                remote_correct: r.is_correct,
                remote_failed: r.is_failure(),
                local_answer: l.produced_answer.clone(),
                local_correct: l.is_correct,
                local_failed: l.is_failure(),
            })
            .collect()
    }

    /// Evaluate both backends over `fixture` concurrently and compare.
    ///
    /// The two runs share one judge; together they keep at most the
    /// evaluator's concurrency in judge calls.
    pub async fn run(
        &self,
        fixture: &[FixtureItem],
        remote: &dyn AnswerBackend,
        local: &dyn AnswerBackend,
        judge: &dyn Judge,
        remote_progress: Option<&mut dyn ProgressSink>,
        local_progress: Option<&mut dyn ProgressSink>,
    ) -> ComparisonReport {
        let judge = BoundedJudge::new(judge, self.evaluator.concurrency());
        let (remote_run, local_run) = tokio::join!(
            self.evaluator.evaluate(fixture, remote, &judge, remote_progress),
            self.evaluator.evaluate(fixture, local, &judge, local_progress),
        );
        ComparisonReport::new(&remote_run, &local_run, fixture)
    }
}
