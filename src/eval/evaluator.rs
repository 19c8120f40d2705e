//! Runs a fixture against one backend and grades every answer.

use crate::backend::AnswerBackend;
use crate::config::EvalConfig;
use crate::error::RfpError;
use crate::fixture::FixtureItem;
use crate::judge::Judge;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Upper bound on in-flight items per run.
pub const MAX_CONCURRENCY: usize = 8;

/// Outcome for one fixture item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub question: String,
    pub expected_answer: String,
    /// The backend's answer, or the backend error text when it failed.
    pub produced_answer: String,
    pub is_correct: bool,
    /// Error text when answering or grading failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl Verdict {
    fn graded(item: &FixtureItem, produced: String, is_correct: bool) -> Self {
        Self {
            question: item.question.clone(),
            expected_answer: item.expected_answer.clone(),
            produced_answer: produced,
            is_correct,
            failure: None,
        }
    }

    fn failed(item: &FixtureItem, produced: String, failure: String) -> Self {
        Self {
            question: item.question.clone(),
            expected_answer: item.expected_answer.clone(),
            produced_answer: produced,
            is_correct: false,
            failure: Some(failure),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }
}

/// All verdicts of one backend over one fixture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRun {
    pub backend: String,
    /// In fixture order.
    pub verdicts: Vec<Verdict>,
    /// Percentage of correct verdicts; 0.0 for an empty fixture.
    pub accuracy: f64,
    pub elapsed_secs: f64,
}

impl EvaluationRun {
    pub fn new(backend: impl Into<String>, verdicts: Vec<Verdict>, elapsed_secs: f64) -> Self {
        let correct = verdicts.iter().filter(|v| v.is_correct).count();
        let accuracy = if verdicts.is_empty() {
            0.0
        } else {
            correct as f64 / verdicts.len() as f64 * 100.0
        };
        Self {
            backend: backend.into(),
            verdicts,
            accuracy,
            elapsed_secs,
        }
    }

    pub fn total(&self) -> usize {
        self.verdicts.len()
    }

    pub fn correct_count(&self) -> usize {
        self.verdicts.iter().filter(|v| v.is_correct).count()
    }

    pub fn failure_count(&self) -> usize {
        self.verdicts.iter().filter(|v| v.is_failure()).count()
    }
}

/// Receives `(fraction, message)` after each finished item.
pub trait ProgressSink {
    fn report(&mut self, fraction: f64, message: &str);
}

impl<F> ProgressSink for F
where
    F: FnMut(f64, &str),
{
    fn report(&mut self, fraction: f64, message: &str) {
        self(fraction, message)
    }
}

/// Drives answer generation and grading over a fixture.
#[derive(Debug, Clone)]
pub struct Evaluator {
    concurrency: usize,
    item_timeout: Duration,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::from_config(&EvalConfig::default())
    }
}

impl Evaluator {
    pub fn new(concurrency: usize, item_timeout: Duration) -> Self {
        Self {
            concurrency: concurrency.clamp(1, MAX_CONCURRENCY),
            item_timeout,
        }
    }

    pub fn from_config(config: &EvalConfig) -> Self {
        Self::new(config.concurrency, Duration::from_secs(config.item_timeout_secs))
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Evaluate every fixture item with `backend`, graded by `judge`.
    ///
    /// Verdicts come back in fixture order whatever the concurrency. An item
    /// that fails (backend error, judge error or timeout) is recorded as an
    /// incorrect verdict carrying the error and the run moves on.
    pub async fn evaluate(
        &self,
        fixture: &[FixtureItem],
        backend: &dyn AnswerBackend,
        judge: &dyn Judge,
        mut progress: Option<&mut dyn ProgressSink>,
    ) -> EvaluationRun {
        let total = fixture.len();
        let started = Instant::now();
        tracing::info!(
            backend = backend.name(),
            items = total,
            concurrency = self.concurrency,
            "evaluation started"
        );

        let mut pending = stream::iter(fixture.iter().map(|item| self.evaluate_item(item, backend, judge)))
            .buffered(self.concurrency);

        let mut verdicts = Vec::with_capacity(total);
        while let Some(verdict) = pending.next().await {
            if let Some(failure) = &verdict.failure {
                tracing::warn!(
                    backend = backend.name(),
                    item = verdicts.len() + 1,
                    error = %failure,
                    "item failed"
                );
            }
            verdicts.push(verdict);

            if let Some(sink) = progress.as_deref_mut() {
                let done = verdicts.len();
                sink.report(
                    done as f64 / total as f64,
                    &format!("[{}] {}/{} evaluated", backend.name(), done, total),
                );
            }
        }

        let run = EvaluationRun::new(backend.name(), verdicts, started.elapsed().as_secs_f64());
        tracing::info!(
            backend = %run.backend,
            accuracy = run.accuracy,
            correct = run.correct_count(),
            failures = run.failure_count(),
            elapsed_secs = run.elapsed_secs,
            "evaluation finished"
        );
        run
    }

    async fn evaluate_item(
        &self,
        item: &FixtureItem,
        backend: &dyn AnswerBackend,
        judge: &dyn Judge,
    ) -> Verdict {
        let attempt = async {
            match backend.generate_answer(&item.question, &[]).await {
                Err(e) => {
                    let message = e.to_string();
                    Verdict::failed(item, message.clone(), message)
                }
                Ok(produced) => match judge
                    .judge(&item.question, &item.expected_answer, &produced)
                    .await
                {
                    Ok(is_correct) => Verdict::graded(item, produced, is_correct),
                    Err(e) => Verdict::failed(item, produced, format!("judge: {}", e)),
                },
            }
        };

        match tokio::time::timeout(self.item_timeout, attempt).await {
            Ok(verdict) => verdict,
            Err(_) => {
                let message = RfpError::Timeout(self.item_timeout).to_string();
                Verdict::failed(item, message.clone(), message)
            }
        }
    }
}
