//! Console summaries and file exports for evaluation results.

use super::compare::{ComparisonReport, ComparisonRow};
use super::evaluator::EvaluationRun;
use crate::error::{Result, RfpError};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Per-cell outcome marker.
fn marker(correct: bool, failed: bool) -> &'static str {
    if failed {
        "⚠"
    } else if correct {
        "✅"
    } else {
        "❌"
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| RfpError::io(parent, e))?;
        }
    }
    Ok(())
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let json =
        serde_json::to_string_pretty(value).map_err(|e| RfpError::Serialization(e.to_string()))?;
    fs::write(path, json).map_err(|e| RfpError::io(path, e))
}

impl EvaluationRun {
    pub fn print_summary(&self) {
        println!("\n========== Evaluation: {} ==========", self.backend);
        println!("Items:    {}", self.total());
        println!("Correct:  {}", self.correct_count());
        println!("Errors:   {}", self.failure_count());
        println!("Accuracy: {:.2}%", self.accuracy);
        println!("Time:     {:.1}s", self.elapsed_secs);
        println!("====================================\n");
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        write_json(self, path)
    }
}

impl ComparisonReport {
    fn count(&self, pick: impl Fn(&ComparisonRow) -> bool) -> usize {
        self.rows.iter().filter(|r| pick(r)).count()
    }

    pub fn print_summary(&self) {
        let width = self.remote_label.len().max(self.local_label.len()).max(7);
        println!("\n========== Comparison Results ==========");
        println!("Items: {}", self.rows.len());
        println!("----------------------------------------");
        println!(
            "{:<width$}  {:>8}  {:>7}  {:>6}  {:>7}",
            "backend", "accuracy", "correct", "errors", "time"
        );
        println!(
            "{:<width$}  {:>7.2}%  {:>7}  {:>6}  {:>6.1}s",
            self.remote_label,
            self.remote_accuracy,
            self.count(|r| r.remote_correct),
            self.count(|r| r.remote_failed),
            self.remote_elapsed_secs
        );
        println!(
            "{:<width$}  {:>7.2}%  {:>7}  {:>6}  {:>6.1}s",
            self.local_label,
            self.local_accuracy,
            self.count(|r| r.local_correct),
            self.count(|r| r.local_failed),
            self.local_elapsed_secs
        );
        println!("----------------------------------------");
        println!(
            "Disagreements: {}",
            self.count(|r| r.remote_correct != r.local_correct)
        );
        println!("========================================\n");
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        write_json(self, path)
    }

    /// One CSV row per item with ✅/❌/⚠ outcome markers.
    pub fn save_csv(&self, path: &Path) -> Result<()> {
        ensure_parent(path)?;
        let csv_error = |e: csv::Error| RfpError::Serialization(e.to_string());
        let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;

        let headers = [
            "source_id".to_string(),
            "question".to_string(),
            "expected_answer".to_string(),
            format!("{}_answer", self.remote_label),
            format!("{}_verdict", self.remote_label),
            format!("{}_answer", self.local_label),
            format!("{}_verdict", self.local_label),
        ];
        writer.write_record(&headers).map_err(csv_error)?;
        for row in &self.rows {
            writer
                .write_record([
                    row.source_id.as_str(),
                    row.question.as_str(),
                    row.expected_answer.as_str(),
                    row.remote_answer.as_str(),
                    marker(row.remote_correct, row.remote_failed),
                    row.local_answer.as_str(),
                    marker(row.local_correct, row.local_failed),
                ])
                .map_err(csv_error)?;
        }
        writer.flush().map_err(|e| RfpError::io(path, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn report() -> ComparisonReport {
        let row = |id: &str, remote_correct, local_correct, local_failed| ComparisonRow {
            source_id: id.to_string(),
            question: format!("{} 질문", id),
            expected_answer: "hwp".to_string(),
            remote_answer: "hwp 파일, 제안요청서".to_string(),
            remote_correct,
            remote_failed: false,
            local_answer: "모름".to_string(),
            local_correct,
            local_failed,
        };
        ComparisonReport {
            remote_label: "remote".to_string(),
            local_label: "local".to_string(),
            remote_accuracy: 100.0,
            local_accuracy: 50.0,
            remote_elapsed_secs: 1.5,
            local_elapsed_secs: 9.0,
            rows: vec![row("a.hwp", true, true, false), row("b.hwp", true, false, true)],
        }
    }

    #[test]
    fn test_markers() {
        assert_eq!(marker(true, false), "✅");
        assert_eq!(marker(false, false), "❌");
        assert_eq!(marker(false, true), "⚠");
    }

    #[test]
    fn test_save_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("report.csv");
        report().save_csv(&path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[3], "remote_answer");
        assert_eq!(&headers[6], "local_verdict");

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][4], "✅");
        assert_eq!(&rows[1][6], "⚠");
        // Embedded comma survives quoting.
        assert_eq!(&rows[1][3], "hwp 파일, 제안요청서");
    }

    #[test]
    fn test_save_json_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("report.json");
        let original = report();
        original.save_json(&path).unwrap();

        let loaded: ComparisonReport =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, original);
    }
}
