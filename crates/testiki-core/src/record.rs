//! Locally saved attempt records.
//!
//! An [`AttemptRecord`] is the offline counterpart of a backend submission:
//! one pretty-printed JSON file per finished attempt. [`RecordSink`] lets the
//! runner persist to a directory instead of (or before) a remote store.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TestError;
use crate::traits::{Ack, ResultSink, Session, Submission};

/// A finished attempt saved to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Unique record identifier.
    pub id: Uuid,
    /// When the attempt was recorded.
    pub completed_at: DateTime<Utc>,
    #[serde(flatten)]
    pub submission: Submission,
}

impl AttemptRecord {
    pub fn new(submission: Submission) -> Self {
        Self {
            id: Uuid::new_v4(),
            completed_at: Utc::now(),
            submission,
        }
    }

    /// File name used inside a results directory.
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}.json",
            self.submission.test_slug,
            self.completed_at.format("%Y-%m-%dT%H%M%S")
        )
    }

    /// Save the record as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize record")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write record to {}", path.display()))?;
        Ok(())
    }

    /// Load a record from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read record from {}", path.display()))?;
        let record: AttemptRecord =
            serde_json::from_str(&content).context("failed to parse record JSON")?;
        Ok(record)
    }
}

/// A [`ResultSink`] that writes each submission into a directory.
///
/// Needs no credential.
pub struct RecordSink {
    dir: PathBuf,
}

impl RecordSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl ResultSink for RecordSink {
    fn name(&self) -> &str {
        "local"
    }

    async fn submit(&self, _: &Session, submission: &Submission) -> Result<Ack, TestError> {
        let record = AttemptRecord::new(submission.clone());
        let path = self.dir.join(record.file_name());
        record
            .save_json(&path)
            .map_err(|e| TestError::Unreachable(format!("{e:#}")))?;
        tracing::debug!(path = %path.display(), "attempt recorded");
        Ok(Ack {
            result_id: Some(record.id.to_string()),
            message: Some(format!("saved to {}", path.display())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Answers;

    fn submission() -> Submission {
        let mut answers = Answers::new();
        answers.insert("1".into(), 2);
        Submission {
            test_slug: "love".into(),
            test_name: "Love".into(),
            score: 42,
            result_text: "Curious".into(),
            answers,
        }
    }

    #[test]
    fn record_is_flat_json() {
        let record = AttemptRecord::new(submission());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["test_slug"], "love");
        assert_eq!(json["score"], 42);
        assert_eq!(json["answers"]["1"], 2);
        assert!(json["completed_at"].is_string());
    }

    #[test]
    fn json_roundtrip() {
        let record = AttemptRecord::new(submission());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(record.file_name());

        record.save_json(&path).unwrap();
        let loaded = AttemptRecord::load_json(&path).unwrap();
        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.submission, record.submission);
    }

    #[tokio::test]
    async fn sink_writes_one_file_per_submission() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RecordSink::new(dir.path());

        let ack = sink
            .submit(&Session::anonymous(), &submission())
            .await
            .unwrap();
        assert!(ack.result_id.is_some());

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
        let path = files[0].as_ref().unwrap().path();
        assert!(path.file_name().unwrap().to_str().unwrap().starts_with("love-"));
    }
}
