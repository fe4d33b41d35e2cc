//! In-memory source and sink for testing the runner without a backend.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use testiki_core::model::TestSummary;
use testiki_core::traits::{Ack, ResultSink, Session, Submission, TestSource};
use testiki_core::{Test, TestError};

/// A [`TestSource`] serving a fixed set of tests.
#[derive(Default)]
pub struct MemorySource {
    tests: BTreeMap<String, Test>,
    /// Number of `load` calls made.
    call_count: AtomicU32,
}

impl MemorySource {
    pub fn new(tests: impl IntoIterator<Item = Test>) -> Self {
        Self {
            tests: tests.into_iter().map(|t| (t.id.clone(), t)).collect(),
            call_count: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TestSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load(&self, id: &str) -> Result<Test, TestError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.tests
            .get(id)
            .cloned()
            .ok_or_else(|| TestError::NotFound(id.to_string()))
    }

    async fn list(&self) -> Result<Vec<TestSummary>, TestError> {
        Ok(self.tests.values().map(Test::summary).collect())
    }
}

/// A [`ResultSink`] that keeps submissions in memory.
///
/// Mirrors the backend's credential check: an anonymous session is refused.
/// Failures can be queued with [`MemorySink::fail_next`].
#[derive(Default)]
pub struct MemorySink {
    submissions: Mutex<Vec<Submission>>,
    failures: Mutex<VecDeque<TestError>>,
    call_count: AtomicU32,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a failure; queued failures are returned in order by the next `submit` calls.
    pub fn fail_next(&self, error: TestError) {
        self.failures.lock().unwrap_or_else(|e| e.into_inner()).push_back(error);
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn submit(&self, session: &Session, submission: &Submission) -> Result<Ack, TestError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if let Some(error) = self.failures.lock().unwrap_or_else(|e| e.into_inner()).pop_front() {
            return Err(error);
        }
        if !session.is_authenticated() {
            return Err(TestError::Unauthorized("not signed in".into()));
        }

        let mut submissions = self.submissions.lock().unwrap_or_else(|e| e.into_inner());
        submissions.push(submission.clone());
        Ok(Ack {
            result_id: Some(submissions.len().to_string()),
            message: None,
        })
    }
}
