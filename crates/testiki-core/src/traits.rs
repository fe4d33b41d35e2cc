//! Core trait definitions for loading tests and persisting results.
//!
//! These async traits are implemented by the `testiki-client` crate (HTTP
//! and in-memory) and by [`crate::parser::DirectorySource`] for local files.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TestError;
use crate::model::{Answers, ScoreResult, Test, TestSummary};

// ---------------------------------------------------------------------------
// Test Definition Loader
// ---------------------------------------------------------------------------

/// Where test definitions come from.
#[async_trait]
pub trait TestSource: Send + Sync {
    /// Human-readable source name (e.g. "api", "directory").
    fn name(&self) -> &str;

    /// Load one test by slug or id.
    ///
    /// Fails with `NotFound` if no such test exists and with `Malformed` if
    /// its definition cannot be used.
    async fn load(&self, id: &str) -> Result<Test, TestError>;

    /// List the tests this source can load.
    async fn list(&self) -> Result<Vec<TestSummary>, TestError>;
}

// ---------------------------------------------------------------------------
// Result Submitter
// ---------------------------------------------------------------------------

/// Where finished attempts are persisted.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Human-readable sink name.
    fn name(&self) -> &str;

    /// Persist one scored attempt.
    ///
    /// Fails with `Unauthorized` when the session carries no valid
    /// credential and with `Unreachable` on network or backend failure.
    async fn submit(&self, session: &Session, submission: &Submission) -> Result<Ack, TestError>;
}

/// Credential handed to the submitter by whoever manages authentication.
///
/// Custom Debug impl masks the token.
#[derive(Clone, Default)]
pub struct Session {
    token: Option<String>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self { token: None }
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let token = token.into();
        Self {
            token: (!token.trim().is_empty()).then_some(token),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Drop the credential after the backend rejected it.
    pub fn invalidate(&mut self) {
        self.token = None;
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Payload persisted for a finished attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub test_slug: String,
    pub test_name: String,
    /// Normalized percentage, 0..=100.
    pub score: u8,
    pub result_text: String,
    pub answers: Answers,
}

impl Submission {
    pub fn new(test: &Test, result: &ScoreResult, answers: &Answers) -> Self {
        Self {
            test_slug: test.id.clone(),
            test_name: test.title.clone(),
            score: result.percentage,
            result_text: result.label.clone(),
            answers: answers.clone(),
        }
    }
}

/// Acknowledgement returned by a sink.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    /// Server-assigned result id, when the backend reports one.
    #[serde(default)]
    pub result_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
