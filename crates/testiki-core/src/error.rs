//! Error types for loading, answering, scoring, and submitting tests.
//!
//! Every failure the engine can surface to a front end is a `TestError`.
//! Callers classify errors with [`TestError::class`] instead of matching on
//! message text, which decides whether to prompt the user, restart the
//! attempt, or offer a retry.

use thiserror::Error;

/// Errors that can occur while running a test attempt.
#[derive(Debug, Error)]
pub enum TestError {
    /// No test exists with the requested identifier.
    #[error("test not found: {0}")]
    NotFound(String),

    /// The test definition or its scoring rules could not be used.
    #[error("malformed test definition: {0}")]
    Malformed(String),

    /// Scoring was requested before every question was answered.
    #[error("{} question(s) unanswered", unanswered.len())]
    Incomplete { unanswered: Vec<String> },

    /// The selected option index is outside the question's options.
    #[error("option {index} is out of range for question {question_id} ({option_count} options)")]
    InvalidOption {
        question_id: String,
        index: usize,
        option_count: usize,
    },

    /// The answered question does not belong to the test.
    #[error("unknown question: {0}")]
    UnknownQuestion(String),

    /// The backend rejected the credential, or none was supplied.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The backend could not be reached or failed to respond.
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// The runner cannot perform the operation in its current state.
    #[error("cannot {action} while {state}")]
    InvalidState { state: String, action: String },
}

/// Broad category of a [`TestError`], used to pick a recovery path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Recovered locally by prompting the user again.
    Input,
    /// Terminal for the attempt; the user goes back to the test list.
    Data,
    /// Shown to the user with a retry affordance.
    Transport,
    /// The caller asked for a transition the runner does not allow.
    State,
}

impl TestError {
    pub fn class(&self) -> ErrorClass {
        match self {
            TestError::InvalidOption { .. }
            | TestError::UnknownQuestion(_)
            | TestError::Incomplete { .. } => ErrorClass::Input,
            TestError::NotFound(_) | TestError::Malformed(_) => ErrorClass::Data,
            TestError::Unauthorized(_) | TestError::Unreachable(_) => ErrorClass::Transport,
            TestError::InvalidState { .. } => ErrorClass::State,
        }
    }

    /// Returns `true` if repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TestError::Unreachable(_))
    }

    /// Returns `true` if the session's credential should be discarded.
    pub fn requires_reauth(&self) -> bool {
        matches!(self, TestError::Unauthorized(_))
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        TestError::Malformed(message.into())
    }
}
