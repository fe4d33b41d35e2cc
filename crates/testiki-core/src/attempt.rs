//! Answer collection for a single in-progress attempt.
//!
//! An [`Attempt`] never owns the test it answers; every operation borrows
//! the [`Test`] so the same definition can back many sequential attempts.

use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::TestError;
use crate::model::{Answers, Test};

/// Answers and position for one run through a test.
#[derive(Debug, Clone)]
pub struct Attempt {
    id: Uuid,
    started_at: DateTime<Utc>,
    answers: Answers,
    position: usize,
}

impl Attempt {
    pub fn new() -> Self {
        Self::started_at(Utc::now())
    }

    pub fn started_at(started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at,
            answers: Answers::new(),
            position: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn answers(&self) -> &Answers {
        &self.answers
    }

    pub fn answer_for(&self, question_id: &str) -> Option<usize> {
        self.answers.get(question_id).copied()
    }

    /// Current question index.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Record (or overwrite) the answer to a question.
    ///
    /// Out-of-range options and unknown questions are rejected and leave the
    /// recorded answers untouched. The position never moves.
    pub fn record_answer(
        &mut self,
        test: &Test,
        question_id: &str,
        index: usize,
    ) -> Result<(), TestError> {
        let Some(question) = test.question(question_id) else {
            tracing::warn!(question_id, "rejected answer for unknown question");
            return Err(TestError::UnknownQuestion(question_id.to_string()));
        };

        if index >= question.option_count() {
            tracing::warn!(
                question_id,
                index,
                options = question.option_count(),
                "rejected out-of-range option"
            );
            return Err(TestError::InvalidOption {
                question_id: question_id.to_string(),
                index,
                option_count: question.option_count(),
            });
        }

        self.answers.insert(question_id.to_string(), index);
        Ok(())
    }

    /// `true` iff every question in the test has an answer.
    pub fn is_complete(&self, test: &Test) -> bool {
        test.questions
            .iter()
            .all(|q| self.answers.contains_key(&q.id))
    }

    /// Ids of unanswered questions, in presentation order.
    pub fn unanswered(&self, test: &Test) -> Vec<String> {
        test.questions
            .iter()
            .filter(|q| !self.answers.contains_key(&q.id))
            .map(|q| q.id.clone())
            .collect()
    }

    /// Move to the next question, stopping at the last one.
    pub fn next(&mut self, test: &Test) -> usize {
        self.go_to(test, self.position.saturating_add(1))
    }

    /// Move to the previous question, stopping at the first one.
    pub fn prev(&mut self, test: &Test) -> usize {
        self.go_to(test, self.position.saturating_sub(1))
    }

    /// Jump to a question index, clamped to the question range.
    pub fn go_to(&mut self, test: &Test, index: usize) -> usize {
        let last = test.questions.len().saturating_sub(1);
        self.position = index.min(last);
        self.position
    }

    /// Time left before the test's limit runs out, if it has one.
    ///
    /// Returns `Some(Duration::ZERO)` once the limit has passed.
    pub fn time_remaining(&self, test: &Test, now: DateTime<Utc>) -> Option<Duration> {
        let limit = test.time_limit_secs?;
        let elapsed = (now - self.started_at).to_std().unwrap_or_default();
        Some(Duration::from_secs(limit).saturating_sub(elapsed))
    }
}

impl Default for Attempt {
    fn default() -> Self {
        Self::new()
    }
}
