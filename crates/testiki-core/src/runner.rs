//! Attempt orchestrator.
//!
//! Sequences one attempt through load -> answer -> score -> submit as an
//! explicit state machine:
//!
//! ```text
//! Loading ──> Ready ──> InProgress ──> Scoring ──> Submitted
//!    │                                    │
//!    └──> LoadError                       ├──> ScoreError ─┐
//!                                         └──> SubmitError ┴─> (retry) Scoring
//! ```
//!
//! Async operations take `&mut self`, so a runner can never have two loads
//! or submissions in flight at once.

use std::fmt;
use std::sync::Arc;

use crate::attempt::Attempt;
use crate::error::TestError;
use crate::model::{Question, ScoreResult, Test};
use crate::scoring;
use crate::traits::{Ack, ResultSink, Session, Submission, TestSource};

/// Where an attempt currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Loading,
    Ready,
    InProgress,
    Scoring,
    Submitted,
    LoadError,
    ScoreError,
    SubmitError,
}

impl RunnerState {
    /// States from which no further progress is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunnerState::Submitted | RunnerState::LoadError)
    }

    fn accepts_answers(self) -> bool {
        matches!(self, RunnerState::Ready | RunnerState::InProgress)
    }

    fn accepts_submit(self) -> bool {
        matches!(
            self,
            RunnerState::Ready
                | RunnerState::InProgress
                | RunnerState::ScoreError
                | RunnerState::SubmitError
        )
    }
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunnerState::Loading => "loading",
            RunnerState::Ready => "ready",
            RunnerState::InProgress => "in progress",
            RunnerState::Scoring => "scoring",
            RunnerState::Submitted => "submitted",
            RunnerState::LoadError => "failed to load",
            RunnerState::ScoreError => "failed to score",
            RunnerState::SubmitError => "failed to submit",
        };
        f.write_str(s)
    }
}

/// Configuration for a test runner.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Move to the next question after the current one is answered.
    pub auto_advance: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self { auto_advance: true }
    }
}

/// Observer for runner progress, e.g. to drive a UI.
pub trait RunnerEvents: Send + Sync {
    fn on_transition(&self, from: RunnerState, to: RunnerState);
    fn on_answer_rejected(&self, error: &TestError);
    fn on_submitted(&self, result: &ScoreResult, ack: &Ack);
}

/// No-op event observer.
pub struct NoopEvents;

impl RunnerEvents for NoopEvents {
    fn on_transition(&self, _: RunnerState, _: RunnerState) {}
    fn on_answer_rejected(&self, _: &TestError) {}
    fn on_submitted(&self, _: &ScoreResult, _: &Ack) {}
}

/// Drives a single attempt at a single test.
pub struct TestRunner {
    source: Arc<dyn TestSource>,
    sink: Arc<dyn ResultSink>,
    session: Session,
    config: RunnerConfig,
    events: Arc<dyn RunnerEvents>,
    state: RunnerState,
    test: Option<Test>,
    attempt: Attempt,
    result: Option<ScoreResult>,
    ack: Option<Ack>,
    last_error: Option<String>,
}

impl TestRunner {
    pub fn new(
        source: Arc<dyn TestSource>,
        sink: Arc<dyn ResultSink>,
        session: Session,
        config: RunnerConfig,
    ) -> Self {
        Self {
            source,
            sink,
            session,
            config,
            events: Arc::new(NoopEvents),
            state: RunnerState::Loading,
            test: None,
            attempt: Attempt::new(),
            result: None,
            ack: None,
            last_error: None,
        }
    }

    pub fn with_events(mut self, events: Arc<dyn RunnerEvents>) -> Self {
        self.events = events;
        self
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    pub fn test(&self) -> Option<&Test> {
        self.test.as_ref()
    }

    pub fn attempt(&self) -> &Attempt {
        &self.attempt
    }

    pub fn result(&self) -> Option<&ScoreResult> {
        self.result.as_ref()
    }

    pub fn ack(&self) -> Option<&Ack> {
        self.ack.as_ref()
    }

    /// Message of the error that put the runner in an error state.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Replace the credential, e.g. after the user logs in again.
    pub fn set_session(&mut self, session: Session) {
        self.session = session;
    }

    /// Question at the current position.
    pub fn current_question(&self) -> Option<&Question> {
        let test = self.test.as_ref()?;
        test.questions.get(self.attempt.position())
    }

    /// Unanswered question ids, in presentation order.
    pub fn unanswered(&self) -> Vec<String> {
        match &self.test {
            Some(test) => self.attempt.unanswered(test),
            None => Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.test
            .as_ref()
            .is_some_and(|test| self.attempt.is_complete(test))
    }

    fn transition(&mut self, to: RunnerState) {
        let from = self.state;
        if from != to {
            tracing::debug!(%from, %to, "runner transition");
            self.state = to;
            self.events.on_transition(from, to);
        }
    }

    fn refuse(&self, action: &str) -> TestError {
        TestError::InvalidState {
            state: self.state.to_string(),
            action: action.to_string(),
        }
    }

    fn fail(&mut self, to: RunnerState, error: TestError) -> TestError {
        self.last_error = Some(error.to_string());
        self.transition(to);
        error
    }

    /// Fetch the test definition. Only valid while `Loading`.
    pub async fn load(&mut self, id: &str) -> Result<&Test, TestError> {
        if self.state != RunnerState::Loading {
            return Err(self.refuse("load a test"));
        }

        match self.source.load(id).await {
            Ok(test) => {
                tracing::info!(
                    test = %test.id,
                    source = self.source.name(),
                    questions = test.questions.len(),
                    method = %test.scoring_method,
                    "test loaded"
                );
                self.attempt = Attempt::new();
                self.transition(RunnerState::Ready);
                let test: &Test = self.test.insert(test);
                Ok(test)
            }
            Err(e) => {
                tracing::warn!(test = id, error = %e, "failed to load test");
                Err(self.fail(RunnerState::LoadError, e))
            }
        }
    }

    /// Record an answer. Rejected answers leave the attempt and state as is.
    pub fn answer(&mut self, question_id: &str, index: usize) -> Result<(), TestError> {
        if !self.state.accepts_answers() {
            return Err(self.refuse("answer"));
        }
        let Some(test) = self.test.as_ref() else {
            return Err(self.refuse("answer"));
        };

        if let Err(e) = self.attempt.record_answer(test, question_id, index) {
            self.events.on_answer_rejected(&e);
            return Err(e);
        }

        if self.config.auto_advance && test.position_of(question_id) == Some(self.attempt.position()) {
            self.attempt.next(test);
        }
        self.transition(RunnerState::InProgress);
        Ok(())
    }

    /// Answer the question at the current position.
    pub fn answer_current(&mut self, index: usize) -> Result<(), TestError> {
        let Some(id) = self.current_question().map(|q| q.id.clone()) else {
            return Err(self.refuse("answer"));
        };
        self.answer(&id, index)
    }

    pub fn next(&mut self) -> Result<usize, TestError> {
        self.navigate(|attempt, test| attempt.next(test))
    }

    pub fn prev(&mut self) -> Result<usize, TestError> {
        self.navigate(|attempt, test| attempt.prev(test))
    }

    pub fn go_to(&mut self, index: usize) -> Result<usize, TestError> {
        self.navigate(|attempt, test| attempt.go_to(test, index))
    }

    fn navigate(&mut self, step: impl FnOnce(&mut Attempt, &Test) -> usize) -> Result<usize, TestError> {
        if !self.state.accepts_answers() {
            return Err(self.refuse("navigate"));
        }
        match self.test.as_ref() {
            Some(test) => Ok(step(&mut self.attempt, test)),
            None => Err(self.refuse("navigate")),
        }
    }

    /// Score the attempt and hand it to the result sink.
    ///
    /// Refused with `Incomplete` (and no state change) until every question
    /// is answered; the sink is not called in that case. After a scoring or
    /// submission failure the attempt is kept, so calling `submit` again
    /// retries without re-answering.
    pub async fn submit(&mut self) -> Result<ScoreResult, TestError> {
        if !self.state.accepts_submit() {
            return Err(self.refuse("submit"));
        }
        let Some(test) = self.test.as_ref() else {
            return Err(self.refuse("submit"));
        };

        if !self.attempt.is_complete(test) {
            let unanswered = self.attempt.unanswered(test);
            tracing::debug!(missing = unanswered.len(), "submit refused, attempt incomplete");
            return Err(TestError::Incomplete { unanswered });
        }

        self.transition(RunnerState::Scoring);

        let test = match self.test.as_ref() {
            Some(test) => test,
            None => return Err(self.refuse("submit")),
        };
        let result = match scoring::score(test, &self.attempt) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = %e, "scoring failed");
                return Err(self.fail(RunnerState::ScoreError, e));
            }
        };
        let submission = Submission::new(test, &result, self.attempt.answers());
        self.result = Some(result.clone());

        match self.sink.submit(&self.session, &submission).await {
            Ok(ack) => {
                tracing::info!(
                    test = %submission.test_slug,
                    score = submission.score,
                    sink = self.sink.name(),
                    "attempt submitted"
                );
                self.events.on_submitted(&result, &ack);
                self.ack = Some(ack);
                self.last_error = None;
                self.transition(RunnerState::Submitted);
                Ok(result)
            }
            Err(e) => {
                if e.requires_reauth() {
                    tracing::warn!("credential rejected, clearing session");
                    self.session.invalidate();
                } else {
                    tracing::warn!(error = %e, "submission failed");
                }
                Err(self.fail(RunnerState::SubmitError, e))
            }
        }
    }
}
