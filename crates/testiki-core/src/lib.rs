//! testiki-core: Test model, answer collection, scoring, and the attempt runner.
//!
//! This crate defines the data model, the loader/submitter traits, the
//! scoring strategies, and the state machine that drives one attempt from
//! loading to submission.

pub mod attempt;
pub mod error;
pub mod model;
pub mod parser;
pub mod record;
pub mod runner;
pub mod scoring;
pub mod traits;

pub use attempt::Attempt;
pub use error::{ErrorClass, TestError};
pub use model::{Question, ScoreResult, ScoringMethod, ScoringRules, Test};
pub use runner::{RunnerConfig, RunnerState, TestRunner};
