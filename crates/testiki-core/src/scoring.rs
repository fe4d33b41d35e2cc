//! Scoring strategies and range matching.
//!
//! Each [`ScoringStrategy`] reduces a complete set of answers to a raw
//! [`Tally`]. [`score`] then normalizes the tally to a percentage and looks
//! up the verdict in the test's [`ScoringRules`](crate::model::ScoringRules).

use crate::attempt::Attempt;
use crate::error::TestError;
use crate::model::{Answers, ScoreResult, ScoringMethod, Test, Weighting};

/// Label prefix used when no range contains the percentage.
pub const FALLBACK_LABEL: &str = "Результат";

/// Raw points collected by a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub total: u32,
    pub max_total: u32,
}

/// A way of turning answers into points.
///
/// Implementations may assume every question has an answer within range;
/// [`score`] checks completeness before calling them.
pub trait ScoringStrategy: Send + Sync {
    /// Short strategy name for logs.
    fn name(&self) -> &str;

    fn tally(&self, test: &Test, answers: &Answers) -> Result<Tally, TestError>;
}

/// Sum of selected option weights.
pub struct LinearSum {
    pub weighting: Weighting,
}

impl LinearSum {
    fn weight(&self, weights: Option<&[u32]>, index: usize) -> Option<u32> {
        match weights {
            Some(w) => w.get(index).copied(),
            None => {
                let base = match self.weighting {
                    Weighting::Position => 1,
                    Weighting::Index => 0,
                };
                u32::try_from(index).ok().and_then(|i| i.checked_add(base))
            }
        }
    }
}

impl ScoringStrategy for LinearSum {
    fn name(&self) -> &str {
        "linear-sum"
    }

    fn tally(&self, test: &Test, answers: &Answers) -> Result<Tally, TestError> {
        let mut total = 0u32;
        let mut max_weight = 0u32;

        for question in &test.questions {
            let weights = question.weights.as_deref();
            if let Some(w) = weights {
                if w.len() != question.option_count() {
                    return Err(TestError::malformed(format!(
                        "question {} has {} weights for {} options",
                        question.id,
                        w.len(),
                        question.option_count()
                    )));
                }
            }

            for index in 0..question.option_count() {
                if let Some(weight) = self.weight(weights, index) {
                    max_weight = max_weight.max(weight);
                }
            }

            let selected = answered(answers, &question.id)?;
            let weight = self.weight(weights, selected).ok_or_else(|| {
                TestError::malformed(format!("no weight for option {selected} of {}", question.id))
            })?;
            total = total.saturating_add(weight);
        }

        let max_total = question_count(test).saturating_mul(max_weight);
        if max_total == 0 {
            return Err(TestError::malformed(
                "maximum possible total is zero; every option weighs nothing",
            ));
        }

        Ok(Tally { total, max_total })
    }
}

/// One point per question answered with its correct option.
pub struct CorrectAnswer;

impl ScoringStrategy for CorrectAnswer {
    fn name(&self) -> &str {
        "correct-answer"
    }

    fn tally(&self, test: &Test, answers: &Answers) -> Result<Tally, TestError> {
        let mut total = 0u32;
        for question in &test.questions {
            let correct = question.correct.ok_or_else(|| {
                TestError::malformed(format!("question {} has no correct option", question.id))
            })?;
            if answered(answers, &question.id)? == correct {
                total += 1;
            }
        }
        Ok(Tally {
            total,
            max_total: question_count(test),
        })
    }
}

/// One point per keyed answer; reverse-scored questions invert the match.
pub struct KeyedPolarity<'a> {
    pub keyed_option: usize,
    pub reverse_scored: &'a [String],
}

impl ScoringStrategy for KeyedPolarity<'_> {
    fn name(&self) -> &str {
        "keyed-polarity"
    }

    fn tally(&self, test: &Test, answers: &Answers) -> Result<Tally, TestError> {
        let mut total = 0u32;
        for question in &test.questions {
            let keyed = answered(answers, &question.id)? == self.keyed_option;
            let reversed = self.reverse_scored.iter().any(|id| *id == question.id);
            if keyed != reversed {
                total += 1;
            }
        }
        Ok(Tally {
            total,
            max_total: question_count(test),
        })
    }
}

fn answered(answers: &Answers, question_id: &str) -> Result<usize, TestError> {
    answers
        .get(question_id)
        .copied()
        .ok_or_else(|| TestError::Incomplete {
            unanswered: vec![question_id.to_string()],
        })
}

fn question_count(test: &Test) -> u32 {
    u32::try_from(test.questions.len()).unwrap_or(u32::MAX)
}

/// Resolve the strategy named by a test's metadata.
pub fn strategy_for(method: &ScoringMethod) -> Box<dyn ScoringStrategy + '_> {
    match method {
        ScoringMethod::LinearSum { weighting } => Box::new(LinearSum {
            weighting: *weighting,
        }),
        ScoringMethod::CorrectAnswer => Box::new(CorrectAnswer),
        ScoringMethod::KeyedPolarity {
            keyed_option,
            reverse_scored,
        } => Box::new(KeyedPolarity {
            keyed_option: *keyed_option,
            reverse_scored: reverse_scored.as_slice(),
        }),
    }
}

/// `round(total / max_total * 100)`, rounding halves up, clamped to 100.
pub fn percentage(total: u32, max_total: u32) -> u8 {
    if max_total == 0 {
        return 0;
    }
    let pct = (f64::from(total) / f64::from(max_total) * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

/// Score a completed attempt.
///
/// Fails with `Incomplete` if any question is unanswered and with
/// `Malformed` if the rules have no ranges or the strategy lacks the data
/// it needs. A percentage no range contains is not an error: it yields
/// the fallback label with `matched = false`.
pub fn score(test: &Test, attempt: &Attempt) -> Result<ScoreResult, TestError> {
    if !attempt.is_complete(test) {
        return Err(TestError::Incomplete {
            unanswered: attempt.unanswered(test),
        });
    }
    score_answers(test, attempt.answers())
}

/// Score a raw answer map, e.g. one read back from a saved record.
pub fn score_answers(test: &Test, answers: &Answers) -> Result<ScoreResult, TestError> {
    if test.questions.is_empty() {
        return Err(TestError::malformed("test has no questions"));
    }
    if test.scoring_rules.ranges.is_empty() {
        return Err(TestError::malformed("scoring rules contain no ranges"));
    }

    let unanswered: Vec<String> = test
        .questions
        .iter()
        .filter(|q| !answers.contains_key(&q.id))
        .map(|q| q.id.clone())
        .collect();
    if !unanswered.is_empty() {
        return Err(TestError::Incomplete { unanswered });
    }
    for question in &test.questions {
        let index = answers[&question.id];
        if index >= question.option_count() {
            return Err(TestError::InvalidOption {
                question_id: question.id.clone(),
                index,
                option_count: question.option_count(),
            });
        }
    }

    let strategy = strategy_for(&test.scoring_method);
    let tally = strategy.tally(test, answers)?;
    let pct = percentage(tally.total, tally.max_total);

    tracing::debug!(
        test = %test.id,
        strategy = strategy.name(),
        total = tally.total,
        max_total = tally.max_total,
        percentage = pct,
        "scored attempt"
    );

    let result = match test.scoring_rules.match_percentage(pct) {
        Some(range) => ScoreResult {
            total: tally.total,
            max_total: tally.max_total,
            percentage: pct,
            label: range
                .text
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| fallback_label(pct)),
            description: range.description.clone().unwrap_or_default(),
            matched: true,
        },
        None => {
            tracing::debug!(test = %test.id, percentage = pct, "no range matched, using fallback");
            ScoreResult {
                total: tally.total,
                max_total: tally.max_total,
                percentage: pct,
                label: fallback_label(pct),
                description: String::new(),
                matched: false,
            }
        }
    };

    Ok(result)
}

fn fallback_label(percentage: u8) -> String {
    format!("{FALLBACK_LABEL}: {percentage}%")
}
