//! Core data model types for testiki.
//!
//! A [`Test`] is an immutable question set plus the rules that turn a
//! percentage into a human-readable verdict. Tests are built from untrusted
//! definitions by [`crate::parser`]; nothing here performs I/O.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

use crate::error::TestError;

/// Recorded answers keyed by question id.
pub type Answers = BTreeMap<String, usize>;

/// A loaded multiple-choice test.
#[derive(Debug, Clone, Serialize)]
pub struct Test {
    /// Slug or identifier used to load and submit the test.
    pub id: String,
    /// Human-readable title.
    pub title: String,
    /// Introductory text shown before the first question.
    pub description: String,
    /// Catalog category, if the source provides one.
    pub category: Option<String>,
    /// Questions in presentation order.
    pub questions: Vec<Question>,
    /// Percentage ranges mapped to verdicts.
    pub scoring_rules: ScoringRules,
    /// Which scoring strategy turns answers into a percentage.
    pub scoring_method: ScoringMethod,
    /// Optional time limit for one attempt.
    pub time_limit_secs: Option<u64>,
}

impl Test {
    /// Look up a question by id.
    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Index of a question in presentation order.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.questions.iter().position(|q| q.id == id)
    }

    pub fn summary(&self) -> TestSummary {
        TestSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
            question_count: Some(self.questions.len()),
        }
    }
}

/// A single multiple-choice question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// Unique id within the test. Backends send integers; we keep strings.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Prompt shown to the user.
    #[serde(alias = "question", alias = "prompt")]
    pub text: String,
    /// Option labels in presentation order.
    pub options: Vec<String>,
    /// Index of the correct option, for knowledge-style tests.
    #[serde(default, alias = "answer", skip_serializing_if = "Option::is_none")]
    pub correct: Option<usize>,
    /// Explicit per-option weights for linear-sum scoring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<u32>>,
}

impl Question {
    pub fn option_count(&self) -> usize {
        self.options.len()
    }
}

/// Ordered percentage ranges. The first range containing a percentage wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringRules {
    pub ranges: Vec<ScoreRange>,
}

/// Wire envelope: `{"scoring": {"ranges": [...]}}`.
#[derive(Deserialize)]
struct ScoringEnvelope {
    scoring: ScoringRules,
}

impl ScoringRules {
    /// Decode scoring rules from an untrusted payload.
    ///
    /// Accepts the `{"scoring": {"ranges": [...]}}` envelope, a bare
    /// `{"ranges": [...]}` object, or either of those encoded as a JSON
    /// string. Anything else is `Malformed`.
    pub fn decode(value: &serde_json::Value) -> Result<Self, TestError> {
        match value {
            serde_json::Value::String(encoded) => {
                let inner: serde_json::Value = serde_json::from_str(encoded).map_err(|e| {
                    TestError::malformed(format!("scoring rules are not valid JSON: {e}"))
                })?;
                if inner.is_string() {
                    return Err(TestError::malformed("scoring rules are double-encoded"));
                }
                Self::decode(&inner)
            }
            serde_json::Value::Object(map) => {
                let rules = if map.contains_key("scoring") {
                    serde_json::from_value::<ScoringEnvelope>(value.clone()).map(|e| e.scoring)
                } else {
                    serde_json::from_value::<ScoringRules>(value.clone())
                };
                rules.map_err(|e| TestError::malformed(format!("invalid scoring rules: {e}")))
            }
            serde_json::Value::Null => Err(TestError::malformed("scoring rules are missing")),
            other => Err(TestError::malformed(format!(
                "scoring rules must be an object or a JSON string, got {}",
                json_kind(other)
            ))),
        }
    }

    /// First declared range with `min <= percentage <= max`.
    pub fn match_percentage(&self, percentage: u8) -> Option<&ScoreRange> {
        let p = u32::from(percentage);
        self.ranges.iter().find(|r| r.min <= p && p <= r.max)
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// One verdict range, inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRange {
    #[serde(default)]
    pub min: u32,
    pub max: u32,
    /// Short verdict, e.g. "Moderate anxiety".
    #[serde(default, alias = "label")]
    pub text: Option<String>,
    /// Longer explanation shown under the verdict.
    #[serde(default)]
    pub description: Option<String>,
}

/// How an option's weight is derived when a question has no explicit weights.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weighting {
    /// 1-indexed position: first option weighs 1.
    #[default]
    Position,
    /// 0-indexed raw value: first option weighs 0.
    Index,
}

impl fmt::Display for Weighting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Weighting::Position => write!(f, "position"),
            Weighting::Index => write!(f, "index"),
        }
    }
}

impl FromStr for Weighting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "position" | "one-based" => Ok(Weighting::Position),
            "index" | "zero-based" | "raw" => Ok(Weighting::Index),
            other => Err(format!("unknown weighting: {other}")),
        }
    }
}

/// Scoring strategy selector carried in test metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScoringMethod {
    /// Sum of option weights, normalized by the maximum possible sum.
    LinearSum {
        #[serde(default)]
        weighting: Weighting,
    },
    /// Count of questions answered with their correct option.
    CorrectAnswer,
    /// One point per keyed answer, inverted for reverse-scored questions.
    KeyedPolarity {
        #[serde(default = "default_keyed_option")]
        keyed_option: usize,
        #[serde(default)]
        reverse_scored: Vec<String>,
    },
}

fn default_keyed_option() -> usize {
    1
}

impl Default for ScoringMethod {
    fn default() -> Self {
        ScoringMethod::LinearSum {
            weighting: Weighting::Position,
        }
    }
}

impl fmt::Display for ScoringMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoringMethod::LinearSum { weighting } => write!(f, "linear-sum ({weighting})"),
            ScoringMethod::CorrectAnswer => write!(f, "correct-answer"),
            ScoringMethod::KeyedPolarity { reverse_scored, .. } => {
                write!(f, "keyed-polarity ({} reversed)", reverse_scored.len())
            }
        }
    }
}

/// Outcome of scoring a completed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Raw points collected.
    pub total: u32,
    /// Points a perfect attempt would collect.
    pub max_total: u32,
    /// `round(total / max_total * 100)`, clamped to 0..=100.
    pub percentage: u8,
    /// Matched range's verdict, or the fallback label.
    pub label: String,
    /// Matched range's description, empty when none.
    pub description: String,
    /// `false` when no range contained the percentage.
    pub matched: bool,
}

/// Catalog entry for a test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSummary {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub question_count: Option<usize>,
}

/// Accept either a JSON/TOML string or an integer and keep it as a string.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct IdVisitor;

    impl Visitor<'_> for IdVisitor {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a string or integer id")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }
    }

    deserializer.deserialize_any(IdVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn weighting_display_and_parse() {
        assert_eq!(Weighting::Position.to_string(), "position");
        assert_eq!("index".parse::<Weighting>().unwrap(), Weighting::Index);
        assert_eq!("Zero-Based".parse::<Weighting>().unwrap(), Weighting::Index);
        assert!("quadratic".parse::<Weighting>().is_err());
    }

    #[test]
    fn decode_envelope_object() {
        let rules = ScoringRules::decode(&json!({
            "scoring": {"ranges": [
                {"min": 0, "max": 50, "text": "Low"},
                {"min": 51, "max": 100, "text": "High", "description": "Quite high"}
            ]}
        }))
        .unwrap();
        assert_eq!(rules.ranges.len(), 2);
        assert_eq!(rules.ranges[1].description.as_deref(), Some("Quite high"));
    }

    #[test]
    fn decode_encoded_string() {
        let encoded = r#"{"scoring":{"ranges":[{"max":100,"text":"Any"}]}}"#;
        let rules = ScoringRules::decode(&json!(encoded)).unwrap();
        assert_eq!(rules.ranges[0].min, 0, "missing min defaults to zero");
        assert_eq!(rules.ranges[0].text.as_deref(), Some("Any"));
    }

    #[test]
    fn decode_bare_ranges() {
        let rules = ScoringRules::decode(&json!({"ranges": []})).unwrap();
        assert!(rules.ranges.is_empty());
    }

    #[test]
    fn decode_rejects_garbage() {
        for bad in [
            json!("not json {"),
            json!(null),
            json!(42),
            json!({"scoring": {"ranges": "nope"}}),
            json!({"scoring": {"ranges": [{"min": -5, "max": 10}]}}),
            json!("\"{}\""),
        ] {
            let err = ScoringRules::decode(&bad).unwrap_err();
            assert!(matches!(err, TestError::Malformed(_)), "{bad} -> {err}");
        }
    }

    #[test]
    fn first_declared_range_wins() {
        let rules = ScoringRules {
            ranges: vec![
                ScoreRange {
                    min: 0,
                    max: 50,
                    text: Some("A".into()),
                    description: None,
                },
                ScoreRange {
                    min: 40,
                    max: 100,
                    text: Some("B".into()),
                    description: None,
                },
            ],
        };
        assert_eq!(rules.match_percentage(45).unwrap().text.as_deref(), Some("A"));
        assert_eq!(rules.match_percentage(51).unwrap().text.as_deref(), Some("B"));
        assert_eq!(rules.match_percentage(50).unwrap().text.as_deref(), Some("A"));
    }

    #[test]
    fn scoring_method_tagged_serde() {
        let method: ScoringMethod = serde_json::from_value(json!({
            "type": "keyed_polarity",
            "reverse_scored": ["3", "7"]
        }))
        .unwrap();
        assert_eq!(
            method,
            ScoringMethod::KeyedPolarity {
                keyed_option: 1,
                reverse_scored: vec!["3".into(), "7".into()]
            }
        );

        let method: ScoringMethod =
            serde_json::from_value(json!({"type": "linear_sum"})).unwrap();
        assert_eq!(method, ScoringMethod::default());
    }

    #[test]
    fn question_accepts_numeric_id_and_answer_alias() {
        let q: Question = serde_json::from_value(json!({
            "id": 12,
            "text": "2 + 2?",
            "options": ["3", "4"],
            "answer": 1
        }))
        .unwrap();
        assert_eq!(q.id, "12");
        assert_eq!(q.correct, Some(1));
        assert_eq!(q.option_count(), 2);
    }
}
