//! Test definition parser.
//!
//! Turns untrusted JSON or TOML test definitions into [`Test`] values,
//! loads them from files and directories, and validates them.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::error::TestError;
use crate::model::{string_or_number, Question, ScoringMethod, ScoringRules, Test, TestSummary};
use crate::traits::TestSource;

/// Wire form of a test, as served by the backend or written on disk.
#[derive(Debug, Deserialize)]
struct RawTest {
    #[serde(default, deserialize_with = "optional_id")]
    id: Option<String>,
    #[serde(default)]
    slug: Option<String>,
    #[serde(alias = "name")]
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    questions: Vec<Question>,
    #[serde(default)]
    scoring_rules: Option<serde_json::Value>,
    #[serde(default)]
    scoring_method: Option<ScoringMethod>,
    #[serde(default)]
    time_limit_secs: Option<u64>,
}

fn optional_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    string_or_number(deserializer).map(Some)
}

impl RawTest {
    fn into_test(self, fallback_id: Option<&str>) -> Result<Test, TestError> {
        let id = self
            .slug
            .filter(|s| !s.trim().is_empty())
            .or(self.id)
            .or_else(|| fallback_id.map(str::to_string))
            .ok_or_else(|| TestError::malformed("test has neither slug nor id"))?;

        if self.questions.is_empty() {
            return Err(TestError::malformed(format!("test {id} has no questions")));
        }

        let mut seen = HashSet::new();
        for question in &self.questions {
            if !seen.insert(question.id.as_str()) {
                return Err(TestError::malformed(format!(
                    "test {id} repeats question id {}",
                    question.id
                )));
            }
            if question.options.is_empty() {
                return Err(TestError::malformed(format!(
                    "question {} has no options",
                    question.id
                )));
            }
            if let Some(weights) = &question.weights {
                if weights.len() != question.options.len() {
                    return Err(TestError::malformed(format!(
                        "question {} has {} weights for {} options",
                        question.id,
                        weights.len(),
                        question.options.len()
                    )));
                }
            }
        }

        let scoring_rules = match &self.scoring_rules {
            Some(value) => ScoringRules::decode(value)?,
            None => return Err(TestError::malformed(format!("test {id} has no scoring rules"))),
        };

        Ok(Test {
            id,
            title: self.title,
            description: self.description.unwrap_or_default(),
            category: self.category,
            questions: self.questions,
            scoring_rules,
            scoring_method: self.scoring_method.unwrap_or_default(),
            time_limit_secs: self.time_limit_secs,
        })
    }
}

/// Build a test from an already-decoded JSON value (e.g. an HTTP body).
pub fn test_from_value(value: serde_json::Value) -> Result<Test, TestError> {
    let raw: RawTest = serde_json::from_value(value)
        .map_err(|e| TestError::Malformed(format!("invalid test definition: {e}")))?;
    raw.into_test(None)
}

/// Parse a JSON test definition.
pub fn parse_test_json(content: &str) -> Result<Test, TestError> {
    let raw: RawTest = serde_json::from_str(content)
        .map_err(|e| TestError::Malformed(format!("invalid test JSON: {e}")))?;
    raw.into_test(None)
}

/// Parse a TOML test definition.
pub fn parse_test_toml(content: &str) -> Result<Test, TestError> {
    let raw: RawTest = toml::from_str(content)
        .map_err(|e| TestError::Malformed(format!("invalid test TOML: {e}")))?;
    raw.into_test(None)
}

/// Parse a `.toml` or `.json` test file. The file stem is the id of last
/// resort when the definition declares neither slug nor id.
pub fn parse_test_file(path: &Path) -> Result<Test> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read test file: {}", path.display()))?;
    let stem = path.file_stem().and_then(|s| s.to_str());

    let raw: RawTest = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("failed to parse JSON: {}", path.display()))?,
        _ => toml::from_str(&content)
            .with_context(|| format!("failed to parse TOML: {}", path.display()))?,
    };

    raw.into_test(stem)
        .with_context(|| format!("invalid test definition: {}", path.display()))
}

fn is_definition(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == "toml" || ext == "json")
}

/// Recursively load every test definition under a directory.
///
/// Files that fail to parse are skipped with a warning.
pub fn load_test_directory(dir: &Path) -> Result<Vec<Test>> {
    let mut tests = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    for path in definition_files(dir)? {
        match parse_test_file(&path) {
            Ok(test) => tests.push(test),
            Err(e) => {
                tracing::warn!("skipping {}: {e:#}", path.display());
            }
        }
    }

    tests.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(tests)
}

/// Every `.toml` / `.json` file under `dir`, sorted by path.
pub fn definition_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_dir() {
            files.extend(definition_files(&path)?);
        } else if is_definition(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// A [`TestSource`] backed by a directory of `.toml` / `.json` definitions.
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl TestSource for DirectorySource {
    fn name(&self) -> &str {
        "directory"
    }

    async fn load(&self, id: &str) -> Result<Test, TestError> {
        let files = definition_files(&self.root)
            .map_err(|e| TestError::NotFound(format!("{id} ({e:#})")))?;

        // A file named after the id wins over scanning declared ids.
        if let Some(path) = files
            .iter()
            .find(|p| p.file_stem().and_then(|s| s.to_str()) == Some(id))
        {
            return parse_test_file(path).map_err(|e| TestError::Malformed(format!("{e:#}")));
        }

        for path in &files {
            if let Ok(test) = parse_test_file(path) {
                if test.id == id {
                    return Ok(test);
                }
            }
        }

        Err(TestError::NotFound(id.to_string()))
    }

    async fn list(&self) -> Result<Vec<TestSummary>, TestError> {
        let tests = load_test_directory(&self.root)
            .map_err(|e| TestError::NotFound(format!("{e:#}")))?;
        Ok(tests.iter().map(Test::summary).collect())
    }
}

/// A warning from test validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The question ID (if applicable).
    pub question_id: Option<String>,
    /// Warning message.
    pub message: String,
}

impl ValidationWarning {
    fn test(message: impl Into<String>) -> Self {
        Self {
            question_id: None,
            message: message.into(),
        }
    }

    fn question(id: &str, message: impl Into<String>) -> Self {
        Self {
            question_id: Some(id.to_string()),
            message: message.into(),
        }
    }
}

/// Validate a test for issues the engine tolerates but authors should fix.
pub fn validate_test(test: &Test) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let ranges = &test.scoring_rules.ranges;

    if ranges.is_empty() {
        warnings.push(ValidationWarning::test("scoring rules contain no ranges"));
    }

    for (i, range) in ranges.iter().enumerate() {
        if range.min > range.max {
            warnings.push(ValidationWarning::test(format!(
                "range #{} is empty (min {} > max {})",
                i + 1,
                range.min,
                range.max
            )));
        }
        if range.max > 100 {
            warnings.push(ValidationWarning::test(format!(
                "range #{} ends above 100 ({})",
                i + 1,
                range.max
            )));
        }
        if !range.text.as_deref().is_some_and(|t| !t.trim().is_empty()) {
            warnings.push(ValidationWarning::test(format!(
                "range #{} has no text; the fallback label will be shown",
                i + 1
            )));
        }
    }

    if !ranges.is_empty() {
        let uncovered: Vec<u8> = (0..=100u8)
            .filter(|&p| test.scoring_rules.match_percentage(p).is_none())
            .collect();
        if !uncovered.is_empty() {
            warnings.push(ValidationWarning::test(format!(
                "ranges leave {} percentage(s) uncovered: {}",
                uncovered.len(),
                describe_gaps(&uncovered)
            )));
        }

        for (i, a) in ranges.iter().enumerate() {
            for (j, b) in ranges.iter().enumerate().skip(i + 1) {
                if a.min <= b.max && b.min <= a.max {
                    warnings.push(ValidationWarning::test(format!(
                        "ranges #{} and #{} overlap; the earlier one wins",
                        i + 1,
                        j + 1
                    )));
                }
            }
        }
    }

    match &test.scoring_method {
        ScoringMethod::CorrectAnswer => {
            for q in &test.questions {
                match q.correct {
                    None => warnings.push(ValidationWarning::question(
                        &q.id,
                        "correct-answer scoring but no correct option",
                    )),
                    Some(c) if c >= q.options.len() => warnings.push(ValidationWarning::question(
                        &q.id,
                        format!("correct option {c} is out of range"),
                    )),
                    Some(_) => {}
                }
            }
        }
        ScoringMethod::KeyedPolarity {
            keyed_option,
            reverse_scored,
        } => {
            for id in reverse_scored {
                if test.question(id).is_none() {
                    warnings.push(ValidationWarning::test(format!(
                        "reverse-scored id {id} matches no question"
                    )));
                }
            }
            for q in &test.questions {
                if *keyed_option >= q.options.len() {
                    warnings.push(ValidationWarning::question(
                        &q.id,
                        format!("keyed option {keyed_option} is out of range"),
                    ));
                }
            }
        }
        ScoringMethod::LinearSum { .. } => {
            let counts: HashSet<usize> = test.questions.iter().map(Question::option_count).collect();
            if counts.len() > 1 && test.questions.iter().any(|q| q.weights.is_none()) {
                warnings.push(ValidationWarning::test(
                    "questions have different option counts; percentages are relative to the widest question",
                ));
            }
        }
    }

    warnings
}

/// Render sorted percentages as compact runs, e.g. `0-9, 95`.
fn describe_gaps(values: &[u8]) -> String {
    let mut runs: Vec<(u8, u8)> = Vec::new();
    for &v in values {
        match runs.last_mut() {
            Some((_, end)) if end.checked_add(1) == Some(v) => *end = v,
            _ => runs.push((v, v)),
        }
    }
    runs.iter()
        .map(|&(a, b)| if a == b { a.to_string() } else { format!("{a}-{b}") })
        .collect::<Vec<_>>()
        .join(", ")
}
