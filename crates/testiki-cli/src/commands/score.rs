//! The `testiki score` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use testiki_core::model::Answers;
use testiki_core::{parser, scoring, Test};

pub fn execute(test_path: PathBuf, answers: String) -> Result<()> {
    let test = parser::parse_test_file(&test_path)?;
    let answers = read_answers(&answers)?;
    tracing::debug!(test = %test.id, answers = answers.len(), "scoring offline");

    let result = scoring::score_answers(&test, &answers)
        .with_context(|| format!("failed to score {}", test.id))?;

    print_answers(&test, &answers);

    let mut table = Table::new();
    table.set_header(vec!["Test", "Method", "Points", "Score", "Result"]);
    table.add_row(vec![
        Cell::new(&test.title),
        Cell::new(test.scoring_method.to_string()),
        Cell::new(format!("{}/{}", result.total, result.max_total)),
        Cell::new(format!("{}%", result.percentage)),
        Cell::new(&result.label),
    ]);
    println!("{table}");

    if !result.description.is_empty() {
        println!("{}", result.description);
    }
    if !result.matched {
        println!("No result range covers {}%.", result.percentage);
    }
    Ok(())
}

/// Inline JSON, or a path to a JSON file.
fn read_answers(arg: &str) -> Result<Answers> {
    let path = Path::new(arg);
    let content = if !arg.trim_start().starts_with('{') && path.exists() {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read answers: {}", path.display()))?
    } else {
        arg.to_string()
    };
    serde_json::from_str(&content).context("answers must be a JSON object of question id to option index")
}

fn print_answers(test: &Test, answers: &Answers) {
    let mut table = Table::new();
    table.set_header(vec!["#", "Question", "Answer"]);
    for (i, question) in test.questions.iter().enumerate() {
        let answer = answers
            .get(&question.id)
            .and_then(|&index| question.options.get(index))
            .map(String::as_str)
            .unwrap_or("-");
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&question.text),
            Cell::new(answer),
        ]);
    }
    println!("{table}");
}
