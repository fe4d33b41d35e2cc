//! The `testiki take` command.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;

use testiki_client::config::load_config_from;
use testiki_client::ApiClient;
use testiki_core::record::{AttemptRecord, RecordSink};
use testiki_core::runner::RunnerEvents;
use testiki_core::traits::{Ack, ResultSink, Submission};
use testiki_core::{ErrorClass, RunnerState, ScoreResult, TestError, TestRunner};

/// Console observer for the runner.
struct ConsoleEvents;

impl RunnerEvents for ConsoleEvents {
    fn on_transition(&self, _: RunnerState, _: RunnerState) {}

    fn on_answer_rejected(&self, error: &TestError) {
        println!("  Not accepted: {error}");
    }

    fn on_submitted(&self, _: &ScoreResult, ack: &Ack) {
        if let Some(message) = &ack.message {
            eprintln!("  {message}");
        }
    }
}

enum Input {
    Answer(usize),
    Next,
    Prev,
    Quit,
    Unknown,
}

fn parse_input(line: &str) -> Input {
    match line {
        ">" | "n" => Input::Next,
        "<" | "p" => Input::Prev,
        "q" => Input::Quit,
        _ => match line.parse::<usize>() {
            Ok(n) if n >= 1 => Input::Answer(n - 1),
            _ => Input::Unknown,
        },
    }
}

pub async fn execute(
    test_id: String,
    dir: Option<PathBuf>,
    config_path: Option<PathBuf>,
    no_submit: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let results_dir = output.unwrap_or_else(|| config.results_dir.clone());

    let source = super::test_source(dir, &config)?;
    let sink: Arc<dyn ResultSink> = if no_submit {
        Arc::new(RecordSink::new(&results_dir))
    } else {
        Arc::new(ApiClient::new(&config)?)
    };

    let mut runner = TestRunner::new(source, sink, config.session(), config.runner_config())
        .with_events(Arc::new(ConsoleEvents));

    let test = runner
        .load(&test_id)
        .await
        .with_context(|| format!("failed to load test {test_id}"))?;
    println!("{} ({} questions)", test.title, test.questions.len());
    if !test.description.is_empty() {
        println!("{}", test.description);
    }
    if let Some(limit) = test.time_limit_secs {
        println!("Time limit: {} min", limit.div_ceil(60));
    }
    println!("Answer with an option number; '<' and '>' move between questions, 'q' quits.\n");

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    while !runner.is_complete() {
        show_current(&runner);
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next() else {
            anyhow::bail!(
                "input ended with {} question(s) unanswered",
                runner.unanswered().len()
            );
        };
        match parse_input(line?.trim()) {
            Input::Answer(index) => {
                tolerate_input_error(runner.answer_current(index))?;
                if config.auto_advance {
                    jump_to_unanswered(&mut runner)?;
                }
            }
            Input::Next => {
                runner.next()?;
            }
            Input::Prev => {
                runner.prev()?;
            }
            Input::Quit => anyhow::bail!("attempt abandoned"),
            Input::Unknown => {
                println!("  Enter an option number, '<', '>' or 'q'.");
            }
        }
    }

    loop {
        match runner.submit().await {
            Ok(result) => {
                print_result(&result);
                if !no_submit {
                    save_record(&runner, &results_dir)?;
                }
                return Ok(());
            }
            Err(e) if e.is_retryable() && confirm(&mut lines, &format!("Submission failed: {e}. Retry? [y/N] "))? => {}
            Err(e) => {
                if let Some(result) = runner.result() {
                    print_result(result);
                    // With --no-submit the failing sink is the results directory itself.
                    if !no_submit {
                        save_record(&runner, &results_dir)?;
                    }
                }
                let hint = if e.requires_reauth() {
                    " (set TESTIKI_TOKEN or `token` in testiki.toml)"
                } else {
                    ""
                };
                return Err(e).context(format!("result was not submitted{hint}"));
            }
        }
    }
}

/// Input errors were already reported through `ConsoleEvents`; anything
/// else means the runner is not accepting answers and ends the session.
fn tolerate_input_error(result: Result<(), TestError>) -> Result<(), TestError> {
    match result {
        Err(e) if e.class() != ErrorClass::Input => Err(e),
        _ => Ok(()),
    }
}

fn show_current(runner: &TestRunner) {
    let (Some(test), Some(question)) = (runner.test(), runner.current_question()) else {
        return;
    };
    let attempt = runner.attempt();
    let position = attempt.position();

    println!("[{}/{}] {}", position + 1, test.questions.len(), question.text);
    let chosen = attempt.answer_for(&question.id);
    for (i, option) in question.options.iter().enumerate() {
        let marker = if chosen == Some(i) { "*" } else { " " };
        println!(" {marker}{}) {option}", i + 1);
    }
    if let Some(left) = attempt.time_remaining(test, Utc::now()) {
        if left.is_zero() {
            println!("  Time is up, finish when ready.");
        } else {
            println!("  {}:{:02} left", left.as_secs() / 60, left.as_secs() % 60);
        }
    }
}

/// Move to the first unanswered question if the current one is answered.
fn jump_to_unanswered(runner: &mut TestRunner) -> Result<()> {
    let answered = runner
        .current_question()
        .is_some_and(|q| runner.attempt().answer_for(&q.id).is_some());
    if !answered {
        return Ok(());
    }
    let target = runner.unanswered().first().and_then(|id| {
        runner.test().and_then(|t| t.position_of(id))
    });
    if let Some(index) = target {
        runner.go_to(index)?;
    }
    Ok(())
}

fn confirm(lines: &mut impl Iterator<Item = std::io::Result<String>>, prompt: &str) -> Result<bool> {
    print!("{prompt}");
    std::io::stdout().flush()?;
    Ok(match lines.next() {
        Some(line) => matches!(line?.trim(), "y" | "Y" | "yes"),
        None => false,
    })
}

fn print_result(result: &ScoreResult) {
    println!("\nScore: {}% ({}/{})", result.percentage, result.total, result.max_total);
    println!("{}", result.label);
    if !result.description.is_empty() {
        println!("{}", result.description);
    }
}

fn save_record(runner: &TestRunner, dir: &Path) -> Result<()> {
    let (Some(test), Some(result)) = (runner.test(), runner.result()) else {
        return Ok(());
    };
    let record = AttemptRecord::new(Submission::new(test, result, runner.attempt().answers()));
    let path = dir.join(record.file_name());
    record.save_json(&path)?;
    eprintln!("Saved {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_parsing() {
        assert!(matches!(parse_input("2"), Input::Answer(1)));
        assert!(matches!(parse_input("0"), Input::Unknown));
        assert!(matches!(parse_input(">"), Input::Next));
        assert!(matches!(parse_input("p"), Input::Prev));
        assert!(matches!(parse_input("q"), Input::Quit));
        assert!(matches!(parse_input("maybe"), Input::Unknown));
    }

    #[test]
    fn only_input_errors_are_tolerated() {
        let invalid_option = TestError::InvalidOption {
            question_id: "1".into(),
            index: 5,
            option_count: 3,
        };
        assert!(tolerate_input_error(Err(invalid_option)).is_ok());
        assert!(tolerate_input_error(Err(TestError::UnknownQuestion("9".into()))).is_ok());
        assert!(tolerate_input_error(Ok(())).is_ok());

        let misuse = TestError::InvalidState {
            state: "submitted".into(),
            action: "answer".into(),
        };
        assert!(matches!(
            tolerate_input_error(Err(misuse)),
            Err(TestError::InvalidState { .. })
        ));
    }
}
