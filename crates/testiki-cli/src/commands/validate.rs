//! The `testiki validate` command.

use std::path::PathBuf;

use anyhow::Result;

use testiki_core::parser;

pub fn execute(dir: Option<PathBuf>, test: Option<PathBuf>) -> Result<()> {
    let files = match (dir, test) {
        (Some(dir), _) => {
            anyhow::ensure!(dir.is_dir(), "not a directory: {}", dir.display());
            parser::definition_files(&dir)?
        }
        (None, Some(file)) => vec![file],
        (None, None) => anyhow::bail!("pass --dir or --test"),
    };
    let single = files.len() == 1;

    let mut total_warnings = 0;
    let mut broken = 0;

    for path in &files {
        let test = match parser::parse_test_file(path) {
            Ok(test) => test,
            // A lone file that does not parse is an error, not a warning.
            Err(e) if single => return Err(e),
            Err(e) => {
                println!("{}: ERROR: {e:#}", path.display());
                broken += 1;
                continue;
            }
        };
        println!(
            "Test: {} [{}] ({} questions, {})",
            test.title,
            test.id,
            test.questions.len(),
            test.scoring_method
        );

        let warnings = parser::validate_test(&test);
        for w in &warnings {
            let prefix = w
                .question_id
                .as_ref()
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if broken > 0 {
        anyhow::bail!("{broken} test definition(s) failed to load");
    }
    if total_warnings == 0 {
        println!("All tests valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
