//! The `testiki list` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use testiki_client::config::load_config_from;

pub async fn execute(dir: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let source = super::test_source(dir, &config)?;

    let tests = source
        .list()
        .await
        .with_context(|| format!("failed to list tests from {}", source.name()))?;

    if tests.is_empty() {
        println!("No tests found. Run `testiki init` to create an example test.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Id", "Title", "Category", "Questions"]);
    for test in &tests {
        table.add_row(vec![
            Cell::new(&test.id),
            Cell::new(&test.title),
            Cell::new(test.category.as_deref().unwrap_or("-")),
            Cell::new(
                test.question_count
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "-".into()),
            ),
        ]);
    }
    println!("{table}");
    println!("{} test(s)", tests.len());

    Ok(())
}
