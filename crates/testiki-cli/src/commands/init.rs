//! The `testiki init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    // Create testiki.toml
    if Path::new("testiki.toml").exists() {
        println!("testiki.toml already exists, skipping.");
    } else {
        std::fs::write("testiki.toml", SAMPLE_CONFIG)?;
        println!("Created testiki.toml");
    }

    // Create example test
    std::fs::create_dir_all("tests")?;
    let example_path = Path::new("tests/example.toml");
    if example_path.exists() {
        println!("tests/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_TEST)?;
        println!("Created tests/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Edit testiki.toml with your backend URL and token");
    println!("  2. Run: testiki validate --test tests/example.toml");
    println!("  3. Run: testiki take --dir tests --test example --no-submit");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# testiki configuration

base_url = "http://localhost:8080"
timeout_secs = 10
token = "${TESTIKI_TOKEN}"
auto_advance = true
results_dir = "./testiki-results"
"#;

const EXAMPLE_TEST: &str = r#"slug = "example"
title = "Example Test"
description = "How do you spend a free evening?"
category = "Personality"

[scoring_method]
type = "linear_sum"

[[questions]]
id = 1
text = "A friend calls with a last-minute invitation. You..."
options = ["Stay home", "Ask who else is coming", "Say yes right away"]

[[questions]]
id = 2
text = "At a party you usually..."
options = ["Talk to one person all night", "Move between a few groups", "End up organizing games"]

[[questions]]
id = 3
text = "After a busy week you recharge by..."
options = ["Reading alone", "Dinner with a close friend", "Going out dancing"]

[[scoring_rules.ranges]]
min = 0
max = 44
text = "Homebody"
description = "Quiet evenings are your idea of a good time."

[[scoring_rules.ranges]]
min = 45
max = 77
text = "Balanced"
description = "You enjoy company and solitude in equal measure."

[[scoring_rules.ranges]]
min = 78
max = 100
text = "Life of the party"
description = "You draw energy from people around you."
"#;
