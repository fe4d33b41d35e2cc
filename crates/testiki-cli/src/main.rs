//! testiki CLI: take, score and validate tests from the terminal.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "testiki", version, about = "Quiz and psychology test runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take a test interactively
    Take {
        /// Test slug or id
        #[arg(long)]
        test: String,

        /// Load definitions from a local directory instead of the backend
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Save the result locally without submitting it
        #[arg(long)]
        no_submit: bool,

        /// Directory for the saved attempt record (default: results_dir from config)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Score a set of answers against a local test definition
    Score {
        /// Path to a .toml or .json test definition
        #[arg(long)]
        test: PathBuf,

        /// Answers as JSON (`{"q1": 0, ...}`, zero-based option indexes) or a path to such a file
        #[arg(long)]
        answers: String,
    },

    /// Validate test definition files
    Validate {
        /// Directory of test definitions
        #[arg(long, conflicts_with = "test", required_unless_present = "test")]
        dir: Option<PathBuf>,

        /// Single test definition file
        #[arg(long)]
        test: Option<PathBuf>,
    },

    /// List available tests
    List {
        /// List a local directory instead of the backend
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create starter config and example test
    Init,
}

#[tokio::main]
async fn main() {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "testiki=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Take {
            test,
            dir,
            config,
            no_submit,
            output,
        } => commands::take::execute(test, dir, config, no_submit, output).await,
        Commands::Score { test, answers } => commands::score::execute(test, answers),
        Commands::Validate { dir, test } => commands::validate::execute(dir, test),
        Commands::List { dir, config } => commands::list::execute(dir, config).await,
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
