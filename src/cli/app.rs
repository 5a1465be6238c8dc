//! Entry point: logging setup, argument parsing, dispatch.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use super::commands::{Cli, Command};
use super::{discover, explain, list, monitor, run};
use crate::config::{self, QuestlineConfig};

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let root = config::project_root()?;
    let config = QuestlineConfig::load(&root)?;

    match cli.command {
        Command::Discover(args) => discover::execute(args, &root, &config).await,
        Command::Run(args) => run::execute(args, &root, &config).await,
        Command::List(args) => list::execute(args, &root, &config),
        Command::Explain(args) => explain::execute(args, &root, &config),
        Command::Monitor(args) => monitor::execute(args, &config).await,
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    // A second init (tests) is fine to ignore.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
