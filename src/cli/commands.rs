//! Argument definitions.

use clap::{Parser, Subcommand};

pub use super::discover::DiscoverArgs;
pub use super::explain::ExplainArgs;
pub use super::list::ListArgs;
pub use super::monitor::MonitorArgs;
pub use super::run::RunArgs;

#[derive(Debug, Parser)]
#[command(
    name = "questline",
    version,
    about = "Agentic end-to-end testing from the terminal",
    long_about = "Discovers user flows from your application source, caches them, and \
                  plays them back step by step against a live browser."
)]
pub struct Cli {
    /// Verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scan the project source and rebuild the flow catalog
    Discover(DiscoverArgs),

    /// Execute one flow against the running application
    Run(RunArgs),

    /// List cataloged flows
    List(ListArgs),

    /// Show one flow in detail, step by step
    Explain(ExplainArgs),

    /// Background monitors (inbound email)
    Monitor(MonitorArgs),
}
