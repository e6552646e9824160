//! InvDelta CLI
//!
//! Command-line interface for InvDelta

use clap::{Parser, Subcommand};
use invdelta_core::logging_facility::{self, Profile};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "invdelta")]
#[command(about = "InvDelta - Delta change detection for inventory snapshots", long_about = None)]
struct Cli {
    /// Emit JSON logs (production profile)
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Reconcile a staged run into the store
    Index(commands::index::IndexArgs),
    /// Stage a JSONL file for a run
    Stage(commands::stage::StageArgs),
    /// Change records of a run
    Changes(commands::query::ChangesArgs),
    /// Change history of one entity
    History(commands::query::HistoryArgs),
    /// Per-family summaries of a run
    Summary(commands::query::SummaryArgs),
    /// Remove old tombstoned documents
    Gc(commands::gc::GcArgs),
    /// Registry operations
    Registry(commands::registry::RegistryArgs),
}

fn main() {
    let cli = Cli::parse();

    logging_facility::init(if cli.json_logs {
        Profile::Production
    } else {
        Profile::Development
    });

    let result = match cli.command {
        Commands::Index(args) => commands::index::execute(args),
        Commands::Stage(args) => commands::stage::execute(args),
        Commands::Changes(args) => commands::query::execute_changes(args),
        Commands::History(args) => commands::query::execute_history(args),
        Commands::Summary(args) => commands::query::execute_summary(args),
        Commands::Gc(args) => commands::gc::execute(args),
        Commands::Registry(args) => commands::registry::execute(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
