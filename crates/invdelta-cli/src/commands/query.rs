//! Read-only queries over the change log and summaries

use crate::commands::StoreArgs;
use clap::Args;
use invdelta_core::diff::render_human_summary;
use invdelta_store::repo::{change_log, summaries};

#[derive(Debug, Args)]
pub struct ChangesArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long)]
    pub run: String,

    #[arg(long)]
    pub family: Option<String>,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    pub family: String,

    pub id: String,
}

#[derive(Debug, Args)]
pub struct SummaryArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Defaults to the latest indexed run
    #[arg(long)]
    pub run: Option<String>,

    #[arg(long)]
    pub json: bool,
}

/// Change records are printed one JSON object per line
pub fn execute_changes(args: ChangesArgs) -> Result<(), Box<dyn std::error::Error>> {
    let conn = args.store.open()?;
    for record in change_log::list_changes(&conn, &args.run, args.family.as_deref())? {
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(())
}

pub fn execute_history(args: HistoryArgs) -> Result<(), Box<dyn std::error::Error>> {
    let conn = args.store.open()?;
    let history = change_log::entity_history(&conn, &args.family, &args.id)?;
    if history.is_empty() {
        return Err(format!("No history for {} {}", args.family, args.id).into());
    }
    for record in history {
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(())
}

pub fn execute_summary(args: SummaryArgs) -> Result<(), Box<dyn std::error::Error>> {
    let conn = args.store.open()?;
    let run = match args.run {
        Some(run) => run,
        None => summaries::latest_snapshot_id(&conn)?.ok_or("No indexed runs")?,
    };
    let listed = summaries::list_summaries(&conn, Some(run.as_str()))?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&listed)?);
    } else {
        print!("{}", render_human_summary(&listed));
    }
    Ok(())
}
