//! Index command

use crate::commands::StoreArgs;
use clap::Args;
use invdelta_core::diff::render_human_summary;
use invdelta_core::SnapshotId;
use invdelta_engine::{run_indexing, IndexOptions};
use invdelta_store::StagingArea;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Args)]
pub struct IndexArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long, default_value = ".invdelta/staging")]
    pub staging: PathBuf,

    /// Run timestamp (%Y-%m-%dT%H-%M-%SZ). Defaults to the latest staged run.
    #[arg(long)]
    pub run: Option<String>,

    /// Disable delta detection and rewrite every entity
    #[arg(long)]
    pub full_refresh: bool,

    /// Restrict to these families (repeatable)
    #[arg(long = "family")]
    pub families: Vec<String>,

    #[arg(long, default_value_t = 3)]
    pub max_attempts: u32,

    #[arg(long, default_value_t = 500)]
    pub retry_delay_ms: u64,

    /// Print the run report as JSON instead of the summary table
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: IndexArgs) -> Result<(), Box<dyn std::error::Error>> {
    let registry = args.store.load_registry()?;
    let staging = StagingArea::new(&args.staging);
    let snapshot_id = match &args.run {
        Some(raw) => SnapshotId::parse(raw)?,
        None => staging
            .latest_run()?
            .ok_or_else(|| format!("No staged runs under {}", args.staging.display()))?,
    };

    // Migrate once up front; worker connections only open
    drop(args.store.open()?);

    let options = IndexOptions {
        delta_detection_enabled: !args.full_refresh,
        max_attempts: args.max_attempts,
        retry_delay: Duration::from_millis(args.retry_delay_ms),
        families: if args.families.is_empty() {
            None
        } else {
            Some(args.families.clone())
        },
    };

    let db_path = args.store.db_path();
    let report = run_indexing(
        || invdelta_store::db::open(db_path),
        &registry,
        &staging,
        &snapshot_id,
        &options,
    )?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_human_summary(&report.summaries));
    }

    if report.results.is_empty() {
        return Err(format!("No families to index for run {}", snapshot_id).into());
    }
    if !report.all_succeeded() {
        let failed: Vec<_> = report
            .results
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.entity_type.as_str())
            .collect();
        return Err(format!("Indexing failed for: {}", failed.join(", ")).into());
    }
    if report.any_degraded() {
        eprintln!("Warning: some current-state writes failed; rerun to converge");
    }
    Ok(())
}
