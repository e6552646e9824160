//! Stage command

use clap::Args;
use invdelta_core::SnapshotId;
use invdelta_store::StagingArea;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct StageArgs {
    #[arg(long, default_value = ".invdelta/staging")]
    pub staging: PathBuf,

    /// Run timestamp. Defaults to now.
    #[arg(long)]
    pub run: Option<String>,

    #[arg(long)]
    pub family: String,

    /// JSONL file with one record per line
    #[arg(long)]
    pub input: PathBuf,
}

pub fn execute(args: StageArgs) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot_id = match &args.run {
        Some(raw) => SnapshotId::parse(raw)?,
        None => SnapshotId::now(),
    };
    let content = std::fs::read(&args.input)?;
    let staging = StagingArea::new(&args.staging);
    let path = staging.stage_bytes(&snapshot_id, &args.family, &content)?;

    println!("Staged:");
    println!("  run: {}", snapshot_id);
    println!("  family: {}", args.family);
    println!("  path: {}", path.display());
    Ok(())
}
