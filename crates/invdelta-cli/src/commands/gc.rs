//! Gc command

use crate::commands::StoreArgs;
use clap::Args;
use invdelta_core::SnapshotId;
use invdelta_engine::commands::gc::purge_tombstones;

#[derive(Debug, Args)]
pub struct GcArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long)]
    pub family: String,

    /// Remove tombstones recorded before this run timestamp
    #[arg(long)]
    pub before: String,
}

pub fn execute(args: GcArgs) -> Result<(), Box<dyn std::error::Error>> {
    let before = SnapshotId::parse(&args.before)?;
    let registry = args.store.load_registry()?;
    let conn = args.store.open()?;
    let removed = purge_tombstones(&conn, &registry, &args.family, &before)?;
    println!("Removed {} tombstoned {} document(s)", removed, args.family);
    Ok(())
}
