pub mod gc;
pub mod index;
pub mod query;
pub mod registry;
pub mod stage;

use clap::Args;
use invdelta_core::EntityTypeRegistry;
use std::path::{Path, PathBuf};

/// Store and registry locations shared by every command
#[derive(Debug, Args)]
pub struct StoreArgs {
    #[arg(long, default_value = ".invdelta/store.db")]
    pub db: PathBuf,

    /// Registry YAML. Defaults to the built-in registry.
    #[arg(long)]
    pub registry: Option<PathBuf>,
}

impl StoreArgs {
    pub fn load_registry(&self) -> Result<EntityTypeRegistry, Box<dyn std::error::Error>> {
        let registry = match &self.registry {
            Some(path) => EntityTypeRegistry::from_file(path)?,
            None => EntityTypeRegistry::builtin()?,
        };
        Ok(registry)
    }

    /// Open the store, creating its directory and applying migrations
    pub fn open(&self) -> Result<rusqlite::Connection, Box<dyn std::error::Error>> {
        if let Some(parent) = self.db.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(invdelta_store::db::open_and_migrate(&self.db)?)
    }

    pub fn db_path(&self) -> &Path {
        &self.db
    }
}
