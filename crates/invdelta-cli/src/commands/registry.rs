//! Registry command

use clap::{Args, Subcommand};
use invdelta_core::EntityTypeRegistry;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct RegistryArgs {
    #[command(subcommand)]
    pub command: RegistryCommand,
}

#[derive(Debug, Subcommand)]
pub enum RegistryCommand {
    /// Parse and validate a registry file
    Validate {
        path: PathBuf,
    },
    /// Print the built-in registry
    Default,
}

pub fn execute(args: RegistryArgs) -> Result<(), Box<dyn std::error::Error>> {
    match args.command {
        RegistryCommand::Validate { path } => {
            let registry = EntityTypeRegistry::from_file(&path)?;
            println!("Registry OK: {} entity type(s)", registry.len());
            for entry in registry.entries() {
                println!(
                    "  {} (key: {}, compare: {})",
                    entry.entity_type,
                    entry.key_field,
                    entry.compare_fields.join(", ")
                );
            }
            Ok(())
        }
        RegistryCommand::Default => {
            print!("{}", invdelta_core::registry::DEFAULT_REGISTRY_YAML);
            Ok(())
        }
    }
}
