use super::toml_config::{ConfigOverrides, DEFAULT_CONFIG_FILE};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "postventa-import")]
#[command(about = "Bulk CSV import for the after-sales incident dashboard")]
pub struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit JSON logs instead of human-readable lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Log CPU/memory usage at phase boundaries
    #[arg(long, global = true)]
    pub monitor: bool,

    #[command(flatten)]
    pub overrides: OverrideArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct OverrideArgs {
    #[arg(long, global = true)]
    pub batch_size: Option<usize>,

    #[arg(long, global = true)]
    pub chunk_size: Option<usize>,

    #[arg(long, global = true, env = "POSTVENTA_STORE_URL")]
    pub store_url: Option<String>,

    #[arg(long, global = true, env = "POSTVENTA_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

impl From<&OverrideArgs> for ConfigOverrides {
    fn from(args: &OverrideArgs) -> Self {
        Self {
            batch_size: args.batch_size,
            chunk_size: args.chunk_size,
            store_url: args.store_url.clone(),
            api_key: args.api_key.clone(),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Parse a delimited file and insert its new rows
    Import {
        file: PathBuf,

        #[arg(short, long)]
        target: String,

        /// Parse and map only; print the first rows without touching the store
        #[arg(long)]
        dry_run: bool,
    },
    /// Delete every row of a target table and its dependent tables
    Purge {
        #[arg(short, long)]
        target: String,

        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Print the number of rows in a target table
    Count {
        #[arg(short, long)]
        target: String,
    },
    /// List configured import targets
    Targets,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_import_command() {
        let cli = Cli::try_parse_from([
            "postventa-import",
            "import",
            "datos.csv",
            "--target",
            "incidencias",
            "--batch-size",
            "100",
        ])
        .unwrap();

        assert_eq!(cli.overrides.batch_size, Some(100));
        match cli.command {
            Command::Import {
                file,
                target,
                dry_run,
            } => {
                assert_eq!(file, PathBuf::from("datos.csv"));
                assert_eq!(target, "incidencias");
                assert!(!dry_run);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_purge_requires_target() {
        assert!(Cli::try_parse_from(["postventa-import", "purge"]).is_err());
    }
}
