//! Command implementations

mod config;
mod count;
mod initdb;
mod josm;
mod obsolete;
mod stats;
mod status;
mod update;

use crate::cli::{Cli, Commands};
use crate::output::OutputWriter;
use crate::storage::Storage;
use anyhow::{Context as _, Result};
use batimap_core::config::LayeredConfig;
use batimap_core::models::JobStatus;
use batimap_engine::Batimap;
use std::path::PathBuf;

const DEFAULT_CONFIG_FILE: &str = "batimap.toml";

/// Everything a command needs
pub struct Context {
    pub output: OutputWriter,
    pub storage: Storage,
    pub batimap: Batimap,
}

/// Layered configuration: defaults, file, environment, then flags
pub fn load_config(cli: &Cli) -> Result<LayeredConfig> {
    let mut config = LayeredConfig::with_defaults();

    let path = cli.config.clone().or_else(|| {
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        default.exists().then_some(default)
    });
    if let Some(path) = path {
        config = config
            .load_from_file(&path)
            .with_context(|| format!("Failed to load configuration file {}", path.display()))?;
    }

    let mut config = config.load_from_env();
    config.update_from_cli(cli.overrides());
    Ok(config)
}

/// Error message recorded on a failed job
pub fn job_error(status: &JobStatus) -> String {
    status
        .result
        .as_ref()
        .and_then(|r| r.get("error"))
        .and_then(|e| e.as_str())
        .unwrap_or("unknown error")
        .to_string()
}

/// Execute a CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    let output = OutputWriter::new(cli.json);
    let config = load_config(&cli)?;

    if let Commands::Config = cli.command {
        return config::execute(&config, &output);
    }

    let settings = config.settings();
    let storage = Storage::load(&cli.snapshot)?;
    let batimap = Batimap::new(storage.collaborators(&settings, cli.offline)?, &settings);
    let ctx = Context {
        output,
        storage,
        batimap,
    };

    let result = match cli.command {
        Commands::Initdb(args) => initdb::execute(args, &ctx).await,
        Commands::Stats(args) => stats::execute(args, &ctx).await,
        Commands::Update(args) => update::execute(args, &ctx).await,
        Commands::Josm(args) => josm::execute(args, &ctx).await,
        Commands::Obsolete(args) => obsolete::execute(args, &ctx).await,
        Commands::Status => status::execute(&ctx).await,
        Commands::Count(args) => count::execute(args, &ctx).await,
        Commands::Config => Ok(()),
    };

    // whatever got computed before a failure is kept
    ctx.storage.save()?;
    result
}
