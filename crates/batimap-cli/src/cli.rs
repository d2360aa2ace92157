use batimap_core::config::{parse_list, CliConfigOverrides};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Batimap - cadastre building import status of French cities
#[derive(Parser, Debug)]
#[command(name = "batimap")]
#[command(about = "Cadastre building import status of French cities", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Output results in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to ./batimap.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Repository snapshot read at startup and written back after changes
    #[arg(long, global = true, default_value = "batimap.json")]
    pub snapshot: PathBuf,

    /// Answer building queries from the snapshot instead of Overpass
    #[arg(long, global = true)]
    pub offline: bool,

    /// Overpass endpoints, comma separated
    #[arg(long, global = true, value_name = "URLS")]
    pub overpass_endpoints: Option<String>,

    /// Minimum building count under which open data may force `never`
    #[arg(long, global = true)]
    pub min_buildings: Option<u64>,

    /// Concurrent background jobs
    #[arg(long, global = true)]
    pub workers: Option<usize>,

    /// Directory of the tile renderer (outdated list, data-ready marker)
    #[arg(long, global = true)]
    pub tiles_dir: Option<PathBuf>,

    /// Directory of the web front (maintenance page)
    #[arg(long, global = true)]
    pub html_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn overrides(&self) -> CliConfigOverrides {
        CliConfigOverrides {
            overpass_endpoints: self.overpass_endpoints.as_deref().map(parse_list),
            min_buildings: self.min_buildings,
            workers: self.workers,
            tiles_dir: self.tiles_dir.clone(),
            html_dir: self.html_dir.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Refresh the status of departments or cities
    Initdb(InitdbArgs),

    /// Show the status of cities, departments or everything
    Stats(StatsArgs),

    /// Reclassify cities live
    Update(UpdateArgs),

    /// Prepare the editing data of a city
    Josm(JosmArgs),

    /// Pick the next city to work on
    Obsolete(ObsoleteArgs),

    /// Number of cities per status
    Status,

    /// Fetch open data building counts
    Count(CountArgs),

    /// Show the effective configuration
    Config,
}

#[derive(Parser, Debug)]
pub struct InitdbArgs {
    /// Department or city codes (every known department if omitted)
    pub items: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct StatsArgs {
    /// Department codes, INSEE codes or city names
    pub items: Vec<String>,

    /// Report stored statuses without refreshing anything
    #[arg(long)]
    pub fast: bool,

    /// Every known department
    #[arg(long)]
    pub all: bool,
}

#[derive(Parser, Debug)]
pub struct UpdateArgs {
    /// INSEE codes, duplicates share the same job
    #[arg(required = true)]
    pub insees: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct JosmArgs {
    /// INSEE code
    pub insee: String,
}

#[derive(Parser, Debug)]
pub struct ObsoleteArgs {
    /// Statuses to rank last (never, unknown, unfinished, raster or a year)
    #[arg(long = "ignore", value_name = "STATUS")]
    pub ignored: Vec<String>,

    /// INSEE codes to leave out
    #[arg(long = "exclude", value_name = "INSEE")]
    pub excluded: Vec<String>,

    /// Keep cities whose open data count exceeds this ratio of mapped buildings
    #[arg(long, default_value = "0")]
    pub min_ratio: f64,
}

#[derive(Parser, Debug)]
pub struct CountArgs {
    /// Department (two or three characters) or INSEE codes
    #[arg(required = true)]
    pub items: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_overrides() {
        let cli = Cli::parse_from([
            "batimap",
            "update",
            "01004",
            "--overpass-endpoints",
            "https://a/api, https://b/api",
            "--workers",
            "4",
        ]);
        let overrides = cli.overrides();
        assert_eq!(
            overrides.overpass_endpoints,
            Some(vec!["https://a/api".to_string(), "https://b/api".to_string()])
        );
        assert_eq!(overrides.workers, Some(4));
        assert!(matches!(cli.command, Commands::Update(ref args) if args.insees == ["01004"]));
    }

    #[test]
    fn test_obsolete_filters() {
        let cli = Cli::parse_from([
            "batimap", "obsolete", "--ignore", "never", "--ignore", "raster", "--exclude", "01004", "--min-ratio", "1.5",
        ]);
        let Commands::Obsolete(args) = cli.command else {
            panic!("expected obsolete");
        };
        assert_eq!(args.ignored, vec!["never", "raster"]);
        assert_eq!(args.excluded, vec!["01004"]);
        assert_eq!(args.min_ratio, 1.5);
    }
}
