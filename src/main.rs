//! CLI entry point for the transit data preparation tool.
//!
//! `prepare` runs the full batch pipeline; `check` validates the raw inputs
//! without writing anything.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use transit_prep::output::print_json;
use transit_prep::pipeline::{self, Paths, RunOptions};
use transit_prep::synth::config::SynthesisConfig;

#[derive(Parser)]
#[command(name = "transit_prep")]
#[command(about = "Prepare transit schedule, delay and accessibility tables from agency extracts", long_about = None)]
struct Cli {
    #[command(flatten)]
    locations: Locations,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct Locations {
    /// Base directory holding raw_data/, processed_data/ and sql_db/
    #[arg(long, global = true, env = "TRANSIT_PREP_BASE_DIR", default_value = ".")]
    base_dir: PathBuf,

    /// Directory with the raw extracts (defaults to <BASE_DIR>/raw_data)
    #[arg(long, global = true, env = "TRANSIT_PREP_RAW_DIR")]
    raw_dir: Option<PathBuf>,

    /// Directory for processed CSVs (defaults to <BASE_DIR>/processed_data)
    #[arg(long, global = true, env = "TRANSIT_PREP_OUT_DIR")]
    out_dir: Option<PathBuf>,

    /// SQLite database file (defaults to <BASE_DIR>/sql_db/urban_mobility.db)
    #[arg(long, global = true, env = "TRANSIT_PREP_DB_PATH")]
    db_path: Option<PathBuf>,
}

impl Locations {
    fn resolve(self) -> Paths {
        let defaults = Paths::under(&self.base_dir);
        Paths {
            raw_dir: self.raw_dir.unwrap_or(defaults.raw_dir),
            out_dir: self.out_dir.unwrap_or(defaults.out_dir),
            db_path: self.db_path.unwrap_or(defaults.db_path),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and overwrite all outputs
    Prepare {
        /// Seed for the delay and accessibility synthesis
        #[arg(short, long, env = "TRANSIT_PREP_SEED")]
        seed: Option<u64>,

        /// JSON file overriding delay model and accessibility rates
        #[arg(long, env = "TRANSIT_PREP_SYNTHESIS_CONFIG")]
        synthesis_config: Option<PathBuf>,
    },
    /// Validate the raw inputs and report their sizes
    Check,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/transit_prep.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("transit_prep.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let paths = cli.locations.resolve();

    match cli.command {
        Commands::Prepare {
            seed,
            synthesis_config,
        } => {
            let synthesis = match synthesis_config {
                Some(path) => SynthesisConfig::load(&path).with_context(|| {
                    format!("failed to load synthesis config {}", path.display())
                })?,
                None => SynthesisConfig::default(),
            };

            info!(
                raw_dir = %paths.raw_dir.display(),
                out_dir = %paths.out_dir.display(),
                db = %paths.db_path.display(),
                "Preparing transit data"
            );
            let summary = pipeline::run(&paths, &RunOptions { seed, synthesis })?;
            print_json(&summary)?;
        }
        Commands::Check => {
            let report = pipeline::check(&paths)?;
            info!(
                aggregated_rows = report.aggregated_rows,
                routes = report.routes,
                stops = report.stops,
                gtfs_stops = report.gtfs_stops,
                "Inputs look usable"
            );
            info!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
