//! The batch pipeline: load, link, synthesize, persist.

use anyhow::{Result, bail};
use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::db::Database;
use crate::geo::{attach_coordinates, load_stop_coordinates};
use crate::opendata::{self, OpenDataProbe};
use crate::output::{self, write_records};
use crate::routes::{RouteIndex, RouteRecord};
use crate::schedule::build_schedule;
use crate::stats::{DelayStats, RunSummary, biased_routes};
use crate::synth::accessibility::build_accessibility;
use crate::synth::config::SynthesisConfig;
use crate::synth::delay::{route_biases, simulate_actuals};
use crate::table::RawTable;

pub const AGGREGATED_FILE: &str = "aggregated.csv";
pub const ROUTES_FILE: &str = "routes.csv";
pub const STOPS_FILE: &str = "stops.csv";
pub const GTFS_STOPS_FILE: &str = "stops.txt";
pub const OPEN_DATA_FILE: &str = "opencity_public_transport.xlsx";

/// Input and output locations of a run.
#[derive(Debug, Clone)]
pub struct Paths {
    pub raw_dir: PathBuf,
    pub out_dir: PathBuf,
    pub db_path: PathBuf,
}

impl Paths {
    /// Default layout below `base`: `raw_data/`, `processed_data/`, `sql_db/urban_mobility.db`.
    pub fn under(base: &Path) -> Self {
        Self {
            raw_dir: base.join("raw_data"),
            out_dir: base.join("processed_data"),
            db_path: base.join("sql_db").join("urban_mobility.db"),
        }
    }

    fn raw(&self, name: &str) -> PathBuf {
        self.raw_dir.join(name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub seed: Option<u64>,
    pub synthesis: SynthesisConfig,
}

/// Fails unless the three required extracts are present.
pub fn check_required_inputs(raw_dir: &Path) -> Result<()> {
    let missing: Vec<&str> = [AGGREGATED_FILE, ROUTES_FILE, STOPS_FILE]
        .into_iter()
        .filter(|f| !raw_dir.join(f).exists())
        .collect();
    if !missing.is_empty() {
        bail!(
            "Make sure {AGGREGATED_FILE}, {ROUTES_FILE} and {STOPS_FILE} are in {} (missing: {})",
            raw_dir.display(),
            missing.join(", ")
        );
    }
    Ok(())
}

/// Raw tables with their list columns parsed.
pub struct RawInputs {
    pub aggregated: RawTable,
    pub routes: RawTable,
    pub stops: RawTable,
}

impl RawInputs {
    #[tracing::instrument(skip_all, fields(raw_dir = %paths.raw_dir.display()))]
    pub fn load(paths: &Paths) -> Result<Self> {
        check_required_inputs(&paths.raw_dir)?;

        let mut aggregated = RawTable::load(&paths.raw(AGGREGATED_FILE))?;
        let mut routes = RawTable::load(&paths.raw(ROUTES_FILE))?;
        let mut stops = RawTable::load(&paths.raw(STOPS_FILE))?;

        aggregated.parse_list_column("trip_list");
        routes.parse_list_column("trip_list");
        routes.parse_list_column("stop_list");
        stops.parse_list_column("trip_list");
        stops.parse_list_column("route_list");

        info!(
            aggregated = aggregated.len(),
            routes = routes.len(),
            stops = stops.len(),
            "Raw inputs loaded"
        );
        Ok(Self {
            aggregated,
            routes,
            stops,
        })
    }
}

/// Report of `check`: which inputs are present and how large they are.
#[derive(Debug, serde::Serialize)]
pub struct InputReport {
    pub aggregated_rows: usize,
    pub routes: usize,
    pub stops: usize,
    pub gtfs_stops: bool,
    pub open_data: OpenDataProbe,
}

/// Loads and validates the inputs without writing anything.
pub fn check(paths: &Paths) -> Result<InputReport> {
    let inputs = RawInputs::load(paths)?;
    Ok(InputReport {
        aggregated_rows: inputs.aggregated.len(),
        routes: inputs.routes.len(),
        stops: inputs.stops.len(),
        gtfs_stops: paths.raw(GTFS_STOPS_FILE).exists(),
        open_data: opendata::probe(&paths.raw(OPEN_DATA_FILE)),
    })
}

/// Runs every stage and overwrites all outputs.
#[tracing::instrument(skip_all, fields(seed = ?options.seed))]
pub fn run(paths: &Paths, options: &RunOptions) -> Result<RunSummary> {
    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let inputs = RawInputs::load(paths)?;

    let records = RouteRecord::from_table(&inputs.routes);
    let index = RouteIndex::build(&records);
    let stop_ids = inputs.stops.lookup("name", "id");

    let schedule = build_schedule(&inputs.aggregated, &index, &stop_ids);

    let biases = route_biases(&records, &options.synthesis.delay, &mut rng);
    let mut actuals = simulate_actuals(&schedule, &biases, &options.synthesis.delay, &mut rng);

    let gtfs_path = paths.raw(GTFS_STOPS_FILE);
    let records_with_coordinates = if gtfs_path.exists() {
        match load_stop_coordinates(&gtfs_path) {
            Ok(coords) => Some(attach_coordinates(&mut actuals, &coords)),
            Err(e) => {
                warn!(error = %e, "Failed to read GTFS stops, skipping coordinates");
                None
            }
        }
    } else {
        None
    };

    let open_data = opendata::probe(&paths.raw(OPEN_DATA_FILE));
    let accessibility = build_accessibility(
        &schedule,
        &stop_ids,
        &options.synthesis.accessibility,
        &mut rng,
    );

    std::fs::create_dir_all(&paths.out_dir)?;
    write_records(&paths.out_dir.join(output::SCHEDULED_FILE), &schedule)?;
    write_records(&paths.out_dir.join(output::ACTUAL_FILE), &actuals)?;
    write_records(&paths.out_dir.join(output::ACCESSIBILITY_FILE), &accessibility)?;
    inputs
        .stops
        .write_csv(&paths.out_dir.join(output::STOPS_CLEANED_FILE))?;
    inputs
        .routes
        .write_csv(&paths.out_dir.join(output::ROUTES_CLEANED_FILE))?;
    info!(out_dir = %paths.out_dir.display(), "Processed CSVs written");

    let mut db = Database::open(&paths.db_path)?;
    db.replace_all(
        &schedule,
        &actuals,
        &accessibility,
        &inputs.stops,
        &inputs.routes,
    )?;
    info!(db = %paths.db_path.display(), "Database written");

    Ok(RunSummary {
        timestamp: Utc::now(),
        seed: options.seed,
        aggregated_rows: inputs.aggregated.len(),
        routes: records.len(),
        stops: inputs.stops.len(),
        scheduled_stop_times: schedule.len(),
        actual_stop_times: actuals.len(),
        stop_accessibility: accessibility.len(),
        unlinked_stop_times: schedule.iter().filter(|s| s.route_id.is_none()).count(),
        biased_routes: biased_routes(&biases),
        records_with_coordinates,
        delay: DelayStats::from_actuals(&actuals),
        open_data,
    })
}
