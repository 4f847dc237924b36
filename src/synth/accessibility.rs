use rand::Rng;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::info;

use crate::schedule::ScheduledStopTime;
use crate::synth::config::AccessibilityRates;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopAccessibility {
    pub stop_name: String,
    pub wheelchair_accessible: bool,
    pub shelter: bool,
    pub lighting: bool,
    pub stop_id: Option<String>,
}

/// One accessibility row per distinct stop of the schedule, in name order.
#[tracing::instrument(skip_all)]
pub fn build_accessibility<R: Rng>(
    schedule: &[ScheduledStopTime],
    stop_ids: &HashMap<String, String>,
    rates: &AccessibilityRates,
    rng: &mut R,
) -> Vec<StopAccessibility> {
    let stops: BTreeSet<&str> = schedule.iter().map(|s| s.stop_name.as_str()).collect();

    let rows: Vec<StopAccessibility> = stops
        .into_iter()
        .map(|name| {
            // draw order matters for seeded runs
            let wheelchair_accessible = rng.random::<f64>() < rates.wheelchair;
            let shelter = rng.random::<f64>() < rates.shelter;
            let lighting = rng.random::<f64>() < rates.lighting;
            StopAccessibility {
                stop_name: name.to_string(),
                wheelchair_accessible,
                shelter,
                lighting,
                stop_id: stop_ids.get(name).cloned(),
            }
        })
        .collect();

    info!(stops = rows.len(), "Stop accessibility built");
    rows
}
