//! Flattening of the aggregated stop-time listing into one row per stop visit.

use chrono::NaiveTime;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::parser::parse_time;
use crate::routes::RouteIndex;
use crate::table::RawTable;

/// Trip id prefix used when no route could be linked.
pub const UNKNOWN_ROUTE: &str = "routeX";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledStopTime {
    pub stop_name: String,
    #[serde(serialize_with = "crate::output::serialize_time")]
    pub scheduled_time: NaiveTime,
    pub scheduled_time_str: String,
    pub route_id: Option<String>,
    pub stop_id: Option<String>,
    pub trip_id: String,
}

impl ScheduledStopTime {
    fn new(
        stop_name: &str,
        scheduled_time: NaiveTime,
        raw_time: &str,
        route_id: Option<String>,
        stop_id: Option<String>,
    ) -> Self {
        let trip_id = format!(
            "{}__{}",
            route_id.as_deref().unwrap_or(UNKNOWN_ROUTE),
            raw_time
        );
        Self {
            stop_name: stop_name.to_string(),
            scheduled_time,
            scheduled_time_str: raw_time.to_string(),
            route_id,
            stop_id,
            trip_id,
        }
    }
}

/// Explodes every `trip_list` of `aggregated` into scheduled stop times.
///
/// Entries whose time does not parse are dropped. The result is ordered by
/// stop name, then time.
#[tracing::instrument(skip_all, fields(aggregated_rows = aggregated.len()))]
pub fn build_schedule(
    aggregated: &RawTable,
    index: &RouteIndex<'_>,
    stop_ids: &HashMap<String, String>,
) -> Vec<ScheduledStopTime> {
    let mut rows = Vec::new();
    let mut unparsed = 0usize;
    let mut unlinked = 0usize;

    for row in &aggregated.rows {
        let Some(stop_name) = aggregated
            .text(row, "name")
            .or_else(|| aggregated.text(row, "stop_name"))
        else {
            warn!("Aggregated row has no stop name, skipping");
            continue;
        };

        for token in aggregated.list(row, "trip_list") {
            let raw_time = token.trim();
            let Some(time) = parse_time(raw_time) else {
                unparsed += 1;
                continue;
            };

            let route_id = index
                .assign(stop_name, raw_time)
                .map(|r| r.route_id.clone())
                .filter(|id| !id.is_empty());
            if route_id.is_none() {
                unlinked += 1;
            }

            let stop_id = stop_ids.get(stop_name).cloned();
            rows.push(ScheduledStopTime::new(
                stop_name, time, raw_time, route_id, stop_id,
            ));
        }
    }

    rows.sort_by(|a, b| {
        a.stop_name
            .cmp(&b.stop_name)
            .then(a.scheduled_time.cmp(&b.scheduled_time))
    });

    if unparsed > 0 {
        debug!(unparsed, "Dropped stop times with unparsable time");
    }
    info!(rows = rows.len(), unlinked, "Scheduled stop times built");
    rows
}
