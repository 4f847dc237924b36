//! Stop coordinates from a GTFS `stops.txt`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use crate::synth::delay::ActualStopTime;

#[derive(Debug, Deserialize)]
struct GtfsStop {
    stop_name: Option<String>,
    stop_lat: Option<String>,
    stop_lon: Option<String>,
}

pub type Coordinates = (Option<f64>, Option<f64>);

/// Stop name → (lat, lon). Later rows win; unparsable coordinates become `None`.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn load_stop_coordinates(path: &Path) -> Result<HashMap<String, Coordinates>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut coords = HashMap::new();
    for result in rdr.deserialize() {
        let stop: GtfsStop = result?;
        let Some(name) = stop.stop_name.filter(|n| !n.is_empty()) else {
            continue;
        };
        coords.insert(
            name,
            (parse_coord(stop.stop_lat.as_deref()), parse_coord(stop.stop_lon.as_deref())),
        );
    }

    debug!(stops = coords.len(), "GTFS stop coordinates loaded");
    Ok(coords)
}

fn parse_coord(raw: Option<&str>) -> Option<f64> {
    raw?.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Attaches coordinates by stop name. Returns how many records were matched.
pub fn attach_coordinates(
    actuals: &mut [ActualStopTime],
    coords: &HashMap<String, Coordinates>,
) -> usize {
    let mut matched = 0;
    for record in actuals.iter_mut() {
        let (lat, lon) = coords.get(&record.stop_name).copied().unwrap_or((None, None));
        record.stop_lat = lat;
        record.stop_lon = lon;
        if lat.is_some() || lon.is_some() {
            matched += 1;
        }
    }
    info!(matched, total = actuals.len(), "Coordinates attached");
    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use std::fs;

    fn actual(stop: &str) -> ActualStopTime {
        ActualStopTime {
            trip_id: "routeX__08:00".into(),
            route_id: None,
            stop_id: None,
            stop_name: stop.into(),
            scheduled_time: "08:00".into(),
            scheduled_time_obj: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            actual_time_str: "08:03:00".into(),
            actual_time_obj: NaiveTime::from_hms_opt(8, 3, 0).unwrap(),
            delay_minutes: 3,
            stop_lat: None,
            stop_lon: None,
        }
    }

    #[test]
    fn test_load_and_attach() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stops.txt");
        fs::write(
            &path,
            "stop_id,stop_name,stop_lat,stop_lon,zone_id\n\
             1, Central ,12.97,77.59,A\n\
             2,Market,bad,77.60,A\n\
             3,,1.0,2.0,B\n",
        )
        .unwrap();

        let coords = load_stop_coordinates(&path).unwrap();
        assert_eq!(coords.len(), 2);
        assert_eq!(coords["Central"], (Some(12.97), Some(77.59)));
        assert_eq!(coords["Market"], (None, Some(77.60)));

        let mut actuals = vec![actual("Central"), actual("Elsewhere")];
        let matched = attach_coordinates(&mut actuals, &coords);
        assert_eq!(matched, 1);
        assert_eq!(actuals[0].stop_lat, Some(12.97));
        assert_eq!(actuals[1].stop_lon, None);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_stop_coordinates(&dir.path().join("stops.txt")).is_err());
    }
}
