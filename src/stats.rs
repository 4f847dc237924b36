use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::opendata::OpenDataProbe;
use crate::synth::delay::ActualStopTime;

/// What a `prepare` run produced.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub timestamp: DateTime<Utc>,
    pub seed: Option<u64>,

    // table sizes
    pub aggregated_rows: usize,
    pub routes: usize,
    pub stops: usize,
    pub scheduled_stop_times: usize,
    pub actual_stop_times: usize,
    pub stop_accessibility: usize,

    pub unlinked_stop_times: usize,
    pub biased_routes: usize,
    pub records_with_coordinates: Option<usize>,

    pub delay: DelayStats,
    pub open_data: OpenDataProbe,
}

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct DelayStats {
    pub mean_minutes: f64,
    pub stddev_minutes: f64,
    pub max_minutes: i64,
    pub on_time_pct: f64,
}

impl DelayStats {
    pub fn from_actuals(actuals: &[ActualStopTime]) -> Self {
        let delays: Vec<i64> = actuals.iter().map(|a| a.delay_minutes).collect();
        let avg = mean(&delays);
        let on_time = actuals.iter().filter(|a| a.delay_minutes == 0).count();

        DelayStats {
            mean_minutes: avg,
            stddev_minutes: stddev(&delays, avg),
            max_minutes: actuals.iter().map(|a| a.delay_minutes).max().unwrap_or(0),
            on_time_pct: pct(on_time, actuals.len()),
        }
    }
}

/// Number of routes that drew a non-zero delay bias.
pub fn biased_routes(biases: &HashMap<String, f64>) -> usize {
    biases.values().filter(|&&b| b > 0.0).count()
}

pub fn pct(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64) * 100.0
    }
}

/// Average delay in minutes, 0.0 when no stop times were simulated.
pub fn mean(delays: &[i64]) -> f64 {
    match delays.len() {
        0 => 0.0,
        n => delays.iter().map(|&d| d as f64).sum::<f64>() / n as f64,
    }
}

/// Spread of the delays around `mean` over every simulated stop time.
pub fn stddev(delays: &[i64], mean: f64) -> f64 {
    if delays.is_empty() {
        return 0.0;
    }
    let squared: f64 = delays.iter().map(|&d| (d as f64 - mean).powi(2)).sum();
    (squared / delays.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn with_delay(delay: i64) -> ActualStopTime {
        ActualStopTime {
            trip_id: String::new(),
            route_id: None,
            stop_id: None,
            stop_name: "A".into(),
            scheduled_time: "08:00:00".into(),
            scheduled_time_obj: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            actual_time_str: String::new(),
            actual_time_obj: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            delay_minutes: delay,
            stop_lat: None,
            stop_lon: None,
        }
    }

    #[test]
    fn test_pct_with_zero_total() {
        assert_eq!(pct(10, 0), 0.0);
        assert_eq!(pct(1, 4), 25.0);
    }

    #[test]
    fn test_mean_and_stddev() {
        let delays = [2, 4, 4, 4, 5, 5, 7, 9];
        let m = mean(&delays);
        assert_eq!(m, 5.0);
        assert_eq!(stddev(&delays, m), 2.0);
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(stddev(&[], 0.0), 0.0);
    }

    #[test]
    fn test_delay_stats() {
        let actuals = vec![with_delay(0), with_delay(4), with_delay(0), with_delay(8)];
        let stats = DelayStats::from_actuals(&actuals);

        assert_eq!(stats.mean_minutes, 3.0);
        assert_eq!(stats.max_minutes, 8);
        assert_eq!(stats.on_time_pct, 50.0);
        assert_eq!(DelayStats::from_actuals(&[]), DelayStats::default());
    }

    #[test]
    fn test_biased_routes() {
        let biases = HashMap::from([
            ("R1".to_string(), 0.0),
            ("R2".to_string(), 2.5),
            ("R3".to_string(), 1.5),
        ]);
        assert_eq!(biased_routes(&biases), 2);
    }
}
