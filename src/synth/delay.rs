//! Synthetic "actual" stop times.

use chrono::{Duration, NaiveTime, Timelike};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

use crate::routes::RouteRecord;
use crate::schedule::ScheduledStopTime;
use crate::synth::config::DelayModel;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActualStopTime {
    pub trip_id: String,
    pub route_id: Option<String>,
    pub stop_id: Option<String>,
    pub stop_name: String,
    pub scheduled_time: String,
    #[serde(serialize_with = "crate::output::serialize_time")]
    pub scheduled_time_obj: NaiveTime,
    pub actual_time_str: String,
    #[serde(serialize_with = "crate::output::serialize_time")]
    pub actual_time_obj: NaiveTime,
    pub delay_minutes: i64,
    pub stop_lat: Option<f64>,
    pub stop_lon: Option<f64>,
}

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Draws a per-route delay bias (minutes). Most routes get zero.
pub fn route_biases<R: Rng>(
    records: &[RouteRecord],
    model: &DelayModel,
    rng: &mut R,
) -> HashMap<String, f64> {
    records
        .iter()
        .filter(|r| !r.route_id.is_empty())
        .map(|r| {
            let bias = if rng.random::<f64>() < model.bias_probability {
                uniform(rng, model.bias_min, model.bias_max)
            } else {
                0.0
            };
            (r.route_id.clone(), bias)
        })
        .collect()
}

/// Whole minutes of delay for a vehicle scheduled at `time`.
pub fn generate_delay_minutes<R: Rng>(
    time: NaiveTime,
    route_bias: f64,
    model: &DelayModel,
    rng: &mut R,
) -> i64 {
    let incident_roll = rng.random::<f64>();

    let (mean, stddev) = if model.is_peak(time.hour()) {
        (model.peak_mean, model.peak_stddev)
    } else {
        (model.offpeak_mean, model.offpeak_stddev)
    };
    let base = match Normal::new(mean, stddev) {
        Ok(normal) => normal.sample(rng),
        Err(_) => mean,
    };
    let mut delay = base.max(0.0) as i64;

    if incident_roll < model.incident_probability {
        delay = delay.saturating_add(
            rng.random_range(model.incident_min_minutes..=model.incident_max_minutes),
        );
    }

    delay.saturating_add(route_bias as i64)
}

/// `time` shifted by `delay_minutes`, wrapping around midnight.
pub fn shift_time(time: NaiveTime, delay_minutes: i64) -> NaiveTime {
    time + Duration::minutes(delay_minutes.rem_euclid(MINUTES_PER_DAY))
}

/// Adds a synthetic delay to every scheduled stop time.
#[tracing::instrument(skip_all, fields(rows = schedule.len()))]
pub fn simulate_actuals<R: Rng>(
    schedule: &[ScheduledStopTime],
    biases: &HashMap<String, f64>,
    model: &DelayModel,
    rng: &mut R,
) -> Vec<ActualStopTime> {
    let actuals: Vec<ActualStopTime> = schedule
        .iter()
        .map(|s| {
            let bias = s
                .route_id
                .as_ref()
                .and_then(|id| biases.get(id))
                .copied()
                .unwrap_or(0.0);
            let delay = generate_delay_minutes(s.scheduled_time, bias, model, rng);
            let actual = shift_time(s.scheduled_time, delay);

            ActualStopTime {
                trip_id: s.trip_id.clone(),
                route_id: s.route_id.clone(),
                stop_id: s.stop_id.clone(),
                stop_name: s.stop_name.clone(),
                scheduled_time: s.scheduled_time_str.clone(),
                scheduled_time_obj: s.scheduled_time,
                actual_time_str: actual.format("%H:%M:%S").to_string(),
                actual_time_obj: actual,
                delay_minutes: delay,
                stop_lat: None,
                stop_lon: None,
            }
        })
        .collect();

    info!(rows = actuals.len(), "Actual stop times simulated");
    actuals
}

fn uniform<R: Rng>(rng: &mut R, low: f64, high: f64) -> f64 {
    low + (high - low) * rng.random::<f64>()
}
