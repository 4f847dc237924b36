use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Upper bound for every minute-valued delay parameter (one day).
pub const MAX_DELAY_MINUTES: f64 = 1440.0;

/// Parameters of the delay and accessibility synthesis.
///
/// Can be overridden from a JSON file; omitted fields keep their defaults:
/// ```json
/// {
///   "delay": { "incident_probability": 0.02 },
///   "accessibility": { "wheelchair": 0.5 }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub delay: DelayModel,
    pub accessibility: AccessibilityRates,
}

/// Delay distribution per time of day, plus incidents and per-route bias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayModel {
    /// Inclusive hour ranges treated as peak.
    pub peak_hours: Vec<(u32, u32)>,
    pub peak_mean: f64,
    pub peak_stddev: f64,
    pub offpeak_mean: f64,
    pub offpeak_stddev: f64,
    pub incident_probability: f64,
    pub incident_min_minutes: i64,
    pub incident_max_minutes: i64,
    pub bias_probability: f64,
    pub bias_min: f64,
    pub bias_max: f64,
}

impl Default for DelayModel {
    fn default() -> Self {
        Self {
            peak_hours: vec![(7, 10), (17, 20)],
            peak_mean: 8.0,
            peak_stddev: 5.0,
            offpeak_mean: 3.0,
            offpeak_stddev: 3.0,
            incident_probability: 0.01,
            incident_min_minutes: 20,
            incident_max_minutes: 90,
            bias_probability: 0.15,
            bias_min: 1.5,
            bias_max: 4.5,
        }
    }
}

impl DelayModel {
    pub fn is_peak(&self, hour: u32) -> bool {
        self.peak_hours
            .iter()
            .any(|&(start, end)| (start..=end).contains(&hour))
    }
}

/// Probability that a stop has each amenity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessibilityRates {
    pub wheelchair: f64,
    pub shelter: f64,
    pub lighting: f64,
}

impl Default for AccessibilityRates {
    fn default() -> Self {
        Self {
            wheelchair: 0.35,
            shelter: 0.6,
            lighting: 0.7,
        }
    }
}

impl SynthesisConfig {
    /// Loads overrides from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SynthesisConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let d = &self.delay;
        let probabilities = [
            ("delay.incident_probability", d.incident_probability),
            ("delay.bias_probability", d.bias_probability),
            ("accessibility.wheelchair", self.accessibility.wheelchair),
            ("accessibility.shelter", self.accessibility.shelter),
            ("accessibility.lighting", self.accessibility.lighting),
        ];
        for (name, p) in probabilities {
            ensure!((0.0..=1.0).contains(&p), "{name} must be within [0, 1], got {p}");
        }
        let minutes = [
            ("delay.peak_mean", d.peak_mean),
            ("delay.peak_stddev", d.peak_stddev),
            ("delay.offpeak_mean", d.offpeak_mean),
            ("delay.offpeak_stddev", d.offpeak_stddev),
            ("delay.bias_min", d.bias_min),
            ("delay.bias_max", d.bias_max),
            ("delay.incident_min_minutes", d.incident_min_minutes as f64),
            ("delay.incident_max_minutes", d.incident_max_minutes as f64),
        ];
        for (name, m) in minutes {
            ensure!(
                (0.0..=MAX_DELAY_MINUTES).contains(&m),
                "{name} must be within [0, {MAX_DELAY_MINUTES}] minutes, got {m}"
            );
        }
        ensure!(
            d.bias_min <= d.bias_max,
            "delay.bias_min ({}) exceeds delay.bias_max ({})",
            d.bias_min,
            d.bias_max
        );
        ensure!(
            d.incident_min_minutes <= d.incident_max_minutes,
            "delay.incident_min_minutes exceeds delay.incident_max_minutes"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SynthesisConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.delay.is_peak(7));
        assert!(config.delay.is_peak(20));
        assert!(!config.delay.is_peak(11));
        assert!(!config.delay.is_peak(21));
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let config: SynthesisConfig =
            serde_json::from_str(r#"{"delay": {"incident_probability": 0.05}}"#).unwrap();
        assert_eq!(config.delay.incident_probability, 0.05);
        assert_eq!(config.delay.peak_mean, 8.0);
        assert_eq!(config.accessibility, AccessibilityRates::default());
    }

    #[test]
    fn test_validate_rejects_bad_rates() {
        let mut config = SynthesisConfig::default();
        config.accessibility.shelter = 1.5;
        assert!(config.validate().is_err());

        let mut config = SynthesisConfig::default();
        config.delay.bias_min = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bounds_minute_values() {
        let config: SynthesisConfig =
            serde_json::from_str(r#"{"delay":{"offpeak_mean":1e18,"offpeak_stddev":0.0}}"#)
                .unwrap();
        assert!(config.validate().is_err());

        let mut config = SynthesisConfig::default();
        config.delay.incident_max_minutes = 10_000;
        assert!(config.validate().is_err());

        let mut config = SynthesisConfig::default();
        config.delay.peak_stddev = -1.0;
        assert!(config.validate().is_err());

        let mut config = SynthesisConfig::default();
        config.delay.bias_max = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = SynthesisConfig::default();
        config.delay.peak_mean = 1440.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("synthesis.json");
        std::fs::write(&path, r#"{"accessibility": {"wheelchair": 0.9}}"#).unwrap();

        let config = SynthesisConfig::load(&path).unwrap();
        assert_eq!(config.accessibility.wheelchair, 0.9);
        assert_eq!(config.accessibility.lighting, 0.7);
    }
}
