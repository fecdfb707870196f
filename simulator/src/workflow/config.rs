use anyhow::Context;
use potholecore::records::GeoPosition;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Scenario driving the feed server: ports, heartbeat, and the synthetic survey.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub http_port: u16,
    pub ws_port: u16,
    pub seed: u64,
    pub initial_potholes: usize,
    pub center: GeoPosition,
    pub spread_deg: f64,
    pub tick_ms: u64,
    pub detector_speed_deg: f64,
    pub pothole_probability: f64,
    pub detector_name: Option<String>,
    pub ping_interval_ms: u64,
    pub ping_timeout_ms: u64,
    pub greeting: Option<String>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            http_port: 3000,
            ws_port: 3030,
            seed: 0,
            initial_potholes: 12,
            center: GeoPosition::new(21.1, 6.9),
            spread_deg: 8.0,
            tick_ms: 1_000,
            detector_speed_deg: 0.25,
            pothole_probability: 0.15,
            detector_name: Some("survey van".into()),
            ping_interval_ms: 25_000,
            ping_timeout_ms: 20_000,
            greeting: Some("connected to pothole feed".into()),
        }
    }
}

impl ScenarioConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading scenario config {}", path_ref.display()))?;
        let config: ScenarioConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing scenario config {}", path_ref.display()))?;
        config
            .center
            .validate()
            .with_context(|| format!("validating center in {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(http_port: u16, ws_port: u16, seed: u64, tick_ms: u64) -> Self {
        Self {
            http_port,
            ws_port,
            seed,
            tick_ms,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn config_from_args_keeps_survey_defaults() {
        let cfg = ScenarioConfig::from_args(8000, 8030, 9, 250);
        assert_eq!(cfg.ws_port, 8030);
        assert_eq!(cfg.tick_ms, 250);
        assert_eq!(cfg.initial_potholes, 12);
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"seed: 3\ninitial_potholes: 4\ncenter:\n  latitude: 45.0\n  longitude: 7.6\n")
            .unwrap();
        let path = temp.into_temp_path();
        let cfg = ScenarioConfig::load(&path).unwrap();
        assert_eq!(cfg.seed, 3);
        assert_eq!(cfg.initial_potholes, 4);
        assert_eq!(cfg.center, GeoPosition::new(45.0, 7.6));
        assert_eq!(cfg.http_port, 3000);
    }

    #[test]
    fn example_scenario_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../config/scenario.example.yaml");
        let cfg = ScenarioConfig::load(path).unwrap();
        assert_eq!(cfg.seed, 312);
        assert_eq!(cfg.ws_port, 3030);
    }

    #[test]
    fn config_load_rejects_invalid_center() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"center:\n  latitude: 95.0\n  longitude: 0.0\n")
            .unwrap();
        let path = temp.into_temp_path();
        assert!(ScenarioConfig::load(&path).is_err());
    }
}
