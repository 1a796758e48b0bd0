//! Map configuration
//!
//! Probabilities are supplied by the caller and converted to log-odds once
//! at `set_config` time; the engine never touches probabilities on the hot
//! path. Invalid configurations are rejected and the map keeps its previous
//! state.

use crate::error::{Error, Result};
use crate::voxel::LogOdds;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

fn default_history_size() -> u32 {
    5
}

/// User-facing map configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapConfig {
    /// Maximum ray length in meters; 0 means unbounded
    pub max_range: f64,
    /// Probability of occupancy given a hit, in (0.5, 1)
    pub prob_hit: f64,
    /// Probability of occupancy given a miss, in (0, 0.5)
    pub prob_miss: f64,
    /// Deactivation probability threshold, in (0, 1)
    pub prob_thres_min: f64,
    /// Activation probability threshold, in (0, 1)
    pub prob_thres_max: f64,
    /// Directory map snapshots are written to
    pub map_directory_path: PathBuf,
    /// Record endpoint hits only, skipping free-space raycasting
    #[serde(default)]
    pub static_env: bool,
    /// Capacity of the per-voxel semantic voting window
    #[serde(default = "default_history_size")]
    pub semantic_history_size: u32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            max_range: 0.0,
            prob_hit: 0.7,
            prob_miss: 0.4,
            prob_thres_min: 0.12,
            prob_thres_max: 0.8,
            map_directory_path: PathBuf::from("."),
            static_env: false,
            semantic_history_size: default_history_size(),
        }
    }
}

impl MapConfig {
    /// Load a configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let config: MapConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Check all parameter ranges
    pub fn validate(&self) -> Result<()> {
        if self.max_range < 0.0 {
            return Err(Error::ConfigInvalid(format!(
                "max_range {} is negative",
                self.max_range
            )));
        }
        if !(self.prob_hit > 0.5 && self.prob_hit < 1.0) {
            return Err(Error::ConfigInvalid(format!(
                "prob_hit {} must lie in (0.5, 1)",
                self.prob_hit
            )));
        }
        if !(self.prob_miss > 0.0 && self.prob_miss < 0.5) {
            return Err(Error::ConfigInvalid(format!(
                "prob_miss {} must lie in (0, 0.5)",
                self.prob_miss
            )));
        }
        if !(self.prob_thres_min > 0.0 && self.prob_thres_min < 1.0) {
            return Err(Error::ConfigInvalid(format!(
                "prob_thres_min {} must lie in (0, 1)",
                self.prob_thres_min
            )));
        }
        if !(self.prob_thres_max > 0.0 && self.prob_thres_max < 1.0) {
            return Err(Error::ConfigInvalid(format!(
                "prob_thres_max {} must lie in (0, 1)",
                self.prob_thres_max
            )));
        }
        if self.prob_thres_min > self.prob_thres_max {
            return Err(Error::ConfigInvalid(format!(
                "prob_thres_min {} exceeds prob_thres_max {}",
                self.prob_thres_min, self.prob_thres_max
            )));
        }
        Ok(())
    }

    /// Convert the probability parameters to log-odds fusion parameters
    pub(crate) fn log_odds(&self) -> LogOdds {
        LogOdds::from_probabilities(
            self.prob_hit,
            self.prob_miss,
            self.prob_thres_min,
            self.prob_thres_max,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(MapConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_probabilities() {
        let mut config = MapConfig::default();
        config.prob_hit = 0.4;
        assert!(matches!(config.validate(), Err(Error::ConfigInvalid(_))));

        let mut config = MapConfig::default();
        config.prob_miss = 0.6;
        assert!(config.validate().is_err());

        let mut config = MapConfig::default();
        config.prob_thres_min = 0.9;
        config.prob_thres_max = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_negative_range() {
        let mut config = MapConfig::default();
        config.max_range = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_range_means_unbounded() {
        let mut config = MapConfig::default();
        config.max_range = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_defaults() {
        let json = r#"{
            "max_range": 10.0,
            "prob_hit": 0.8,
            "prob_miss": 0.3,
            "prob_thres_min": 0.2,
            "prob_thres_max": 0.75,
            "map_directory_path": "/tmp/maps"
        }"#;
        let config: MapConfig = serde_json::from_str(json).unwrap();
        assert!(!config.static_env);
        assert_eq!(config.semantic_history_size, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_log_odds_signs() {
        let odds = MapConfig::default().log_odds();
        assert!(odds.hit > 0.0);
        assert!(odds.miss < 0.0);
        assert!(odds.thres_min <= odds.thres_max);
        assert!(odds.clamp_min < odds.thres_min);
        assert!(odds.clamp_max > odds.thres_max);
    }
}
