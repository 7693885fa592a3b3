//! Engine tuning knobs.
//!
//! Loaded from JSON (missing fields fall back to the defaults below). The
//! SpacetimeDB module keeps the same values in its `game_config` singleton.

use std::{fs, io, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::regen::RegenRule;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Stat points restored per regeneration tick.
    pub regen_step: u8,
    /// Upper clamp for health and energy.
    pub stat_cap: u8,
    pub regen_interval_secs: u64,
    /// How often the dispatcher polls the job table.
    pub dispatch_interval_millis: u64,
    /// Max jobs handled per dispatcher poll.
    pub dispatch_batch_size: usize,
    /// Deliveries attempted before a faulting job is dead-lettered.
    pub job_max_attempts: u32,
    pub job_retry_backoff_secs: u64,
    pub farm_energy_per_minute: u32,
    /// Side length added to (x, y) to get a base's box.
    pub base_footprint: u32,
    pub default_inventory_slots: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            regen_step: 1,
            stat_cap: 100,
            regen_interval_secs: 60,
            dispatch_interval_millis: 1_000,
            dispatch_batch_size: 64,
            job_max_attempts: 10,
            job_retry_backoff_secs: 5,
            farm_energy_per_minute: 1,
            base_footprint: 1,
            default_inventory_slots: 10,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse engine config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read engine config from {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn regen_rule(&self) -> RegenRule {
        RegenRule {
            step: self.regen_step,
            cap: self.stat_cap,
        }
    }

    /// Energy charged for a farm run of `minutes`.
    pub fn farm_energy_cost(&self, minutes: u32) -> u32 {
        minutes.saturating_mul(self.farm_energy_per_minute)
    }

    pub fn retry_backoff_micros(&self) -> i64 {
        (self.job_retry_backoff_secs as i64).saturating_mul(1_000_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = EngineConfig::from_json(r#"{ "regen_step": 2 }"#).unwrap();
        assert_eq!(config.regen_step, 2);
        assert_eq!(config.stat_cap, 100);
        assert_eq!(config.default_inventory_slots, 10);
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = EngineConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = EngineConfig::from_path(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_energy_cost_scales_with_minutes() {
        let config = EngineConfig {
            farm_energy_per_minute: 2,
            ..Default::default()
        };
        assert_eq!(config.farm_energy_cost(0), 0);
        assert_eq!(config.farm_energy_cost(15), 30);
        assert_eq!(config.farm_energy_cost(u32::MAX), u32::MAX);
    }

    #[test]
    fn test_regen_rule_mirrors_config() {
        let rule = EngineConfig::default().regen_rule();
        assert_eq!(rule.step, 1);
        assert_eq!(rule.cap, 100);
    }
}
