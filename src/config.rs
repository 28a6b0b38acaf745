//! Application configuration

use std::path::PathBuf;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_with::serde_as;

use crate::errors::VoyageWorkerError;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub regions: RegionConfig,
    #[serde(default)]
    pub simplifier: SimplifierConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RegionConfig {
    /// GeoJSON feature collection; region tagging is disabled when unset
    pub path: Option<PathBuf>,
    /// Feature property holding the region name
    #[serde(default = "default_name_property")]
    pub name_property: String,
}

/// Removal thresholds of the simplification heuristic
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Maximum distance from the anchor→successor line, meters
    #[serde(default = "default_cross_track_m")]
    pub cross_track_m: f64,
    /// Maximum heading change from the previous fix, degrees
    #[serde(default = "default_turn_deg")]
    pub turn_deg: f64,
    /// Maximum distance from the anchor, meters
    #[serde(default = "default_proximity_m")]
    pub proximity_m: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SimplifierConfig {
    /// Pending fixes fetched per sub-batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Fixes processed per trip per scheduler tick
    #[serde(default = "default_tick_amount")]
    pub tick_amount: usize,
    /// Every Nth fix of a batch is looked up in the region index
    #[serde(default = "default_region_sample_interval")]
    pub region_sample_interval: usize,
    /// Keep the anchor across sub-batches instead of restarting it
    #[serde(default = "default_carry_anchor")]
    pub carry_anchor: bool,
    #[serde(default)]
    pub thresholds: Thresholds,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_tick_interval")]
    pub tick_interval: Duration,
}

fn default_max_connections() -> u32 {
    5
}

fn default_name_property() -> String {
    "name".to_string()
}

fn default_cross_track_m() -> f64 {
    10.0
}

fn default_turn_deg() -> f64 {
    7.0
}

fn default_proximity_m() -> f64 {
    100.0
}

fn default_batch_size() -> usize {
    10_000
}

fn default_tick_amount() -> usize {
    100_000
}

fn default_region_sample_interval() -> usize {
    1000
}

fn default_carry_anchor() -> bool {
    true
}

fn default_tick_interval() -> Duration {
    Duration::from_secs(1)
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            path: None,
            name_property: default_name_property(),
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cross_track_m: default_cross_track_m(),
            turn_deg: default_turn_deg(),
            proximity_m: default_proximity_m(),
        }
    }
}

impl Default for SimplifierConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            tick_amount: default_tick_amount(),
            region_sample_interval: default_region_sample_interval(),
            carry_anchor: default_carry_anchor(),
            thresholds: Thresholds::default(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: default_tick_interval(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(
                Environment::with_prefix("VOYAGEWORKER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Validate all sections
    pub fn validate(&self) -> Result<(), VoyageWorkerError> {
        self.database.validate()?;
        self.simplifier.validate()?;
        self.scheduler.validate()?;
        Ok(())
    }
}

fn invalid(message: &str) -> VoyageWorkerError {
    VoyageWorkerError::ConfigurationError {
        message: message.to_string(),
    }
}

impl DatabaseConfig {
    pub fn validate(&self) -> Result<(), VoyageWorkerError> {
        if self.url.trim().is_empty() {
            return Err(invalid("Database URL cannot be empty"));
        }
        if self.max_connections == 0 {
            return Err(invalid("Database max_connections must be greater than zero"));
        }
        Ok(())
    }
}

impl SimplifierConfig {
    pub fn validate(&self) -> Result<(), VoyageWorkerError> {
        if self.batch_size < 3 {
            return Err(invalid("Simplifier batch_size must be at least 3"));
        }
        if self.tick_amount == 0 {
            return Err(invalid("Simplifier tick_amount must be greater than zero"));
        }
        if self.region_sample_interval == 0 {
            return Err(invalid(
                "Simplifier region_sample_interval must be greater than zero",
            ));
        }
        self.thresholds.validate()
    }
}

impl Thresholds {
    pub fn validate(&self) -> Result<(), VoyageWorkerError> {
        let all_positive = [self.cross_track_m, self.turn_deg, self.proximity_m]
            .iter()
            .all(|v| v.is_finite() && *v > 0.0);
        if !all_positive {
            return Err(invalid("Simplifier thresholds must be positive"));
        }
        Ok(())
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), VoyageWorkerError> {
        if self.tick_interval.is_zero() {
            return Err(invalid("Scheduler tick_interval must be greater than zero"));
        }
        Ok(())
    }
}
