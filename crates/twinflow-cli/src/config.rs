//! Configuration vault – reads/writes `~/.twinflow/config.toml`.
//!
//! Replaces the module-level credential globals of the connector scripts
//! this design descends from with one explicit, serialisable object.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use twinflow_types::{AggregationPolicy, ThresholdOp, ThresholdPredicate};

/// Persisted user configuration stored in `~/.twinflow/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// How many simulated temperature feeds the demo publishes.
    #[serde(default = "default_feed_count")]
    pub feed_count: usize,

    /// The value label feeds publish under.
    #[serde(default = "default_value_label")]
    pub value_label: String,

    /// Threshold comparison applied to every reading.
    #[serde(default = "default_threshold_op")]
    pub threshold_op: ThresholdOp,

    /// Threshold value, in the feed's unit (degrees Celsius for the demo).
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// ANY or ALL aggregation across the followed feeds.
    #[serde(default = "default_policy")]
    pub policy: AggregationPolicy,

    /// Fallback control-loop tick, in milliseconds.
    #[serde(default = "default_tick_ms")]
    pub tick_interval_ms: u64,

    /// Upper bound on a single actuator send, in milliseconds.
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,

    /// Silence period after which a feed is reported quiet, in milliseconds.
    #[serde(default = "default_stale_after_ms")]
    pub stale_after_ms: u64,

    /// Cadence of the simulated publishers, in milliseconds.
    #[serde(default = "default_sim_period_ms")]
    pub sim_period_ms: u64,

    /// Lower end of the simulated temperature ramp.
    #[serde(default = "default_sim_low")]
    pub sim_low: i64,

    /// Upper end of the simulated temperature ramp.
    #[serde(default = "default_sim_high")]
    pub sim_high: i64,
}

fn default_feed_count() -> usize {
    2
}
fn default_value_label() -> String {
    "sensor_reading".to_string()
}
fn default_threshold_op() -> ThresholdOp {
    ThresholdOp::AtOrBelow
}
fn default_threshold() -> f64 {
    18.0
}
fn default_policy() -> AggregationPolicy {
    AggregationPolicy::Any
}
fn default_tick_ms() -> u64 {
    250
}
fn default_send_timeout_ms() -> u64 {
    5_000
}
fn default_stale_after_ms() -> u64 {
    30_000
}
fn default_sim_period_ms() -> u64 {
    1_000
}
fn default_sim_low() -> i64 {
    15
}
fn default_sim_high() -> i64 {
    22
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_count: default_feed_count(),
            value_label: default_value_label(),
            threshold_op: default_threshold_op(),
            threshold: default_threshold(),
            policy: default_policy(),
            tick_interval_ms: default_tick_ms(),
            send_timeout_ms: default_send_timeout_ms(),
            stale_after_ms: default_stale_after_ms(),
            sim_period_ms: default_sim_period_ms(),
            sim_low: default_sim_low(),
            sim_high: default_sim_high(),
        }
    }
}

impl Config {
    /// The configured threshold predicate.
    pub fn predicate(&self) -> ThresholdPredicate {
        ThresholdPredicate::new(self.threshold_op, self.threshold)
    }
}

/// Return the path to `~/.twinflow/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
/// Extracted for testability without mutating environment variables.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".twinflow").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `TWINFLOW_*` environment variable overrides to `cfg`.
///
/// Supported variables:
///
/// | Variable | Config field |
/// |---|---|
/// | `TWINFLOW_POLICY` | `policy` (`any` / `all`) |
/// | `TWINFLOW_THRESHOLD` | `threshold` |
/// | `TWINFLOW_FEEDS` | `feed_count` |
/// | `TWINFLOW_TICK_MS` | `tick_interval_ms` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("TWINFLOW_POLICY") {
        match v.to_ascii_lowercase().as_str() {
            "any" => cfg.policy = AggregationPolicy::Any,
            "all" => cfg.policy = AggregationPolicy::All,
            _ => {}
        }
    }
    if let Ok(v) = std::env::var("TWINFLOW_THRESHOLD")
        && let Ok(threshold) = v.parse::<f64>()
    {
        cfg.threshold = threshold;
    }
    if let Ok(v) = std::env::var("TWINFLOW_FEEDS")
        && let Ok(count) = v.parse::<usize>()
    {
        cfg.feed_count = count;
    }
    if let Ok(v) = std::env::var("TWINFLOW_TICK_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.tick_interval_ms = ms;
    }
}

/// Save the config to disk, creating `~/.twinflow/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &PathBuf) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}
