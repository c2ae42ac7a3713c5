use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

/// Scheduler tuning knobs, typically parsed from TOML.
///
/// All delays are expressed in *time units*; `time_unit_ms` converts them
/// to wall-clock time (one second by default).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Length of one time unit in milliseconds.
    #[serde(default = "default_time_unit_ms")]
    pub time_unit_ms: u64,
    /// Utilization above this percentage triggers a backoff before a task.
    #[serde(default = "default_throttle_threshold")]
    pub throttle_threshold_percent: f32,
    /// Backoff pause applied under high load, in time units.
    #[serde(default = "default_backoff_units")]
    pub backoff_units: u32,
    /// Low-power pause after a run finishes, in time units.
    #[serde(default = "default_idle_units")]
    pub idle_units: u32,
    /// Interval between periodic status samples, in time units.
    #[serde(default = "default_status_interval_units")]
    pub status_interval_units: u32,
    /// Window over which one utilization reading is measured.
    #[serde(default = "default_sample_window_ms")]
    pub sample_window_ms: u64,
}

fn default_time_unit_ms() -> u64 { 1000 }
fn default_throttle_threshold() -> f32 { 75.0 }
fn default_backoff_units() -> u32 { 3 }
fn default_idle_units() -> u32 { 1 }
fn default_status_interval_units() -> u32 { 2 }
fn default_sample_window_ms() -> u64 { 100 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            time_unit_ms: default_time_unit_ms(),
            throttle_threshold_percent: default_throttle_threshold(),
            backoff_units: default_backoff_units(),
            idle_units: default_idle_units(),
            status_interval_units: default_status_interval_units(),
            sample_window_ms: default_sample_window_ms(),
        }
    }
}

impl SchedulerConfig {
    /// Override fields from `POWERSCHED_*` env vars.
    ///
    /// Profile is read from `POWERSCHED_PROFILE`. When set (e.g. `FAST`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn apply_env_overrides(&mut self) {
        let profile = env_opt("POWERSCHED_PROFILE")
            .unwrap_or_default()
            .to_uppercase();
        self.apply_overrides(|key| profiled_env_opt(&profile, key));
    }

    /// Override fields from an arbitrary key lookup. Unparseable values are
    /// ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        override_field(&lookup, "POWERSCHED_TIME_UNIT_MS", &mut self.time_unit_ms);
        override_field(
            &lookup,
            "POWERSCHED_THROTTLE_THRESHOLD",
            &mut self.throttle_threshold_percent,
        );
        override_field(&lookup, "POWERSCHED_BACKOFF_UNITS", &mut self.backoff_units);
        override_field(&lookup, "POWERSCHED_IDLE_UNITS", &mut self.idle_units);
        override_field(
            &lookup,
            "POWERSCHED_STATUS_INTERVAL_UNITS",
            &mut self.status_interval_units,
        );
        override_field(&lookup, "POWERSCHED_SAMPLE_WINDOW_MS", &mut self.sample_window_ms);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.time_unit_ms == 0 {
            return Err(ConfigError::Invalid("time_unit_ms must be > 0".into()));
        }
        let threshold = self.throttle_threshold_percent;
        if !threshold.is_finite() || threshold <= 0.0 || threshold > 100.0 {
            return Err(ConfigError::Invalid(format!(
                "throttle_threshold_percent must be in (0, 100], got {}",
                threshold
            )));
        }
        if self.status_interval_units == 0 {
            return Err(ConfigError::Invalid(
                "status_interval_units must be > 0".into(),
            ));
        }
        for (name, count) in [
            ("backoff_units", self.backoff_units),
            ("idle_units", self.idle_units),
            ("status_interval_units", self.status_interval_units),
        ] {
            if self.units(count).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "{} x time_unit_ms overflows a duration",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Convert a count of time units to a duration. `None` on overflow.
    pub fn units(&self, count: u32) -> Option<Duration> {
        self.time_unit_ms
            .checked_mul(u64::from(count))
            .map(Duration::from_millis)
    }

    /// A count of time units expressed in seconds, for display.
    pub fn units_secs(&self, count: u32) -> f64 {
        f64::from(count) * self.time_unit_ms as f64 / 1000.0
    }

    pub fn backoff(&self) -> Duration {
        self.units(self.backoff_units).unwrap_or(Duration::MAX)
    }

    pub fn idle(&self) -> Duration {
        self.units(self.idle_units).unwrap_or(Duration::MAX)
    }

    pub fn status_interval(&self) -> Duration {
        self.units(self.status_interval_units).unwrap_or(Duration::MAX)
    }

    pub fn sample_window(&self) -> Duration {
        Duration::from_millis(self.sample_window_ms)
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Scheduler config loaded:");
        tracing::info!("  time unit:   {}ms", self.time_unit_ms);
        tracing::info!(
            "  throttle:    >{:.1}% load, backoff {} units",
            self.throttle_threshold_percent,
            self.backoff_units
        );
        tracing::info!("  idle:        {} units", self.idle_units);
        tracing::info!("  status:      every {} units", self.status_interval_units);
        tracing::info!("  sampling:    {}ms window", self.sample_window_ms);
    }
}

fn override_field<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    field: &mut T,
) {
    if let Some(raw) = lookup(key) {
        match raw.trim().parse() {
            Ok(value) => *field = value,
            Err(_) => tracing::warn!(key, value = %raw, "ignoring unparseable config override"),
        }
    }
}
