use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

use powersched_core::SchedulerConfig;

use crate::cli::CliArgs;

/// CLI configuration loaded from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Scheduler tuning (`[scheduler]` table).
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Console rendering preferences (`[display]` table).
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Run the periodic CPU status monitor.
    #[serde(default = "default_show_status")]
    pub show_status: bool,

    /// Emit JSON lines instead of colored text.
    #[serde(default)]
    pub json: bool,
}

fn default_show_status() -> bool {
    true
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_status: default_show_status(),
            json: false,
        }
    }
}

impl CliConfig {
    /// Return the default config directory path: ~/.config/powersched/
    pub fn default_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("could not determine user config directory")?
            .join("powersched");
        Ok(config_dir)
    }

    /// Return the default config file path.
    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join("config.toml"))
    }

    /// Load config from the given path, or the default path.
    /// Returns default config if the file does not exist.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = match path {
            Some(p) => PathBuf::from(p),
            None => Self::default_config_path()?,
        };

        if config_path.exists() {
            debug!(?config_path, "Loading config");
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read config: {}", config_path.display()))?;
            let config: Self = toml::from_str(&content)
                .with_context(|| format!("failed to parse config: {}", config_path.display()))?;
            Ok(config)
        } else {
            debug!(?config_path, "Config file not found, using defaults");
            let config = Self::default();
            // Create directory and write default config
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent).ok();
            }
            let toml_str = toml::to_string_pretty(&config)
                .context("failed to serialize default config")?;
            std::fs::write(&config_path, toml_str).ok();
            Ok(config)
        }
    }

    /// Layer environment and command-line overrides on top of the file
    /// values, then validate.
    /// Priority: cli flag > `POWERSCHED_*` env var > config file > default.
    pub fn resolve(mut self, args: &CliArgs) -> Result<Self> {
        self.scheduler.apply_env_overrides();
        self.apply_args(args);
        self.scheduler
            .validate()
            .context("invalid scheduler configuration")?;
        Ok(self)
    }

    fn apply_args(&mut self, args: &CliArgs) {
        if let Some(ms) = args.time_unit_ms {
            self.scheduler.time_unit_ms = ms;
        }
        if args.json {
            self.display.json = true;
        }
        if args.no_status {
            self.display.show_status = false;
        }
    }
}
