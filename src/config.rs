//! Layered runtime configuration.
//!
//! Precedence, lowest first: built-in defaults, an optional TOML file,
//! `HOSTPULSE_*` environment variables (nested keys use `__`, e.g.
//! `HOSTPULSE_RECONNECT__MAX_ATTEMPTS`), then explicit command-line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::Thresholds;
use crate::error::{Error, Result};
use crate::source::ReconnectPolicy;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "HOSTPULSE";

/// Resolved settings for a dashboard run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Backend origin; the channel endpoint and API URLs derive from it.
    pub server: String,
    pub reconnect: ReconnectPolicy,
    pub thresholds: Thresholds,
    /// Where downloaded reports are written.
    pub reports_dir: PathBuf,
    /// UI refresh interval in milliseconds.
    pub tick_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: "http://localhost:8000".to_string(),
            reconnect: ReconnectPolicy::default(),
            thresholds: Thresholds::default(),
            reports_dir: PathBuf::from("."),
            tick_ms: 100,
        }
    }
}

/// Values given explicitly on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub server: Option<String>,
    pub max_attempts: Option<u32>,
    pub reconnect_delay_ms: Option<u64>,
    pub reports_dir: Option<PathBuf>,
}

impl Settings {
    /// Load settings from defaults, `config_path`, the process environment and `overrides`.
    pub fn load(config_path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        Self::load_with_env(config_path, Environment::with_prefix(ENV_PREFIX), overrides)
    }

    fn load_with_env(
        config_path: Option<&Path>,
        env: Environment,
        overrides: &Overrides,
    ) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Settings::default())?);

        if let Some(path) = config_path {
            debug!(path = %path.display(), "Loading config file");
            builder = builder.add_source(File::from(path).required(true));
        }

        let env = env.prefix_separator("_").separator("__").try_parsing(true);
        let mut settings: Settings = builder.add_source(env).build()?.try_deserialize()?;

        settings.apply(overrides);
        settings.validate()?;
        Ok(settings)
    }

    fn apply(&mut self, overrides: &Overrides) {
        if let Some(server) = &overrides.server {
            self.server = server.clone();
        }
        if let Some(max_attempts) = overrides.max_attempts {
            self.reconnect.max_attempts = max_attempts;
        }
        if let Some(delay_ms) = overrides.reconnect_delay_ms {
            self.reconnect.delay_ms = delay_ms;
        }
        if let Some(dir) = &overrides.reports_dir {
            self.reports_dir = dir.clone();
        }
    }

    /// Reject settings the dashboard cannot run with.
    ///
    /// `max_attempts = 0` is allowed and disables reconnection.
    pub fn validate(&self) -> Result<()> {
        if self.server.trim().is_empty() {
            return Err(Error::Config("server must not be empty".to_string()));
        }
        if self.reconnect.delay_ms == 0 {
            return Err(Error::Config("reconnect.delay_ms must be positive".to_string()));
        }
        if self.tick_ms == 0 {
            return Err(Error::Config("tick_ms must be positive".to_string()));
        }
        if let Some(name) = self.thresholds.first_invalid() {
            return Err(Error::Config(format!(
                "thresholds.{}: warn must be below danger",
                name
            )));
        }
        Ok(())
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}
