//! Service configuration.
//!
//! Values come from the environment (a `.env` file is loaded by the binary)
//! and may be overridden by CLI flags.
//!
//! | Variable                     | Default                   |
//! |------------------------------|---------------------------|
//! | `CANCELLATIONS_SOURCE`       | `data/cancellations.xlsx` |
//! | `CANCELLATIONS_PORT`         | `3000`                    |
//! | `CANCELLATIONS_REFRESH_SECS` | `300`                     |

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

pub const DEFAULT_SOURCE: &str = "data/cancellations.xlsx";
pub const DEFAULT_PORT: u16 = 3000;
/// Re-ingest every five minutes.
pub const DEFAULT_REFRESH_SECS: u64 = 300;

/// Maximum accepted upload size.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Workbook file, or directory of per-sheet CSV files.
    pub source: PathBuf,
    pub port: u16,
    pub refresh_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source: PathBuf::from(DEFAULT_SOURCE),
            port: DEFAULT_PORT,
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_SECS),
        }
    }
}

impl Settings {
    /// Read settings from process environment variables.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through an arbitrary lookup (used by tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let mut settings = Self::default();

        if let Some(source) = lookup("CANCELLATIONS_SOURCE").filter(|s| !s.trim().is_empty()) {
            settings.source = PathBuf::from(source.trim());
        }
        if let Some(port) = lookup("CANCELLATIONS_PORT") {
            settings.port = parse_value("CANCELLATIONS_PORT", &port)?;
        }
        if let Some(secs) = lookup("CANCELLATIONS_REFRESH_SECS") {
            let secs: u64 = parse_value("CANCELLATIONS_REFRESH_SECS", &secs)?;
            settings.refresh_interval = refresh_interval(secs)?;
        }

        Ok(settings)
    }

    /// Apply CLI overrides on top of environment values.
    pub fn with_overrides(
        mut self,
        source: Option<PathBuf>,
        port: Option<u16>,
        refresh_secs: Option<u64>,
    ) -> ConfigResult<Self> {
        if let Some(source) = source {
            self.source = source;
        }
        if let Some(port) = port {
            self.port = port;
        }
        if let Some(secs) = refresh_secs {
            self.refresh_interval = refresh_interval(secs)?;
        }
        Ok(self)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn refresh_interval(secs: u64) -> ConfigResult<Duration> {
    if secs == 0 {
        return Err(ConfigError::InvalidValue {
            key: "CANCELLATIONS_REFRESH_SECS".to_string(),
            value: secs.to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}
