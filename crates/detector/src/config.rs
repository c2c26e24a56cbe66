//! Detector configuration from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chromatrack_core::color::Sensitivity;
use chromatrack_pipeline::PipelineConfig;

/// Default for `LEDGER_TIMEOUT_MS`.
const DEFAULT_LEDGER_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("Either BACKEND_URL or DATABASE_URL must be set")]
    NoLedger,

    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Where detections are recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerTarget {
    /// A chromatrack API base URL, e.g. `http://localhost:3000`.
    Remote(String),
    /// A database URL opened in-process.
    Embedded(String),
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub ledger: LedgerTarget,
    /// Image file, or directory of images cycled per tick.
    pub frame_source: PathBuf,
    /// Where the latest annotated overlay is written. Logged only when unset.
    pub overlay_dir: Option<PathBuf>,
    pub ledger_timeout: Duration,
    pub pipeline: PipelineConfig,
}

impl DetectorConfig {
    /// Load configuration from the process environment.
    ///
    /// | Variable           | Required | Default | Description                              |
    /// |--------------------|----------|---------|------------------------------------------|
    /// | `BACKEND_URL`      | one of   | --      | API base URL; takes precedence           |
    /// | `DATABASE_URL`     | one of   | --      | Embedded ledger database                 |
    /// | `FRAME_SOURCE`     | yes      | --      | Image file or directory of images        |
    /// | `TICK_INTERVAL_MS` | no       | `1000`  | Milliseconds between captures            |
    /// | `EMIT_INTERVAL_MS` | no       | `1000`  | Minimum milliseconds between dispatches  |
    /// | `SENSITIVITY`      | no       | `5`     | Colour threshold sensitivity, 1-10       |
    /// | `BLOCK_STRIDE`     | no       | `20`    | Sampling grid size in pixels             |
    /// | `GROUP_RADIUS`     | no       | `100`   | Merge radius in pixels                   |
    /// | `LEDGER_TIMEOUT_MS`| no       | `5000`  | Bound on one ledger submission           |
    /// | `OVERLAY_DIR`      | no       | --      | Directory for `overlay.png`              |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which returns a variable's value
    /// if it is set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let ledger = match (get("BACKEND_URL"), get("DATABASE_URL")) {
            (Some(url), _) => LedgerTarget::Remote(url.trim_end_matches('/').to_string()),
            (None, Some(url)) => LedgerTarget::Embedded(url),
            (None, None) => return Err(ConfigError::NoLedger),
        };

        let frame_source = get("FRAME_SOURCE")
            .map(PathBuf::from)
            .ok_or(ConfigError::Missing("FRAME_SOURCE"))?;

        let overlay_dir = get("OVERLAY_DIR").map(PathBuf::from);

        let defaults = PipelineConfig::default();

        let tick_interval = parse::<u64>(get("TICK_INTERVAL_MS"), "TICK_INTERVAL_MS")?
            .map_or(defaults.tick_interval, Duration::from_millis);
        let emit_interval = parse::<u64>(get("EMIT_INTERVAL_MS"), "EMIT_INTERVAL_MS")?
            .map_or(defaults.emit_interval, Duration::from_millis);
        let block_stride =
            parse::<u32>(get("BLOCK_STRIDE"), "BLOCK_STRIDE")?.unwrap_or(defaults.block_stride);
        let group_radius =
            parse::<f64>(get("GROUP_RADIUS"), "GROUP_RADIUS")?.unwrap_or(defaults.group_radius);
        let ledger_timeout = Duration::from_millis(
            parse::<u64>(get("LEDGER_TIMEOUT_MS"), "LEDGER_TIMEOUT_MS")?
                .unwrap_or(DEFAULT_LEDGER_TIMEOUT_MS),
        );

        let sensitivity = match get("SENSITIVITY") {
            None => defaults.sensitivity,
            Some(raw) => {
                let value: u8 = raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                    invalid("SENSITIVITY", &raw, e.to_string())
                })?;
                Sensitivity::new(value).map_err(|e| invalid("SENSITIVITY", &raw, e.to_string()))?
            }
        };

        let pipeline = PipelineConfig {
            tick_interval,
            emit_interval,
            block_stride,
            group_radius,
            sensitivity,
            delivery_timeout: ledger_timeout,
            ..defaults
        };

        Ok(Self {
            ledger,
            frame_source,
            overlay_dir,
            ledger_timeout,
            pipeline,
        })
    }
}

fn parse<T>(raw: Option<String>, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.map(|value| {
        value
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(var, &value, e.to_string()))
    })
    .transpose()
}

fn invalid(var: &'static str, value: &str, reason: String) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason,
    }
}
