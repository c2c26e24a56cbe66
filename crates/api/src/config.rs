use std::time::Duration;

/// Longest accepted retention window.
pub const MAX_RETENTION_DAYS: i64 = 36_500;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Upper bound on a single ledger operation, in milliseconds (default: `5000`).
    pub ledger_timeout_ms: u64,
    /// Detections older than this many days are pruned (default: `90`).
    pub retention_days: i64,
    /// Seconds between retention runs (default: `3600`).
    pub retention_interval_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                 |
    /// |---------------------------|-------------------------|
    /// | `HOST`                    | `0.0.0.0`               |
    /// | `PORT`                    | `3000`                  |
    /// | `CORS_ORIGINS`            | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                    |
    /// | `LEDGER_TIMEOUT_MS`       | `5000`                  |
    /// | `RETENTION_DAYS`          | `90`                    |
    /// | `RETENTION_INTERVAL_SECS` | `3600`                  |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let ledger_timeout_ms: u64 = std::env::var("LEDGER_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".into())
            .parse()
            .expect("LEDGER_TIMEOUT_MS must be a valid u64");

        let retention_days: i64 = std::env::var("RETENTION_DAYS")
            .unwrap_or_else(|_| "90".into())
            .parse()
            .expect("RETENTION_DAYS must be a valid integer");

        let retention_interval_secs: u64 = std::env::var("RETENTION_INTERVAL_SECS")
            .unwrap_or_else(|_| "3600".into())
            .parse()
            .expect("RETENTION_INTERVAL_SECS must be a valid u64");

        let config = Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            ledger_timeout_ms,
            retention_days,
            retention_interval_secs,
        };
        config.validate().expect("Invalid server configuration");
        config
    }

    /// Check the ranges that parsing alone does not enforce.
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=MAX_RETENTION_DAYS).contains(&self.retention_days) {
            return Err(format!(
                "RETENTION_DAYS must be between 1 and {MAX_RETENTION_DAYS}, got {}",
                self.retention_days
            ));
        }
        if self.retention_interval_secs == 0 {
            return Err("RETENTION_INTERVAL_SECS must be greater than zero".to_string());
        }
        if self.ledger_timeout_ms == 0 {
            return Err("LEDGER_TIMEOUT_MS must be greater than zero".to_string());
        }
        Ok(())
    }

    pub fn ledger_timeout(&self) -> Duration {
        Duration::from_millis(self.ledger_timeout_ms)
    }

    pub fn retention_interval(&self) -> Duration {
        Duration::from_secs(self.retention_interval_secs)
    }
}
