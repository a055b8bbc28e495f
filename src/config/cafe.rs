//! Café configuration structures.

use std::env::VarError;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default seat count.
pub const DEFAULT_SEATS: usize = 5;
/// Default barista pool size.
pub const DEFAULT_BARISTAS: usize = 3;
/// Default preparation time per coffee, in milliseconds.
pub const DEFAULT_SERVICE_TIME_MS: u64 = 2_000;
/// Default extra time shutdown allows a barista beyond one preparation.
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 2_000;

/// What happens to an arrival when every seat is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "policy")]
pub enum OverflowPolicy {
    /// Wait at the door until a seat frees up.
    #[default]
    Wait,
    /// Leave immediately if `max_waiting` customers are already at the door.
    Reject {
        /// Longest door line tolerated before turning arrivals away.
        max_waiting: usize,
    },
}

/// Café configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CafeConfig {
    /// Maximum customers inside at once.
    pub seats: usize,
    /// Fixed number of baristas.
    pub baristas: usize,
    /// Preparation time per coffee, in milliseconds.
    pub service_time_ms: u64,
    /// Optional limit on how long an arrival waits before giving up.
    pub arrival_timeout_ms: Option<u64>,
    /// Overflow behaviour when the café is full.
    pub overflow: OverflowPolicy,
    /// Time allowed on top of one preparation for tasks to stop at shutdown,
    /// in milliseconds.
    pub shutdown_grace_ms: u64,
}

impl Default for CafeConfig {
    fn default() -> Self {
        Self {
            seats: DEFAULT_SEATS,
            baristas: DEFAULT_BARISTAS,
            service_time_ms: DEFAULT_SERVICE_TIME_MS,
            arrival_timeout_ms: None,
            overflow: OverflowPolicy::Wait,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
        }
    }
}

impl CafeConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the seat count.
    #[must_use]
    pub const fn with_seats(mut self, seats: usize) -> Self {
        self.seats = seats;
        self
    }

    /// Set the barista pool size.
    #[must_use]
    pub const fn with_baristas(mut self, baristas: usize) -> Self {
        self.baristas = baristas;
        self
    }

    /// Set the preparation time per coffee.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn with_service_time(mut self, service_time: Duration) -> Self {
        self.service_time_ms = service_time.as_millis() as u64;
        self
    }

    /// Set the arrival timeout.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn with_arrival_timeout(mut self, timeout: Duration) -> Self {
        self.arrival_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Set the overflow policy.
    #[must_use]
    pub const fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    /// Set the shutdown grace period.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace_ms = grace.as_millis() as u64;
        self
    }

    /// Preparation time per coffee.
    #[must_use]
    pub const fn service_time(&self) -> Duration {
        Duration::from_millis(self.service_time_ms)
    }

    /// Arrival timeout, if any.
    #[must_use]
    pub fn arrival_timeout(&self) -> Option<Duration> {
        self.arrival_timeout_ms.map(Duration::from_millis)
    }

    /// Shutdown grace period.
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.seats == 0 {
            return Err("seats must be greater than 0".into());
        }
        if self.seats > tokio::sync::Semaphore::MAX_PERMITS {
            return Err(format!(
                "seats must be at most {}",
                tokio::sync::Semaphore::MAX_PERMITS
            ));
        }
        if self.baristas == 0 {
            return Err("baristas must be greater than 0".into());
        }
        if self.arrival_timeout_ms == Some(0) {
            return Err("arrival_timeout_ms must be greater than 0 when set".into());
        }
        if let OverflowPolicy::Reject { max_waiting: 0 } = self.overflow {
            return Err("max_waiting must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a message on parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `CAFE_*` environment variables, loading a
    /// `.env` file first if one exists. Unset variables keep their defaults.
    ///
    /// Recognised: `CAFE_SEATS`, `CAFE_BARISTAS`, `CAFE_SERVICE_MS`,
    /// `CAFE_ARRIVAL_TIMEOUT_MS`, `CAFE_SHUTDOWN_GRACE_MS`, `CAFE_MAX_WAITING`
    /// (switches to `OverflowPolicy::Reject`).
    ///
    /// # Errors
    ///
    /// Returns a message if a variable does not parse or validation fails.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        let mut cfg = Self::default();

        if let Some(seats) = env_var("CAFE_SEATS")? {
            cfg.seats = seats;
        }
        if let Some(baristas) = env_var("CAFE_BARISTAS")? {
            cfg.baristas = baristas;
        }
        if let Some(ms) = env_var("CAFE_SERVICE_MS")? {
            cfg.service_time_ms = ms;
        }
        if let Some(ms) = env_var("CAFE_ARRIVAL_TIMEOUT_MS")? {
            cfg.arrival_timeout_ms = Some(ms);
        }
        if let Some(ms) = env_var("CAFE_SHUTDOWN_GRACE_MS")? {
            cfg.shutdown_grace_ms = ms;
        }
        if let Some(max_waiting) = env_var("CAFE_MAX_WAITING")? {
            cfg.overflow = OverflowPolicy::Reject { max_waiting };
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

fn env_var<T>(name: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| format!("{name}: {e}")),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(format!("{name}: not valid unicode")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_original_scenario() {
        let cfg = CafeConfig::default();
        assert_eq!(cfg.seats, 5);
        assert_eq!(cfg.baristas, 3);
        assert_eq!(cfg.service_time(), Duration::from_secs(2));
        assert_eq!(cfg.overflow, OverflowPolicy::Wait);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_builder_setters() {
        let cfg = CafeConfig::new()
            .with_seats(1)
            .with_baristas(2)
            .with_service_time(Duration::from_millis(250))
            .with_arrival_timeout(Duration::from_secs(1))
            .with_overflow(OverflowPolicy::Reject { max_waiting: 3 });
        assert_eq!(cfg.service_time_ms, 250);
        assert_eq!(cfg.arrival_timeout(), Some(Duration::from_secs(1)));
        assert!(cfg.validate().is_ok());
    }
}
