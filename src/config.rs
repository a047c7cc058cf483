//! Runtime configuration for the core crate.
//!
//! `CoreConfig` is a concrete, `Duration`-typed expansion of the
//! `Controller::new` config contract: poll cadence, per-write timeout, the
//! serial text family's baud rate and port-name filter, plus three fields
//! (`auth_user`, `auth_pass`, `cors_origins`) the core itself never reads —
//! they exist so a façade binding the core to HTTP can source them from the
//! same place, the way config types commonly carry a few fields the backend
//! itself never branches on.
use std::env;
use std::time::Duration;

use regex::Regex;

#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// How often the registry's poll thread re-enumerates devices.
    pub poll_interval: Duration,
    /// Upper bound on a single transport write/read.
    pub write_timeout: Duration,
    /// Dwell used by [`crate::effect::steady`] when a caller doesn't pick
    /// one explicitly.
    pub default_dwell: Duration,
    /// Baud rate used to open text-over-serial devices.
    pub serial_baud_rate: u32,
    /// Only serial ports whose name matches are treated as text-over-serial
    /// devices. `None` means "every serial port" (used by tests; production
    /// callers should supply [`crate::registry::default_serial_pattern`]).
    pub serial_port_pattern: Option<Regex>,
    /// Passed through untouched for an HTTP façade's basic-auth binding.
    pub auth_user: Option<String>,
    pub auth_pass: Option<String>,
    /// Passed through untouched for an HTTP façade's CORS configuration.
    pub cors_origins: Vec<String>,
    /// Mirrors `DEBUG`; read by [`crate::logging::init_from_config`].
    pub debug: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            write_timeout: Duration::from_millis(500),
            default_dwell: Duration::from_millis(250),
            serial_baud_rate: 9600,
            serial_port_pattern: None,
            auth_user: None,
            auth_pass: None,
            cors_origins: Vec::new(),
            debug: false,
        }
    }
}

impl CoreConfig {
    /// Build a config from the environment-variable contract: unset or
    /// unparsable numeric variables fall back to the matching default field
    /// rather than erroring.
    #[must_use]
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            poll_interval: env_duration_ms("POLL_INTERVAL_MS", default.poll_interval),
            write_timeout: env_duration_ms("WRITE_TIMEOUT_MS", default.write_timeout),
            default_dwell: env_duration_ms("DEFAULT_DWELL_MS", default.default_dwell),
            serial_port_pattern: crate::registry::default_serial_pattern().ok(),
            auth_user: env::var("AUTH_USER").ok(),
            auth_pass: env::var("AUTH_PASS").ok(),
            cors_origins: env::var("CORS_ORIGINS_JSON")
                .ok()
                .and_then(|raw| serde_json::from_str::<Vec<String>>(&raw).ok())
                .unwrap_or_default(),
            debug: env::var("DEBUG")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            ..default
        }
    }
}

fn env_duration_ms(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_sane_poll_and_timeout() {
        let c = CoreConfig::default();
        assert_eq!(c.poll_interval, Duration::from_secs(1));
        assert_eq!(c.write_timeout, Duration::from_millis(500));
    }

    #[test]
    fn missing_env_vars_fall_back_to_defaults() {
        env::remove_var("POLL_INTERVAL_MS");
        env::remove_var("WRITE_TIMEOUT_MS");
        let c = CoreConfig::from_env();
        assert_eq!(c.poll_interval, Duration::from_secs(1));
        assert_eq!(c.write_timeout, Duration::from_millis(500));
    }
}
