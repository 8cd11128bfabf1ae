//! Tunable ports, capacities and timing constants.
//!
//! The source fixes these as literal constants (`MAX_ROVERS=5`,
//! `command_port=5005`, ...). Here they are fields on a [`Config`] value
//! owned by the station and passed by reference into each component, so the
//! constants remain the defaults but are no longer hidden singletons.

use std::time::Duration;

/// Station-wide configuration. `Config::default()` reproduces the literal
/// constants fixed by the wire/behavior contract; every field may be
/// overridden independently by callers that embed this crate.
#[derive(Debug, Clone)]
pub struct Config {
    pub command_port: u16,
    pub telemetry_port: u16,
    pub api_port: u16,

    pub max_rovers: usize,
    pub max_missions: usize,
    pub max_telemetry: usize,

    pub heartbeat_interval: Duration,
    pub heartbeat_timeout: Duration,
    pub heartbeat_max_retries: u8,

    pub ack_timeout: Duration,
    pub ack_retries: u8,

    pub handshake_timeout: Duration,
    pub handshake_retries: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            command_port: 5005,
            telemetry_port: 5006,
            api_port: 8080,

            max_rovers: 5,
            max_missions: 100,
            max_telemetry: 10,

            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(5),
            heartbeat_max_retries: 2,

            ack_timeout: Duration::from_secs(1),
            ack_retries: 5,

            handshake_timeout: Duration::from_secs(2),
            handshake_retries: 5,
        }
    }
}

impl Config {
    /// Start from the defaults and apply any `MOTHERSHIP_*` environment
    /// overrides present in the process environment. Unparseable values are
    /// ignored in favor of the default (fatal misconfiguration is limited
    /// to "cannot bind the requested port", not "could not parse an env
    /// var").
    #[must_use]
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(v) = env_u16("MOTHERSHIP_COMMAND_PORT") {
            cfg.command_port = v;
        }
        if let Some(v) = env_u16("MOTHERSHIP_TELEMETRY_PORT") {
            cfg.telemetry_port = v;
        }
        if let Some(v) = env_u16("MOTHERSHIP_API_PORT") {
            cfg.api_port = v;
        }
        if let Some(v) = env_usize("MOTHERSHIP_MAX_ROVERS") {
            cfg.max_rovers = v;
        }
        if let Some(v) = env_usize("MOTHERSHIP_MAX_MISSIONS") {
            cfg.max_missions = v;
        }
        if let Some(v) = env_usize("MOTHERSHIP_MAX_TELEMETRY") {
            cfg.max_telemetry = v;
        }
        cfg
    }
}

fn env_u16(key: &str) -> Option<u16> {
    std::env::var(key).ok()?.parse().ok()
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_wire_contract() {
        let cfg = Config::default();
        assert_eq!(cfg.command_port, 5005);
        assert_eq!(cfg.telemetry_port, 5006);
        assert_eq!(cfg.api_port, 8080);
        assert_eq!(cfg.max_rovers, 5);
        assert_eq!(cfg.max_missions, 100);
        assert_eq!(cfg.max_telemetry, 10);
        assert_eq!(cfg.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(cfg.heartbeat_timeout, Duration::from_secs(5));
        assert_eq!(cfg.heartbeat_max_retries, 2);
        assert_eq!(cfg.ack_timeout, Duration::from_secs(1));
        assert_eq!(cfg.ack_retries, 5);
    }
}
