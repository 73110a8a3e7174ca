use std::str::FromStr;
use std::time::Duration;

use genq_backend::connection::{
    ConnectionSettings, DEFAULT_CONNECT_TIMEOUT, DEFAULT_HEARTBEAT_PERIOD,
    DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_READ_WAIT,
};
use genq_core::error::ConfigError;
use genq_core::registry::{ModelRegistry, MODEL_CONFIG_ENV};

/// Default bound on concurrently running task workers.
pub const DEFAULT_MAX_IN_FLIGHT_TASKS: usize = 32;

/// Default period of the `genq-worker` cycle timer.
pub const DEFAULT_SCHEDULE_INTERVAL: Duration = Duration::from_secs(5);

/// Dispatch engine configuration loaded from environment variables.
///
/// The batch limit is not part of this: it is read at the start of every
/// cycle (see [`genq_core::limits::BatchLimit::from_env`]).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub registry: ModelRegistry,
    pub connection: ConnectionSettings,
    /// Upper bound on task workers running at once across all cycles.
    pub max_in_flight: usize,
    /// Re-dial dead backend connections with backoff.
    pub reconnect_enabled: bool,
    /// Timer period for the standalone worker binary.
    pub schedule_interval: Duration,
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                  | Default   |
    /// |--------------------------|-----------|
    /// | `MODEL_CONFIG`           | required  |
    /// | `HEARTBEAT_PERIOD_SECS`  | `10`      |
    /// | `READ_WAIT_SECS`         | `900`     |
    /// | `MAX_READ_BYTES`         | `1048576` |
    /// | `CONNECT_TIMEOUT_SECS`   | `10`      |
    /// | `MAX_IN_FLIGHT_TASKS`    | `32`      |
    /// | `RECONNECT_ENABLED`      | `false`   |
    /// | `SCHEDULE_INTERVAL_SECS` | `5`       |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which returns the raw value of
    /// a variable if set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let registry = ModelRegistry::from_json(&lookup(MODEL_CONFIG_ENV).unwrap_or_default())?;

        let connection = ConnectionSettings {
            heartbeat_period: Duration::from_secs(parse_or(
                &lookup,
                "HEARTBEAT_PERIOD_SECS",
                DEFAULT_HEARTBEAT_PERIOD.as_secs(),
            )?),
            read_wait: Duration::from_secs(parse_or(
                &lookup,
                "READ_WAIT_SECS",
                DEFAULT_READ_WAIT.as_secs(),
            )?),
            max_message_size: parse_or(&lookup, "MAX_READ_BYTES", DEFAULT_MAX_MESSAGE_SIZE)?,
            connect_timeout: Duration::from_secs(parse_or(
                &lookup,
                "CONNECT_TIMEOUT_SECS",
                DEFAULT_CONNECT_TIMEOUT.as_secs(),
            )?),
        };
        if connection.heartbeat_period.is_zero() {
            return Err(ConfigError::Invalid {
                name: "HEARTBEAT_PERIOD_SECS",
                reason: "must be greater than zero".into(),
            });
        }

        let max_in_flight = parse_or(&lookup, "MAX_IN_FLIGHT_TASKS", DEFAULT_MAX_IN_FLIGHT_TASKS)?;
        if max_in_flight == 0 {
            return Err(ConfigError::Invalid {
                name: "MAX_IN_FLIGHT_TASKS",
                reason: "must be greater than zero".into(),
            });
        }

        let schedule_interval = Duration::from_secs(parse_or(
            &lookup,
            "SCHEDULE_INTERVAL_SECS",
            DEFAULT_SCHEDULE_INTERVAL.as_secs(),
        )?);

        Ok(Self {
            registry,
            connection,
            max_in_flight,
            reconnect_enabled: parse_or(&lookup, "RECONNECT_ENABLED", false)?,
            schedule_interval,
        })
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name).as_deref().map(str::trim) {
        None | Some("") => Ok(default),
        Some(raw) => raw.parse().map_err(|e| ConfigError::Invalid {
            name,
            reason: format!("{raw:?}: {e}"),
        }),
    }
}
