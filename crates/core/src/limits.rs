//! Batch-limit parsing for dispatch cycles.
//!
//! The limit is read fresh at the start of every cycle so operators can
//! tune it without a restart.

use crate::error::ConfigError;

/// Environment variable holding the per-cycle batch limit.
pub const SCHEDULE_TASK_LIMIT_ENV: &str = "SCHEDULE_TASK_LIMIT";

/// A validated, strictly positive number of tasks to select per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimit(u32);

impl BatchLimit {
    /// Validate a numeric limit.
    pub fn new(limit: i64) -> Result<Self, ConfigError> {
        if limit <= 0 {
            return Err(ConfigError::Invalid {
                name: SCHEDULE_TASK_LIMIT_ENV,
                reason: format!("must be a positive integer, got {limit}"),
            });
        }
        u32::try_from(limit)
            .map(Self)
            .map_err(|_| ConfigError::Invalid {
                name: SCHEDULE_TASK_LIMIT_ENV,
                reason: format!("{limit} is too large"),
            })
    }

    /// Parse a raw setting. Absent or blank values are `Missing`.
    pub fn parse(raw: Option<&str>) -> Result<Self, ConfigError> {
        let raw = raw
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing(SCHEDULE_TASK_LIMIT_ENV))?;

        let limit: i64 = raw.parse().map_err(|e| ConfigError::Invalid {
            name: SCHEDULE_TASK_LIMIT_ENV,
            reason: format!("{raw:?} is not a number: {e}"),
        })?;

        Self::new(limit)
    }

    /// Read and validate `SCHEDULE_TASK_LIMIT` from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw = std::env::var(SCHEDULE_TASK_LIMIT_ENV).ok();
        Self::parse(raw.as_deref())
    }

    pub fn get(self) -> u32 {
        self.0
    }
}
