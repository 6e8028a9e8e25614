//! Client configuration.
//!
//! Deserializable with serde so applications can embed it in their own
//! config files; every field has a default. `from_env` overlays the
//! `COURIER_*` environment variables on top of the defaults.

use serde::Deserialize;

use crate::error::BuildError;

pub const DEFAULT_WORKER_THREADS: usize = 4;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Response bodies larger than this fail with `RequestError`.
pub const DEFAULT_MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Threads in a pool the client builds for itself.
    pub worker_threads: usize,
    /// Worker threads are named `{thread_name}-{index}`.
    pub thread_name: String,
    /// Whole-exchange timeout. `None` waits indefinitely.
    pub timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
    /// Largest response body that is read into memory. `None` reads any size.
    pub max_body_bytes: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            worker_threads: DEFAULT_WORKER_THREADS,
            thread_name: "courier-worker".to_string(),
            timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
            user_agent: None,
            max_body_bytes: Some(DEFAULT_MAX_BODY_BYTES),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, BuildError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, BuildError> {
        let mut config = Self::default();
        if let Some(v) = lookup("COURIER_WORKER_THREADS") {
            config.worker_threads = v.parse().map_err(|_| {
                BuildError::InvalidConfig(format!("COURIER_WORKER_THREADS: not a number: {v}"))
            })?;
        }
        if let Some(v) = lookup("COURIER_TIMEOUT_SECS") {
            // 0 disables the timeout.
            let secs: u64 = v.parse().map_err(|_| {
                BuildError::InvalidConfig(format!("COURIER_TIMEOUT_SECS: not a number: {v}"))
            })?;
            config.timeout_secs = (secs > 0).then_some(secs);
        }
        if let Some(v) = lookup("COURIER_MAX_BODY_BYTES") {
            // 0 removes the limit.
            let bytes: u64 = v.parse().map_err(|_| {
                BuildError::InvalidConfig(format!("COURIER_MAX_BODY_BYTES: not a number: {v}"))
            })?;
            config.max_body_bytes = (bytes > 0).then_some(bytes);
        }
        if let Some(v) = lookup("COURIER_USER_AGENT") {
            config.user_agent = Some(v);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BuildError> {
        if self.worker_threads == 0 {
            return Err(BuildError::InvalidConfig(
                "worker_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
