//! Job runner configuration.

use std::path::PathBuf;
use std::time::Duration;

pub const ENV_LOG_DIR: &str = "BUILDVAULT_LOG_DIR";
pub const ENV_WORKERS: &str = "BUILDVAULT_JOB_WORKERS";
pub const ENV_QUEUE: &str = "BUILDVAULT_JOB_QUEUE";
pub const ENV_DELAY_MS: &str = "BUILDVAULT_JOB_DELAY_MS";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}={value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Job runner configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRunnerConfig {
    /// Directory report artifacts are written to
    pub log_dir: PathBuf,
    /// Pool threads
    pub workers: usize,
    /// Jobs allowed to wait for a free worker; at least one
    pub queue_capacity: usize,
    /// Pause before generation starts; the only interruptible point of a job
    pub start_delay: Duration,
    /// Pool name, used as the thread name prefix
    pub name: String,
}

impl Default for JobRunnerConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            workers: 4,
            queue_capacity: 64,
            start_delay: Duration::ZERO,
            name: "report-jobs".to_string(),
        }
    }
}

impl JobRunnerConfig {
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Defaults overridden by `BUILDVAULT_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(dir) = lookup(ENV_LOG_DIR).filter(|v| !v.trim().is_empty()) {
            config.log_dir = PathBuf::from(dir.trim());
        }
        if let Some(value) = lookup(ENV_WORKERS) {
            config.workers = parse_number(ENV_WORKERS, &value)?;
        }
        if let Some(value) = lookup(ENV_QUEUE) {
            config.queue_capacity = parse_number(ENV_QUEUE, &value)?;
        }
        if let Some(value) = lookup(ENV_DELAY_MS) {
            config.start_delay = Duration::from_millis(parse_number(ENV_DELAY_MS, &value)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the worker pool cannot honor.
    ///
    /// A zero-capacity queue only hands a job to a worker already blocked in
    /// `recv`, so idle workers would still report `Saturated`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid {
                var: ENV_WORKERS,
                value: self.workers.to_string(),
                reason: "at least one worker is required".to_string(),
            });
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                var: ENV_QUEUE,
                value: self.queue_capacity.to_string(),
                reason: "queue capacity must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_number<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = JobRunnerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, JobRunnerConfig::default());
        assert_eq!(config.log_dir, PathBuf::from("logs"));
    }

    #[test]
    fn overrides_are_applied() {
        let config = JobRunnerConfig::from_lookup(lookup(&[
            (ENV_LOG_DIR, "/tmp/reports"),
            (ENV_WORKERS, "2"),
            (ENV_QUEUE, " 8 "),
            (ENV_DELAY_MS, "250"),
        ]))
        .unwrap();
        assert_eq!(config.log_dir, PathBuf::from("/tmp/reports"));
        assert_eq!(config.workers, 2);
        assert_eq!(config.queue_capacity, 8);
        assert_eq!(config.start_delay, Duration::from_millis(250));
    }

    #[test]
    fn rejects_zero_workers() {
        let err = JobRunnerConfig::from_lookup(lookup(&[(ENV_WORKERS, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: ENV_WORKERS, .. }));
    }

    #[test]
    fn rejects_zero_queue_capacity() {
        let err = JobRunnerConfig::from_lookup(lookup(&[(ENV_QUEUE, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: ENV_QUEUE, .. }));

        let built = JobRunnerConfig::default().with_queue_capacity(0);
        assert!(matches!(
            built.validate(),
            Err(ConfigError::Invalid { var: ENV_QUEUE, .. })
        ));
        assert!(JobRunnerConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_numeric_values() {
        let err = JobRunnerConfig::from_lookup(lookup(&[(ENV_DELAY_MS, "soon")])).unwrap_err();
        assert!(err.to_string().contains(ENV_DELAY_MS));
    }

    #[test]
    fn builders_chain() {
        let config = JobRunnerConfig::default()
            .with_workers(1)
            .with_queue_capacity(2)
            .with_name("test-jobs");
        assert_eq!(config.workers, 1);
        assert_eq!(config.queue_capacity, 2);
        assert_eq!(config.name, "test-jobs");
    }
}
