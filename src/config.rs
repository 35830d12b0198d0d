//! Runner configuration
//!
//! Bounded-retry and polling parameters are injected here rather than
//! hard-coded in the resolver, so tests can shrink the budgets instead of
//! sleeping through them.

use crate::attach::Target;
use crate::error::{Error, Result};
use crate::sink::SinkFormat;

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

/// Default pid-file wait budget: one attempt per second for ~5 minutes.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 300;
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Delay before the one-shot child hand-off check.
pub const DEFAULT_HANDOFF_DELAY: Duration = Duration::from_secs(2);

/// Default interval between samples.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Bounded retry for pid-file resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }
}

/// Everything a [`crate::runner::Runner`] needs for one run.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub target: Target,
    pub outfile: PathBuf,
    pub format: SinkFormat,
    pub interval: Duration,
    pub write_header: bool,
    /// Subset of [`crate::metrics::Sample::FIELDS`] to emit; `None` emits
    /// every metric.
    pub fields: Option<Vec<String>>,
    pub static_fields: Vec<String>,
    pub retry: RetryPolicy,
    pub handoff_delay: Duration,
    /// Cleared (set to `false`) to stop the polling loop early.
    pub stop_flag: Option<Arc<AtomicBool>>,
}

impl RunnerConfig {
    pub fn new(target: Target, outfile: impl Into<PathBuf>) -> Self {
        Self {
            target,
            outfile: outfile.into(),
            format: SinkFormat::Delimited,
            interval: DEFAULT_POLL_INTERVAL,
            write_header: true,
            fields: None,
            static_fields: Vec::new(),
            retry: RetryPolicy::default(),
            handoff_delay: DEFAULT_HANDOFF_DELAY,
            stop_flag: None,
        }
    }

    pub fn with_format(mut self, format: SinkFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_write_header(mut self, write_header: bool) -> Self {
        self.write_header = write_header;
        self
    }

    /// Restrict output to a subset of the metric columns.
    pub fn with_fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_static_fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.static_fields = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_handoff_delay(mut self, delay: Duration) -> Self {
        self.handoff_delay = delay;
        self
    }

    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop_flag = Some(flag);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(Error::InvalidConfiguration(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::InvalidConfiguration(
                "retry budget must allow at least one attempt".to_string(),
            ));
        }
        if let Some(fields) = &self.fields {
            if fields.is_empty() {
                return Err(Error::InvalidConfiguration(
                    "field selection cannot be empty".to_string(),
                ));
            }
            for name in fields {
                if !crate::metrics::Sample::FIELDS.contains(&name.as_str()) {
                    return Err(Error::InvalidConfiguration(format!(
                        "unknown metric field '{}'",
                        name
                    )));
                }
            }
        }
        if let Target::Command(cmd) = &self.target {
            if cmd.is_empty() {
                return Err(Error::InvalidConfiguration(
                    "command cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}
