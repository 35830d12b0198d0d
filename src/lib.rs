//! pagurus: attach to a running process and stream its resource usage.
//!
//! The target is either an explicit pid, a pid file written by an external
//! launcher, or a command to spawn. Samples are appended to a delimited
//! (csv) or structured (jsonl) file at a fixed interval until the process
//! exits, optionally enriched with static fields resolved from environment
//! variables.

pub mod attach;
pub mod config;
pub mod error;
pub mod metrics;
pub mod process;
pub mod runner;
pub mod sink;

pub use attach::{AttachResolver, Target};
pub use config::{RetryPolicy, RunnerConfig};
pub use error::{Error, Result};
pub use metrics::{FieldValue, Sample};
pub use process::ProcessHandle;
pub use runner::Runner;
pub use sink::{Sink, SinkConfig, SinkFormat};
