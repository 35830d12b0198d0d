//! Target resolution
//!
//! [`AttachResolver`] turns a [`Target`] into an attached
//! [`ProcessHandle`]: an explicit pid is used as-is, a pid file is polled
//! under a bounded retry budget, and a command is spawned non-blocking.
//! After any of the three, a single delayed check hands the observation
//! off to the target's first child if one exists, for launchers whose
//! visible pid is not the real worker.

use crate::config::{RetryPolicy, DEFAULT_HANDOFF_DELAY};
use crate::error::{Error, Result};
use crate::process::ProcessHandle;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

/// The process to observe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// An already-known pid.
    Pid(usize),
    /// A file whose first line is the pid, written by an external launcher
    /// (`./prog & echo $! > watch.pid`).
    PidFile(PathBuf),
    /// A command to launch; its pid becomes the initial candidate.
    Command(Vec<String>),
}

/// Resolves a [`Target`] to a [`ProcessHandle`].
pub struct AttachResolver {
    retry: RetryPolicy,
    handoff_delay: Duration,
}

impl Default for AttachResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl AttachResolver {
    pub fn new() -> Self {
        Self {
            retry: RetryPolicy::default(),
            handoff_delay: DEFAULT_HANDOFF_DELAY,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_handoff_delay(mut self, delay: Duration) -> Self {
        self.handoff_delay = delay;
        self
    }

    /// Resolve the target, attach, and run the one-shot child hand-off.
    ///
    /// Errors here are fatal to the run: a pid file that never appears, a
    /// pid that does not exist, or a command that cannot be spawned.
    pub fn resolve(&self, target: Target) -> Result<ProcessHandle> {
        let (pid, child) = match target {
            Target::Pid(pid) => (pid, None),
            Target::PidFile(path) => (self.wait_for_pid_file(&path)?, None),
            Target::Command(cmd) => {
                let child = spawn(&cmd)?;
                log::info!("spawned '{}' with pid {}", cmd.join(" "), child.id());
                (child.id() as usize, Some(child))
            }
        };

        thread::sleep(self.handoff_delay);

        let mut handle = match child {
            Some(child) => ProcessHandle::from_child(child),
            None => ProcessHandle::attach(pid)?,
        };

        if let Some(&first_child) = handle.children().first() {
            log::info!(
                "process {} has child {}, observing the child instead",
                handle.pid(),
                first_child
            );
            handle = ProcessHandle::attach(first_child)?;
        }

        Ok(handle)
    }

    /// Poll for the pid file once per retry interval, up to the budget.
    fn wait_for_pid_file(&self, path: &Path) -> Result<usize> {
        for attempt in 1..=self.retry.max_attempts {
            match fs::read_to_string(path) {
                Ok(contents) => {
                    let pid = contents
                        .lines()
                        .next()
                        .and_then(|line| line.trim().parse::<usize>().ok())
                        .ok_or_else(|| Error::InvalidPidFile(path.to_path_buf()))?;
                    log::info!(
                        "acquired pid {} from {} after {} attempt(s)",
                        pid,
                        path.display(),
                        attempt
                    );
                    return Ok(pid);
                }
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    thread::sleep(self.retry.interval);
                }
                Err(err) => return Err(Error::Io(err)),
            }
        }

        Err(Error::AttachTimeout {
            path: path.to_path_buf(),
            attempts: self.retry.max_attempts,
        })
    }
}

/// Launch the command without waiting for it. Stdio stays inherited so the
/// launched program's output goes where ours does; stdin is detached.
fn spawn(cmd: &[String]) -> Result<std::process::Child> {
    if cmd.is_empty() {
        return Err(Error::InvalidConfiguration(
            "command cannot be empty".to_string(),
        ));
    }
    let child = Command::new(&cmd[0])
        .args(&cmd[1..])
        .stdin(Stdio::null())
        .spawn()?;
    Ok(child)
}
