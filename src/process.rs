//! Process introspection
//!
//! [`ProcessHandle`] is a read-only accessor over one observed process:
//! liveness, immediate children, and metric snapshots. CPU percent and
//! memory figures come from sysinfo; on Linux, CPU times, thread and fd
//! counts, shared memory, and I/O counters come from procfs.

use crate::error::{Error, Result};
use crate::metrics::Sample;

use chrono::Local;
use std::process::Child;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Handle on a single observed process.
///
/// Holds the `Child` when the process was spawned by us, so liveness can
/// use `try_wait`; a zombie child would otherwise still show up under
/// /proc and read as alive forever.
pub struct ProcessHandle {
    pid: usize,
    child: Option<Child>,
    sys: System,
}

impl ProcessHandle {
    /// Attach to an existing process. Fails immediately if no process with
    /// this pid exists; attach is never retried.
    pub fn attach(pid: usize) -> Result<Self> {
        if !process_exists(pid) {
            return Err(Error::ProcessNotFound(pid));
        }
        Ok(Self {
            pid,
            child: None,
            sys: System::new(),
        })
    }

    /// Adopt a process we spawned ourselves.
    pub fn from_child(child: Child) -> Self {
        let pid = child.id() as usize;
        Self {
            pid,
            child: Some(child),
            sys: System::new(),
        }
    }

    pub fn pid(&self) -> usize {
        self.pid
    }

    /// Check whether the observed process is still running.
    pub fn is_running(&mut self) -> bool {
        if let Some(child) = &mut self.child {
            match child.try_wait() {
                Ok(Some(_)) => false, // exited and reaped
                Ok(None) => true,
                Err(_) => false,
            }
        } else {
            process_exists(self.pid)
        }
    }

    /// Pids of the immediate children of the observed process, in
    /// ascending order.
    pub fn children(&mut self) -> Vec<usize> {
        self.sys.refresh_processes(ProcessesToUpdate::All, true);
        let parent = Pid::from(self.pid);
        let mut pids: Vec<usize> = self
            .sys
            .processes()
            .iter()
            .filter(|(_, proc)| proc.parent() == Some(parent))
            .map(|(pid, _)| pid.as_u32() as usize)
            .collect();
        pids.sort_unstable();
        pids
    }

    /// Take one snapshot of every metric.
    ///
    /// Fails with [`Error::Extraction`] when the process is gone or a
    /// required field cannot be read; optional fields degrade to
    /// unavailable instead of failing the snapshot.
    pub fn snapshot(&mut self) -> Result<Sample> {
        self.sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[Pid::from(self.pid)]),
            true,
            ProcessRefreshKind::everything(),
        );
        self.sys.refresh_memory();

        let proc = self
            .sys
            .process(Pid::from(self.pid))
            .ok_or_else(|| Error::Extraction(format!("process {} disappeared", self.pid)))?;

        let timestamp = Local::now();
        let cpu_percent = proc.cpu_usage() as f64;
        let mem_rss = proc.memory();
        let mem_vms = proc.virtual_memory();
        let total_memory = self.sys.total_memory();
        let mem_percent = if total_memory > 0 {
            mem_rss as f64 / total_memory as f64 * 100.0
        } else {
            0.0
        };

        let procfs = ProcfsStats::read(self.pid)?;

        Ok(Sample {
            timestamp,
            num_threads: procfs.num_threads,
            cpu_percent,
            cpu_user_secs: procfs.cpu_user_secs,
            cpu_system_secs: procfs.cpu_system_secs,
            mem_rss,
            mem_vms,
            mem_shared: procfs.mem_shared,
            mem_percent,
            num_fds: procfs.num_fds,
            read_count: procfs.read_count,
            write_count: procfs.write_count,
            read_bytes: procfs.read_bytes,
            write_bytes: procfs.write_bytes,
        })
    }
}

fn process_exists(pid: usize) -> bool {
    #[cfg(target_os = "linux")]
    {
        std::path::Path::new(&format!("/proc/{}", pid)).exists()
    }

    #[cfg(not(target_os = "linux"))]
    {
        let mut system = System::new();
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[Pid::from(pid)]),
            true,
            ProcessRefreshKind::nothing(),
        );
        system.process(Pid::from(pid)).is_some()
    }
}

/// The /proc-derived slice of a sample.
struct ProcfsStats {
    num_threads: u64,
    cpu_user_secs: Option<f64>,
    cpu_system_secs: Option<f64>,
    mem_shared: Option<u64>,
    num_fds: Option<u64>,
    read_count: Option<u64>,
    write_count: Option<u64>,
    read_bytes: Option<u64>,
    write_bytes: Option<u64>,
}

#[cfg(target_os = "linux")]
impl ProcfsStats {
    fn read(pid: usize) -> Result<Self> {
        let proc = procfs::process::Process::new(pid as i32)
            .map_err(|e| Error::Extraction(format!("pid {}: {}", pid, e)))?;
        let stat = proc
            .stat()
            .map_err(|e| Error::Extraction(format!("pid {} stat: {}", pid, e)))?;
        let num_fds = proc
            .fd_count()
            .map_err(|e| Error::Extraction(format!("pid {} fds: {}", pid, e)))?;

        let ticks = procfs::ticks_per_second() as f64;
        let cpu_user_secs = stat.utime as f64 / ticks;
        let cpu_system_secs = stat.stime as f64 / ticks;

        // shared memory and io counters are permission- and
        // platform-dependent; report them as unavailable on failure
        let mem_shared = proc
            .statm()
            .ok()
            .map(|statm| statm.shared * procfs::page_size());
        let io = proc.io().ok();

        Ok(Self {
            num_threads: stat.num_threads.max(0) as u64,
            cpu_user_secs: Some(cpu_user_secs),
            cpu_system_secs: Some(cpu_system_secs),
            mem_shared,
            num_fds: Some(num_fds as u64),
            read_count: io.as_ref().map(|io| io.syscr),
            write_count: io.as_ref().map(|io| io.syscw),
            read_bytes: io.as_ref().map(|io| io.rchar),
            write_bytes: io.as_ref().map(|io| io.wchar),
        })
    }
}

#[cfg(not(target_os = "linux"))]
impl ProcfsStats {
    fn read(_pid: usize) -> Result<Self> {
        // No /proc; report the sysinfo-backed subset only
        Ok(Self {
            num_threads: 1,
            cpu_user_secs: None,
            cpu_system_secs: None,
            mem_shared: None,
            num_fds: None,
            read_count: None,
            write_count: None,
            read_bytes: None,
            write_bytes: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use std::thread;
    use std::time::Duration;

    fn spawn_sleep(secs: &str) -> Child {
        Command::new("sleep")
            .arg(secs)
            .spawn()
            .expect("failed to spawn sleep")
    }

    #[test]
    fn test_attach_missing_pid_fails() {
        // pid_max on Linux is well below this
        let result = ProcessHandle::attach(99_999_999);
        assert!(matches!(result, Err(Error::ProcessNotFound(_))));
    }

    #[test]
    fn test_attach_existing_process() {
        let mut child = spawn_sleep("2");
        let pid = child.id() as usize;

        let handle = ProcessHandle::attach(pid);
        assert!(handle.is_ok(), "should attach to a running process");
        assert_eq!(handle.unwrap().pid(), pid);

        child.kill().ok();
        child.wait().ok();
    }

    #[test]
    fn test_is_running_transitions() {
        let child = spawn_sleep("1");
        let mut handle = ProcessHandle::from_child(child);

        assert!(handle.is_running(), "sleep should be running initially");

        thread::sleep(Duration::from_secs(2));
        assert!(!handle.is_running(), "sleep should have terminated");
    }

    #[test]
    fn test_snapshot_sanity() {
        let child = spawn_sleep("3");
        let mut handle = ProcessHandle::from_child(child);

        thread::sleep(Duration::from_millis(200));
        let sample = handle.snapshot().expect("snapshot of a live process");

        assert!(sample.num_threads >= 1);
        assert!(sample.mem_rss > 0, "resident memory should be nonzero");
        assert!(sample.mem_percent >= 0.0);
        #[cfg(target_os = "linux")]
        {
            assert!(sample.num_fds.is_some());
            assert!(sample.cpu_user_secs.is_some());
        }

        if let Some(child) = &mut handle.child {
            child.kill().ok();
            child.wait().ok();
        }
    }

    #[test]
    fn test_snapshot_of_dead_process_fails() {
        let mut child = spawn_sleep("30");
        let pid = child.id() as usize;
        let mut handle = ProcessHandle::attach(pid).unwrap();

        child.kill().ok();
        child.wait().ok();

        let result = handle.snapshot();
        assert!(matches!(result, Err(Error::Extraction(_))));
    }
}
