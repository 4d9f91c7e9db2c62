//! Single-instance enforcement.
//!
//! Before binding, any other running copy of this program is killed and
//! the port is given a moment to free up. This is best effort: there is no
//! lock, and a process started between listing and binding is not seen.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SingletonError {
    #[error("process listing is not supported on this platform")]
    Unsupported,

    #[error("cannot determine own executable: {0}")]
    OwnIdentity(#[from] std::io::Error),

    #[error("failed to terminate process {pid}: {source}")]
    Terminate { pid: u32, source: nix::Error },
}

/// A running process as seen by the guard.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
    pub exe: Option<PathBuf>,
    pub cmd: Vec<String>,
}

/// Source of the process list and the means to kill entries in it.
pub trait ProcessTable {
    fn list(&self) -> Result<Vec<ProcessEntry>, SingletonError>;
    fn terminate(&self, pid: u32) -> Result<(), SingletonError>;
}

/// Which processes count as another instance of this service.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessIdentity {
    program: String,
}

impl ProcessIdentity {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Identity of the running executable.
    pub fn current() -> Result<Self, SingletonError> {
        let exe = std::env::current_exe()?;
        let name = exe.file_name().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "executable has no file name")
        })?;
        Ok(Self::new(name.to_string_lossy()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Match on process name, executable file name or argv[0] file name.
    pub fn matches(&self, entry: &ProcessEntry) -> bool {
        let program = OsStr::new(&self.program);
        entry.name == self.program
            || entry.exe.as_deref().and_then(Path::file_name) == Some(program)
            || entry
                .cmd
                .first()
                .and_then(|arg0| Path::new(arg0).file_name())
                == Some(program)
    }
}

pub struct SingletonGuard<T> {
    table: T,
    identity: ProcessIdentity,
    own_pid: u32,
    settle: Duration,
}

impl<T: ProcessTable> SingletonGuard<T> {
    pub fn new(table: T, identity: ProcessIdentity, own_pid: u32, settle: Duration) -> Self {
        Self {
            table,
            identity,
            own_pid,
            settle,
        }
    }

    /// Guard for the current process.
    pub fn for_current_process(table: T, identity: ProcessIdentity, settle: Duration) -> Self {
        Self::new(table, identity, std::process::id(), settle)
    }

    /// Pids of other matching instances, without touching them.
    pub fn targets(&self) -> Result<Vec<u32>, SingletonError> {
        Ok(self
            .table
            .list()?
            .into_iter()
            .filter(|p| p.pid != self.own_pid && self.identity.matches(p))
            .map(|p| p.pid)
            .collect())
    }

    /// Kill other instances. Returns the pids that were terminated.
    pub async fn enforce(&self) -> Result<Vec<u32>, SingletonError> {
        let stale = self.targets()?;

        if stale.is_empty() {
            tracing::debug!(program = self.identity.program(), "No other instance running");
            return Ok(stale);
        }

        for pid in &stale {
            tracing::warn!(pid, program = self.identity.program(), "Terminating stale instance");
            self.table.terminate(*pid)?;
        }

        tracing::info!(
            terminated = stale.len(),
            settle_secs = self.settle.as_secs(),
            "Waiting for the port to be released"
        );
        tokio::time::sleep(self.settle).await;
        Ok(stale)
    }
}

/// The host's process table.
///
/// Only thread group leaders are listed. On Linux every thread also shows
/// up as its own task, and a signal sent to a thread id reaches the whole
/// process, so threads of this process must never be candidates.
#[derive(Debug, Default)]
pub struct SystemProcessTable;

impl ProcessTable for SystemProcessTable {
    fn list(&self) -> Result<Vec<ProcessEntry>, SingletonError> {
        use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};

        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(SingletonError::Unsupported);
        }

        let mut system = System::new();
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::new()
                .with_exe(UpdateKind::OnlyIfNotSet)
                .with_cmd(UpdateKind::OnlyIfNotSet),
        );

        Ok(system
            .processes()
            .values()
            .filter(|p| p.thread_kind().is_none())
            .map(|p| ProcessEntry {
                pid: p.pid().as_u32(),
                name: OsStr::new(p.name()).to_string_lossy().into_owned(),
                exe: p.exe().map(Path::to_path_buf),
                cmd: p
                    .cmd()
                    .iter()
                    .map(|arg| OsStr::new(arg).to_string_lossy().into_owned())
                    .collect(),
            })
            .collect())
    }

    fn terminate(&self, pid: u32) -> Result<(), SingletonError> {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        match kill(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            Ok(()) => Ok(()),
            // Exited between listing and kill.
            Err(Errno::ESRCH) => Ok(()),
            Err(source) => Err(SingletonError::Terminate { pid, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    struct MockTable {
        entries: Vec<ProcessEntry>,
        killed: Mutex<Vec<u32>>,
        fail_kill: bool,
    }

    impl MockTable {
        fn new(entries: Vec<ProcessEntry>) -> Self {
            Self {
                entries,
                killed: Mutex::new(Vec::new()),
                fail_kill: false,
            }
        }
    }

    impl ProcessTable for &MockTable {
        fn list(&self) -> Result<Vec<ProcessEntry>, SingletonError> {
            Ok(self.entries.clone())
        }

        fn terminate(&self, pid: u32) -> Result<(), SingletonError> {
            if self.fail_kill {
                return Err(SingletonError::Terminate {
                    pid,
                    source: nix::Error::EPERM,
                });
            }
            self.killed.lock().unwrap().push(pid);
            Ok(())
        }
    }

    // Linux truncates the process name to 15 bytes.
    fn entry(pid: u32, exe: &str) -> ProcessEntry {
        let file_name = Path::new(exe).file_name().unwrap().to_string_lossy();
        ProcessEntry {
            pid,
            name: file_name.chars().take(15).collect(),
            exe: Some(PathBuf::from(exe)),
            cmd: vec![exe.to_string()],
        }
    }

    #[test]
    fn identity_matches_exe_and_argv0() {
        let id = ProcessIdentity::new("controller-gateway");
        assert!(id.matches(&entry(1, "/usr/local/bin/controller-gateway")));

        let wrapped = ProcessEntry {
            pid: 2,
            name: "controller-gate".into(),
            exe: None,
            cmd: vec!["./controller-gateway".into(), "--config".into(), "x.toml".into()],
        };
        assert!(id.matches(&wrapped));

        let mentions = ProcessEntry {
            pid: 3,
            name: "tail".into(),
            exe: Some("/usr/bin/tail".into()),
            cmd: vec!["tail".into(), "/var/log/controller-gateway".into()],
        };
        assert!(!id.matches(&mentions));
    }

    #[tokio::test(start_paused = true)]
    async fn only_other_matching_processes_are_terminated() {
        let table = MockTable::new(vec![
            entry(100, "/usr/local/bin/controller-gateway"),
            entry(200, "/usr/local/bin/controller-gateway"),
            entry(300, "/usr/sbin/nginx"),
        ]);
        let guard = SingletonGuard::new(
            &table,
            ProcessIdentity::new("controller-gateway"),
            100,
            Duration::from_secs(3),
        );

        let start = Instant::now();
        let terminated = guard.enforce().await.unwrap();

        assert_eq!(terminated, vec![200]);
        assert_eq!(*table.killed.lock().unwrap(), vec![200]);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn no_pause_when_alone() {
        let table = MockTable::new(vec![entry(100, "/usr/local/bin/controller-gateway")]);
        let guard = SingletonGuard::new(
            &table,
            ProcessIdentity::new("controller-gateway"),
            100,
            Duration::from_secs(3),
        );

        let start = Instant::now();
        assert!(guard.enforce().await.unwrap().is_empty());
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn kill_failure_propagates() {
        let mut table = MockTable::new(vec![entry(200, "/opt/controller-gateway")]);
        table.fail_kill = true;
        let guard = SingletonGuard::new(
            &table,
            ProcessIdentity::new("controller-gateway"),
            100,
            Duration::from_secs(3),
        );

        let err = guard.enforce().await.unwrap_err();
        assert!(matches!(err, SingletonError::Terminate { pid: 200, .. }));
    }

    #[test]
    fn system_table_skips_threads_of_this_process() {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return;
        }
        let (release, parked) = std::sync::mpsc::channel::<()>();
        let parked = Arc::new(Mutex::new(parked));
        let workers: Vec<_> = (0..3)
            .map(|_| {
                let parked = parked.clone();
                std::thread::spawn(move || {
                    let _ = parked.lock().unwrap().recv();
                })
            })
            .collect();

        let guard = SingletonGuard::for_current_process(
            SystemProcessTable,
            ProcessIdentity::current().unwrap(),
            Duration::ZERO,
        );
        let targets = guard.targets().unwrap();

        let own_tasks: Vec<u32> = std::fs::read_dir("/proc/self/task")
            .map(|dir| {
                dir.filter_map(|e| e.ok()?.file_name().to_str()?.parse().ok())
                    .collect()
            })
            .unwrap_or_default();
        drop(release);
        for worker in workers {
            worker.join().unwrap();
        }

        assert!(
            targets.iter().all(|pid| !own_tasks.contains(pid)),
            "own threads {:?} targeted in {:?}",
            own_tasks,
            targets
        );
    }

    #[test]
    fn terminating_a_reaped_process_is_not_an_error() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        assert!(SystemProcessTable.terminate(pid).is_ok());
    }

    #[test]
    fn system_table_lists_this_process() {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return;
        }
        let own = std::process::id();
        let entries = SystemProcessTable.list().unwrap();
        assert!(entries.iter().any(|p| p.pid == own));
    }
}
