//! Starting and stopping the installed database services.
//!
//! Neo4j ships its own `start`/`stop` subcommands and tracks its own PID.
//! InfluxDB does not, so it is launched detached and its PID is written to
//! `<config home>/influxd.pid`; `stop` signals that PID and removes the file.
//! Start only waits for the launch itself, never for the service to be ready.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};

use crate::component::Component;
use crate::context::RuntimeContext;
use crate::error::{PgdbError, PgdbResult};
use crate::fetch::HookOutcome;

/// Lifecycle state of a supervised service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// A service launched by this invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceHandle {
    pub component: Component,
    pub executable: PathBuf,
    pub config_path: PathBuf,
    /// Only set for services tracked through the PID file
    pub pid: Option<u32>,
    pub state: ServiceState,
}

/// What `stop` found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// The service was asked to stop
    Stopped,
    /// Nothing was running (no PID file, or the process was already gone)
    AlreadyStopped,
    /// The executable is not installed, so there is nothing to stop
    NotInstalled,
    /// The stop request failed; reported but not fatal
    Failed(String),
}

/// Starts and stops the services installed under one data directory
pub struct Supervisor<'a> {
    ctx: &'a RuntimeContext,
    data_dir: PathBuf,
}

impl<'a> Supervisor<'a> {
    pub fn new(ctx: &'a RuntimeContext, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            ctx,
            data_dir: data_dir.into(),
        }
    }

    /// Rendered config file location for a component
    pub fn config_path(&self, component: Component) -> PathBuf {
        let dir = self.ctx.component_dir(&self.data_dir, component);
        match component {
            Component::Neo4j => dir.join("conf").join("neo4j.conf"),
            Component::InfluxDb => dir.join("influxdb.conf"),
        }
    }

    fn installed_executable(&self, component: Component) -> PgdbResult<PathBuf> {
        let exe = self.ctx.executable(&self.data_dir, component);
        if exe.is_file() {
            Ok(exe)
        } else {
            Err(PgdbError::ExecutableNotFound {
                component,
                path: exe,
            })
        }
    }

    /// Start Neo4j through `neo4j start`, clearing stale runtime state first
    pub fn start_neo4j(&self) -> PgdbResult<ServiceHandle> {
        let runtime_dir = self.ctx.neo4j_runtime_dir();
        match fs::remove_dir_all(&runtime_dir) {
            Ok(()) => debug!(path = %runtime_dir.display(), "removed stale neo4j runtime state"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let exe = self.installed_executable(Component::Neo4j)?;
        let mut handle = ServiceHandle {
            component: Component::Neo4j,
            config_path: self.config_path(Component::Neo4j),
            executable: exe.clone(),
            pid: None,
            state: ServiceState::Starting,
        };

        let status = Command::new(&exe)
            .arg("start")
            .status()
            .map_err(|source| PgdbError::ProcessLaunch {
                component: Component::Neo4j,
                source,
            })?;
        if !status.success() {
            warn!(%status, "neo4j start reported failure");
        }

        handle.state = ServiceState::Running;
        info!(exe = %exe.display(), "neo4j started");
        Ok(handle)
    }

    /// Launch InfluxDB detached and record its PID
    pub fn start_influxdb(&self) -> PgdbResult<ServiceHandle> {
        let exe = self.installed_executable(Component::InfluxDb)?;
        let config_path = self.config_path(Component::InfluxDb);
        let mut handle = ServiceHandle {
            component: Component::InfluxDb,
            executable: exe.clone(),
            config_path: config_path.clone(),
            pid: None,
            state: ServiceState::Starting,
        };

        // The PID file location must exist before anything is launched
        self.ctx.ensure_dirs()?;
        let config_arg = config_path.as_os_str().to_os_string();
        let pid = spawn_detached(&exe, &[OsStr::new("-config"), config_arg.as_os_str()]).map_err(
            |source| PgdbError::ProcessLaunch {
                component: Component::InfluxDb,
                source,
            },
        )?;
        if let Err(err) = write_pid(&self.ctx.pid_file, pid) {
            warn!(pid, error = %err, "could not record influxd pid, stopping it");
            if let Err(e) = interrupt(pid) {
                warn!(pid, error = %e, "could not signal untracked influxd");
            }
            return Err(err);
        }

        handle.pid = Some(pid);
        handle.state = ServiceState::Running;
        info!(pid, exe = %exe.display(), "influxd started");
        Ok(handle)
    }

    /// Stop Neo4j through `neo4j stop`
    pub fn stop_neo4j(&self) -> StopOutcome {
        let exe = match self.installed_executable(Component::Neo4j) {
            Ok(exe) => exe,
            Err(_) => {
                debug!("neo4j not installed, nothing to stop");
                return StopOutcome::NotInstalled;
            }
        };
        debug!(state = ?ServiceState::Stopping, "stopping neo4j");
        match Command::new(&exe).arg("stop").status() {
            Ok(status) if status.success() => StopOutcome::Stopped,
            Ok(status) => {
                warn!(%status, "neo4j stop reported failure");
                StopOutcome::Failed(format!("neo4j stop exited with {status}"))
            }
            Err(e) => {
                warn!(error = %e, "could not run neo4j stop");
                StopOutcome::Failed(e.to_string())
            }
        }
    }

    /// Interrupt the PID recorded in the PID file and remove the file
    pub fn stop_influxdb(&self) -> StopOutcome {
        let pid_file = &self.ctx.pid_file;
        let pid = match read_pid(pid_file) {
            Ok(Some(pid)) => pid,
            Ok(None) => {
                debug!(path = %pid_file.display(), "no influxd pid file");
                return StopOutcome::AlreadyStopped;
            }
            Err(e) => {
                warn!(path = %pid_file.display(), error = %e, "discarding unreadable pid file");
                remove_pid_file(pid_file);
                return StopOutcome::AlreadyStopped;
            }
        };

        debug!(pid, state = ?ServiceState::Stopping, "stopping influxd");
        let outcome = match interrupt(pid) {
            Ok(true) => StopOutcome::Stopped,
            Ok(false) => {
                debug!(pid, "influxd already gone");
                StopOutcome::AlreadyStopped
            }
            Err(e) => {
                warn!(pid, error = %e, "could not signal influxd");
                StopOutcome::Failed(e.to_string())
            }
        };
        remove_pid_file(pid_file);
        outcome
    }

    /// Start every service, Neo4j first
    pub fn start_all(&self) -> PgdbResult<Vec<ServiceHandle>> {
        Ok(vec![self.start_neo4j()?, self.start_influxdb()?])
    }

    /// Stop every service, Neo4j first
    pub fn stop_all(&self) -> Vec<(Component, StopOutcome)> {
        vec![
            (Component::Neo4j, self.stop_neo4j()),
            (Component::InfluxDb, self.stop_influxdb()),
        ]
    }

    /// Remove the native OS service registration where the platform has one
    pub fn unregister_service(&self) -> HookOutcome {
        if !self.ctx.platform.requires_service_registration(Component::Neo4j) {
            return HookOutcome::Skipped;
        }
        let exe = self.ctx.executable(&self.data_dir, Component::Neo4j);
        match run_elevated(&exe, &["windows-service", "uninstall"]) {
            Ok(()) => HookOutcome::Completed,
            Err(e) => HookOutcome::Warning(format!(
                "Could not remove the Neo4j service registration: {e}"
            )),
        }
    }
}

/// Launch `exe` with all standard streams detached in its own process group
pub fn spawn_detached(exe: &Path, args: &[&OsStr]) -> io::Result<u32> {
    let mut cmd = Command::new(exe);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const DETACHED_PROCESS: u32 = 0x0000_0008;
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
        cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
    }

    let child = cmd.spawn()?;
    Ok(child.id())
}

/// Send an interrupt to `pid`; `Ok(false)` means no such process
#[cfg(unix)]
pub fn interrupt(pid: u32) -> io::Result<bool> {
    // 0 and 1 would address our own process group or init
    let pid = match libc::pid_t::try_from(pid) {
        Ok(pid) if pid > 1 => pid,
        _ => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("refusing to signal pid {pid}"),
            ))
        }
    };
    // SAFETY: kill(2) has no memory-safety preconditions.
    if unsafe { libc::kill(pid, libc::SIGINT) } == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(false)
    } else {
        Err(err)
    }
}

/// Send an interrupt to `pid`; `Ok(false)` means no such process
#[cfg(windows)]
pub fn interrupt(pid: u32) -> io::Result<bool> {
    const TASKKILL_NOT_FOUND: i32 = 128;
    let output = Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/F"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .output()?;
    match output.status.code() {
        Some(0) => Ok(true),
        Some(TASKKILL_NOT_FOUND) => Ok(false),
        _ => Err(io::Error::other(format!(
            "taskkill exited with {}",
            output.status
        ))),
    }
}

/// Run `exe` with administrator rights through a UAC prompt
pub fn run_elevated(exe: &Path, args: &[&str]) -> io::Result<()> {
    let quote = |s: &str| s.replace('\'', "''");
    let script = format!(
        "Start-Process -FilePath '{}' -ArgumentList '{}' -Verb RunAs -Wait",
        quote(&exe.display().to_string()),
        quote(&args.join(" "))
    );
    let status = Command::new("powershell")
        .args(["-NoProfile", "-NonInteractive", "-Command", &script])
        .status()?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("elevated command exited with {status}")))
    }
}

/// Record a PID, replacing any previous file
pub fn write_pid(path: &Path, pid: u32) -> PgdbResult<()> {
    fs::write(path, pid.to_string()).map_err(|source| PgdbError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a recorded PID; `Ok(None)` when no PID file exists
pub fn read_pid(path: &Path) -> io::Result<Option<u32>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    contents
        .trim()
        .parse::<u32>()
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn remove_pid_file(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "could not remove pid file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PlatformProfile;
    use tempfile::tempdir;

    fn ctx(root: &Path) -> RuntimeContext {
        RuntimeContext::with_home(root.join("home"), root.join("user"), PlatformProfile::current())
    }

    #[test]
    fn test_pid_roundtrip_and_missing_file() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("influxd.pid");
        assert_eq!(read_pid(&path).unwrap(), None);

        write_pid(&path, 4242).unwrap();
        assert_eq!(read_pid(&path).unwrap(), Some(4242));
    }

    #[test]
    fn test_stop_twice_without_anything_running() {
        let tmp = tempdir().unwrap();
        let ctx = ctx(tmp.path());
        let supervisor = Supervisor::new(&ctx, tmp.path().join("data"));

        for _ in 0..2 {
            let outcomes = supervisor.stop_all();
            assert_eq!(
                outcomes,
                vec![
                    (Component::Neo4j, StopOutcome::NotInstalled),
                    (Component::InfluxDb, StopOutcome::AlreadyStopped),
                ]
            );
        }
    }

    #[test]
    fn test_garbage_pid_file_is_discarded() {
        let tmp = tempdir().unwrap();
        let ctx = ctx(tmp.path());
        fs::create_dir_all(&ctx.config_home).unwrap();
        fs::write(&ctx.pid_file, "not-a-pid").unwrap();
        let supervisor = Supervisor::new(&ctx, tmp.path().join("data"));

        assert_eq!(supervisor.stop_influxdb(), StopOutcome::AlreadyStopped);
        assert!(!ctx.pid_file.exists());
    }

    #[test]
    fn test_start_without_install_is_fatal() {
        let tmp = tempdir().unwrap();
        let ctx = ctx(tmp.path());
        let supervisor = Supervisor::new(&ctx, tmp.path().join("data"));

        let err = supervisor.start_influxdb().unwrap_err();
        assert!(matches!(
            err,
            PgdbError::ExecutableNotFound {
                component: Component::InfluxDb,
                ..
            }
        ));
        assert!(!ctx.pid_file.exists());
    }

    #[test]
    fn test_config_paths() {
        let tmp = tempdir().unwrap();
        let ctx = ctx(tmp.path());
        let data = tmp.path().join("data");
        let supervisor = Supervisor::new(&ctx, &data);
        assert_eq!(
            supervisor.config_path(Component::Neo4j),
            data.join("neo4j").join("conf").join("neo4j.conf")
        );
        assert_eq!(
            supervisor.config_path(Component::InfluxDb),
            data.join("influxdb").join("influxdb.conf")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_start_and_stop_detached_influxd() {
        let tmp = tempdir().unwrap();
        let ctx = ctx(tmp.path());
        let data = tmp.path().join("data");
        install_stub_influxd(&data, "#!/bin/sh\nexec sleep 30\n");

        let supervisor = Supervisor::new(&ctx, &data);
        let handle = supervisor.start_influxdb().unwrap();
        let pid = handle.pid.unwrap();
        assert_eq!(handle.state, ServiceState::Running);
        assert_eq!(read_pid(&ctx.pid_file).unwrap(), Some(pid));

        assert_eq!(supervisor.stop_influxdb(), StopOutcome::Stopped);
        assert!(!ctx.pid_file.exists());
        assert_eq!(supervisor.stop_influxdb(), StopOutcome::AlreadyStopped);
    }

    #[cfg(unix)]
    fn install_stub_influxd(data: &Path, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let bin_dir = data.join("influxdb").join("usr").join("bin");
        fs::create_dir_all(&bin_dir).unwrap();
        let exe = bin_dir.join("influxd");
        fs::write(&exe, script).unwrap();
        fs::set_permissions(&exe, fs::Permissions::from_mode(0o755)).unwrap();
        exe
    }

    #[cfg(unix)]
    #[test]
    fn test_unusable_config_home_launches_nothing() {
        let tmp = tempdir().unwrap();
        let ctx = ctx(tmp.path());
        let data = tmp.path().join("data");
        let exe = install_stub_influxd(&data, "#!/bin/sh\ntouch \"$0.launched\"\nexec sleep 30\n");
        fs::write(&ctx.config_home, "not a directory").unwrap();

        let supervisor = Supervisor::new(&ctx, &data);
        let err = supervisor.start_influxdb().unwrap_err();
        assert!(matches!(err, PgdbError::ConfigIo { .. }));

        std::thread::sleep(std::time::Duration::from_millis(300));
        assert!(!exe.with_extension("launched").exists());
    }

    /// Whether `pid` is a live (non-zombie) process
    #[cfg(target_os = "linux")]
    fn is_live(pid: u32) -> bool {
        match fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit_once(')')
                .map(|(_, rest)| !rest.trim_start().starts_with('Z'))
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_unrecordable_pid_stops_the_launched_process() {
        let tmp = tempdir().unwrap();
        let ctx = ctx(tmp.path());
        let data = tmp.path().join("data");
        let exe = install_stub_influxd(&data, "#!/bin/sh\necho $$ > \"$0.pid\"\nexec sleep 30\n");
        // A directory where the PID file should go makes the write fail
        fs::create_dir_all(&ctx.pid_file).unwrap();

        let supervisor = Supervisor::new(&ctx, &data);
        let err = supervisor.start_influxdb().unwrap_err();
        assert!(matches!(err, PgdbError::Write { .. }));

        let marker = exe.with_extension("pid");
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(3);
        loop {
            let pid = fs::read_to_string(&marker)
                .ok()
                .and_then(|s| s.trim().parse::<u32>().ok());
            match pid {
                Some(pid) if !is_live(pid) => break,
                // Interrupted before it could record itself
                None if std::time::Instant::now() > deadline => break,
                _ if std::time::Instant::now() > deadline => {
                    panic!("launched influxd is still running")
                }
                _ => std::thread::sleep(std::time::Duration::from_millis(50)),
            }
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_interrupt_refuses_process_group_pids() {
        assert!(interrupt(0).is_err());
        assert!(interrupt(1).is_err());
    }
}
