// SPDX-FileCopyrightText: 2026 Linkmap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Daemon lifecycle: background re-exec, PID file, stop, status.
//!
//! The PID file is the lock: a live process at that PID means the daemon is
//! running. Liveness is probed with a zero-signal `kill`.

use std::path::Path;

use linkmap_core::LinkmapError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Read the PID file, if present and parseable.
pub fn read_pid(pid_path: &Path) -> Option<i32> {
    let content = std::fs::read_to_string(pid_path).ok()?;
    content.trim().parse().ok()
}

/// Write our (or a child's) PID.
pub fn write_pid(pid_path: &Path, pid: i32) -> Result<(), LinkmapError> {
    std::fs::write(pid_path, pid.to_string())
        .map_err(|e| LinkmapError::Internal(format!("cannot write PID file: {e}")))
}

/// Remove the PID file; missing files are fine.
pub fn remove_pid(pid_path: &Path) {
    let _ = std::fs::remove_file(pid_path);
}

/// Probe a process for liveness with a zero-signal send.
#[cfg(unix)]
pub fn process_alive(pid: i32) -> bool {
    // Signal 0 performs error checking only.
    unsafe { libc::kill(pid, 0) == 0 }
}

#[cfg(not(unix))]
pub fn process_alive(_pid: i32) -> bool {
    false
}

/// True when the PID file points at a live process.
pub fn daemon_running(pid_path: &Path) -> Option<i32> {
    let pid = read_pid(pid_path)?;
    if process_alive(pid) {
        Some(pid)
    } else {
        None
    }
}

/// Re-execute ourselves detached, stdio redirected to the log file.
///
/// Returns the child PID, which is also written to the PID file.
#[cfg(unix)]
pub fn spawn_background(log_path: &Path, pid_path: &Path) -> Result<i32, LinkmapError> {
    use std::os::unix::process::CommandExt;
    use std::process::Stdio;

    let exe = std::env::current_exe()
        .map_err(|e| LinkmapError::Internal(format!("cannot locate own executable: {e}")))?;

    let log = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .map_err(|e| LinkmapError::Internal(format!("cannot open log file: {e}")))?;
    let log_err = log
        .try_clone()
        .map_err(|e| LinkmapError::Internal(format!("cannot clone log handle: {e}")))?;

    let child = std::process::Command::new(exe)
        .arg("run")
        .arg("--foreground")
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_err))
        .process_group(0)
        .spawn()
        .map_err(|e| LinkmapError::Internal(format!("cannot spawn daemon: {e}")))?;

    let pid = child.id() as i32;
    write_pid(pid_path, pid)?;
    debug!(pid, "daemon spawned");
    Ok(pid)
}

#[cfg(not(unix))]
pub fn spawn_background(_log_path: &Path, _pid_path: &Path) -> Result<i32, LinkmapError> {
    Err(LinkmapError::Internal(
        "background mode is only supported on unix; use --foreground".to_string(),
    ))
}

/// Send SIGTERM to the PID-file process.
#[cfg(unix)]
pub fn stop_daemon(pid_path: &Path) -> Result<i32, LinkmapError> {
    let Some(pid) = read_pid(pid_path) else {
        return Err(LinkmapError::NotFound("probe is not running".to_string()));
    };
    if !process_alive(pid) {
        remove_pid(pid_path);
        return Err(LinkmapError::NotFound(
            "probe is not running (stale PID file removed)".to_string(),
        ));
    }
    if unsafe { libc::kill(pid, libc::SIGTERM) } != 0 {
        return Err(LinkmapError::Internal(format!(
            "failed to signal process {pid}"
        )));
    }
    remove_pid(pid_path);
    Ok(pid)
}

#[cfg(not(unix))]
pub fn stop_daemon(_pid_path: &Path) -> Result<i32, LinkmapError> {
    Err(LinkmapError::Internal(
        "stop is only supported on unix".to_string(),
    ))
}

/// Install SIGTERM/SIGINT handlers, returning a token that cancels when
/// either fires.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!(error = %e, "failed to install SIGTERM handler");
                    let _ = ctrl_c.await;
                    token_clone.cancel();
                    return;
                }
            };

            tokio::select! {
                _ = ctrl_c => {
                    info!("received SIGINT, shutting down");
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM, shutting down");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, shutting down");
        }

        token_clone.cancel();
    });

    token
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn pid_file_roundtrip() {
        let dir = tempdir().unwrap();
        let pid_path = dir.path().join("probe.pid");

        assert!(read_pid(&pid_path).is_none());
        write_pid(&pid_path, 12345).unwrap();
        assert_eq!(read_pid(&pid_path), Some(12345));

        remove_pid(&pid_path);
        assert!(read_pid(&pid_path).is_none());
        // Removing again is a no-op.
        remove_pid(&pid_path);
    }

    #[test]
    fn malformed_pid_file_reads_none() {
        let dir = tempdir().unwrap();
        let pid_path = dir.path().join("probe.pid");
        std::fs::write(&pid_path, "not-a-pid").unwrap();
        assert!(read_pid(&pid_path).is_none());
    }

    #[test]
    fn own_process_is_alive() {
        assert!(process_alive(std::process::id() as i32));
    }

    #[test]
    fn daemon_running_rejects_dead_pids() {
        let dir = tempdir().unwrap();
        let pid_path = dir.path().join("probe.pid");
        // A PID from far outside the usual range is almost certainly dead.
        write_pid(&pid_path, i32::MAX - 1).unwrap();
        assert!(daemon_running(&pid_path).is_none());
    }

    #[test]
    fn stop_without_pid_file_is_not_found() {
        let dir = tempdir().unwrap();
        let pid_path = dir.path().join("probe.pid");
        let err = stop_daemon(&pid_path).unwrap_err();
        assert!(err.to_string().contains("not running"));
    }

    #[test]
    fn stop_with_stale_pid_cleans_up() {
        let dir = tempdir().unwrap();
        let pid_path = dir.path().join("probe.pid");
        write_pid(&pid_path, i32::MAX - 1).unwrap();

        let err = stop_daemon(&pid_path).unwrap_err();
        assert!(err.to_string().contains("stale"));
        assert!(read_pid(&pid_path).is_none(), "stale PID file removed");
    }
}
