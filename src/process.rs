//! External helper processes
//!
//! The phone-mirroring tool that provides the mic stream and the per-target
//! recorders are plain child processes: started in the background, polled
//! for liveness, and stopped with SIGTERM followed by SIGKILL.

use log::{debug, info, warn};
use std::io::{self, ErrorKind};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Grace period before a stopping process is killed
pub const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// A background child process we are responsible for
pub struct ManagedProcess {
    label: String,
    child: Child,
}

impl ManagedProcess {
    /// Spawn `program` with `args`, output discarded
    pub fn spawn(label: &str, program: &str, args: &[&str]) -> Result<Self, String> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    format!("{} not found - is it installed and on PATH?", program)
                } else {
                    format!("Failed to start {}: {}", program, e)
                }
            })?;
        debug!("Started {} (pid {})", label, child.id());
        Ok(Self {
            label: label.to_string(),
            child,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Non-blocking liveness check
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Ask the process to exit, killing it if it has not after `timeout`
    pub fn stop(&mut self, timeout: Duration) {
        if !self.is_running() {
            return;
        }

        if let Err(e) = terminate(&self.child) {
            debug!("SIGTERM to {} failed ({}), killing", self.label, e);
        } else {
            let start = Instant::now();
            while start.elapsed() < timeout {
                if !self.is_running() {
                    return;
                }
                thread::sleep(Duration::from_millis(50));
            }
            warn!("{} did not exit within {:?}, killing", self.label, timeout);
        }

        if let Err(e) = self.child.kill() {
            debug!("Failed to kill {}: {}", self.label, e);
        }
        let _ = self.child.wait();
    }
}

/// Send SIGTERM to a child that has not been reaped
fn terminate(child: &Child) -> io::Result<()> {
    let pid = libc::pid_t::try_from(child.id())
        .map_err(|_| io::Error::new(ErrorKind::InvalidInput, "pid out of range"))?;
    // SAFETY: kill(2) takes no pointers; the pid is our own unreaped child
    let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

impl Drop for ManagedProcess {
    fn drop(&mut self) {
        if self.is_running() {
            self.stop(STOP_TIMEOUT);
        }
    }
}

/// The phone-mirroring tool, audio only, capturing the phone's microphone
pub struct Mirror {
    program: String,
    process: Option<ManagedProcess>,
}

impl Mirror {
    pub fn new() -> Self {
        Self {
            program: "scrcpy".to_string(),
            process: None,
        }
    }

    /// Start the tool unless it is already running
    pub fn start(&mut self, startup: Duration) -> Result<(), String> {
        if self.is_running() {
            info!("{} already running", self.program);
            return Ok(());
        }

        let process = ManagedProcess::spawn(
            &self.program,
            &self.program,
            &["--no-video", "--audio-source=mic", "--audio-codec=raw"],
        )?;
        info!("Started {}", self.program);
        self.process = Some(process);

        // Give it a moment to connect to the device
        thread::sleep(startup);
        Ok(())
    }

    pub fn is_running(&mut self) -> bool {
        self.process.as_mut().is_some_and(|p| p.is_running())
    }

    pub fn stop(&mut self) {
        if let Some(mut process) = self.process.take() {
            process.stop(STOP_TIMEOUT);
            info!("Stopped {}", self.program);
        }
    }
}

impl Default for Mirror {
    fn default() -> Self {
        Self::new()
    }
}

/// Start `pw-record` capturing `target` into `path`
pub fn start_recorder(label: &str, target: &str, path: &Path) -> Result<ManagedProcess, String> {
    let path = path
        .to_str()
        .ok_or_else(|| format!("Invalid output path: {}", path.display()))?;
    ManagedProcess::spawn(label, "pw-record", &["--target", target, path])
}
