use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use uuid::Uuid;

use crate::error::SessionError;

/// A live remote-execution channel bound to one host.
///
/// Backed by an OpenSSH control master held as a child process: commands and
/// copies multiplex over its socket, and liveness is a local check on the
/// master process rather than a network round-trip. The session may die
/// asynchronously (network drop); callers check [`Session::is_alive`] before
/// use and reconnect through their connection manager.
pub struct Session {
    destination: String,
    control_path: PathBuf,
    master: Child,
}

impl Session {
    /// Establish a session to `destination` within `timeout`.
    ///
    /// Spawns `ssh -M -N` with a fresh control socket and waits until the
    /// socket answers `-O check`. Authentication is key/agent only
    /// (`BatchMode=yes`); a password prompt counts as a failed connection.
    pub async fn connect(
        destination: &str,
        control_dir: &Path,
        timeout: Duration,
    ) -> Result<Self, SessionError> {
        let control_path = control_dir.join(format!("sweeprun-{}.ctl", Uuid::new_v4()));

        let mut master = Command::new("ssh")
            .arg("-M")
            .arg("-N")
            .arg("-S")
            .arg(&control_path)
            .arg("-o")
            .arg("BatchMode=yes")
            .arg("-o")
            .arg(format!("ConnectTimeout={}", timeout.as_secs().max(1)))
            .arg(destination)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        // The control socket appears once the master has authenticated;
        // poll it until the connect timeout (plus a little grace) expires.
        let deadline = tokio::time::Instant::now() + timeout + Duration::from_secs(1);
        loop {
            if let Some(status) = master.try_wait()? {
                return Err(SessionError::ConnectFailed {
                    host: destination.to_string(),
                    reason: format!("ssh master exited with {}", status),
                });
            }

            let check = Command::new("ssh")
                .arg("-S")
                .arg(&control_path)
                .arg("-O")
                .arg("check")
                .arg(destination)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await?;
            if check.success() {
                tracing::debug!(host = %destination, "session established");
                return Ok(Self {
                    destination: destination.to_string(),
                    control_path,
                    master,
                });
            }

            if tokio::time::Instant::now() >= deadline {
                let _ = master.kill().await;
                return Err(SessionError::ConnectFailed {
                    host: destination.to_string(),
                    reason: "timed out waiting for control socket".to_string(),
                });
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Whether the transport is still active. A cheap local state check on
    /// the master process; no traffic is sent.
    pub fn is_alive(&mut self) -> bool {
        matches!(self.master.try_wait(), Ok(None))
    }

    /// Run `command` on the remote host, bounded by `timeout`, and return
    /// its stdout. Non-zero exit status is an error.
    pub async fn exec(&self, command: &str, timeout: Duration) -> Result<String, SessionError> {
        let output = tokio::time::timeout(
            timeout,
            Command::new("ssh")
                .arg("-S")
                .arg(&self.control_path)
                .arg("-o")
                .arg("BatchMode=yes")
                .arg(&self.destination)
                .arg(command)
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| SessionError::Timeout {
            timeout_secs: timeout.as_secs(),
        })??;

        if !output.status.success() {
            return Err(SessionError::ExecFailed {
                status: output.status.code().unwrap_or(-1),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Recursive, timestamp-preserving copy of a remote directory into
    /// `local_dir` over this session's socket.
    pub async fn pull_recursive(
        &self,
        remote_dir: &str,
        local_dir: &Path,
    ) -> Result<(), SessionError> {
        let status = Command::new("scp")
            .arg("-r")
            .arg("-p")
            .arg("-q")
            .arg("-o")
            .arg(format!("ControlPath={}", self.control_path.display()))
            .arg("-o")
            .arg("BatchMode=yes")
            .arg(format!("{}:{}", self.destination, remote_dir))
            .arg(local_dir)
            .stdin(Stdio::null())
            .status()
            .await?;

        if !status.success() {
            return Err(SessionError::ExecFailed {
                status: status.code().unwrap_or(-1),
            });
        }
        Ok(())
    }

    /// Close the channel. Consumes the session; the remote side keeps any
    /// detached tasks running.
    pub async fn close(mut self) {
        let _ = Command::new("ssh")
            .arg("-S")
            .arg(&self.control_path)
            .arg("-O")
            .arg("exit")
            .arg(&self.destination)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        let _ = self.master.kill().await;
        let _ = std::fs::remove_file(&self.control_path);
        tracing::debug!(host = %self.destination, "session closed");
    }
}
