use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::RemoteConfig;
use crate::error::{ProbeError, SessionError, StartError};
use crate::target::session::Session;
use crate::target::Target;

/// A machine reached over SSH.
///
/// Owns its session exclusively: absent or dead sessions are re-established
/// lazily before each use, with a bounded connection timeout. A transiently
/// unreachable host never aborts the run; it just probes to capacity 0
/// until it comes back.
pub struct RemoteTarget {
    host: String,
    destination: String,
    config: RemoteConfig,
    session: Option<Session>,
}

impl RemoteTarget {
    pub fn new(host: impl Into<String>, config: RemoteConfig) -> Self {
        let host = host.into();
        let destination = config.destination(&host);
        Self {
            host,
            destination,
            config,
            session: None,
        }
    }

    fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.config.command_timeout_secs)
    }

    /// Reuse the existing session, or (re)connect if it is absent or the
    /// transport died since last use.
    async fn ensure_connected(&mut self) -> Result<&mut Session, SessionError> {
        let dead = match self.session.as_mut() {
            Some(session) => !session.is_alive(),
            None => true,
        };
        if dead {
            if let Some(stale) = self.session.take() {
                tracing::debug!(host = %self.host, "session died, reconnecting");
                stale.close().await;
            }
            let session = Session::connect(
                &self.destination,
                &self.config.control_dir,
                Duration::from_secs(self.config.connect_timeout_secs),
            )
            .await?;
            self.session = Some(session);
        }
        match self.session.as_mut() {
            Some(session) => Ok(session),
            None => unreachable!("session was just established"),
        }
    }

    /// Compose the remote start line: optional working directory and conda
    /// environment, then the command detached so the exec channel can close
    /// immediately.
    fn compose_start(&self, command: &str) -> String {
        let mut parts = Vec::new();
        if let Some(dir) = &self.config.run_dir {
            parts.push(format!("cd {}", dir));
        }
        if let Some(env) = &self.config.conda_env {
            parts.push(format!("conda activate {}", env));
        }
        parts.push(format!("nohup {} >/dev/null 2>&1 &", command));
        parts.join("; ")
    }
}

#[async_trait]
impl Target for RemoteTarget {
    fn id(&self) -> &str {
        &self.host
    }

    async fn probe_capacity(&mut self) -> Result<u32, ProbeError> {
        let probe = self.config.probe_command.clone();
        let timeout = self.command_timeout();
        let session = self
            .ensure_connected()
            .await
            .map_err(|e| ProbeError::Unreachable(e.to_string()))?;

        let output = session
            .exec(&probe, timeout)
            .await
            .map_err(|e| ProbeError::Unreachable(e.to_string()))?;

        let line = output.trim();
        line.parse::<u32>()
            .map_err(|_| ProbeError::Malformed(line.to_string()))
    }

    async fn start(&mut self, command: &str) -> Result<(), StartError> {
        let composed = self.compose_start(command);
        let timeout = self.command_timeout();
        let session = self
            .ensure_connected()
            .await
            .map_err(|e| StartError::Unreachable(e.to_string()))?;

        session
            .exec(&composed, timeout)
            .await
            .map_err(|e| StartError::ExecFailed(e.to_string()))?;
        Ok(())
    }

    async fn collect_results(&mut self) {
        let Some(result_dir) = self.config.result_dir.clone() else {
            return;
        };
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.is_alive() {
            tracing::debug!(host = %self.host, "session dead, skipping result pull");
            return;
        }
        match session.pull_recursive(&result_dir, Path::new(".")).await {
            Ok(()) => {
                tracing::info!(host = %self.host, dir = %result_dir, "results pulled")
            }
            // The directory may not exist yet, or the task died before
            // producing output; either way teardown continues.
            Err(e) => {
                tracing::warn!(host = %self.host, error = %e, "result pull failed, ignoring")
            }
        }
    }

    async fn teardown(&mut self) {
        if let Some(session) = self.session.take() {
            session.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target_with(config: RemoteConfig) -> RemoteTarget {
        RemoteTarget::new("node01", config)
    }

    #[test]
    fn compose_start_bare() {
        let target = target_with(RemoteConfig::default());
        assert_eq!(
            target.compose_start("python train.py --seed 0"),
            "nohup python train.py --seed 0 >/dev/null 2>&1 &"
        );
    }

    #[test]
    fn compose_start_with_run_dir_and_env() {
        let config = RemoteConfig {
            run_dir: Some("/data/exp".to_string()),
            conda_env: Some("ml".to_string()),
            ..Default::default()
        };
        let target = target_with(config);
        assert_eq!(
            target.compose_start("python train.py"),
            "cd /data/exp; conda activate ml; nohup python train.py >/dev/null 2>&1 &"
        );
    }

    #[test]
    fn destination_includes_user() {
        let config = RemoteConfig {
            user: Some("alice".to_string()),
            ..Default::default()
        };
        let target = target_with(config);
        assert_eq!(target.destination, "alice@node01");
        assert_eq!(target.id(), "node01");
    }
}
