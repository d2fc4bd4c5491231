//! Delegation to the LSF batch queue.
//!
//! On an LSF head node there is no dispatching to do: every command is
//! handed to `bsub` as a single formatted submission string, either one job
//! per command or one job array driven by a plain-text command file.

use std::path::PathBuf;
use std::process::Stdio;

use chrono::Local;
use tokio::process::Command;

use crate::config::BatchConfig;
use crate::error::{Result, RunnerError};

/// Whether this machine fronts an LSF cluster.
pub fn is_lsf_host() -> bool {
    std::env::var_os("LSF_ENVDIR").is_some()
}

/// Builds and submits `bsub` invocations.
pub struct BsubRunner {
    config: BatchConfig,
}

impl BsubRunner {
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }

    /// The shared flag prefix: log path, wall time, memory, GPU, threads.
    pub fn base_command(&self) -> String {
        let cfg = &self.config;
        let mut cmd = String::from("bsub ");
        cmd.push_str(&format!(
            "-o {}/lsf.{} ",
            cfg.log_dir.display(),
            cfg.name
        ));
        if let Some(wall_time) = cfg.wall_time {
            cmd.push_str(&format!("-W {} ", wall_time));
        }
        if let Some(memory) = cfg.memory {
            cmd.push_str(&format!("-R \"rusage[mem={}]\" ", memory));
        }
        if cfg.use_gpu {
            cmd.push_str("-R \"rusage[ngpus_excl_p=1]\" ");
        }
        cmd.push_str(&format!("-n {} ", cfg.threads));
        cmd
    }

    /// Submit one job per command. Returns the submission strings.
    pub async fn run(&self, commands: &[String]) -> Result<Vec<String>> {
        if commands.is_empty() {
            return Err(RunnerError::EmptyQueue);
        }
        std::fs::create_dir_all(&self.config.log_dir)?;

        let base = self.base_command();
        let mut submitted = Vec::with_capacity(commands.len());
        for (i, command) in commands.iter().enumerate() {
            let full = format!("{}-J \"{}-{}\" \"{}\"", base, self.config.name, i, command);
            self.submit(&full).await;
            submitted.push(full);
        }
        Ok(submitted)
    }

    /// Submit all commands as one job array.
    ///
    /// The commands are written to a timestamped file under the log
    /// directory and each array element picks its line by `LSB_JOBINDEX`.
    /// Returns the submission string.
    pub async fn run_batch(&self, commands: &[String]) -> Result<String> {
        if commands.is_empty() {
            return Err(RunnerError::EmptyQueue);
        }
        std::fs::create_dir_all(&self.config.log_dir)?;

        let cmd_file = self.command_file_path();
        let mut contents = commands.join("\n");
        contents.push('\n');
        std::fs::write(&cmd_file, contents)?;
        tracing::info!(file = %cmd_file.display(), commands = commands.len(), "command file written");

        let mut bsub = self.base_command();
        bsub.push_str(&format!("-J \"{}[1-{}]\"", self.config.name, commands.len()));
        bsub.push_str(&format!(
            " \"awk -v jindex=\\$LSB_JOBINDEX 'NR==jindex' {} | bash\"",
            cmd_file.display()
        ));
        self.submit(&bsub).await;
        Ok(bsub)
    }

    fn command_file_path(&self) -> PathBuf {
        let stamp = Local::now().format("%b%d_%H-%M-%S");
        self.config
            .log_dir
            .join(format!("{}_cmd_{}", self.config.name, stamp))
    }

    /// Hand a submission string to the shell. The queueing system owns the
    /// job from here; a refused submission is logged, not propagated.
    async fn submit(&self, command: &str) {
        let result = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .status()
            .await;
        match result {
            Ok(status) if status.success() => {
                tracing::info!(name = %self.config.name, "job submitted")
            }
            Ok(status) => {
                tracing::warn!(exit_code = status.code(), "bsub exited non-zero")
            }
            Err(e) => tracing::warn!(error = %e, "failed to invoke bsub"),
        }
    }
}
