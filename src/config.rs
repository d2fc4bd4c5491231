use std::path::PathBuf;

/// Logical CPU count of this machine, falling back to 1 if it cannot be
/// determined.
pub fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Default shell probe: prints the number of logical CPUs not currently busy
/// (total CPUs minus the rounded 1-minute load average, floored at 0), one
/// integer on one line.
pub const DEFAULT_PROBE_COMMAND: &str =
    "awk -v n=\"$(nproc)\" '{ free = n - int($1 + 0.5); print (free > 0 ? free : 0) }' /proc/loadavg";

/// Tuning knobs for the cluster dispatch loop.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Threads/cores reserved by each task. A target is only dispatched to
    /// when its probed capacity exceeds this by more than one unit.
    pub threads: u32,
    /// Sleep between scheduling iterations when the best-ranked target has
    /// no headroom. The primary lever for trading dispatch latency against
    /// probe and connection overhead.
    pub backoff_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            backoff_ms: 3000,
        }
    }
}

/// Per-cluster settings for SSH targets.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// SSH login name; `None` defers to ssh_config.
    pub user: Option<String>,
    /// Bounded timeout for establishing a session.
    pub connect_timeout_secs: u64,
    /// Bounded timeout for capacity probes and task-start commands.
    pub command_timeout_secs: u64,
    /// Shell command run on the target to report free capacity.
    pub probe_command: String,
    /// Conda environment activated before each task.
    pub conda_env: Option<String>,
    /// Directory changed into before each task.
    pub run_dir: Option<String>,
    /// Remote directory pulled back after dispatch completes.
    pub result_dir: Option<String>,
    /// Where SSH control sockets are created.
    pub control_dir: PathBuf,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            user: None,
            connect_timeout_secs: 3,
            command_timeout_secs: 3,
            probe_command: DEFAULT_PROBE_COMMAND.to_string(),
            conda_env: None,
            run_dir: None,
            result_dir: None,
            control_dir: std::env::temp_dir(),
        }
    }
}

impl RemoteConfig {
    /// SSH destination for a host, honoring the configured login name.
    pub fn destination(&self, host: &str) -> String {
        match &self.user {
            Some(user) => format!("{}@{}", user, host),
            None => host.to_string(),
        }
    }
}

/// Settings for the single-machine worker pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Threads/cores reserved by each task.
    pub threads: u32,
    /// Requested slot count; `None` selects the default
    /// (`num_cpus / threads - 1`, floor 1).
    pub num_workers: Option<usize>,
    /// Fixed pause before each process start, to avoid bursts of process
    /// creation.
    pub spawn_delay_ms: u64,
    /// Interval between scans of the slot table.
    pub poll_interval_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            num_workers: None,
            spawn_delay_ms: 1000,
            poll_interval_ms: 200,
        }
    }
}

impl PoolConfig {
    /// Resolve the effective worker count.
    ///
    /// Requests at or above the unreserved maximum (`num_cpus / threads`)
    /// are clamped to `num_cpus / threads - 1` with a non-fatal warning;
    /// the result is never below 1.
    pub fn effective_workers(&self) -> usize {
        let threads = self.threads.max(1) as usize;
        let safe_max = (num_cpus() / threads).saturating_sub(1).max(1);
        match self.num_workers {
            None => safe_max,
            Some(requested) => {
                if requested >= num_cpus() / threads && requested > 1 {
                    tracing::warn!(
                        requested,
                        clamped = safe_max,
                        "too many workers requested, limiting"
                    );
                    safe_max
                } else {
                    requested.max(1)
                }
            }
        }
    }
}

/// Settings for LSF batch submission.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Experiment name, used for the log file and job names.
    pub name: String,
    /// Threads requested per job (`bsub -n`).
    pub threads: u32,
    /// Request one exclusive GPU.
    pub use_gpu: bool,
    /// Wall time in minutes (`bsub -W`).
    pub wall_time: Option<u32>,
    /// Memory reservation in MB.
    pub memory: Option<u32>,
    /// Directory for scheduler logs and command files.
    pub log_dir: PathBuf,
}

impl BatchConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            threads: 1,
            use_gpu: false,
            wall_time: None,
            memory: None,
            log_dir: PathBuf::from("logs"),
        }
    }

    pub fn with_threads(mut self, threads: u32) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_gpu(mut self, use_gpu: bool) -> Self {
        self.use_gpu = use_gpu;
        self
    }

    pub fn with_wall_time(mut self, minutes: u32) -> Self {
        self.wall_time = Some(minutes);
        self
    }

    pub fn with_memory(mut self, mb: u32) -> Self {
        self.memory = Some(mb);
        self
    }
}
