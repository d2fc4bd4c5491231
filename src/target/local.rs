use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::{Child, Command};

use crate::config::num_cpus;
use crate::error::{ProbeError, StartError};
use crate::target::Target;

/// Execution slots on this machine.
///
/// Capacity is the logical CPU count minus the reservations of commands it
/// has started that are still running; finished children are reaped on each
/// probe. Started commands are not waited on, matching the detached remote
/// semantics.
pub struct LocalTarget {
    id: String,
    reservation: u32,
    total_cpus: u32,
    children: Vec<Child>,
}

impl LocalTarget {
    pub fn new(reservation: u32) -> Self {
        Self {
            id: "local".to_string(),
            reservation: reservation.max(1),
            total_cpus: num_cpus() as u32,
            children: Vec::new(),
        }
    }

    /// Number of started commands still running.
    pub fn running(&mut self) -> usize {
        self.reap();
        self.children.len()
    }

    fn reap(&mut self) {
        self.children
            .retain_mut(|child| matches!(child.try_wait(), Ok(None)));
    }
}

#[async_trait]
impl Target for LocalTarget {
    fn id(&self) -> &str {
        &self.id
    }

    async fn probe_capacity(&mut self) -> Result<u32, ProbeError> {
        self.reap();
        let reserved = self.reservation * self.children.len() as u32;
        Ok(self.total_cpus.saturating_sub(reserved))
    }

    async fn start(&mut self, command: &str) -> Result<(), StartError> {
        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .spawn()?;
        self.children.push(child);
        Ok(())
    }

    async fn collect_results(&mut self) {
        // Results are already on this machine.
    }

    async fn teardown(&mut self) {
        // Drop the handles; running tasks stay alive, detached.
        self.children.clear();
    }
}
