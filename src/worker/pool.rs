use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};

use crate::config::PoolConfig;
use crate::error::{Result, RunnerError};
use crate::scheduler::CommandQueue;

/// Lifecycle of one execution slot.
pub enum SlotState {
    /// Created with no occupant (or the occupant has been finalized);
    /// waiting to be assigned a command.
    Idle,
    /// Occupied by a running process.
    Running(Child),
    /// The queue was empty when this slot last came free; it will never
    /// run again this round.
    Drained,
}

/// Fixed-size pool of homogeneous execution slots on this machine.
///
/// A single polling loop scans the slot table: whenever a slot's occupant
/// is observed not running, the slot is finalized and refilled from the
/// front of the queue, with a fixed delay before each process start to
/// avoid bursts of process creation. The pool exits once every slot is
/// drained, i.e. the queue is empty and every started process has been
/// observed exited. No ranking is needed; slots are interchangeable.
pub struct LocalPool {
    workers: usize,
    spawn_delay: Duration,
    poll_interval: Duration,
    slots: Vec<SlotState>,
}

impl LocalPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            workers: config.effective_workers(),
            spawn_delay: Duration::from_millis(config.spawn_delay_ms),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            slots: Vec::new(),
        }
    }

    /// Effective slot count after clamping.
    pub fn num_workers(&self) -> usize {
        self.workers
    }

    /// Run every queued command, starting each exactly once, and wait for
    /// the last process to exit.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::EmptyQueue`] if called with nothing to run.
    pub async fn run(&mut self, queue: &mut CommandQueue) -> Result<usize> {
        if queue.is_empty() {
            return Err(RunnerError::EmptyQueue);
        }

        tracing::info!(
            workers = self.workers,
            commands = queue.len(),
            "worker pool started"
        );
        self.slots = (0..self.workers).map(|_| SlotState::Idle).collect();
        let mut started = 0usize;

        loop {
            for idx in 0..self.slots.len() {
                let state = std::mem::replace(&mut self.slots[idx], SlotState::Drained);
                let next = match state {
                    SlotState::Running(mut child) => match child.try_wait()? {
                        None => SlotState::Running(child),
                        Some(status) => {
                            tracing::debug!(
                                slot = idx,
                                exit_code = status.code(),
                                "slot occupant finished"
                            );
                            self.assign(idx, queue, &mut started).await?
                        }
                    },
                    SlotState::Idle => self.assign(idx, queue, &mut started).await?,
                    SlotState::Drained => SlotState::Drained,
                };
                self.slots[idx] = next;
            }

            if self
                .slots
                .iter()
                .all(|slot| matches!(slot, SlotState::Drained))
            {
                break;
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        tracing::info!(started, "worker pool drained");
        Ok(started)
    }

    /// Refill a free slot from the queue, or drain it if nothing is left.
    async fn assign(
        &self,
        slot: usize,
        queue: &mut CommandQueue,
        started: &mut usize,
    ) -> Result<SlotState> {
        match queue.pop_next() {
            Some(command) => {
                tokio::time::sleep(self.spawn_delay).await;
                let child = Command::new("sh")
                    .arg("-c")
                    .arg(&command)
                    .stdin(Stdio::null())
                    .spawn()?;
                *started += 1;
                tracing::info!(slot, remaining = queue.len(), "command started");
                Ok(SlotState::Running(child))
            }
            None => {
                tracing::debug!(slot, "slot drained");
                Ok(SlotState::Drained)
            }
        }
    }
}
