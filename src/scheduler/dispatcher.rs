use std::time::Duration;

use serde::Serialize;

use crate::config::DispatchConfig;
use crate::error::{ProbeError, Result, RunnerError};
use crate::scheduler::queue::CommandQueue;
use crate::scheduler::rank::{RankEntry, TargetRanking};
use crate::target::Target;

/// Where the dispatch loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopPhase {
    /// Probing every target and building the initial ranking.
    Filling,
    /// Emptying the command queue onto ranked targets.
    Draining,
    /// Queue empty; every command has been started.
    Done,
}

/// Where a single target is in its scheduling lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetPhase {
    /// Not yet probed for the initial ranking.
    Unprobed,
    /// Waiting in the ranking with a known capacity.
    Ranked,
    /// Popped from the ranking; being re-probed or started on.
    Dispatching,
    /// Had no headroom at its last probe; backing off before re-rank.
    CoolingDown,
}

/// Per-target dispatch count for the final report.
#[derive(Debug, Clone, Serialize)]
pub struct TargetDispatches {
    pub target: String,
    pub started: usize,
}

/// Summary of a completed dispatch run.
#[derive(Debug, Serialize)]
pub struct DispatchReport {
    /// Total commands started (every queued command, exactly once).
    pub started: usize,
    /// Dispatch attempts that failed and were re-queued.
    pub failed_attempts: usize,
    pub per_target: Vec<TargetDispatches>,
}

/// The capacity-greedy scheduling loop.
///
/// Owns the target set and drives the whole run: rank targets by their
/// freshest known capacity, re-validate the best one, and either dispatch
/// one command or put the target back with an updated rank. A target that
/// becomes unreachable keeps probing to 0 and naturally stops receiving
/// work; it is never removed.
pub struct Dispatcher {
    targets: Vec<Box<dyn Target>>,
    phases: Vec<TargetPhase>,
    reservation: u32,
    backoff: Duration,
}

impl Dispatcher {
    pub fn new(targets: Vec<Box<dyn Target>>, config: &DispatchConfig) -> Result<Self> {
        if targets.is_empty() {
            return Err(RunnerError::NoTargets);
        }
        let phases = vec![TargetPhase::Unprobed; targets.len()];
        Ok(Self {
            targets,
            phases,
            reservation: config.threads,
            backoff: Duration::from_millis(config.backoff_ms),
        })
    }

    /// Start every queued command exactly once, then return.
    ///
    /// Commands are guaranteed an attempt, not an outcome: a start that was
    /// confirmed is terminal for the scheduler's responsibility. A failed
    /// start re-queues the command at the front and it is retried on a
    /// later iteration, possibly on another target.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::EmptyQueue`] if called with nothing to run.
    pub async fn run(&mut self, queue: &mut CommandQueue) -> Result<DispatchReport> {
        if queue.is_empty() {
            return Err(RunnerError::EmptyQueue);
        }

        let mut phase = LoopPhase::Filling;
        tracing::debug!(?phase, targets = self.targets.len(), "building initial ranking");

        let mut ranking = TargetRanking::new();
        for idx in 0..self.targets.len() {
            let capacity = self.probe_or_zero(idx).await;
            self.phases[idx] = TargetPhase::Ranked;
            ranking.insert(RankEntry::new(capacity, 0, idx));
        }

        phase = LoopPhase::Draining;
        tracing::info!(
            ?phase,
            commands = queue.len(),
            targets = self.targets.len(),
            "dispatch loop started"
        );

        let mut started = 0usize;
        let mut failed_attempts = 0usize;
        let mut per_target = vec![0usize; self.targets.len()];

        while !queue.is_empty() {
            let entry = match ranking.pop() {
                Some(entry) => entry,
                // Every entry is re-inserted after each step, so the
                // ranking only empties if the target set was empty.
                None => return Err(RunnerError::NoTargets),
            };
            let idx = entry.target();
            self.phases[idx] = TargetPhase::Dispatching;

            // The ranked value may be stale; trust only a fresh probe.
            let capacity = self.probe_or_zero(idx).await;

            if capacity > self.reservation + 1 {
                let command = match queue.pop_next() {
                    Some(command) => command,
                    None => break,
                };
                match self.targets[idx].start(&command).await {
                    Ok(()) => {
                        started += 1;
                        per_target[idx] += 1;
                        self.phases[idx] = TargetPhase::Ranked;
                        ranking.insert(entry.reranked(capacity - self.reservation));
                        tracing::info!(
                            target = %self.targets[idx].id(),
                            remaining = queue.len(),
                            "command dispatched"
                        );
                    }
                    Err(e) => {
                        // The command is not lost: back to the front of the
                        // queue, and the target is re-ranked with the fresh
                        // probe value rather than left stale.
                        failed_attempts += 1;
                        queue.push_front(command);
                        self.phases[idx] = TargetPhase::Ranked;
                        ranking.insert(entry.reranked(capacity));
                        tracing::warn!(
                            target = %self.targets[idx].id(),
                            error = %e,
                            "dispatch failed, command re-queued"
                        );
                    }
                }
            } else {
                self.phases[idx] = TargetPhase::CoolingDown;
                ranking.insert(entry.reranked(capacity));
                tracing::debug!(
                    target = %self.targets[idx].id(),
                    capacity,
                    reservation = self.reservation,
                    backoff_ms = self.backoff.as_millis() as u64,
                    "insufficient headroom, backing off"
                );
                tokio::time::sleep(self.backoff).await;
            }
        }

        phase = LoopPhase::Done;
        tracing::info!(?phase, started, failed_attempts, "dispatch loop finished");

        Ok(DispatchReport {
            started,
            failed_attempts,
            per_target: self
                .targets
                .iter()
                .zip(per_target)
                .map(|(t, n)| TargetDispatches {
                    target: t.id().to_string(),
                    started: n,
                })
                .collect(),
        })
    }

    /// Current lifecycle phase of each target, in target order.
    pub fn target_phases(&self) -> &[TargetPhase] {
        &self.phases
    }

    /// Hand the target set back for result collection and teardown.
    pub fn into_targets(self) -> Vec<Box<dyn Target>> {
        self.targets
    }

    /// Probe one target, coercing every failure kind to capacity 0. An
    /// unreachable or garbled target is fully busy, never fatal.
    async fn probe_or_zero(&mut self, idx: usize) -> u32 {
        match self.targets[idx].probe_capacity().await {
            Ok(capacity) => capacity,
            Err(ProbeError::Unreachable(reason)) => {
                tracing::debug!(
                    target = %self.targets[idx].id(),
                    reason = %reason,
                    "probe failed, treating as busy"
                );
                0
            }
            Err(ProbeError::Malformed(response)) => {
                tracing::warn!(
                    target = %self.targets[idx].id(),
                    response = %response,
                    "unparseable probe response, treating as busy"
                );
                0
            }
        }
    }
}
