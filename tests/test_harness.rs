//! Shared fakes for dispatcher tests.
//!
//! `FakeTarget` is a deterministic stand-in for an execution target: its
//! reported capacity is its base value minus one reservation per command it
//! has started, it can be scripted to refuse the first N start attempts or
//! to become unreachable after its first successful start, and every start
//! is recorded in a log shared across all targets of a test.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use sweeprun::config::DispatchConfig;
use sweeprun::error::{ProbeError, StartError};
use sweeprun::target::Target;

/// `(target id, command)` pairs in global start order.
pub type StartLog = Arc<Mutex<Vec<(String, String)>>>;

pub fn start_log() -> StartLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Starts recorded for one target, in order.
pub fn started_on(log: &StartLog, id: &str) -> Vec<String> {
    log.lock()
        .unwrap()
        .iter()
        .filter(|(target, _)| target == id)
        .map(|(_, command)| command.clone())
        .collect()
}

/// Dispatch config with a backoff short enough for tests.
pub fn fast_config(threads: u32) -> DispatchConfig {
    DispatchConfig {
        threads,
        backoff_ms: 1,
    }
}

pub fn commands(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("cmd-{}", i)).collect()
}

pub struct FakeTarget {
    id: String,
    base_capacity: u32,
    reservation: u32,
    started_here: u32,
    fail_starts: usize,
    drop_after_first_start: bool,
    unreachable: bool,
    log: StartLog,
    probes: Arc<AtomicUsize>,
    teardowns: Arc<AtomicUsize>,
    collects: Arc<AtomicUsize>,
}

impl FakeTarget {
    pub fn new(id: &str, base_capacity: u32, log: &StartLog) -> Self {
        Self {
            id: id.to_string(),
            base_capacity,
            reservation: 1,
            started_here: 0,
            fail_starts: 0,
            drop_after_first_start: false,
            unreachable: false,
            log: log.clone(),
            probes: Arc::new(AtomicUsize::new(0)),
            teardowns: Arc::new(AtomicUsize::new(0)),
            collects: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Refuse the first `n` start attempts with a simulated connection drop.
    pub fn failing_starts(mut self, n: usize) -> Self {
        self.fail_starts = n;
        self
    }

    /// Become unreachable right after the first confirmed start.
    pub fn dropping_after_first_start(mut self) -> Self {
        self.drop_after_first_start = true;
        self
    }

    /// Handle to the probe counter, cloned before boxing.
    pub fn probe_counter(&self) -> Arc<AtomicUsize> {
        self.probes.clone()
    }

    pub fn teardown_counter(&self) -> Arc<AtomicUsize> {
        self.teardowns.clone()
    }

    #[allow(dead_code)]
    pub fn collect_counter(&self) -> Arc<AtomicUsize> {
        self.collects.clone()
    }
}

#[async_trait]
impl Target for FakeTarget {
    fn id(&self) -> &str {
        &self.id
    }

    async fn probe_capacity(&mut self) -> Result<u32, ProbeError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.unreachable {
            return Err(ProbeError::Unreachable("connection refused".to_string()));
        }
        Ok(self
            .base_capacity
            .saturating_sub(self.reservation * self.started_here))
    }

    async fn start(&mut self, command: &str) -> Result<(), StartError> {
        if self.unreachable {
            return Err(StartError::Unreachable("connection refused".to_string()));
        }
        if self.fail_starts > 0 {
            self.fail_starts -= 1;
            return Err(StartError::Unreachable("simulated drop".to_string()));
        }
        self.log
            .lock()
            .unwrap()
            .push((self.id.clone(), command.to_string()));
        self.started_here += 1;
        if self.drop_after_first_start {
            self.unreachable = true;
        }
        Ok(())
    }

    async fn collect_results(&mut self) {
        self.collects.fetch_add(1, Ordering::SeqCst);
    }

    async fn teardown(&mut self) {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
    }
}
