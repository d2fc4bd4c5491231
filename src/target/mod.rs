//! Execution targets for the cluster dispatcher.
//!
//! A target is a destination that can absorb detached shell commands within
//! its capacity budget. The closed set of variants is:
//! - [`LocalTarget`]: execution slots on this machine
//! - [`RemoteTarget`]: a machine reached over SSH
//!
//! The dispatcher is written once against the [`Target`] trait; every
//! target-local failure is absorbed here and surfaces only as a capacity or
//! start-outcome signal, never as a fatal error.

pub mod local;
pub mod remote;
pub mod session;

pub use local::LocalTarget;
pub use remote::RemoteTarget;
pub use session::Session;

use async_trait::async_trait;

use crate::error::{ProbeError, StartError};

/// Capability surface shared by all execution targets.
#[async_trait]
pub trait Target: Send {
    /// Stable identity, used for ranking and logs.
    fn id(&self) -> &str;

    /// How many additional per-task thread reservations this target can
    /// currently absorb. Must be re-queried immediately before every
    /// dispatch decision; the value fluctuates with other tenants.
    async fn probe_capacity(&mut self) -> Result<u32, ProbeError>;

    /// Start one command, detached. `Ok` means the start was confirmed;
    /// the task's own outcome is never observed.
    async fn start(&mut self, command: &str) -> Result<(), StartError>;

    /// Best-effort pull of result artifacts into the local working
    /// directory. Copy errors are logged and swallowed.
    async fn collect_results(&mut self);

    /// Release any live session. Must be idempotent.
    async fn teardown(&mut self);
}

/// Harvest results and close every target once dispatch completes.
///
/// A copy failure on one target must not prevent teardown of the others,
/// so each step is best-effort. Safe to call on already-closed targets.
pub async fn teardown_all(targets: &mut [Box<dyn Target>]) {
    for target in targets.iter_mut() {
        target.collect_results().await;
    }
    for target in targets.iter_mut() {
        target.teardown().await;
    }
}
