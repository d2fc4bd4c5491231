//! Capacity-aware scheduling over a set of execution targets.
//!
//! The dispatcher owns the command queue and a ranked set of targets and is
//! the sole driver: a single cooperative loop that re-probes the best-ranked
//! target before every dispatch decision. The only parallel activity is the
//! detached tasks themselves.

pub mod dispatcher;
pub mod queue;
pub mod rank;

pub use dispatcher::{DispatchReport, Dispatcher};
pub use queue::CommandQueue;
pub use rank::{RankEntry, TargetRanking};
