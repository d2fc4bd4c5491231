//! Capacity-aware dispatch of hyperparameter sweep experiments.
//!
//! A queue of independent shell commands is dispatched onto one of three
//! backends:
//! - a fixed pool of local worker slots ([`worker::LocalPool`]),
//! - a set of SSH-reachable machines ranked by free capacity
//!   ([`scheduler::Dispatcher`] over [`target::RemoteTarget`]), or
//! - an LSF batch queue ([`batch::BsubRunner`]), where the cluster
//!   scheduler does the dispatching for us.
//!
//! The dispatcher guarantees that an attempt is made to start every queued
//! command exactly once; it never observes task completion and makes no
//! ordering promises across targets.

pub mod batch;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod shutdown;
pub mod sweep;
pub mod target;
pub mod worker;

pub use config::{BatchConfig, DispatchConfig, PoolConfig, RemoteConfig};
pub use error::{ProbeError, Result, RunnerError, SessionError, StartError};
pub use scheduler::{CommandQueue, DispatchReport, Dispatcher};
pub use sweep::{make_commands, SweepSpec};
pub use target::{LocalTarget, RemoteTarget, Target};
pub use worker::LocalPool;
