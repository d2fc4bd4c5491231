//! Single-machine execution.
//!
//! When every command runs on this machine there is no ranking and no
//! session management; the [`LocalPool`] replaces the probe/connection pair
//! with a liveness check on its own slots.

pub mod pool;

pub use pool::{LocalPool, SlotState};
