//! Scheduling engine -- drives one run over a task snapshot.
//!
//! Split into focused submodules:
//! - `core`: SchedulerEngine struct, constructor, and event emission
//! - `ordering`: run validation and stable priority ordering
//! - `execution`: the per-task pacing and simulated execution loop

mod core;
mod execution;
mod ordering;

pub use self::core::SchedulerEngine;
pub use self::ordering::execution_order;
