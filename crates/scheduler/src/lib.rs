//! Load-aware priority task scheduler.
//!
//! Tasks are submitted to a [`Scheduler`], which owns the [`TaskQueue`] and
//! the busy flag. A run snapshots the queue and hands it to the
//! [`SchedulerEngine`] on a worker thread; the engine orders tasks by
//! priority, backs off when the [`LoadSampler`] reports high CPU load, and
//! publishes every lifecycle step to a [`ReportSink`].

pub mod clock;
pub mod controller;
pub mod engine;
pub mod error;
pub mod event;
pub mod metrics;
pub mod queue;
pub mod sampler;
pub mod sink;
pub mod status;
pub mod types;

pub use clock::{Clock, SystemClock, VirtualClock};
pub use controller::{RunHandle, Scheduler};
pub use engine::SchedulerEngine;
pub use error::{RunError, SchedulerError};
pub use event::{EventKind, SchedulerEvent};
pub use metrics::{MetricsSink, SchedulerMetrics};
pub use queue::TaskQueue;
pub use sampler::{FixedLoadSampler, LoadSample, LoadSampler, SampleError, SystemLoadSampler};
pub use sink::{ChannelSink, FanoutSink, MemorySink, ReportSink, TracingSink};
pub use status::StatusMonitor;
pub use types::{RunOutcome, RunSummary, ScheduleRun};

pub use powersched_core::{SchedulerConfig, Task, TaskError, TaskId};
