//! Scheduler lifecycle events.
//!
//! The engine, controller, and status monitor publish these to a
//! [`ReportSink`](crate::sink::ReportSink). `Display` renders the human log
//! line; serde renders the JSON wire form.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use powersched_core::TaskId;

/// A timestamped event envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerEvent {
    /// Run the event belongs to; `None` for session-level events.
    pub run_id: Option<Uuid>,
    /// Wall-clock emission time.
    pub timestamp: DateTime<Utc>,
    /// Scheduler clock reading at emission, in milliseconds.
    pub offset_ms: u64,
    pub kind: EventKind,
}

impl SchedulerEvent {
    pub fn new(run_id: Option<Uuid>, offset: Duration, kind: EventKind) -> Self {
        Self {
            run_id,
            timestamp: Utc::now(),
            offset_ms: u64::try_from(offset.as_millis()).unwrap_or(u64::MAX),
            kind,
        }
    }
}

impl fmt::Display for SchedulerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp.format("%H:%M:%S"), self.kind)
    }
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// A task was accepted by the queue.
    TaskSubmitted {
        task_id: TaskId,
        priority: u32,
        /// In time units.
        execution_time: u32,
        /// `execution_time` converted with the configured time unit.
        expected_secs: f64,
    },
    /// Informational message (run accepted, nothing to do, ...).
    Notice { message: String },
    RunStarted { task_count: usize, core_count: usize },
    LoadSampled {
        task_id: TaskId,
        utilization: f32,
        /// True for the re-sample taken after a throttle backoff.
        after_backoff: bool,
    },
    Throttled { task_id: TaskId, utilization: f32 },
    TaskStarted {
        task_id: TaskId,
        priority: u32,
        execution_time: u32,
        expected_secs: f64,
    },
    TaskCompleted {
        task_id: TaskId,
        /// Measured wall time in seconds, rounded to two decimals.
        duration_secs: f64,
    },
    RunFinished { tasks_executed: usize },
    RunIdle,
    Warning {
        task_id: Option<TaskId>,
        message: String,
    },
    Failed { message: String },
    /// The busy flag was released; submissions are accepted again.
    SchedulerReady,
    /// Periodic status reading, published independently of runs.
    StatusSampled {
        core_count: usize,
        utilization: Option<f32>,
    },
}

impl EventKind {
    /// Stable snake_case name, matching the serialized `type` tag.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::TaskSubmitted { .. } => "task_submitted",
            EventKind::Notice { .. } => "notice",
            EventKind::RunStarted { .. } => "run_started",
            EventKind::LoadSampled { .. } => "load_sampled",
            EventKind::Throttled { .. } => "throttled",
            EventKind::TaskStarted { .. } => "task_started",
            EventKind::TaskCompleted { .. } => "task_completed",
            EventKind::RunFinished { .. } => "run_finished",
            EventKind::RunIdle => "run_idle",
            EventKind::Warning { .. } => "warning",
            EventKind::Failed { .. } => "failed",
            EventKind::SchedulerReady => "scheduler_ready",
            EventKind::StatusSampled { .. } => "status_sampled",
        }
    }

    /// Task the event refers to, if any.
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            EventKind::TaskSubmitted { task_id, .. }
            | EventKind::LoadSampled { task_id, .. }
            | EventKind::Throttled { task_id, .. }
            | EventKind::TaskStarted { task_id, .. }
            | EventKind::TaskCompleted { task_id, .. } => Some(*task_id),
            EventKind::Warning { task_id, .. } => *task_id,
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::TaskSubmitted {
                task_id,
                priority,
                expected_secs,
                ..
            } => write!(
                f,
                "Added Task {} (Prio: {}, Time: {}s)",
                task_id, priority, expected_secs
            ),
            EventKind::Notice { message } => write!(f, "{}", message),
            EventKind::RunStarted {
                task_count,
                core_count,
            } => write!(
                f,
                "=== Scheduling {} tasks (sorted by priority) | Detected cores: {} ===",
                task_count, core_count
            ),
            EventKind::LoadSampled {
                utilization,
                after_backoff: false,
                ..
            } => write!(f, "Current CPU Load: {:.1}%", utilization),
            EventKind::LoadSampled {
                utilization,
                after_backoff: true,
                ..
            } => write!(f, "CPU Load after delay: {:.1}%", utilization),
            EventKind::Throttled {
                task_id,
                utilization,
            } => write!(
                f,
                "!! High CPU ({:.1}%)! Delaying Task {}...",
                utilization, task_id
            ),
            EventKind::TaskStarted {
                task_id,
                priority,
                expected_secs,
                ..
            } => write!(
                f,
                "--> Executing Task {} | Prio: {} | Time: {}s",
                task_id, priority, expected_secs
            ),
            EventKind::TaskCompleted {
                task_id,
                duration_secs,
            } => write!(
                f,
                "<-- Task {} completed in {:.2} seconds.",
                task_id, duration_secs
            ),
            EventKind::RunFinished { tasks_executed } => {
                write!(f, "=== All {} tasks executed. ===", tasks_executed)
            }
            EventKind::RunIdle => write!(f, "CPU entering low-power mode."),
            EventKind::Warning { message, .. } => write!(f, "Warning: {}", message),
            EventKind::Failed { message } => {
                write!(f, "!!! ERROR during scheduling: {} !!!", message)
            }
            EventKind::SchedulerReady => {
                write!(f, "Scheduler finished. Ready for more tasks.")
            }
            EventKind::StatusSampled {
                core_count,
                utilization: Some(load),
            } => write!(f, "CPU Cores: {} | CPU Load: {:.1}%", core_count, load),
            EventKind::StatusSampled {
                core_count,
                utilization: None,
            } => write!(f, "CPU Cores: {} | CPU Load: Error", core_count),
        }
    }
}
