use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use powersched_core::Task;

use crate::error::RunError;

/// Immutable snapshot of tasks handed to one engine run.
#[derive(Debug, Clone)]
pub struct ScheduleRun {
    id: Uuid,
    tasks: Vec<Task>,
}

impl ScheduleRun {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tasks,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Tasks in submission order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Totals for a completed run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub tasks_executed: usize,
    pub tasks_throttled: usize,
    pub sample_failures: usize,
    /// Clock time from `RunStarted` to `RunIdle`.
    pub elapsed: Duration,
}

/// Terminal result of [`SchedulerEngine::run`](crate::engine::SchedulerEngine::run).
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Success(RunSummary),
    /// Nothing to schedule; a notice was emitted and no run started.
    Empty,
    Failed(RunError),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success(_))
    }

    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            RunOutcome::Success(summary) => Some(summary),
            _ => None,
        }
    }
}
