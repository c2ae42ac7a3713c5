use std::num::IntErrorKind;

use serde::Serialize;

use crate::error::TaskError;

/// Identifier assigned by the task queue. Starts at 1, never reused.
pub type TaskId = u64;

/// A unit of simulated work. Lower `priority` values run first.
///
/// Fields are private so every `Task` in the system has passed
/// [`Task::new`] validation: `priority > 0` and `execution_time > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Task {
    id: TaskId,
    priority: u32,
    execution_time: u32,
}

impl Task {
    /// Validate raw numeric input and build a task.
    pub fn new(id: TaskId, priority: i64, execution_time: i64) -> Result<Self, TaskError> {
        Ok(Self {
            id,
            priority: positive(priority)?,
            execution_time: positive(execution_time)?,
        })
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    /// Expected workload duration, in scheduler time units.
    pub fn execution_time(&self) -> u32 {
        self.execution_time
    }
}

fn positive(value: i64) -> Result<u32, TaskError> {
    if value <= 0 {
        return Err(TaskError::NotPositive);
    }
    u32::try_from(value).map_err(|_| TaskError::OutOfRange)
}

/// Parse one text field of the submission form into an integer.
///
/// Surrounding whitespace is ignored. Empty input and anything that is
/// not a whole number are rejected; sign checks happen in [`Task::new`].
pub fn parse_field(text: &str) -> Result<i64, TaskError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(TaskError::MissingField);
    }
    trimmed.parse::<i64>().map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => TaskError::OutOfRange,
        _ => TaskError::NotAnInteger,
    })
}
