use powersched_core::{TaskError, TaskId};

/// Errors surfaced to the caller of the scheduler controller.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Input error: {0}")]
    Input(#[from] TaskError),

    #[error("Busy: {0}")]
    Busy(&'static str),

    #[error("No tasks: please add some tasks before scheduling.")]
    EmptyRun,

    #[error("failed to spawn scheduler worker: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Fatal failure of a single run. The run is aborted; the scheduler
/// itself returns to the ready state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunError {
    #[error("task {0} appears more than once in the run")]
    DuplicateTask(TaskId),

    #[error("execution time of task {task_id} overflows the configured time unit")]
    DurationOverflow { task_id: TaskId },

    #[error("scheduler worker panicked: {0}")]
    Panicked(String),
}

impl RunError {
    /// Build a [`RunError::Panicked`] from a caught panic payload.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        RunError::Panicked(message)
    }
}
