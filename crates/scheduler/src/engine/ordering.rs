use std::collections::HashSet;

use powersched_core::Task;

use crate::error::RunError;

/// Order a run's tasks for execution: ascending priority, ties kept in
/// submission order.
///
/// Fails if a task id appears twice, since events must identify tasks
/// unambiguously.
pub fn execution_order(tasks: &[Task]) -> Result<Vec<Task>, RunError> {
    let mut seen = HashSet::with_capacity(tasks.len());
    for task in tasks {
        if !seen.insert(task.id()) {
            return Err(RunError::DuplicateTask(task.id()));
        }
    }

    let mut ordered = tasks.to_vec();
    // `sort_by_key` is stable.
    ordered.sort_by_key(|task| task.priority());
    Ok(ordered)
}
