use powersched_core::task::parse_field;
use powersched_core::{Task, TaskError, TaskId};

/// Authoritative list of submitted tasks for a session.
///
/// Tasks keep insertion order (for display); scheduling order is decided
/// by the engine. Ids start at 1 and are never reused, even across
/// [`reset`](TaskQueue::reset).
#[derive(Debug)]
pub struct TaskQueue {
    tasks: Vec<Task>,
    next_id: TaskId,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            next_id: 1,
        }
    }

    /// Validate and append a task, returning the created value.
    ///
    /// The queue is left untouched when validation fails.
    pub fn submit(&mut self, priority: i64, execution_time: i64) -> Result<Task, TaskError> {
        let task = Task::new(self.next_id, priority, execution_time)?;
        self.next_id += 1;
        self.tasks.push(task);
        Ok(task)
    }

    /// Submit from raw text fields, as typed into a form or console.
    pub fn submit_text(&mut self, priority: &str, execution_time: &str) -> Result<Task, TaskError> {
        // Both fields must be present before either is interpreted.
        if priority.trim().is_empty() || execution_time.trim().is_empty() {
            return Err(TaskError::MissingField);
        }
        let priority = parse_field(priority)?;
        let execution_time = parse_field(execution_time)?;
        self.submit(priority, execution_time)
    }

    /// Independent copy of all tasks, insertion order.
    pub fn snapshot(&self) -> Vec<Task> {
        self.tasks.clone()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Drop all submitted tasks. The id counter keeps counting.
    pub fn reset(&mut self) {
        self.tasks.clear();
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_sequential_from_one() {
        let mut queue = TaskQueue::new();
        let ids: Vec<TaskId> = (0..5)
            .map(|i| queue.submit(i + 1, 2).unwrap().id())
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn rejected_submission_leaves_queue_unchanged() {
        let mut queue = TaskQueue::new();
        queue.submit(1, 1).unwrap();

        assert_eq!(queue.submit(0, 5), Err(TaskError::NotPositive));
        assert_eq!(queue.submit(2, -1), Err(TaskError::NotPositive));
        assert_eq!(queue.submit_text("x", "5"), Err(TaskError::NotAnInteger));
        assert_eq!(queue.submit_text("2", "2.5"), Err(TaskError::NotAnInteger));
        assert_eq!(queue.submit_text("", "5"), Err(TaskError::MissingField));
        assert_eq!(queue.submit_text("abc", " "), Err(TaskError::MissingField));

        assert_eq!(queue.len(), 1);
        // Failed submissions never consumed an id.
        assert_eq!(queue.submit(2, 2).unwrap().id(), 2);
    }

    #[test]
    fn submit_text_accepts_padded_integers() {
        let mut queue = TaskQueue::new();
        let task = queue.submit_text(" 3 ", "10").unwrap();
        assert_eq!(task.priority(), 3);
        assert_eq!(task.execution_time(), 10);
    }

    #[test]
    fn snapshot_does_not_alias_queue() {
        let mut queue = TaskQueue::new();
        queue.submit(2, 1).unwrap();
        let snapshot = queue.snapshot();

        queue.submit(1, 1).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id(), 1);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn reset_keeps_id_counter() {
        let mut queue = TaskQueue::new();
        queue.submit(1, 1).unwrap();
        queue.submit(1, 1).unwrap();
        queue.reset();

        assert!(queue.is_empty());
        assert_eq!(queue.submit(1, 1).unwrap().id(), 3);
    }
}
