use std::collections::VecDeque;

use crate::types::QueuedTask;

/// FIFO of requests waiting for the single generation slot.
#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: VecDeque<QueuedTask>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task and return its 1-based position.
    pub fn push(&mut self, task: QueuedTask) -> usize {
        self.tasks.push_back(task);
        self.tasks.len()
    }

    pub fn pop_front(&mut self) -> Option<QueuedTask> {
        self.tasks.pop_front()
    }

    /// Remove a waiting task by id.
    pub fn remove(&mut self, task_id: &str) -> Option<QueuedTask> {
        let index = self.tasks.iter().position(|t| t.id == task_id)?;
        self.tasks.remove(index)
    }

    /// Drop every waiting task, returning them in queue order.
    pub fn clear(&mut self) -> Vec<QueuedTask> {
        self.tasks.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn snapshot(&self) -> Vec<QueuedTask> {
        self.tasks.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GenerationRequest;

    fn task(prompt: &str) -> QueuedTask {
        QueuedTask::new(GenerationRequest::new(prompt))
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = TaskQueue::new();
        assert_eq!(queue.push(task("a")), 1);
        assert_eq!(queue.push(task("b")), 2);
        assert_eq!(queue.pop_front().unwrap().request.prompt, "a");
        assert_eq!(queue.pop_front().unwrap().request.prompt, "b");
        assert!(queue.pop_front().is_none());
    }

    #[test]
    fn test_remove_by_id() {
        let mut queue = TaskQueue::new();
        let keep = task("keep");
        let drop = task("drop");
        let drop_id = drop.id.clone();
        queue.push(keep);
        queue.push(drop);

        assert!(queue.remove(&drop_id).is_some());
        assert!(queue.remove(&drop_id).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_clear_returns_tasks_in_order() {
        let mut queue = TaskQueue::new();
        queue.push(task("a"));
        queue.push(task("b"));
        let cleared: Vec<_> = queue.clear().into_iter().map(|t| t.request.prompt).collect();
        assert_eq!(cleared, vec!["a", "b"]);
        assert!(queue.is_empty());
    }
}
