use crate::types::{Task, TaskId, TaskStatus};
use std::collections::HashMap;

/// Insertion-ordered task store with dependency lookups.
pub struct TaskQueue {
    tasks: Vec<Task>,
    index: HashMap<TaskId, usize>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Add a task. A task whose id is already queued is left untouched, so
    /// creating identical tasks twice is a no-op. Returns whether it was inserted.
    pub fn add(&mut self, task: Task) -> bool {
        if self.index.contains_key(&task.id) {
            return false;
        }
        self.index.insert(task.id.clone(), self.tasks.len());
        self.tasks.push(task);
        true
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.index.get(id).map(|&i| &self.tasks[i])
    }

    pub fn get_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.index.get(id).map(|&i| &mut self.tasks[i])
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.index.contains_key(id)
    }

    /// All tasks in creation order.
    pub fn all_tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Dependencies of `task` that are not COMPLETED. Unknown ids count as blocking.
    pub fn blocking_dependencies(&self, task: &Task) -> Vec<TaskId> {
        task.dependencies
            .iter()
            .filter(|dep| self.get(dep).map(|t| t.status) != Some(TaskStatus::Completed))
            .cloned()
            .collect()
    }

    pub fn dependencies_met(&self, task: &Task) -> bool {
        self.blocking_dependencies(task).is_empty()
    }

    pub fn count_status(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }

    pub fn pending_count(&self) -> usize {
        self.count_status(TaskStatus::Pending)
    }

    pub fn completed_count(&self) -> usize {
        self.count_status(TaskStatus::Completed)
    }

    pub fn total_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Check for cycles in the dependency graph.
    pub fn has_cycle(&self) -> bool {
        let mut visited = HashMap::new();
        self.tasks
            .iter()
            .any(|t| self.dfs_cycle(&t.id, &mut visited))
    }

    fn dfs_cycle<'a>(&'a self, id: &'a TaskId, visited: &mut HashMap<&'a TaskId, u8>) -> bool {
        match visited.get(id) {
            Some(1) => return true,  // back edge
            Some(2) => return false, // already processed
            _ => {}
        }
        visited.insert(id, 1);
        if let Some(task) = self.get(id) {
            for dep in &task.dependencies {
                if self.dfs_cycle(dep, visited) {
                    return true;
                }
            }
        }
        visited.insert(id, 2);
        false
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
