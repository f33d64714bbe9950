use serde::{Deserialize, Serialize};

/// Lifecycle states of one pipeline task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    /// Planned, waiting on producers
    Pending,
    /// Spawned on the runtime
    Running,
    /// Finished and artifacts recorded
    Completed,
    /// Finished with an error; the run aborts
    Failed,
}

/// States a task may move to from `from`.
///
/// Terminal states allow nothing; a run never restarts or retries a task.
pub fn allowed_transitions(from: TaskState) -> Vec<TaskState> {
    use TaskState::*;
    match from {
        Pending => vec![Running],
        Running => vec![Completed, Failed],
        Completed => vec![],
        Failed => vec![],
    }
}

pub fn transition_allowed(from: TaskState, to: TaskState) -> bool {
    allowed_transitions(from).into_iter().any(|s| s == to)
}
