//! The task value record and the two-phase state machine it is scheduled under.

use serde::{Deserialize, Serialize};

/// Which half of the job a task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskType {
    Map,
    Reduce,
}

/// Where a task currently sits in its lifecycle.
///
/// `Ready` -> `InProgress` on acquisition, `InProgress` -> `Finished` on a
/// completion report, or `InProgress` -> `Ready` on reclaim. A task that has
/// reached `Finished` never regresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Ready,
    InProgress,
    Finished,
}

/// The job-wide phase. Monotone: `Map` -> `Reduce` -> `Finished`, never backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    Map,
    Reduce,
    Finished,
}

/// A scheduling unit handed to a worker over RPC.
///
/// This is the *wire* representation: it is a value copy of whatever the
/// coordinator's internal record held at the moment of acquisition. The
/// coordinator-only reclaim deadline never appears here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Index in `[0, M)` for a map task, `[0, R)` for a reduce task.
    pub handle: usize,
    pub task_type: TaskType,
    pub input: Vec<String>,
    pub output: Vec<String>,
    pub status: TaskStatus,
    pub assignee: String,
}

impl Task {
    /// Build the `i`-th map task over `file`, per `spec.md` §3 and §6.
    pub fn new_map(handle: usize, file: String, n_reduce: usize) -> Self {
        Task {
            handle,
            task_type: TaskType::Map,
            input: vec![file],
            output: map_output_names(handle, n_reduce),
            status: TaskStatus::Ready,
            assignee: String::new(),
        }
    }

    /// Build the `i`-th reduce task, reading every map task's partition `i`.
    pub fn new_reduce(handle: usize, n_map: usize) -> Self {
        Task {
            handle,
            task_type: TaskType::Reduce,
            input: reduce_input_names(handle, n_map),
            output: vec![reduce_output_name(handle)],
            status: TaskStatus::Ready,
            assignee: String::new(),
        }
    }
}

/// Intermediate file a map task with the given handle writes for partition `i`.
pub fn map_intermediate_name(map_handle: usize, partition: usize) -> String {
    format!("mr-{map_handle}-{partition}")
}

/// The full set of `R` intermediate files a map task produces.
pub fn map_output_names(map_handle: usize, n_reduce: usize) -> Vec<String> {
    (0..n_reduce)
        .map(|i| map_intermediate_name(map_handle, i))
        .collect()
}

/// The `M` intermediate files a reduce task reads for its partition.
pub fn reduce_input_names(reduce_handle: usize, n_map: usize) -> Vec<String> {
    (0..n_map)
        .map(|j| map_intermediate_name(j, reduce_handle))
        .collect()
}

/// The single output file a reduce task produces.
pub fn reduce_output_name(reduce_handle: usize) -> String {
    format!("mr-out-{reduce_handle}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_task_outputs_are_exactly_r_partitions() {
        let t = Task::new_map(2, "pg-2.txt".into(), 3);
        assert_eq!(t.output, vec!["mr-2-0", "mr-2-1", "mr-2-2"]);
        assert_eq!(t.input, vec!["pg-2.txt"]);
        assert_eq!(t.status, TaskStatus::Ready);
        assert!(t.assignee.is_empty());
    }

    #[test]
    fn reduce_task_inputs_are_exactly_m_partitions() {
        let t = Task::new_reduce(1, 4);
        assert_eq!(t.input, vec!["mr-0-1", "mr-1-1", "mr-2-1", "mr-3-1"]);
        assert_eq!(t.output, vec!["mr-out-1"]);
    }

    #[test]
    fn phase_is_strictly_ordered() {
        assert!(Phase::Map < Phase::Reduce);
        assert!(Phase::Reduce < Phase::Finished);
    }
}
