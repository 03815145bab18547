//! The RPC surface (`spec.md` §4.3): two request/response operations bound
//! over a local transport via `tarpc`, the same RPC framework the teacher
//! crate used over TCP — here pinned to a Unix domain socket per
//! `spec.md` §6.

use crate::mr::error::MrError;
use crate::mr::task::{Task, TaskType};

/// Thin RPC wrapper over the dispatcher's `acquire`/`complete` operations.
/// Message shapes are flat, with no nested optionals and no version
/// negotiation, per `spec.md` §4.3.
#[tarpc::service]
pub trait Server {
    /// `GetTask`: acquire the next ready task for `worker_id`, or
    /// `NoTaskAvailable` if the queue is empty or the job is finished.
    async fn get_task(worker_id: String) -> Result<Task, MrError>;

    /// `Finish`: report that `(task_type, handle)` completed. Always
    /// succeeds at the protocol level unless `handle` is out of range.
    async fn finish(task_type: TaskType, handle: usize) -> Result<(), MrError>;
}

/// The path a coordinator listens on and workers connect to, per
/// `spec.md` §6: `/var/tmp/824-mr-<uid>`, unless overridden.
pub fn default_socket_path() -> String {
    format!("/var/tmp/824-mr-{}", nix::unistd::getuid())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_path_is_under_var_tmp() {
        let path = default_socket_path();
        assert!(path.starts_with("/var/tmp/824-mr-"));
    }
}
