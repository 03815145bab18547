//! The coordinator/worker error taxonomy (`spec.md` §7).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can cross the RPC boundary or surface inside a worker.
///
/// `NoTaskAvailable` is the only variant the coordinator ever returns from
/// an RPC handler; the rest describe worker-local failure modes that never
/// make it back to the coordinator (they manifest only as a missed
/// completion report, per `spec.md` §7's propagation rule).
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum MrError {
    /// The queue is empty: everything is in progress, the phase barrier
    /// hasn't released reduce tasks yet, or the job is finished. Transient.
    #[error("no task available")]
    NoTaskAvailable,

    /// The RPC call could not be delivered.
    #[error("transport error: {0}")]
    TransportError(String),

    /// An out-of-range handle or type mismatch. Indicates a caller bug.
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// Local I/O or user-function failure inside a worker. The worker
    /// abandons the task without reporting; the coordinator reclaims it
    /// after `T_reclaim`.
    #[error("worker fatal: {0}")]
    WorkerFatal(String),
}

pub type Result<T> = std::result::Result<T, MrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_task_available_round_trips_through_json() {
        let err = MrError::NoTaskAvailable;
        let encoded = serde_json::to_string(&err).unwrap();
        let decoded: MrError = serde_json::from_str(&encoded).unwrap();
        assert!(matches!(decoded, MrError::NoTaskAvailable));
    }
}
