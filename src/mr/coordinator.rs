//! The dispatcher / coordinator state machine (`spec.md` §4.2).
//!
//! Owns the authoritative task table, the ready queue, and `phase` behind
//! a single mutual-exclusion domain (`spec.md` §5's "one shared domain"),
//! rather than the teacher's one-`Mutex`-per-field scheme — see
//! `DESIGN.md` for why that source pattern needed re-architecting.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::future::{ready, Ready};
use tarpc::context;
use tracing::{info, warn};

use crate::mr::error::MrError;
use crate::mr::queue::TaskQueue;
use crate::mr::rpc::Server;
use crate::mr::task::{Phase, Task, TaskStatus, TaskType};

/// Default reclaim budget (`spec.md` §4.2).
pub const DEFAULT_RECLAIM_TIMEOUT: Duration = Duration::from_secs(10);

/// Coordinator-side bookkeeping for one task. `Task` itself is the wire
/// value; `deadline` and `generation` never leave the coordinator.
#[derive(Debug, Clone)]
struct TaskRecord {
    task: Task,
    deadline: Option<Instant>,
    /// Bumped on every acquisition and completion so a reclaim timer
    /// callback armed for a stale acquisition can recognize itself as
    /// stale (`spec.md` §4.2's generation-number design note).
    generation: u64,
}

impl TaskRecord {
    fn new(task: Task) -> Self {
        Self {
            task,
            deadline: None,
            generation: 0,
        }
    }
}

struct DispatcherState {
    map_tasks: Vec<TaskRecord>,
    reduce_tasks: Vec<TaskRecord>,
    queue: TaskQueue,
    phase: Phase,
    n_map: usize,
    n_reduce: usize,
    reclaim_timeout: Duration,
}

impl DispatcherState {
    fn records_mut(&mut self, task_type: TaskType) -> &mut Vec<TaskRecord> {
        match task_type {
            TaskType::Map => &mut self.map_tasks,
            TaskType::Reduce => &mut self.reduce_tasks,
        }
    }

    /// Re-evaluate the Map->Reduce->Finished barrier. Idempotent: running
    /// it when nothing changed is a no-op. Handles `M = 0` / `R = 0`
    /// falling straight through both transitions at construction time.
    fn advance_phase(&mut self) {
        loop {
            match self.phase {
                Phase::Map if self.map_tasks.iter().all(|r| r.task.status == TaskStatus::Finished) => {
                    for handle in 0..self.n_reduce {
                        let task = Task::new_reduce(handle, self.n_map);
                        self.reduce_tasks.push(TaskRecord::new(task));
                        self.queue.push((TaskType::Reduce, handle));
                    }
                    self.phase = Phase::Reduce;
                    info!(n_reduce = self.n_reduce, "map phase complete, entering reduce phase");
                }
                Phase::Reduce
                    if self
                        .reduce_tasks
                        .iter()
                        .all(|r| r.task.status == TaskStatus::Finished) =>
                {
                    self.phase = Phase::Finished;
                    info!("reduce phase complete, job finished");
                }
                _ => break,
            }
        }
    }
}

/// The dispatcher, shared between every RPC handler and every reclaim
/// timer. Cloning is cheap (an `Arc` bump) so `tarpc`'s per-connection
/// `Clone` requirement is free.
#[derive(Clone)]
pub struct Coordinator {
    state: Arc<Mutex<DispatcherState>>,
}

impl Coordinator {
    /// Construct a coordinator for `files` (one map task per file) and
    /// `n_reduce` reduce tasks, per `spec.md` §6's `MakeCoordinator`.
    pub fn new(files: Vec<String>, n_reduce: usize, reclaim_timeout: Duration) -> Self {
        let n_map = files.len();
        let map_tasks = files
            .into_iter()
            .enumerate()
            .map(|(handle, file)| TaskRecord::new(Task::new_map(handle, file, n_reduce)))
            .collect::<Vec<_>>();
        let mut queue = TaskQueue::new();
        for handle in 0..n_map {
            queue.push((TaskType::Map, handle));
        }

        let mut state = DispatcherState {
            map_tasks,
            reduce_tasks: Vec::new(),
            queue,
            phase: Phase::Map,
            n_map,
            n_reduce,
            reclaim_timeout,
        };
        // Drives straight through Map->Reduce->Finished when M = 0 (spec.md §8).
        state.advance_phase();

        Coordinator {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn with_default_reclaim_timeout(files: Vec<String>, n_reduce: usize) -> Self {
        Self::new(files, n_reduce, DEFAULT_RECLAIM_TIMEOUT)
    }

    /// `Done()` from `spec.md` §6: true iff the job has reached `Finished`.
    pub fn done(&self) -> bool {
        self.state.lock().unwrap().phase == Phase::Finished
    }

    /// `acquire` from `spec.md` §4.2.
    fn acquire(&self, worker_id: &str) -> Result<Task, MrError> {
        let mut guard = self.state.lock().unwrap();
        if guard.phase == Phase::Finished {
            return Err(MrError::NoTaskAvailable);
        }
        let Some((task_type, handle)) = guard.queue.pop() else {
            return Err(MrError::NoTaskAvailable);
        };

        let reclaim_timeout = guard.reclaim_timeout;
        let record = &mut guard.records_mut(task_type)[handle];
        record.task.status = TaskStatus::InProgress;
        record.task.assignee = worker_id.to_string();
        record.deadline = Some(Instant::now() + reclaim_timeout);
        record.generation += 1;
        let generation = record.generation;
        let task = record.task.clone();
        drop(guard);

        info!(?task_type, handle, worker_id, "acquired task");
        self.arm_reclaim_timer(task_type, handle, generation, reclaim_timeout);
        Ok(task)
    }

    /// `complete` from `spec.md` §4.2. Completing an already-`Finished`
    /// task is a benign no-op (late completion after reclaim).
    fn complete(&self, task_type: TaskType, handle: usize) -> Result<(), MrError> {
        let mut guard = self.state.lock().unwrap();
        let len = match task_type {
            TaskType::Map => guard.map_tasks.len(),
            TaskType::Reduce => guard.reduce_tasks.len(),
        };
        if handle >= len {
            return Err(MrError::ProtocolError(format!(
                "handle {handle} out of range for {len} {task_type:?} tasks"
            )));
        }

        let record = &mut guard.records_mut(task_type)[handle];
        if record.task.status == TaskStatus::Finished {
            // Late completion racing a reclaim that already won; benign.
            return Ok(());
        }
        record.task.status = TaskStatus::Finished;
        record.task.assignee.clear();
        record.deadline = None;
        record.generation += 1;
        info!(?task_type, handle, "task finished");

        guard.advance_phase();
        Ok(())
    }

    /// Revert an `InProgress` task to `Ready` if the timer's generation
    /// still matches — a stale callback (raced by a completion) is a
    /// silent no-op.
    fn reclaim(&self, task_type: TaskType, handle: usize, generation: u64) {
        let mut guard = self.state.lock().unwrap();
        let record = &mut guard.records_mut(task_type)[handle];
        if record.generation != generation || record.task.status != TaskStatus::InProgress {
            return;
        }
        warn!(?task_type, handle, assignee = %record.task.assignee, "reclaiming task after timeout");
        record.task.status = TaskStatus::Ready;
        record.task.assignee.clear();
        record.deadline = None;
        guard.queue.push((task_type, handle));
    }

    fn arm_reclaim_timer(&self, task_type: TaskType, handle: usize, generation: u64, timeout: Duration) {
        let coordinator = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            coordinator.reclaim(task_type, handle, generation);
        });
    }
}

#[tarpc::server]
impl Server for Coordinator {
    type GetTaskFut = Ready<Result<Task, MrError>>;
    type FinishFut = Ready<Result<(), MrError>>;

    fn get_task(self, _: context::Context, worker_id: String) -> Self::GetTaskFut {
        ready(self.acquire(&worker_id))
    }

    fn finish(self, _: context::Context, task_type: TaskType, handle: usize) -> Self::FinishFut {
        ready(self.complete(task_type, handle))
    }
}
