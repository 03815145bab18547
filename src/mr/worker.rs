//! The worker loop (`spec.md` §4.4): executes one map or reduce task
//! locally and produces its outputs via atomic rename so a reduce reader
//! never observes a partially-written intermediate file.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use rayon::slice::ParallelSliceMut;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::mr::error::MrError;
use crate::mr::hash::partition;
use crate::mr::task::{Task, TaskType};

/// A single newline-delimited JSON record in an intermediate file, per
/// `spec.md` §6 ("self-delimited JSON-encoded record").
#[derive(Debug, Clone, Serialize, Deserialize)]
struct KeyValue {
    key: String,
    value: String,
}

/// A user-provided map function: `(filename, contents) -> [(key, value)]`.
pub type MapFn = fn(&str, &str) -> Vec<(String, String)>;
/// A user-provided reduce function: `(key, values) -> result`.
pub type ReduceFn = fn(&str, Vec<String>) -> String;

/// Executes map and reduce tasks in a working directory. One `Worker` is
/// used by exactly one worker process, so there is nothing to synchronize
/// here — see `spec.md` §4.4. All of a task's `input`/`output` filenames
/// are resolved relative to `working_dir`, so intermediate and temp files
/// land on the same filesystem as their final name (`persist` requires
/// this to be atomic).
pub struct Worker {
    working_dir: PathBuf,
    map_fn: MapFn,
    reduce_fn: ReduceFn,
}

impl Worker {
    /// A worker rooted at the current process's working directory.
    pub fn new(map_fn: MapFn, reduce_fn: ReduceFn) -> Self {
        Self::with_working_dir(".", map_fn, reduce_fn)
    }

    pub fn with_working_dir(working_dir: impl Into<PathBuf>, map_fn: MapFn, reduce_fn: ReduceFn) -> Self {
        Self {
            working_dir: working_dir.into(),
            map_fn,
            reduce_fn,
        }
    }

    fn resolve(&self, name: &str) -> PathBuf {
        self.working_dir.join(name)
    }

    /// Run whichever phase `task.task_type` names. A `WorkerFatal` error
    /// means the caller should abandon the task and let the coordinator
    /// reclaim it after `T_reclaim`, per `spec.md` §7.
    pub fn execute(&self, task: &Task) -> Result<(), MrError> {
        match task.task_type {
            TaskType::Map => self.execute_map(task),
            TaskType::Reduce => self.execute_reduce(task),
        }
    }

    fn execute_map(&self, task: &Task) -> Result<(), MrError> {
        let input_name = task
            .input
            .first()
            .ok_or_else(|| MrError::ProtocolError("map task with no input file".into()))?;
        let input_path = self.resolve(input_name);
        let contents = std::fs::read_to_string(&input_path)
            .map_err(|e| MrError::WorkerFatal(format!("reading {input_name}: {e}")))?;

        let pairs = (self.map_fn)(input_name, &contents);
        let n_reduce = task.output.len();

        let mut temp_files = (0..n_reduce)
            .map(|_| {
                tempfile::NamedTempFile::new_in(&self.working_dir)
                    .map_err(|e| MrError::WorkerFatal(format!("creating intermediate temp file: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (key, value) in pairs {
            let p = partition(&key, n_reduce);
            let record = KeyValue { key, value };
            let mut line = serde_json::to_string(&record)
                .map_err(|e| MrError::WorkerFatal(format!("encoding record: {e}")))?;
            line.push('\n');
            temp_files[p]
                .write_all(line.as_bytes())
                .map_err(|e| MrError::WorkerFatal(format!("writing partition {p}: {e}")))?;
        }

        for (temp_file, final_name) in temp_files.into_iter().zip(task.output.iter()) {
            temp_file
                .persist(self.resolve(final_name))
                .map_err(|e| MrError::WorkerFatal(format!("renaming into {final_name}: {e}")))?;
        }

        info!(handle = task.handle, partitions = n_reduce, "map task finished");
        Ok(())
    }

    fn execute_reduce(&self, task: &Task) -> Result<(), MrError> {
        let mut records = Vec::new();
        for name in &task.input {
            records.extend(self.read_intermediate_file(name)?);
        }

        // Stable parallel sort so contiguous-equal-key grouping below is
        // correct regardless of which map task a record came from.
        records.par_sort_by(|a, b| a.key.cmp(&b.key));

        let output_name = task
            .output
            .first()
            .ok_or_else(|| MrError::ProtocolError("reduce task with no output file".into()))?;
        let mut temp_file = tempfile::NamedTempFile::new_in(&self.working_dir)
            .map_err(|e| MrError::WorkerFatal(format!("creating output temp file: {e}")))?;

        let mut i = 0;
        while i < records.len() {
            let key = records[i].key.clone();
            let mut j = i;
            let mut values = Vec::new();
            while j < records.len() && records[j].key == key {
                values.push(records[j].value.clone());
                j += 1;
            }
            let result = (self.reduce_fn)(&key, values);
            writeln!(temp_file, "{key} {result}")
                .map_err(|e| MrError::WorkerFatal(format!("writing output line: {e}")))?;
            i = j;
        }

        temp_file
            .persist(self.resolve(output_name))
            .map_err(|e| MrError::WorkerFatal(format!("renaming into {output_name}: {e}")))?;

        info!(handle = task.handle, output = %output_name, "reduce task finished");
        Ok(())
    }

    fn read_intermediate_file(&self, name: &str) -> Result<Vec<KeyValue>, MrError> {
        let path = self.resolve(name);
        let file = File::open(&path).map_err(|e| MrError::WorkerFatal(format!("opening {name}: {e}")))?;
        BufReader::new(file)
            .lines()
            .filter(|line| !matches!(line, Ok(l) if l.is_empty()))
            .map(|line| {
                let line = line.map_err(|e| MrError::WorkerFatal(format!("reading {name}: {e}")))?;
                serde_json::from_str(&line)
                    .map_err(|e| MrError::WorkerFatal(format!("decoding record in {name}: {e}")))
            })
            .collect()
    }
}

/// A stable per-process worker identity (`spec.md` §4.4's `pid`).
pub fn worker_identity() -> String {
    std::process::id().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mr::function::wc;
    use crate::mr::task::TaskStatus;
    use std::fs;
    use std::path::Path;

    fn read_output_lines(dir: &Path, name: &str) -> Vec<String> {
        let contents = fs::read_to_string(dir.join(name)).unwrap();
        contents.lines().map(|l| l.to_string()).collect()
    }

    #[test]
    fn map_task_partitions_deterministically_and_atomically() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "foo bar foo").unwrap();

        let task = Task::new_map(0, "a.txt".to_string(), 2);
        let worker = Worker::with_working_dir(dir.path(), wc::map, wc::reduce);
        worker.execute(&task).unwrap();

        for output in &task.output {
            assert!(dir.path().join(output).exists(), "missing {output}");
        }
    }

    #[test]
    fn reduce_task_groups_and_sorts_by_key() {
        let dir = tempfile::tempdir().unwrap();

        // Hand-write two intermediate files as a map phase would have.
        fs::write(
            dir.path().join("mr-0-0"),
            "{\"key\":\"foo\",\"value\":\"1\"}\n{\"key\":\"bar\",\"value\":\"1\"}\n",
        )
        .unwrap();
        fs::write(dir.path().join("mr-1-0"), "{\"key\":\"foo\",\"value\":\"1\"}\n").unwrap();

        let task = Task {
            handle: 0,
            task_type: TaskType::Reduce,
            input: vec!["mr-0-0".to_string(), "mr-1-0".to_string()],
            output: vec!["mr-out-0".to_string()],
            status: TaskStatus::InProgress,
            assignee: "w1".to_string(),
        };
        let worker = Worker::with_working_dir(dir.path(), wc::map, wc::reduce);
        worker.execute(&task).unwrap();

        let lines = read_output_lines(dir.path(), "mr-out-0");
        assert_eq!(lines, vec!["bar 1".to_string(), "foo 2".to_string()]);
    }

    #[test]
    fn missing_intermediate_file_is_worker_fatal_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let task = Task::new_reduce(0, 1);
        let worker = Worker::with_working_dir(dir.path(), wc::map, wc::reduce);
        assert!(matches!(worker.execute(&task), Err(MrError::WorkerFatal(_))));
    }
}
