use crate::errors::WorkboardError;
use crate::store::{system_time_unix_ms, WorkerStore};
use crate::types::WorkerRecord;
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// How long a manually completed worker stays listed before the service
/// removes it.
pub const COMPLETED_RETENTION_MS: i64 = 30_000;

/// The remote data layer the board consumes. Implementations own the worker
/// collection and the freeze flag; the board only reads snapshots and
/// requests mutations.
pub trait WorkerService: Send + Sync {
    fn list_workers(&self) -> Result<Vec<WorkerRecord>, WorkboardError>;
    fn is_frozen(&self) -> Result<bool, WorkboardError>;
    fn set_frozen(&self, frozen: bool) -> Result<(), WorkboardError>;
    fn complete_worker(&self, worker_id: &str) -> Result<(), WorkboardError>;
}

pub struct SqliteWorkerService {
    store: Arc<WorkerStore>,
    completion_hold: Duration,
}

impl SqliteWorkerService {
    pub fn new(store: Arc<WorkerStore>, completion_hold: Duration) -> Self {
        Self {
            store,
            completion_hold,
        }
    }
}

impl WorkerService for SqliteWorkerService {
    fn list_workers(&self) -> Result<Vec<WorkerRecord>, WorkboardError> {
        self.store.list_workers()
    }

    fn is_frozen(&self) -> Result<bool, WorkboardError> {
        self.store.is_frozen()
    }

    fn set_frozen(&self, frozen: bool) -> Result<(), WorkboardError> {
        self.store.set_frozen(frozen)
    }

    fn complete_worker(&self, worker_id: &str) -> Result<(), WorkboardError> {
        let now = system_time_unix_ms();
        let known = self
            .store
            .complete_worker(worker_id, now + COMPLETED_RETENTION_MS)?;
        if !known {
            return Err(WorkboardError::Service(format!(
                "unknown worker {worker_id}"
            )));
        }
        // Keep the attempt observable on the board before reporting done.
        if !self.completion_hold.is_zero() {
            std::thread::sleep(self.completion_hold);
        }
        Ok(())
    }
}

#[derive(Default)]
struct CompletionGate {
    held: Mutex<bool>,
    released: Condvar,
}

/// Scriptable service for tests: fixed snapshots, queued completion
/// outcomes, an optional gate that holds completions in flight, and call
/// recording.
#[derive(Default, Clone)]
pub struct FakeWorkerService {
    workers: Arc<Mutex<Vec<WorkerRecord>>>,
    frozen: Arc<Mutex<bool>>,
    list_error: Arc<Mutex<Option<String>>>,
    set_frozen_error: Arc<Mutex<Option<String>>>,
    set_frozen_calls: Arc<Mutex<Vec<bool>>>,
    complete_outcomes: Arc<Mutex<VecDeque<Result<(), String>>>>,
    complete_calls: Arc<Mutex<Vec<String>>>,
    gate: Arc<CompletionGate>,
}

impl FakeWorkerService {
    pub fn with_workers(workers: Vec<WorkerRecord>) -> Self {
        let service = Self::default();
        service.set_workers(workers);
        service
    }

    pub fn set_workers(&self, workers: Vec<WorkerRecord>) {
        *self.workers.lock().expect("workers lock") = workers;
    }

    pub fn set_frozen_state(&self, frozen: bool) {
        *self.frozen.lock().expect("frozen lock") = frozen;
    }

    pub fn fail_next_list(&self, reason: impl Into<String>) {
        *self.list_error.lock().expect("list error lock") = Some(reason.into());
    }

    pub fn fail_set_frozen(&self, reason: impl Into<String>) {
        *self.set_frozen_error.lock().expect("freeze error lock") = Some(reason.into());
    }

    /// Queues the outcome for the next `complete_worker` call. Without a
    /// queued outcome, completions succeed.
    pub fn push_complete_outcome(&self, outcome: Result<(), String>) {
        self.complete_outcomes
            .lock()
            .expect("outcomes lock")
            .push_back(outcome);
    }

    /// Makes `complete_worker` block until `release_completions` is called,
    /// so tests can observe the in-flight state.
    pub fn hold_completions(&self) {
        *self.gate.held.lock().expect("gate lock") = true;
    }

    pub fn release_completions(&self) {
        *self.gate.held.lock().expect("gate lock") = false;
        self.gate.released.notify_all();
    }

    pub fn set_frozen_calls(&self) -> Vec<bool> {
        self.set_frozen_calls.lock().expect("calls lock").clone()
    }

    pub fn complete_calls(&self) -> Vec<String> {
        self.complete_calls.lock().expect("calls lock").clone()
    }
}

impl WorkerService for FakeWorkerService {
    fn list_workers(&self) -> Result<Vec<WorkerRecord>, WorkboardError> {
        if let Some(reason) = self.list_error.lock().expect("list error lock").take() {
            return Err(WorkboardError::Service(reason));
        }
        Ok(self.workers.lock().expect("workers lock").clone())
    }

    fn is_frozen(&self) -> Result<bool, WorkboardError> {
        Ok(*self.frozen.lock().expect("frozen lock"))
    }

    fn set_frozen(&self, frozen: bool) -> Result<(), WorkboardError> {
        if let Some(reason) = self.set_frozen_error.lock().expect("freeze error lock").take() {
            return Err(WorkboardError::Service(reason));
        }
        self.set_frozen_calls
            .lock()
            .expect("calls lock")
            .push(frozen);
        *self.frozen.lock().expect("frozen lock") = frozen;
        Ok(())
    }

    fn complete_worker(&self, worker_id: &str) -> Result<(), WorkboardError> {
        self.complete_calls
            .lock()
            .expect("calls lock")
            .push(worker_id.to_string());

        let mut held = self.gate.held.lock().expect("gate lock");
        while *held {
            held = self.gate.released.wait(held).expect("gate wait");
        }
        drop(held);

        match self
            .complete_outcomes
            .lock()
            .expect("outcomes lock")
            .pop_front()
        {
            Some(Ok(())) | None => Ok(()),
            Some(Err(reason)) => Err(WorkboardError::Service(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        FakeWorkerService, SqliteWorkerService, WorkerService, COMPLETED_RETENTION_MS,
    };
    use crate::store::{NewWorker, WorkerStore};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn sqlite_service_completes_known_workers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(WorkerStore::open(dir.path().join("board.sqlite")).expect("open"));
        store
            .create(
                NewWorker {
                    worker_id: "w-1".to_string(),
                    task_description: "debug the cache".to_string(),
                    start_at: None,
                },
                1,
            )
            .expect("create");

        let service = SqliteWorkerService::new(Arc::clone(&store), Duration::ZERO);
        service.complete_worker("w-1").expect("complete");
        assert_eq!(store.list_workers().expect("list")[0].status, "completed");

        let error = service.complete_worker("w-missing").expect_err("unknown");
        assert!(error.to_string().contains("unknown worker w-missing"));
    }

    #[test]
    fn sqlite_service_schedules_completed_removal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(WorkerStore::open(dir.path().join("board.sqlite")).expect("open"));
        store
            .create(
                NewWorker {
                    worker_id: "w-1".to_string(),
                    task_description: "reboot the firewall".to_string(),
                    start_at: None,
                },
                1,
            )
            .expect("create");

        let service = SqliteWorkerService::new(Arc::clone(&store), Duration::ZERO);
        let before = crate::store::system_time_unix_ms();
        service.complete_worker("w-1").expect("complete");

        // Removal is due no earlier than the retention window from the call.
        let due_early = store
            .due_removals(before + COMPLETED_RETENTION_MS - 1)
            .expect("due");
        assert!(due_early.is_empty());
    }

    #[test]
    fn fake_service_replays_queued_outcomes() {
        let service = FakeWorkerService::default();
        service.push_complete_outcome(Err("timeout".to_string()));

        let error = service.complete_worker("w-1").expect_err("queued failure");
        assert!(error.to_string().contains("timeout"));
        // Queue drained: the next call succeeds.
        service.complete_worker("w-1").expect("default success");
        assert_eq!(service.complete_calls(), vec!["w-1", "w-1"]);
    }
}
