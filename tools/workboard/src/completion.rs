use crate::errors::WorkboardError;
use crate::logging::append_run_log;
use crate::service::WorkerService;
use serde_json::json;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;

/// Per-worker completion action state. One instance per failed row;
/// recreated from scratch whenever the worker re-enters the failed view,
/// so pending/error state is deliberately transient.
pub struct CompletionControl {
    worker_id: String,
    pending: bool,
    last_error: Option<String>,
    outcome_rx: Option<Receiver<Result<(), String>>>,
}

impl CompletionControl {
    pub fn new(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            pending: false,
            last_error: None,
            outcome_rx: None,
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn trigger_label(&self) -> &'static str {
        if self.pending {
            "Completing..."
        } else {
            "Complete"
        }
    }

    /// Starts the completion attempt. Callers gate on `is_pending` (the
    /// trigger is disabled while pending); the body itself does not
    /// re-guard.
    ///
    /// The outcome travels back over a channel: a reported failure arrives
    /// as a message, and a worker thread that dies without reporting drops
    /// the sender, which `poll` observes as a disconnect. Either way the
    /// attempt has an observable end, so `pending` always clears.
    pub fn activate(&mut self, service: &Arc<dyn WorkerService>) {
        append_run_log(
            "info",
            "completion.activated",
            json!({ "worker_id": self.worker_id }),
        );
        self.pending = true;
        self.last_error = None;

        let (outcome_tx, outcome_rx) = mpsc::channel();
        self.outcome_rx = Some(outcome_rx);

        let service = Arc::clone(service);
        let worker_id = self.worker_id.clone();
        thread::spawn(move || {
            let result = service.complete_worker(&worker_id).map_err(failure_reason);
            let _ = outcome_tx.send(result);
        });
    }

    /// Drains the outcome channel without blocking. Call once per event-loop
    /// iteration.
    pub fn poll(&mut self) {
        let Some(outcome_rx) = &self.outcome_rx else {
            return;
        };
        match outcome_rx.try_recv() {
            Ok(Ok(())) => {
                append_run_log(
                    "info",
                    "completion.succeeded",
                    json!({ "worker_id": self.worker_id }),
                );
                self.settle(None);
            }
            Ok(Err(reason)) => {
                append_run_log(
                    "warn",
                    "completion.failed",
                    json!({ "worker_id": self.worker_id, "reason": reason }),
                );
                self.settle(Some(reason));
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                append_run_log(
                    "error",
                    "completion.aborted",
                    json!({ "worker_id": self.worker_id }),
                );
                self.settle(Some("completion attempt aborted".to_string()));
            }
        }
    }

    fn settle(&mut self, error: Option<String>) {
        self.pending = false;
        self.outcome_rx = None;
        self.last_error = error.map(|reason| format!("Error: {reason}"));
    }
}

/// The inline display shows the service's reported reason, not the error
/// enum's wrapper text.
fn failure_reason(error: WorkboardError) -> String {
    match error {
        WorkboardError::Service(reason) => reason,
        other => other.to_string(),
    }
}
