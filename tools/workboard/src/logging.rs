use crate::errors::WorkboardError;
use serde::Serialize;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct JsonlLogger {
    pub path: PathBuf,
    pub max_payload_bytes: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEvent<'a> {
    pub level: &'a str,
    pub event_type: &'a str,
    pub payload: Value,
}

impl JsonlLogger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_payload_bytes: 4096,
        }
    }

    pub fn append(&self, event: &LogEvent<'_>) -> Result<(), WorkboardError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| WorkboardError::Io(e.to_string()))?;
        }
        let truncated = truncate_json(event.payload.clone(), self.max_payload_bytes);
        let line = serde_json::to_string(&LogEvent {
            level: event.level,
            event_type: event.event_type,
            payload: truncated,
        })
        .map_err(|e| WorkboardError::Io(e.to_string()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| WorkboardError::Io(e.to_string()))?;
        file.write_all(line.as_bytes())
            .map_err(|e| WorkboardError::Io(e.to_string()))?;
        file.write_all(b"\n")
            .map_err(|e| WorkboardError::Io(e.to_string()))?;
        Ok(())
    }
}

static RUN_LOGGER: OnceLock<JsonlLogger> = OnceLock::new();

/// Installs the process-wide run logger. Later calls are ignored; the first
/// caller wins (relevant only to tests that share a process).
pub fn init_run_logger(path: impl AsRef<Path>) {
    let _ = RUN_LOGGER.set(JsonlLogger::new(path));
}

/// Appends a structured event to the run log. Best-effort: a missing logger
/// or a write failure never surfaces to the caller.
pub fn append_run_log(level: &str, event_type: &str, payload: Value) {
    if let Some(logger) = RUN_LOGGER.get() {
        let _ = logger.append(&LogEvent {
            level,
            event_type,
            payload,
        });
    }
}

pub fn structured_fallback_line(worker_id: &str, state: &str, message: &str) -> String {
    format!(
        "worker_id={worker_id} state={state} message={} ",
        message.replace('\n', "\\n")
    )
}

fn truncate_json(value: Value, max_bytes: usize) -> Value {
    let rendered = serde_json::to_string(&value).unwrap_or_default();
    if rendered.len() <= max_bytes {
        return value;
    }
    let mut truncated = rendered;
    truncated.truncate(max_bytes.saturating_sub(3));
    Value::String(format!("{truncated}..."))
}
