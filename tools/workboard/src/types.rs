use serde::{Deserialize, Serialize};

/// Snapshot of one delegated-work record as returned by the service layer.
///
/// `status` is carried as the raw stored string: the board tolerates values
/// outside the known set (schema drift) by rendering them as "Unknown"
/// instead of failing, so parsing happens at the view edge, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRecord {
    pub worker_id: String,
    pub task_description: String,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    NotStarted,
    InProgress,
    Completed,
    Failed,
}

/// Sort rank for statuses the board does not recognize: after everything
/// known, so the order stays total.
pub const UNKNOWN_STATUS_RANK: u8 = 4;

impl WorkerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "not_started" => Some(Self::NotStarted),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::NotStarted => "Not Started",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }

    /// Failed work is surfaced first so operators see what needs attention.
    pub fn sort_rank(self) -> u8 {
        match self {
            Self::Failed => 0,
            Self::NotStarted => 1,
            Self::InProgress => 2,
            Self::Completed => 3,
        }
    }
}

pub fn status_rank(raw: &str) -> u8 {
    WorkerStatus::parse(raw)
        .map(WorkerStatus::sort_rank)
        .unwrap_or(UNKNOWN_STATUS_RANK)
}

pub fn status_label(raw: &str) -> &'static str {
    WorkerStatus::parse(raw)
        .map(WorkerStatus::label)
        .unwrap_or("Unknown")
}
