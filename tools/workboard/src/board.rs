use crate::types::{status_label, status_rank, WorkerRecord, WorkerStatus};

/// The table always shows exactly this many rows; short lists are padded
/// with placeholders so the layout never jumps.
pub const VISIBLE_ROWS: usize = 10;

pub const PLACEHOLDER_CELL: &str = "--";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardRow {
    Worker {
        worker_id: String,
        task_description: String,
        status_label: &'static str,
        /// Only FAILED workers carry a completion action.
        has_action: bool,
    },
    Placeholder,
}

impl BoardRow {
    pub fn worker_id(&self) -> Option<&str> {
        match self {
            Self::Worker { worker_id, .. } => Some(worker_id),
            Self::Placeholder => None,
        }
    }

    pub fn has_action(&self) -> bool {
        matches!(self, Self::Worker { has_action: true, .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardView {
    /// Exactly `VISIBLE_ROWS` entries.
    pub rows: Vec<BoardRow>,
    pub not_shown_count: usize,
    pub frozen: bool,
}

impl BoardView {
    pub fn empty() -> Self {
        derive_board(&[], false)
    }

    /// Worker ids of rows that carry an action, in display order.
    pub fn action_row_ids(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter(|row| row.has_action())
            .filter_map(|row| row.worker_id().map(ToString::to_string))
            .collect()
    }
}

/// Derives the display model from a worker snapshot. Pure: the same input
/// always yields the same row sequence.
pub fn derive_board(workers: &[WorkerRecord], frozen: bool) -> BoardView {
    let mut sorted = workers.to_vec();
    // Stable sort on (rank, id); the id tie-break makes the order total, so
    // the output is deterministic for any input.
    sorted.sort_by(|a, b| {
        status_rank(&a.status)
            .cmp(&status_rank(&b.status))
            .then_with(|| a.worker_id.cmp(&b.worker_id))
    });

    let total = sorted.len();
    sorted.truncate(VISIBLE_ROWS);
    let not_shown_count = total.saturating_sub(sorted.len());

    let mut rows = sorted
        .into_iter()
        .map(|worker| BoardRow::Worker {
            has_action: WorkerStatus::parse(&worker.status) == Some(WorkerStatus::Failed),
            status_label: status_label(&worker.status),
            worker_id: worker.worker_id,
            task_description: worker.task_description,
        })
        .collect::<Vec<_>>();
    rows.resize(VISIBLE_ROWS, BoardRow::Placeholder);

    BoardView {
        rows,
        not_shown_count,
        frozen,
    }
}

pub fn freeze_button_label(frozen: bool) -> &'static str {
    if frozen {
        "Unfreeze Worker Creation"
    } else {
        "Freeze Worker Creation"
    }
}

pub fn not_shown_notice(not_shown_count: usize) -> Option<String> {
    if not_shown_count > 0 {
        Some(format!("{not_shown_count} workers not shown"))
    } else {
        None
    }
}
