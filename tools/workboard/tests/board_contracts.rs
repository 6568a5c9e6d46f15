use workboard::board::{derive_board, BoardRow, VISIBLE_ROWS};
use workboard::types::WorkerRecord;

fn worker(id: &str, status: &str) -> WorkerRecord {
    WorkerRecord {
        worker_id: id.to_string(),
        task_description: format!("task {id}"),
        status: status.to_string(),
    }
}

fn shown_ids(rows: &[BoardRow]) -> Vec<&str> {
    rows.iter().filter_map(BoardRow::worker_id).collect()
}

#[test]
fn table_always_has_exactly_ten_rows() {
    for count in [0usize, 1, 9, 10, 11, 25] {
        let workers = (0..count)
            .map(|i| worker(&format!("w-{i:02}"), "in_progress"))
            .collect::<Vec<_>>();
        let view = derive_board(&workers, false);
        assert_eq!(view.rows.len(), VISIBLE_ROWS, "count={count}");
    }
}

#[test]
fn short_lists_pad_with_placeholders_and_no_overflow_notice() {
    let workers = (0..4)
        .map(|i| worker(&format!("w-{i}"), "completed"))
        .collect::<Vec<_>>();
    let view = derive_board(&workers, false);

    assert_eq!(view.not_shown_count, 0);
    assert_eq!(shown_ids(&view.rows).len(), 4);
    for row in &view.rows[4..] {
        assert_eq!(*row, BoardRow::Placeholder);
    }
}

#[test]
fn long_lists_truncate_to_ten_and_count_the_rest() {
    let workers = (0..15)
        .map(|i| worker(&format!("w-{i:02}"), "not_started"))
        .collect::<Vec<_>>();
    let view = derive_board(&workers, false);

    assert_eq!(shown_ids(&view.rows).len(), VISIBLE_ROWS);
    assert_eq!(view.not_shown_count, 5);
    assert!(!view.rows.iter().any(|row| *row == BoardRow::Placeholder));
}

#[test]
fn failed_sorts_first_then_id_breaks_ties() {
    let view = derive_board(
        &[
            worker("b", "completed"),
            worker("a", "failed"),
            worker("c", "failed"),
        ],
        false,
    );
    assert_eq!(shown_ids(&view.rows), vec!["a", "c", "b"]);
}

#[test]
fn full_status_ordering_is_failed_not_started_in_progress_completed() {
    let view = derive_board(
        &[
            worker("w-done", "completed"),
            worker("w-run", "in_progress"),
            worker("w-new", "not_started"),
            worker("w-bad", "failed"),
        ],
        false,
    );
    assert_eq!(
        shown_ids(&view.rows),
        vec!["w-bad", "w-new", "w-run", "w-done"]
    );
}

#[test]
fn derivation_is_idempotent_for_an_unchanged_list() {
    let workers = vec![
        worker("w-3", "failed"),
        worker("w-1", "completed"),
        worker("w-2", "failed"),
        worker("w-4", "mystery"),
    ];
    let first = derive_board(&workers, true);
    let second = derive_board(&workers, true);
    assert_eq!(first, second);
}

#[test]
fn action_cell_present_iff_status_is_failed() {
    let view = derive_board(
        &[
            worker("w-1", "failed"),
            worker("w-2", "not_started"),
            worker("w-3", "in_progress"),
            worker("w-4", "completed"),
            worker("w-5", "mystery"),
        ],
        false,
    );
    for row in &view.rows {
        if let BoardRow::Worker {
            worker_id,
            has_action,
            ..
        } = row
        {
            assert_eq!(*has_action, worker_id == "w-1", "row {worker_id}");
        }
    }
}

#[test]
fn unrecognized_status_renders_unknown_without_action_and_sorts_last() {
    let view = derive_board(
        &[worker("w-odd", "paused"), worker("w-done", "completed")],
        false,
    );
    assert_eq!(shown_ids(&view.rows), vec!["w-done", "w-odd"]);
    match &view.rows[1] {
        BoardRow::Worker {
            status_label,
            has_action,
            ..
        } => {
            assert_eq!(*status_label, "Unknown");
            assert!(!has_action);
        }
        BoardRow::Placeholder => panic!("expected worker row"),
    }
}

#[test]
fn input_order_does_not_leak_into_the_view() {
    let mut workers = vec![
        worker("w-1", "failed"),
        worker("w-2", "completed"),
        worker("w-3", "failed"),
    ];
    let forward = derive_board(&workers, false);
    workers.reverse();
    let reversed = derive_board(&workers, false);
    assert_eq!(forward, reversed);
}
