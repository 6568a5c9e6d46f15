use std::sync::Arc;
use std::time::{Duration, Instant};
use workboard::app::DashboardApp;
use workboard::hotkeys::HotkeyAction;
use workboard::service::{FakeWorkerService, WorkerService};
use workboard::types::WorkerRecord;

fn failed_worker(id: &str) -> WorkerRecord {
    WorkerRecord {
        worker_id: id.to_string(),
        task_description: format!("task {id}"),
        status: "failed".to_string(),
    }
}

fn app_with(fake: &FakeWorkerService) -> DashboardApp {
    let service: Arc<dyn WorkerService> = Arc::new(fake.clone());
    DashboardApp::new(service)
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition never held");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn in_flight_completion_shows_completing_and_blocks_reactivation() {
    let fake = FakeWorkerService::with_workers(vec![failed_worker("w1")]);
    fake.hold_completions();
    let mut app = app_with(&fake);
    app.refresh().expect("refresh");

    app.handle_action(HotkeyAction::CompleteSelected)
        .expect("activate");
    wait_until(|| !fake.complete_calls().is_empty());

    let control = app.control("w1").expect("control");
    assert!(control.is_pending());
    assert_eq!(control.trigger_label(), "Completing...");
    assert_eq!(app.action_cells()[0], "Completing...");

    // While pending the press is swallowed by the disabled trigger.
    app.handle_action(HotkeyAction::CompleteSelected)
        .expect("guarded");
    assert_eq!(fake.complete_calls().len(), 1);

    fake.release_completions();
    wait_until(|| {
        app.poll_completions();
        !app.control("w1").is_some_and(|c| c.is_pending())
    });
}

#[test]
fn failed_completion_reverts_label_reenables_and_shows_error() {
    let fake = FakeWorkerService::with_workers(vec![failed_worker("w1")]);
    fake.push_complete_outcome(Err("timeout".to_string()));
    let mut app = app_with(&fake);
    app.refresh().expect("refresh");

    app.handle_action(HotkeyAction::CompleteSelected)
        .expect("activate");
    wait_until(|| {
        app.poll_completions();
        !app.control("w1").is_some_and(|c| c.is_pending())
    });

    let control = app.control("w1").expect("control");
    assert_eq!(control.trigger_label(), "Complete");
    assert!(!control.is_pending());
    assert_eq!(control.last_error(), Some("Error: timeout"));
    assert_eq!(app.action_cells()[0], "Complete  Error: timeout");

    // Re-enabled: the next press reaches the service again.
    app.handle_action(HotkeyAction::CompleteSelected)
        .expect("retry");
    wait_until(|| fake.complete_calls().len() == 2);
}

#[test]
fn successful_completion_leaves_no_error_and_worker_leaves_on_refresh() {
    let fake = FakeWorkerService::with_workers(vec![failed_worker("w1")]);
    let mut app = app_with(&fake);
    app.refresh().expect("refresh");

    app.handle_action(HotkeyAction::CompleteSelected)
        .expect("activate");
    wait_until(|| {
        app.poll_completions();
        !app.control("w1").is_some_and(|c| c.is_pending())
    });
    assert_eq!(app.control("w1").expect("control").last_error(), None);

    // The list converges externally; the next read drops the row and its
    // control with it.
    fake.set_workers(vec![WorkerRecord {
        worker_id: "w1".to_string(),
        task_description: "task w1".to_string(),
        status: "completed".to_string(),
    }]);
    app.refresh().expect("refresh");
    assert!(app.control("w1").is_none());
}

#[test]
fn control_state_resets_when_a_worker_reenters_the_failed_view() {
    let fake = FakeWorkerService::with_workers(vec![failed_worker("w1")]);
    fake.push_complete_outcome(Err("timeout".to_string()));
    let mut app = app_with(&fake);
    app.refresh().expect("refresh");

    app.handle_action(HotkeyAction::CompleteSelected)
        .expect("activate");
    wait_until(|| {
        app.poll_completions();
        app.control("w1").is_some_and(|c| c.last_error().is_some())
    });

    // Leaves the failed view...
    fake.set_workers(vec![]);
    app.refresh().expect("refresh");
    assert!(app.control("w1").is_none());

    // ...and comes back with a clean slate.
    fake.set_workers(vec![failed_worker("w1")]);
    app.refresh().expect("refresh");
    let control = app.control("w1").expect("control");
    assert!(!control.is_pending());
    assert_eq!(control.last_error(), None);
}

#[test]
fn completions_for_different_workers_run_independently() {
    let fake = FakeWorkerService::with_workers(vec![failed_worker("w1"), failed_worker("w2")]);
    fake.hold_completions();
    let mut app = app_with(&fake);
    app.refresh().expect("refresh");

    app.handle_action(HotkeyAction::CompleteSelected)
        .expect("activate w1");
    app.handle_action(HotkeyAction::SelectNext).expect("move");
    app.handle_action(HotkeyAction::CompleteSelected)
        .expect("activate w2");

    wait_until(|| fake.complete_calls().len() == 2);
    assert!(app.control("w1").is_some_and(|c| c.is_pending()));
    assert!(app.control("w2").is_some_and(|c| c.is_pending()));

    fake.release_completions();
    wait_until(|| {
        app.poll_completions();
        let done = |id: &str| !app.control(id).is_some_and(|c| c.is_pending());
        done("w1") && done("w2")
    });
}
