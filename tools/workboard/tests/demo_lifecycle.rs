use std::sync::Arc;
use std::time::Duration;
use workboard::config::{AppConfig, DemoConfig};
use workboard::demo::{failure_unit, DemoEngine};
use workboard::service::{SqliteWorkerService, WorkerService};
use workboard::store::WorkerStore;

fn open_store(dir: &tempfile::TempDir) -> WorkerStore {
    WorkerStore::open(dir.path().join("board.sqlite")).expect("open store")
}

/// Defaults with the creation cadence pushed out of the way, so only the
/// initial burst exists and lifecycle assertions stay exact.
fn burst_only_config() -> DemoConfig {
    let mut cfg = AppConfig::default().demo;
    cfg.create_interval_ms = 1_000_000_000;
    cfg
}

#[test]
fn workers_walk_the_full_lifecycle_under_controlled_time() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open_store(&dir);
    let cfg = burst_only_config();
    let mut engine = DemoEngine::new(cfg.seed);

    let created = engine.tick(&store, &cfg, 0).expect("tick").created;
    assert_eq!(created, cfg.initial_burst as usize);
    // A zero start delay starts a worker on its creation tick, so both
    // states are legal here.
    assert!(store
        .list_workers()
        .expect("list")
        .iter()
        .all(|w| w.status == "not_started" || w.status == "in_progress"));

    // Every start delay is at most start_delay_max_ms, so by then all
    // workers are running.
    let all_started = cfg.start_delay_max_ms as i64;
    engine.tick(&store, &cfg, all_started).expect("tick");
    assert!(store
        .list_workers()
        .expect("list")
        .iter()
        .all(|w| w.status == "in_progress"));

    // Likewise every work duration is bounded by work_max_ms past the last
    // possible start tick.
    let all_finished = all_started + cfg.work_max_ms as i64;
    engine.tick(&store, &cfg, all_finished).expect("tick");
    for worker in store.list_workers().expect("list") {
        let expected = if failure_unit(&worker.worker_id) <= cfg.failure_threshold {
            "failed"
        } else {
            "completed"
        };
        assert_eq!(worker.status, expected, "worker {}", worker.worker_id);
    }
}

#[test]
fn completed_workers_are_removed_after_the_retention_window() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open_store(&dir);
    let mut cfg = burst_only_config();
    // Everything completes: no failures to keep on the board.
    cfg.failure_threshold = 0.0;
    let mut engine = DemoEngine::new(cfg.seed);

    engine.tick(&store, &cfg, 0).expect("tick");
    let settled = (cfg.start_delay_max_ms + cfg.work_max_ms) as i64;
    engine.tick(&store, &cfg, settled).expect("tick");
    let completed = store
        .list_workers()
        .expect("list")
        .iter()
        .filter(|w| w.status == "completed")
        .count();
    assert_eq!(completed, cfg.initial_burst as usize);

    // Every completion landed on the `settled` tick, so removal is due
    // exactly one retention window later and not a millisecond sooner.
    let summary = engine
        .tick(&store, &cfg, settled + cfg.remove_after_ms as i64 - 1)
        .expect("tick");
    assert_eq!(summary.removed, 0);

    let summary = engine
        .tick(&store, &cfg, settled + cfg.remove_after_ms as i64)
        .expect("tick");
    assert_eq!(summary.removed, completed);
    assert!(store.list_workers().expect("list").is_empty());
}

#[test]
fn failed_workers_stay_until_manually_completed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open_store(&dir);
    let mut cfg = burst_only_config();
    // Everything fails: the board fills with actionable rows.
    cfg.failure_threshold = 1.0;
    let mut engine = DemoEngine::new(cfg.seed);

    engine.tick(&store, &cfg, 0).expect("tick");
    let settled = (cfg.start_delay_max_ms + cfg.work_max_ms) as i64;
    engine.tick(&store, &cfg, settled).expect("tick");
    let failed_ids = store
        .list_workers()
        .expect("list")
        .iter()
        .filter(|w| w.status == "failed")
        .map(|w| w.worker_id.clone())
        .collect::<Vec<_>>();
    assert_eq!(failed_ids.len(), cfg.initial_burst as usize);

    // Long after the retention window they are still there: removal is
    // never scheduled for failed workers.
    let summary = engine
        .tick(&store, &cfg, settled + 10 * cfg.remove_after_ms as i64)
        .expect("tick");
    assert_eq!(summary.removed, 0);

    // Manual completion moves one to completed and schedules its removal.
    let store = Arc::new(store);
    let service = SqliteWorkerService::new(Arc::clone(&store), Duration::ZERO);
    service.complete_worker(&failed_ids[0]).expect("complete");
    let record = store
        .list_workers()
        .expect("list")
        .into_iter()
        .find(|w| w.worker_id == failed_ids[0])
        .expect("record");
    assert_eq!(record.status, "completed");
}

#[test]
fn replays_with_the_same_seed_are_identical() {
    let cfg = burst_only_config();

    let run = |label: &str| {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = WorkerStore::open(dir.path().join(format!("{label}.sqlite"))).expect("open");
        let mut engine = DemoEngine::new(cfg.seed);
        engine.tick(&store, &cfg, 0).expect("tick");
        engine
            .tick(
                &store,
                &cfg,
                (cfg.start_delay_max_ms + cfg.work_max_ms) as i64,
            )
            .expect("tick");
        store.list_workers().expect("list")
    };

    assert_eq!(run("first"), run("second"));
}
