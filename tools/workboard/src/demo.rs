use crate::config::DemoConfig;
use crate::errors::WorkboardError;
use crate::logging::append_run_log;
use crate::store::{system_time_unix_ms, NewWorker, WorkerStore};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const VERBS: [&str; 6] = ["debug", "refactor", "optimize", "deploy", "code", "reboot"];

const ADJECTIVES: [&str; 10] = [
    "brilliant",
    "radiant",
    "magnificent",
    "benevolent",
    "gracious",
    "joyful",
    "resilient",
    "harmonious",
    "admirable",
    "charismatic",
];

const NOUNS: [&str; 10] = [
    "algorithm",
    "bandwidth",
    "cache",
    "database",
    "firewall",
    "keyboard",
    "motherboard",
    "processor",
    "software",
    "automated agent",
];

/// Standalone workload generator: creates workers on a cadence (gated by the
/// freeze flag), walks them through their lifecycle, and removes completed
/// ones after a retention window. Every choice derives from hashes of the
/// seed and worker id, so a given seed replays identically.
pub struct DemoEngine {
    seed: u64,
    sequence: u64,
    next_create_at: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DemoTickSummary {
    pub created: usize,
    pub started: usize,
    pub finished: usize,
    pub failed: usize,
    pub removed: usize,
}

impl DemoEngine {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            sequence: 0,
            next_create_at: None,
        }
    }

    /// Applies every transition due at `now`. Synchronous; the caller owns
    /// the cadence.
    pub fn tick(
        &mut self,
        store: &WorkerStore,
        cfg: &DemoConfig,
        now: i64,
    ) -> Result<DemoTickSummary, WorkboardError> {
        let mut summary = DemoTickSummary::default();

        if self.next_create_at.map_or(true, |at| now >= at) {
            // Frozen ticks skip creation but keep the cadence running, so
            // unfreezing resumes on the next due tick rather than bursting.
            if store.is_frozen()? {
                append_run_log("debug", "demo.create.frozen", json!({}));
            } else {
                let count = if self.sequence == 0 {
                    u64::from(cfg.initial_burst)
                } else {
                    1
                };
                for _ in 0..count {
                    let worker_id = worker_id_for(self.seed, self.sequence);
                    let start_delay = pick_range(
                        position_hash(self.seed, self.sequence, "start_delay"),
                        0,
                        cfg.start_delay_max_ms,
                    );
                    store.create(
                        NewWorker {
                            task_description: task_description_for(self.seed, self.sequence),
                            worker_id,
                            start_at: Some(now + start_delay as i64),
                        },
                        now,
                    )?;
                    self.sequence += 1;
                    summary.created += 1;
                }
            }
            self.next_create_at = Some(now + cfg.create_interval_ms as i64);
        }

        for worker_id in store.due_starts(now)? {
            let work_ms = pick_range(
                fnv1a(format!("{worker_id}/work").as_bytes()),
                cfg.work_min_ms,
                cfg.work_max_ms,
            );
            if store.mark_started(&worker_id, now + work_ms as i64)? {
                summary.started += 1;
            }
        }

        for worker_id in store.due_finishes(now)? {
            let failed = failure_unit(&worker_id) <= cfg.failure_threshold;
            let remove_at = if failed {
                None
            } else {
                Some(now + cfg.remove_after_ms as i64)
            };
            if store.mark_finished(&worker_id, failed, remove_at)? {
                summary.finished += 1;
                if failed {
                    summary.failed += 1;
                }
            }
        }

        for worker_id in store.due_removals(now)? {
            if store.remove(&worker_id)? {
                summary.removed += 1;
            }
        }

        Ok(summary)
    }
}

/// Runs the engine on its own thread until `stop` is set. Tick errors are
/// logged and do not kill the loop.
pub fn spawn_demo_thread(
    store: Arc<WorkerStore>,
    cfg: DemoConfig,
    stop: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut engine = DemoEngine::new(cfg.seed);
        let tick_interval = Duration::from_millis(cfg.tick_interval_ms);
        while !stop.load(Ordering::Relaxed) {
            if let Err(error) = engine.tick(&store, &cfg, system_time_unix_ms()) {
                append_run_log(
                    "error",
                    "demo.tick.failed",
                    json!({ "error": error.to_string() }),
                );
            }
            thread::sleep(tick_interval);
        }
    })
}

/// Normalized hash of the worker id, in [0, 1). The same worker always
/// lands on the same side of the failure threshold.
pub fn failure_unit(worker_id: &str) -> f64 {
    (fnv1a(worker_id.as_bytes()) >> 11) as f64 / (1u64 << 53) as f64
}

fn worker_id_for(seed: u64, sequence: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_be_bytes());
    hasher.update(sequence.to_be_bytes());
    let digest = hasher.finalize();
    let hex = digest
        .iter()
        .take(6)
        .map(|byte| format!("{byte:02x}"))
        .collect::<String>();
    format!("w-{hex}")
}

fn task_description_for(seed: u64, sequence: u64) -> String {
    let verb = VERBS[pick_index(position_hash(seed, sequence, "verb"), VERBS.len())];
    let adjective =
        ADJECTIVES[pick_index(position_hash(seed, sequence, "adjective"), ADJECTIVES.len())];
    let noun = NOUNS[pick_index(position_hash(seed, sequence, "noun"), NOUNS.len())];
    format!("{verb} the {adjective} {noun}")
}

fn position_hash(seed: u64, sequence: u64, label: &str) -> u64 {
    fnv1a(format!("{seed}/{sequence}/{label}").as_bytes())
}

fn pick_index(hash: u64, len: usize) -> usize {
    (hash % len as u64) as usize
}

fn pick_range(hash: u64, min: u64, max: u64) -> u64 {
    if max <= min {
        return min;
    }
    min + hash % (max - min + 1)
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}
