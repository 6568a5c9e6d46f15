use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde_json::json;
use tokio::sync::{mpsc, oneshot};

use crate::errors::WorkboardError;
use crate::logging::append_run_log;
use crate::types::{WorkerRecord, WorkerStatus};

const READ_POOL_SIZE: usize = 4;

type StoreResult<T> = Result<T, WorkboardError>;

/// Insert payload for a worker that has not started yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWorker {
    pub worker_id: String,
    pub task_description: String,
    /// When the worker leaves NOT_STARTED, unix ms. `None` means it is
    /// started externally (never by the demo engine).
    pub start_at: Option<i64>,
}

#[derive(Debug)]
enum WriteCmd {
    Create {
        worker: NewWorker,
        now: i64,
        reply: oneshot::Sender<StoreResult<()>>,
    },
    MarkStarted {
        worker_id: String,
        finish_at: i64,
        reply: oneshot::Sender<StoreResult<bool>>,
    },
    MarkFinished {
        worker_id: String,
        failed: bool,
        remove_at: Option<i64>,
        reply: oneshot::Sender<StoreResult<bool>>,
    },
    CompleteWorker {
        worker_id: String,
        remove_at: i64,
        reply: oneshot::Sender<StoreResult<bool>>,
    },
    SetFrozen {
        frozen: bool,
        reply: oneshot::Sender<StoreResult<()>>,
    },
    Remove {
        worker_id: String,
        reply: oneshot::Sender<StoreResult<bool>>,
    },
}

/// Sqlite-backed worker registry. All writes funnel through one writer
/// thread fed by a command channel; reads go to a round-robin pool of
/// read-only connections.
pub struct WorkerStore {
    write_tx: Option<mpsc::Sender<WriteCmd>>,
    read_pool: ReadPool,
    writer_join: Option<thread::JoinHandle<()>>,
    db_path: PathBuf,
}

impl Drop for WorkerStore {
    fn drop(&mut self) {
        // Close the sender first so the writer loop exits.
        drop(self.write_tx.take());
        if let Some(handle) = self.writer_join.take() {
            let _ = handle.join();
        }
    }
}

impl WorkerStore {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        append_run_log(
            "info",
            "worker_store.open",
            json!({ "path": path.display().to_string() }),
        );
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| WorkboardError::Database(e.to_string()))?;
        }

        let existed_before_open = path.exists();

        // Reject zero-byte files — they indicate prior corruption.
        if existed_before_open {
            let meta = std::fs::metadata(&path)
                .map_err(|e| WorkboardError::Database(e.to_string()))?;
            if meta.len() == 0 {
                return Err(WorkboardError::Database(format!(
                    "worker database is 0 bytes (corrupt): {}",
                    path.display()
                )));
            }
        }

        let mut write_conn = Connection::open(&path).map_err(db_err)?;
        configure_write_connection(&write_conn)?;

        if existed_before_open {
            let integrity: String = write_conn
                .pragma_query_value(None, "quick_check", |row| row.get(0))
                .map_err(db_err)?;
            if integrity != "ok" {
                return Err(WorkboardError::Database(format!(
                    "worker database failed integrity check: {integrity}"
                )));
            }
        }

        run_migrations(&mut write_conn)?;

        let (write_tx, mut write_rx) = mpsc::channel(128);
        let writer_join = thread::spawn(move || {
            while let Some(cmd) = write_rx.blocking_recv() {
                match cmd {
                    WriteCmd::Create { worker, now, reply } => {
                        let _ = reply.send(create_worker(&write_conn, &worker, now));
                    }
                    WriteCmd::MarkStarted {
                        worker_id,
                        finish_at,
                        reply,
                    } => {
                        let _ = reply.send(mark_started(&write_conn, &worker_id, finish_at));
                    }
                    WriteCmd::MarkFinished {
                        worker_id,
                        failed,
                        remove_at,
                        reply,
                    } => {
                        let _ =
                            reply.send(mark_finished(&write_conn, &worker_id, failed, remove_at));
                    }
                    WriteCmd::CompleteWorker {
                        worker_id,
                        remove_at,
                        reply,
                    } => {
                        let _ = reply.send(complete_worker(&write_conn, &worker_id, remove_at));
                    }
                    WriteCmd::SetFrozen { frozen, reply } => {
                        let _ = reply.send(set_frozen(&write_conn, frozen));
                    }
                    WriteCmd::Remove { worker_id, reply } => {
                        let _ = reply.send(remove_worker(&write_conn, &worker_id));
                    }
                }
            }
        });

        let read_pool = ReadPool::open(&path, READ_POOL_SIZE)?;
        append_run_log(
            "info",
            "worker_store.opened",
            json!({ "path": path.display().to_string() }),
        );

        Ok(Self {
            write_tx: Some(write_tx),
            read_pool,
            writer_join: Some(writer_join),
            db_path: path,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn sender(&self) -> StoreResult<&mpsc::Sender<WriteCmd>> {
        self.write_tx
            .as_ref()
            .ok_or_else(|| WorkboardError::Database("store is closed".to_string()))
    }

    fn submit<T>(
        &self,
        cmd: impl FnOnce(oneshot::Sender<StoreResult<T>>) -> WriteCmd,
    ) -> StoreResult<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender()?
            .blocking_send(cmd(reply_tx))
            .map_err(|e| WorkboardError::Database(e.to_string()))?;
        reply_rx
            .blocking_recv()
            .map_err(|e| WorkboardError::Database(e.to_string()))?
    }

    pub fn create(&self, worker: NewWorker, now: i64) -> StoreResult<()> {
        let worker_id = worker.worker_id.clone();
        let result = self.submit(|reply| WriteCmd::Create { worker, now, reply });
        match &result {
            Ok(()) => {
                append_run_log(
                    "info",
                    "worker.created",
                    json!({ "worker_id": worker_id }),
                );
            }
            Err(e) => {
                append_run_log(
                    "error",
                    "worker.create.failed",
                    json!({ "worker_id": worker_id, "error": e.to_string() }),
                );
            }
        }
        result
    }

    /// NOT_STARTED -> IN_PROGRESS. `false` if the worker is missing or not
    /// in NOT_STARTED.
    pub fn mark_started(&self, worker_id: &str, finish_at: i64) -> StoreResult<bool> {
        let id = worker_id.to_string();
        let result = self.submit(|reply| WriteCmd::MarkStarted {
            worker_id: id,
            finish_at,
            reply,
        });
        if let Ok(true) = &result {
            append_run_log(
                "info",
                "worker.in_progress",
                json!({ "worker_id": worker_id }),
            );
        }
        result
    }

    /// IN_PROGRESS -> FAILED or COMPLETED. `false` if the worker is missing
    /// or not in IN_PROGRESS.
    pub fn mark_finished(
        &self,
        worker_id: &str,
        failed: bool,
        remove_at: Option<i64>,
    ) -> StoreResult<bool> {
        let id = worker_id.to_string();
        let result = self.submit(|reply| WriteCmd::MarkFinished {
            worker_id: id,
            failed,
            remove_at,
            reply,
        });
        if let Ok(true) = &result {
            append_run_log(
                "info",
                if failed { "worker.failed" } else { "worker.completed" },
                json!({ "worker_id": worker_id }),
            );
        }
        result
    }

    /// Operator-requested completion. `false` means no such worker.
    pub fn complete_worker(&self, worker_id: &str, remove_at: i64) -> StoreResult<bool> {
        let id = worker_id.to_string();
        let result = self.submit(|reply| WriteCmd::CompleteWorker {
            worker_id: id,
            remove_at,
            reply,
        });
        match &result {
            Ok(true) => {
                append_run_log(
                    "info",
                    "worker.completed.manual",
                    json!({ "worker_id": worker_id }),
                );
            }
            Ok(false) => {
                append_run_log(
                    "warn",
                    "worker.completed.unknown_id",
                    json!({ "worker_id": worker_id }),
                );
            }
            Err(e) => {
                append_run_log(
                    "error",
                    "worker.completed.failed",
                    json!({ "worker_id": worker_id, "error": e.to_string() }),
                );
            }
        }
        result
    }

    pub fn set_frozen(&self, frozen: bool) -> StoreResult<()> {
        let result = self.submit(|reply| WriteCmd::SetFrozen { frozen, reply });
        if result.is_ok() {
            append_run_log("info", "board.frozen.set", json!({ "frozen": frozen }));
        }
        result
    }

    pub fn remove(&self, worker_id: &str) -> StoreResult<bool> {
        let id = worker_id.to_string();
        let result = self.submit(|reply| WriteCmd::Remove {
            worker_id: id,
            reply,
        });
        if let Ok(true) = &result {
            append_run_log("info", "worker.removed", json!({ "worker_id": worker_id }));
        }
        result
    }

    pub fn list_workers(&self) -> StoreResult<Vec<WorkerRecord>> {
        self.read_pool.with_conn(|conn| {
            let mut statement = conn
                .prepare(
                    "SELECT worker_id, task_description, status \
                     FROM workers \
                     ORDER BY created_at ASC, worker_id ASC",
                )
                .map_err(db_err)?;
            let rows = statement
                .query_map([], |row| {
                    Ok(WorkerRecord {
                        worker_id: row.get(0)?,
                        task_description: row.get(1)?,
                        status: row.get(2)?,
                    })
                })
                .map_err(db_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(db_err)?;
            Ok(rows)
        })
    }

    pub fn is_frozen(&self) -> StoreResult<bool> {
        self.read_pool.with_conn(|conn| {
            let value: i64 = conn
                .query_row(
                    "SELECT value FROM board_flags WHERE flag = 'frozen'",
                    [],
                    |row| row.get(0),
                )
                .map_err(db_err)?;
            Ok(value != 0)
        })
    }

    pub fn due_starts(&self, now: i64) -> StoreResult<Vec<String>> {
        self.read_pool.with_conn(|conn| {
            collect_ids(
                conn,
                "SELECT worker_id FROM workers \
                 WHERE status = 'not_started' AND start_at IS NOT NULL AND start_at <= ?1 \
                 ORDER BY worker_id ASC",
                now,
            )
        })
    }

    pub fn due_finishes(&self, now: i64) -> StoreResult<Vec<String>> {
        self.read_pool.with_conn(|conn| {
            collect_ids(
                conn,
                "SELECT worker_id FROM workers \
                 WHERE status = 'in_progress' AND finish_at IS NOT NULL AND finish_at <= ?1 \
                 ORDER BY worker_id ASC",
                now,
            )
        })
    }

    pub fn due_removals(&self, now: i64) -> StoreResult<Vec<String>> {
        self.read_pool.with_conn(|conn| {
            collect_ids(
                conn,
                "SELECT worker_id FROM workers \
                 WHERE status = 'completed' AND remove_at IS NOT NULL AND remove_at <= ?1 \
                 ORDER BY worker_id ASC",
                now,
            )
        })
    }
}

#[derive(Clone)]
struct ReadPool {
    conns: Arc<Vec<Mutex<Connection>>>,
    next: Arc<AtomicUsize>,
}

impl ReadPool {
    fn open(path: &Path, size: usize) -> StoreResult<Self> {
        let mut conns = Vec::with_capacity(size);
        for _ in 0..size {
            let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
                .map_err(db_err)?;
            conn.busy_timeout(std::time::Duration::from_secs(3))
                .map_err(db_err)?;
            conns.push(Mutex::new(conn));
        }

        Ok(Self {
            conns: Arc::new(conns),
            next: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.conns.len();
        let guard = self.conns[idx]
            .lock()
            .map_err(|_| WorkboardError::Database("read connection lock poisoned".to_string()))?;
        f(&guard)
    }
}

fn configure_write_connection(conn: &Connection) -> StoreResult<()> {
    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(db_err)?;
    conn.pragma_update(None, "synchronous", "FULL")
        .map_err(db_err)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .map_err(db_err)?;
    Ok(())
}

fn run_migrations(conn: &mut Connection) -> StoreResult<()> {
    let migrations = [(1_i64, include_str!("../migrations/0001_workers.sql"))];

    conn.execute_batch(
        "BEGIN IMMEDIATE; \
         CREATE TABLE IF NOT EXISTS schema_migrations (\
             version INTEGER PRIMARY KEY, applied_at INTEGER NOT NULL); \
         COMMIT;",
    )
    .map_err(db_err)?;

    for (version, sql) in migrations {
        let exists = conn
            .query_row(
                "SELECT 1 FROM schema_migrations WHERE version = ?1 LIMIT 1",
                [version],
                |_| Ok(()),
            )
            .optional()
            .map_err(db_err)?
            .is_some();

        if exists {
            continue;
        }

        append_run_log(
            "info",
            "worker_store.migration.applying",
            json!({ "version": version }),
        );
        let tx = conn.transaction().map_err(db_err)?;
        tx.execute_batch(sql).map_err(db_err)?;
        tx.execute(
            "INSERT INTO schema_migrations(version, applied_at) VALUES (?1, ?2)",
            params![version, system_time_unix_ms()],
        )
        .map_err(db_err)?;
        tx.commit().map_err(db_err)?;
    }

    Ok(())
}

fn create_worker(conn: &Connection, worker: &NewWorker, now: i64) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO workers (worker_id, task_description, status, created_at, start_at) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            worker.worker_id,
            worker.task_description,
            WorkerStatus::NotStarted.as_str(),
            now,
            worker.start_at,
        ],
    )
    .map_err(db_err)?;
    Ok(())
}

fn mark_started(conn: &Connection, worker_id: &str, finish_at: i64) -> StoreResult<bool> {
    let changed = conn
        .execute(
            "UPDATE workers SET status = ?1, finish_at = ?2 \
             WHERE worker_id = ?3 AND status = ?4",
            params![
                WorkerStatus::InProgress.as_str(),
                finish_at,
                worker_id,
                WorkerStatus::NotStarted.as_str(),
            ],
        )
        .map_err(db_err)?;
    Ok(changed > 0)
}

fn mark_finished(
    conn: &Connection,
    worker_id: &str,
    failed: bool,
    remove_at: Option<i64>,
) -> StoreResult<bool> {
    let status = if failed {
        WorkerStatus::Failed
    } else {
        WorkerStatus::Completed
    };
    let changed = conn
        .execute(
            "UPDATE workers SET status = ?1, remove_at = ?2 \
             WHERE worker_id = ?3 AND status = ?4",
            params![
                status.as_str(),
                remove_at,
                worker_id,
                WorkerStatus::InProgress.as_str(),
            ],
        )
        .map_err(db_err)?;
    Ok(changed > 0)
}

fn complete_worker(conn: &Connection, worker_id: &str, remove_at: i64) -> StoreResult<bool> {
    let changed = conn
        .execute(
            "UPDATE workers SET status = ?1, remove_at = ?2 WHERE worker_id = ?3",
            params![WorkerStatus::Completed.as_str(), remove_at, worker_id],
        )
        .map_err(db_err)?;
    Ok(changed > 0)
}

fn set_frozen(conn: &Connection, frozen: bool) -> StoreResult<()> {
    conn.execute(
        "UPDATE board_flags SET value = ?1 WHERE flag = 'frozen'",
        params![i64::from(frozen)],
    )
    .map_err(db_err)?;
    Ok(())
}

fn remove_worker(conn: &Connection, worker_id: &str) -> StoreResult<bool> {
    let changed = conn
        .execute("DELETE FROM workers WHERE worker_id = ?1", params![worker_id])
        .map_err(db_err)?;
    Ok(changed > 0)
}

fn collect_ids(conn: &Connection, sql: &str, now: i64) -> StoreResult<Vec<String>> {
    let mut statement = conn.prepare(sql).map_err(db_err)?;
    let rows = statement
        .query_map([now], |row| row.get::<_, String>(0))
        .map_err(db_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(db_err)?;
    Ok(rows)
}

fn db_err(e: rusqlite::Error) -> WorkboardError {
    WorkboardError::Database(e.to_string())
}

pub fn system_time_unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
