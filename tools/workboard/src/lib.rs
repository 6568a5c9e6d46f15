pub mod app;
pub mod board;
pub mod completion;
pub mod config;
pub mod demo;
pub mod errors;
pub mod hotkeys;
pub mod logging;
pub mod runtime;
pub mod service;
pub mod store;
pub mod tui;
pub mod types;

use app::{run_dashboard_loop, DashboardApp, LoopOptions};
use clap::{error::ErrorKind, CommandFactory, Parser};
use config::{load_config, resolve_db_path, CliOverrides};
use demo::spawn_demo_thread;
use errors::WorkboardError;
use logging::{append_run_log, init_run_logger, structured_fallback_line};
use runtime::{ProductionRuntime, RawModeGuard};
use serde_json::json;
use service::{SqliteWorkerService, WorkerService};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use store::WorkerStore;

#[derive(Debug, Clone, Parser)]
#[command(name = "workboard")]
#[command(about = "Terminal status board for delegated workers")]
pub struct Cli {
    #[arg(long)]
    pub config: Option<std::path::PathBuf>,
    #[arg(long)]
    pub db: Option<std::path::PathBuf>,
    /// Run the built-in workload generator alongside the board.
    #[arg(long, default_value_t = false)]
    pub demo: bool,
    /// Render this many frames and exit instead of running interactively.
    #[arg(long)]
    pub frames: Option<u32>,
    #[arg(long)]
    pub width: Option<u16>,
    #[arg(long)]
    pub height: Option<u16>,
}

pub fn run() -> Result<i32, WorkboardError> {
    let args = std::env::args_os().collect::<Vec<_>>();
    let cwd = std::env::current_dir().map_err(|e| WorkboardError::Io(e.to_string()))?;
    let runtime = ProductionRuntime::new();
    run_with_runtime(&args, &cwd, &runtime)
}

pub fn run_with_runtime(
    args: &[std::ffi::OsString],
    cwd: &std::path::Path,
    runtime: &ProductionRuntime,
) -> Result<i32, WorkboardError> {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{error}");
                return Ok(0);
            }
            _ => return Err(WorkboardError::Cli(error.to_string())),
        },
    };

    let overrides = CliOverrides {
        config_path: cli.config.clone(),
        db_path: cli.db.clone(),
        demo: cli.demo,
        frames: cli.frames,
        width: cli.width,
        height: cli.height,
    };
    let cfg = load_config(&overrides, runtime.file_system.as_ref())?;
    let db_path = resolve_db_path(&cfg, &overrides, cwd);

    init_run_logger(cwd.join(".cache/workboard/run-log.jsonl"));
    append_run_log(
        "info",
        "board.starting",
        json!({
            "db_path": db_path.display().to_string(),
            "demo": cli.demo,
            "frames": cli.frames,
        }),
    );

    let store = Arc::new(WorkerStore::open(&db_path)?);
    let service: Arc<dyn WorkerService> = Arc::new(SqliteWorkerService::new(
        Arc::clone(&store),
        Duration::from_millis(cfg.service.completion_hold_ms),
    ));

    let stop = Arc::new(AtomicBool::new(false));
    let demo_join = if cli.demo {
        Some(spawn_demo_thread(
            Arc::clone(&store),
            cfg.demo.clone(),
            Arc::clone(&stop),
        ))
    } else {
        None
    };

    let interactive = cli.frames.is_none() && runtime.terminal.stdin_is_tty();
    let options = LoopOptions {
        refresh_interval: Duration::from_millis(cfg.ui.refresh_interval_ms),
        frames: if interactive {
            None
        } else {
            Some(cli.frames.unwrap_or(1))
        },
        width: cfg.ui.width,
        height: cfg.ui.height,
    };

    let mut app = DashboardApp::new(service);
    let _raw = if interactive {
        Some(RawModeGuard::enable()?)
    } else {
        None
    };
    let loop_result = run_dashboard_loop(
        &mut app,
        runtime.clock.as_ref(),
        runtime.terminal.as_ref(),
        &options,
    );

    stop.store(true, Ordering::Relaxed);
    if let Some(handle) = demo_join {
        let _ = handle.join();
    }
    loop_result?;

    if !interactive {
        runtime.terminal.write_line(&structured_fallback_line(
            "board",
            "complete",
            &format!("frames={}", options.frames.unwrap_or(0)),
        ))?;
    }
    append_run_log("info", "board.stopped", json!({}));
    Ok(0)
}

pub fn render_help() -> String {
    let mut cmd = Cli::command();
    let mut buffer = Vec::new();
    cmd.write_long_help(&mut buffer).expect("write help to vec");
    String::from_utf8(buffer).expect("utf8")
}
