use crate::errors::WorkboardError;
use crate::runtime::FileSystem;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub demo: bool,
    pub frames: Option<u32>,
    pub width: Option<u16>,
    pub height: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub ui: UiConfig,
    pub store: StoreConfig,
    pub service: ServiceConfig,
    pub demo: DemoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UiConfig {
    pub refresh_interval_ms: u64,
    pub width: u16,
    pub height: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Hold applied before a completion returns so the in-flight rendering
    /// state stays observable. Zero in tests.
    pub completion_hold_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DemoConfig {
    pub create_interval_ms: u64,
    pub initial_burst: u32,
    pub start_delay_max_ms: u64,
    pub work_min_ms: u64,
    pub work_max_ms: u64,
    pub failure_threshold: f64,
    pub remove_after_ms: u64,
    pub tick_interval_ms: u64,
    pub seed: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ui: UiConfig {
                refresh_interval_ms: 1000,
                width: 100,
                height: 28,
            },
            store: StoreConfig { db_path: None },
            service: ServiceConfig {
                completion_hold_ms: 1000,
            },
            demo: DemoConfig {
                create_interval_ms: 5000,
                initial_burst: 5,
                start_delay_max_ms: 5000,
                work_min_ms: 1000,
                work_max_ms: 20000,
                failure_threshold: 0.2,
                remove_after_ms: 30_000,
                tick_interval_ms: 500,
                seed: 1,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialAppConfig {
    ui: Option<PartialUiConfig>,
    store: Option<PartialStoreConfig>,
    service: Option<PartialServiceConfig>,
    demo: Option<PartialDemoConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialUiConfig {
    refresh_interval_ms: Option<u64>,
    width: Option<u16>,
    height: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialStoreConfig {
    db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialServiceConfig {
    completion_hold_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialDemoConfig {
    create_interval_ms: Option<u64>,
    initial_burst: Option<u32>,
    start_delay_max_ms: Option<u64>,
    work_min_ms: Option<u64>,
    work_max_ms: Option<u64>,
    failure_threshold: Option<f64>,
    remove_after_ms: Option<u64>,
    tick_interval_ms: Option<u64>,
    seed: Option<u64>,
}

pub fn load_config(
    overrides: &CliOverrides,
    fs: &dyn FileSystem,
) -> Result<AppConfig, WorkboardError> {
    let mut cfg = AppConfig::default();

    if let Some(path) = &overrides.config_path {
        let file_contents = fs.read_to_string(path)?;
        let partial: PartialAppConfig = toml::from_str(&file_contents)
            .map_err(|e| WorkboardError::ConfigParse(e.to_string()))?;
        merge_partial_config(&mut cfg, partial);
    }

    apply_cli_overrides(&mut cfg, overrides);
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Resolution order: CLI flag, then config file, then
/// `<cwd>/.cache/workboard/workboard.sqlite`.
pub fn resolve_db_path(cfg: &AppConfig, overrides: &CliOverrides, cwd: &Path) -> PathBuf {
    if let Some(path) = &overrides.db_path {
        return path.clone();
    }
    if let Some(path) = &cfg.store.db_path {
        return path.clone();
    }
    cwd.join(".cache/workboard/workboard.sqlite")
}

fn merge_partial_config(cfg: &mut AppConfig, partial: PartialAppConfig) {
    if let Some(ui) = partial.ui {
        if let Some(refresh_interval_ms) = ui.refresh_interval_ms {
            cfg.ui.refresh_interval_ms = refresh_interval_ms;
        }
        if let Some(width) = ui.width {
            cfg.ui.width = width;
        }
        if let Some(height) = ui.height {
            cfg.ui.height = height;
        }
    }

    if let Some(store) = partial.store {
        if let Some(db_path) = store.db_path {
            cfg.store.db_path = Some(db_path);
        }
    }

    if let Some(service) = partial.service {
        if let Some(completion_hold_ms) = service.completion_hold_ms {
            cfg.service.completion_hold_ms = completion_hold_ms;
        }
    }

    if let Some(demo) = partial.demo {
        if let Some(create_interval_ms) = demo.create_interval_ms {
            cfg.demo.create_interval_ms = create_interval_ms;
        }
        if let Some(initial_burst) = demo.initial_burst {
            cfg.demo.initial_burst = initial_burst;
        }
        if let Some(start_delay_max_ms) = demo.start_delay_max_ms {
            cfg.demo.start_delay_max_ms = start_delay_max_ms;
        }
        if let Some(work_min_ms) = demo.work_min_ms {
            cfg.demo.work_min_ms = work_min_ms;
        }
        if let Some(work_max_ms) = demo.work_max_ms {
            cfg.demo.work_max_ms = work_max_ms;
        }
        if let Some(failure_threshold) = demo.failure_threshold {
            cfg.demo.failure_threshold = failure_threshold;
        }
        if let Some(remove_after_ms) = demo.remove_after_ms {
            cfg.demo.remove_after_ms = remove_after_ms;
        }
        if let Some(tick_interval_ms) = demo.tick_interval_ms {
            cfg.demo.tick_interval_ms = tick_interval_ms;
        }
        if let Some(seed) = demo.seed {
            cfg.demo.seed = seed;
        }
    }
}

fn apply_cli_overrides(cfg: &mut AppConfig, overrides: &CliOverrides) {
    if let Some(db_path) = &overrides.db_path {
        cfg.store.db_path = Some(db_path.clone());
    }
    if let Some(width) = overrides.width {
        cfg.ui.width = width;
    }
    if let Some(height) = overrides.height {
        cfg.ui.height = height;
    }
}

fn validate_config(cfg: &AppConfig) -> Result<(), WorkboardError> {
    if cfg.ui.refresh_interval_ms == 0 {
        return Err(WorkboardError::InvalidConfig(
            "ui.refresh_interval_ms must be positive".to_string(),
        ));
    }
    if cfg.ui.width == 0 || cfg.ui.height == 0 {
        return Err(WorkboardError::InvalidConfig(
            "ui.width and ui.height must be positive".to_string(),
        ));
    }
    if cfg.demo.tick_interval_ms == 0 {
        return Err(WorkboardError::InvalidConfig(
            "demo.tick_interval_ms must be positive".to_string(),
        ));
    }
    if cfg.demo.initial_burst == 0 {
        return Err(WorkboardError::InvalidConfig(
            "demo.initial_burst must be at least 1".to_string(),
        ));
    }
    if cfg.demo.work_min_ms > cfg.demo.work_max_ms {
        return Err(WorkboardError::InvalidConfig(
            "demo.work_min_ms must not exceed demo.work_max_ms".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&cfg.demo.failure_threshold) {
        return Err(WorkboardError::InvalidConfig(
            "demo.failure_threshold must be within [0, 1]".to_string(),
        ));
    }
    Ok(())
}
