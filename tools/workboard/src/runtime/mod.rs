use crate::errors::WorkboardError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
    fn sleep_until(&self, deadline: SystemTime) -> Result<(), WorkboardError>;
}

pub trait FileSystem: Send + Sync {
    fn read_to_string(&self, path: &Path) -> Result<String, WorkboardError>;
    fn write_string(&self, path: &Path, contents: &str) -> Result<(), WorkboardError>;
    fn create_dir_all(&self, path: &Path) -> Result<(), WorkboardError>;
    fn exists(&self, path: &Path) -> bool;
}

pub trait Terminal: Send + Sync {
    fn stdin_is_tty(&self) -> bool;
    fn write_line(&self, line: &str) -> Result<(), WorkboardError>;
    fn draw(&self, frame: &str) -> Result<(), WorkboardError>;
    /// Waits up to `timeout` for a key press. `Ok(None)` on timeout or on
    /// events that are not character keys.
    fn poll_key(&self, timeout: Duration) -> Result<Option<char>, WorkboardError>;
}

pub struct ProductionClock;

impl Clock for ProductionClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    fn sleep_until(&self, deadline: SystemTime) -> Result<(), WorkboardError> {
        let now = SystemTime::now();
        if let Ok(duration) = deadline.duration_since(now) {
            std::thread::sleep(duration);
        }
        Ok(())
    }
}

pub struct ProductionFileSystem;

impl FileSystem for ProductionFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, WorkboardError> {
        std::fs::read_to_string(path).map_err(|e| WorkboardError::Io(e.to_string()))
    }

    fn write_string(&self, path: &Path, contents: &str) -> Result<(), WorkboardError> {
        std::fs::write(path, contents).map_err(|e| WorkboardError::Io(e.to_string()))
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), WorkboardError> {
        std::fs::create_dir_all(path).map_err(|e| WorkboardError::Io(e.to_string()))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

pub struct ProductionTerminal;

impl Terminal for ProductionTerminal {
    fn stdin_is_tty(&self) -> bool {
        std::io::IsTerminal::is_terminal(&std::io::stdin())
    }

    fn write_line(&self, line: &str) -> Result<(), WorkboardError> {
        use std::io::Write;
        let mut out = std::io::stdout();
        writeln!(out, "{line}").map_err(|e| WorkboardError::Io(e.to_string()))
    }

    fn draw(&self, frame: &str) -> Result<(), WorkboardError> {
        self.write_line(frame)
    }

    fn poll_key(&self, timeout: Duration) -> Result<Option<char>, WorkboardError> {
        use crossterm::event::{self, Event, KeyEventKind};
        if !event::poll(timeout).map_err(|e| WorkboardError::Io(e.to_string()))? {
            return Ok(None);
        }
        match event::read().map_err(|e| WorkboardError::Io(e.to_string()))? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                if let crossterm::event::KeyCode::Char(c) = key.code {
                    Ok(Some(c))
                } else {
                    Ok(None)
                }
            }
            _ => Ok(None),
        }
    }
}

/// Enables raw mode for the lifetime of the guard. Interactive sessions only;
/// headless runs never construct one.
pub struct RawModeGuard;

impl RawModeGuard {
    pub fn enable() -> Result<Self, WorkboardError> {
        crossterm::terminal::enable_raw_mode().map_err(|e| WorkboardError::Io(e.to_string()))?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = crossterm::terminal::disable_raw_mode();
    }
}

pub struct ProductionRuntime {
    pub clock: Arc<dyn Clock>,
    pub file_system: Arc<dyn FileSystem>,
    pub terminal: Arc<dyn Terminal>,
}

impl ProductionRuntime {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(ProductionClock),
            file_system: Arc::new(ProductionFileSystem),
            terminal: Arc::new(ProductionTerminal),
        }
    }
}

impl Default for ProductionRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct FakeClock {
    now: Arc<Mutex<SystemTime>>,
    sleeps: Arc<Mutex<Vec<SystemTime>>>,
}

impl FakeClock {
    pub fn new(now: SystemTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
            sleeps: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn sleeps(&self) -> Vec<SystemTime> {
        self.sleeps.lock().expect("sleep lock").clone()
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new(SystemTime::UNIX_EPOCH)
    }
}

impl Clock for FakeClock {
    fn now(&self) -> SystemTime {
        *self.now.lock().expect("clock lock")
    }

    fn sleep_until(&self, deadline: SystemTime) -> Result<(), WorkboardError> {
        self.sleeps.lock().expect("sleep lock").push(deadline);
        *self.now.lock().expect("clock lock") = deadline;
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct FakeFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, String>>>,
    dirs: Arc<Mutex<Vec<PathBuf>>>,
}

impl FakeFileSystem {
    pub fn with_file(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        let fs = Self::default();
        fs.files
            .lock()
            .expect("files lock")
            .insert(path.into(), contents.into());
        fs
    }
}

impl FileSystem for FakeFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, WorkboardError> {
        self.files
            .lock()
            .expect("files lock")
            .get(path)
            .cloned()
            .ok_or_else(|| WorkboardError::Io(format!("missing file {}", path.display())))
    }

    fn write_string(&self, path: &Path, contents: &str) -> Result<(), WorkboardError> {
        self.files
            .lock()
            .expect("files lock")
            .insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), WorkboardError> {
        self.dirs
            .lock()
            .expect("dirs lock")
            .push(path.to_path_buf());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.lock().expect("files lock").contains_key(path)
    }
}

#[derive(Default, Clone)]
pub struct FakeTerminal {
    pub is_tty: bool,
    keys: Arc<Mutex<Vec<Option<char>>>>,
    writes: Arc<Mutex<Vec<String>>>,
    draws: Arc<Mutex<Vec<String>>>,
}

impl FakeTerminal {
    pub fn new(is_tty: bool) -> Self {
        Self {
            is_tty,
            ..Self::default()
        }
    }

    /// Scripts the key stream returned by `poll_key`, in order. `None`
    /// entries model poll timeouts; once the script is exhausted every
    /// further poll times out.
    pub fn script_keys(&self, keys: impl IntoIterator<Item = Option<char>>) {
        let mut queue = self.keys.lock().expect("keys lock");
        queue.extend(keys);
    }

    pub fn written_lines(&self) -> Vec<String> {
        self.writes.lock().expect("writes lock").clone()
    }

    pub fn drawn_frames(&self) -> Vec<String> {
        self.draws.lock().expect("draw lock").clone()
    }
}

impl Terminal for FakeTerminal {
    fn stdin_is_tty(&self) -> bool {
        self.is_tty
    }

    fn write_line(&self, line: &str) -> Result<(), WorkboardError> {
        self.writes
            .lock()
            .expect("writes lock")
            .push(line.to_string());
        Ok(())
    }

    fn draw(&self, frame: &str) -> Result<(), WorkboardError> {
        self.draws
            .lock()
            .expect("draw lock")
            .push(frame.to_string());
        Ok(())
    }

    fn poll_key(&self, _timeout: Duration) -> Result<Option<char>, WorkboardError> {
        let mut queue = self.keys.lock().expect("keys lock");
        if queue.is_empty() {
            return Ok(None);
        }
        Ok(queue.remove(0))
    }
}
