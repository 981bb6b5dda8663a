use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock};

use rusqlite::Connection;

use crate::data::{self, repository};
use crate::error::AppError;
use crate::models::job::JobStatus;
use crate::models::settings::AppConfig;

const PAGES_DIR_NAME: &str = "pages";

pub struct AppState {
    pub db: Mutex<Connection>,
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
    pub config: RwLock<AppConfig>,
}

impl AppState {
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        Self::open_with(data_dir, false)
    }

    /// Opens (creating if needed) the store under `data_dir`. With `recreate`
    /// the existing database file is deleted first.
    pub fn open_with(data_dir: impl Into<PathBuf>, recreate: bool) -> Result<Self, AppError> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;
        let db_path = data_dir.join(data::DB_FILE_NAME);

        if recreate {
            for suffix in ["", "-wal", "-shm"] {
                let file = PathBuf::from(format!("{}{suffix}", db_path.display()));
                match std::fs::remove_file(&file) {
                    Ok(()) => log::info!("Removed {}", file.display()),
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                    Err(err) => return Err(err.into()),
                }
            }
        }

        let conn = data::open_store(&db_path)?;
        let config = repository::load_config(&conn)?;
        log::info!("Opened store at {}", db_path.display());

        Ok(Self {
            db: Mutex::new(conn),
            db_path,
            data_dir,
            config: RwLock::new(config),
        })
    }

    /// Opens the store in the platform data directory.
    pub fn open_default() -> Result<Self, AppError> {
        let dirs = directories::ProjectDirs::from("", "", "receipt-finder")
            .ok_or_else(|| AppError::General("no home directory available".to_string()))?;
        Self::open(dirs.data_dir())
    }

    pub fn pages_dir(&self) -> PathBuf {
        self.data_dir.join(PAGES_DIR_NAME)
    }

    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn config(&self) -> AppConfig {
        self.config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Re-reads the settings table into the in-memory configuration.
    pub fn reload_config(&self) -> Result<AppConfig, AppError> {
        let config = repository::load_config(&self.conn())?;
        *self
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = config.clone();
        Ok(config)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Warn,
    Error,
}

impl MessageLevel {
    fn tag(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERR",
        }
    }
}

/// Progress shared between a running job and whoever polls it. Only the
/// message queue needs a lock; scalars are published with release stores.
#[derive(Debug, Default)]
pub struct IndexProgress {
    messages: Mutex<Vec<String>>,
    curr_file_index: AtomicUsize,
    num_files: AtomicUsize,
    status: AtomicU8,
    finished: AtomicBool,
    cancel: AtomicBool,
}

impl IndexProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, level: MessageLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            MessageLevel::Info => log::info!("{message}"),
            MessageLevel::Warn => log::warn!("{message}"),
            MessageLevel::Error => log::error!("{message}"),
        }
        let line = format!(
            "{} {} {message}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            level.tag()
        );
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(line);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(MessageLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.push(MessageLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(MessageLevel::Error, message);
    }

    /// Returns every message queued since the previous call.
    pub fn drain_messages(&self) -> Vec<String> {
        std::mem::take(
            &mut *self
                .messages
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }

    pub fn curr_file_index(&self) -> usize {
        self.curr_file_index.load(Ordering::Acquire)
    }

    pub fn set_curr_file_index(&self, index: usize) {
        self.curr_file_index.store(index, Ordering::Release);
    }

    pub fn num_files(&self) -> usize {
        self.num_files.load(Ordering::Acquire)
    }

    pub fn set_num_files(&self, count: usize) {
        self.num_files.store(count, Ordering::Release);
    }

    pub fn status(&self) -> JobStatus {
        JobStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn set_status(&self, status: JobStatus) {
        self.status.store(status.as_u8(), Ordering::Release);
    }

    /// Publishes the terminal status, then the finished flag.
    pub fn finish(&self, status: JobStatus) {
        debug_assert!(status.is_terminal());
        self.set_status(status);
        self.finished.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    pub fn cancel_flag(&self) -> &AtomicBool {
        &self.cancel
    }
}
