use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use fs2::FileExt;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, StorageError};
use crate::models::Task;

const LOCK_ATTEMPTS: u32 = 50;
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(20);

/// JSON-file task database.
///
/// All writes that must be atomic (advancing a template and creating its
/// instance) go through [`TaskStore::transaction`].
#[derive(Debug, Clone)]
pub struct TaskStore {
    path: PathBuf,
}

impl TaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TaskStore { path: path.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        TaskStore::new(config.tasks_db.clone())
    }

    /// Path of the tasks database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut p = self.path.clone().into_os_string();
        p.push(".lock");
        PathBuf::from(p)
    }

    /// Loads all tasks from the storage file.
    ///
    /// Returns an empty vector if the file does not exist. A file that exists
    /// but cannot be parsed is an error, never silently treated as empty.
    pub fn load_tasks(&self) -> std::result::Result<Vec<Task>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut f = OpenOptions::new().read(true).open(&self.path)?;
        let mut s = String::new();
        f.read_to_string(&mut s)?;
        if s.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&s)?)
    }

    /// Loads a single task by its ID.
    pub fn load_task(&self, id: u64) -> std::result::Result<Option<Task>, StorageError> {
        Ok(self.load_tasks()?.into_iter().find(|t| t.id == id))
    }

    /// Saves the given list of tasks, replacing the file atomically.
    pub fn save_tasks(&self, tasks: &[Task]) -> std::result::Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let s = serde_json::to_string_pretty(tasks)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        let mut f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)?;
        f.write_all(s.as_bytes())?;
        f.sync_all()?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), count = tasks.len(), "tasks saved");
        Ok(())
    }

    /// Runs `f` on the task list under an exclusive lock and saves the
    /// result. Nothing is written if `f` fails.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<Task>) -> Result<T>,
    {
        let _lock = self.acquire_lock()?;
        let mut tasks = self.load_tasks()?;
        let out = f(&mut tasks)?;
        self.save_tasks(&tasks)?;
        Ok(out)
    }

    /// Deletes the tasks database file.
    pub fn delete_database(&self) -> std::result::Result<(), StorageError> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
            info!(path = %self.path.display(), "task database deleted");
        }
        Ok(())
    }

    /// Takes an exclusive OS lock on `<db>.lock`.
    ///
    /// The lock dies with the process, so a crashed run never leaves the
    /// database locked. The lock file itself is left in place.
    fn acquire_lock(&self) -> std::result::Result<LockGuard, StorageError> {
        let path = self.lock_path();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;
        for attempt in 0..LOCK_ATTEMPTS {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(LockGuard { file }),
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    if attempt == 0 {
                        debug!(path = %path.display(), "waiting for task database lock");
                    }
                    thread::sleep(LOCK_RETRY_DELAY);
                }
                Err(e) => return Err(e.into()),
            }
        }
        warn!(path = %path.display(), "task database lock not released");
        Err(StorageError::Locked(format!(
            "{} is held by another recurdo process",
            path.display()
        )))
    }
}

struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
