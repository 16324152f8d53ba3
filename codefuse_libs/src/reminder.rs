//! Contest reminders kept in a key/value storage.
//!
//! All reminders live under a single key as a JSON object mapping contest id to the epoch
//! millisecond at which the reminder fires. Reminders only fire from [`ReminderScheduler`], which
//! removes each due entry before notifying so a reminder is delivered at most once.

use chrono::{DateTime, TimeZone, Utc};
use fs2::FileExt;
use std::{
    collections::{BTreeMap, HashMap},
    fs::{self, OpenOptions},
    future::Future,
    io::{BufWriter, ErrorKind, Write},
    path::{Path, PathBuf},
    sync::Mutex,
    time::Duration,
};
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::time;

pub const REMINDER_KEY: &str = "contestReminders";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

pub type Result<T> = std::result::Result<T, ReminderError>;

#[derive(Debug, Error)]
pub enum ReminderError {
    #[error("failed to access reminder storage: {0}")]
    IoError(#[from] std::io::Error),
    #[error("failed to serialize reminders: {0}")]
    SerializeError(#[from] serde_json::Error),
}

/// Key/value storage the reminders are kept in.
pub trait ReminderStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;

    /// Read-modify-write of `key` as one step: no other write lands between the read and the
    /// write. `f` receives the current value and returns the new one, `None` deletes the key.
    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(Option<&str>) -> Result<Option<String>>,
    ) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ReminderStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries().remove(key);
        Ok(())
    }

    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(Option<&str>) -> Result<Option<String>>,
    ) -> Result<()> {
        let mut entries = self.entries();
        let value = f(entries.get(key).map(String::as_str))?;
        match value {
            Some(value) => entries.insert(key.to_string(), value),
            None => entries.remove(key),
        };
        Ok(())
    }
}

/// Storage backed by a JSON file holding a string to string object.
///
/// Every access holds an advisory lock on a `.lock` file next to the data file, so several
/// processes can share one store. The data file is replaced atomically on write.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock_path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let mut lock_path = path.clone().into_os_string();
        lock_path.push(".lock");

        Self {
            path,
            lock_path: PathBuf::from(lock_path),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn directory(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// Run `f` while holding both the in-process and the file lock.
    fn locked<T>(&self, exclusive: bool, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let directory = self.directory();
        if !directory.exists() {
            tracing::info!("create reminder storage directory {}", directory.display());
            fs::create_dir_all(directory)?;
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&self.lock_path)?;
        if exclusive {
            FileExt::lock_exclusive(&lock_file)?;
        } else {
            FileExt::lock_shared(&lock_file)?;
        }

        let result = f();
        if let Err(e) = FileExt::unlock(&lock_file) {
            tracing::warn!("failed to unlock {}: {}", self.lock_path.display(), e);
        }
        result
    }

    fn read(&self) -> Result<BTreeMap<String, String>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        match serde_json::from_str(&content) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                tracing::warn!(
                    "reminder storage {} is corrupted and will be treated as empty: {}",
                    self.path.display(),
                    e
                );
                Ok(BTreeMap::new())
            }
        }
    }

    fn write(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let mut file = NamedTempFile::new_in(self.directory())?;
        {
            let mut writer = BufWriter::new(file.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, entries)?;
            writer.flush()?;
        }
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn modify<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> Result<()>,
    {
        self.locked(true, || {
            let mut entries = self.read()?;
            let before = entries.clone();
            f(&mut entries)?;
            if entries != before {
                self.write(&entries)?;
            }
            Ok(())
        })
    }
}

impl ReminderStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.locked(false, || Ok(self.read()?.remove(key)))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.modify(|entries| {
            entries.insert(key.to_string(), value.to_string());
            Ok(())
        })
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.modify(|entries| {
            entries.remove(key);
            Ok(())
        })
    }

    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(Option<&str>) -> Result<Option<String>>,
    ) -> Result<()> {
        self.modify(|entries| {
            let value = f(entries.get(key).map(String::as_str))?;
            match value {
                Some(value) => entries.insert(key.to_string(), value),
                None => entries.remove(key),
            };
            Ok(())
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub contest_id: String,
    pub fire_at: DateTime<Utc>,
}

pub struct ReminderStore<S> {
    storage: S,
}

impl<S: ReminderStorage> ReminderStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn load(&self) -> Result<BTreeMap<String, i64>> {
        Ok(parse_entries(self.storage.get(REMINDER_KEY)?.as_deref()))
    }

    /// Apply `f` to the stored entries in a single storage update.
    fn modify<T, F>(&self, mut f: F) -> Result<T>
    where
        T: Default,
        F: FnMut(&mut BTreeMap<String, i64>) -> T,
    {
        let mut output = None;
        self.storage.update(REMINDER_KEY, &mut |raw: Option<&str>| -> Result<Option<String>> {
            let mut entries = parse_entries(raw);
            output = Some(f(&mut entries));
            if entries.is_empty() {
                Ok(None)
            } else {
                Ok(Some(serde_json::to_string(&entries)?))
            }
        })?;
        Ok(output.unwrap_or_default())
    }

    /// Schedule a reminder for `contest_id`, replacing any previous one.
    pub fn set_reminder(&self, contest_id: &str, at: DateTime<Utc>) -> Result<()> {
        let millis = at.timestamp_millis();
        self.modify(|entries| {
            if let Some(previous) = entries.insert(contest_id.to_string(), millis) {
                tracing::info!(
                    "reminder for {} moved from {} to {}",
                    contest_id,
                    previous,
                    millis
                );
            }
        })
    }

    /// Remove the reminder of `contest_id`. Returns whether one existed.
    pub fn cancel_reminder(&self, contest_id: &str) -> Result<bool> {
        self.modify(|entries| entries.remove(contest_id).is_some())
    }

    /// Every stored reminder in firing order.
    pub fn reminders(&self) -> Result<Vec<Reminder>> {
        let mut reminders: Vec<Reminder> = self
            .load()?
            .into_iter()
            .filter_map(|(contest_id, millis)| to_reminder(contest_id, millis))
            .collect();
        reminders.sort_by(|a, b| a.fire_at.cmp(&b.fire_at).then(a.contest_id.cmp(&b.contest_id)));
        Ok(reminders)
    }

    /// Remove and return every reminder due at `now`.
    pub fn check_reminders(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
        let now_millis = now.timestamp_millis();
        let due: BTreeMap<String, i64> = self.modify(|entries| {
            let (due, pending): (BTreeMap<String, i64>, BTreeMap<String, i64>) =
                std::mem::take(entries)
                    .into_iter()
                    .partition(|(_, millis)| *millis <= now_millis);
            *entries = pending;
            due
        })?;

        let mut due: Vec<Reminder> = due
            .into_iter()
            .filter_map(|(contest_id, millis)| to_reminder(contest_id, millis))
            .collect();
        due.sort_by(|a, b| a.fire_at.cmp(&b.fire_at));
        Ok(due)
    }
}

fn parse_entries(raw: Option<&str>) -> BTreeMap<String, i64> {
    let Some(raw) = raw else {
        return BTreeMap::new();
    };

    match serde_json::from_str(raw) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("stored reminders are corrupted and will be discarded: {}", e);
            BTreeMap::new()
        }
    }
}

fn to_reminder(contest_id: String, millis: i64) -> Option<Reminder> {
    match Utc.timestamp_millis_opt(millis).single() {
        Some(fire_at) => Some(Reminder {
            contest_id,
            fire_at,
        }),
        None => {
            tracing::warn!("drop reminder {} with invalid time {}", contest_id, millis);
            None
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, reminder: &Reminder);
}

/// Notifier writing reminders to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, reminder: &Reminder) {
        tracing::info!(
            target: "reminder",
            "CodeFuse Reminder: {} is starting soon! (scheduled at {})",
            reminder.contest_id,
            reminder.fire_at.to_rfc3339()
        );
    }
}

/// Polls the store on a fixed interval and hands due reminders to the notifier.
pub struct ReminderScheduler<S, N> {
    store: ReminderStore<S>,
    notifier: N,
    interval: Duration,
}

impl<S: ReminderStorage, N: Notifier> ReminderScheduler<S, N> {
    pub fn new(store: ReminderStore<S>, notifier: N, interval: Duration) -> Self {
        Self {
            store,
            notifier,
            interval,
        }
    }

    pub fn store(&self) -> &ReminderStore<S> {
        &self.store
    }

    /// Fire every reminder due at `now`. Returns how many fired.
    pub fn tick(&self, now: DateTime<Utc>) -> Result<usize> {
        let due = self.store.check_reminders(now)?;
        for reminder in due.iter() {
            self.notifier.notify(reminder);
        }
        Ok(due.len())
    }

    /// Check once immediately, then on every interval until `shutdown` completes.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let mut interval = time::interval(self.interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.tick(Utc::now()) {
                        Ok(0) => {}
                        Ok(fired) => tracing::info!("{} reminders fired", fired),
                        Err(e) => tracing::error!("failed to check reminders: {:?}", e),
                    }
                }
                _ = &mut shutdown => {
                    tracing::info!("stop polling reminders");
                    return Ok(());
                }
            }
        }
    }
}
