//! Persisted client state. The browser original kept its cache in
//! local/session storage; here the same key-value surface is a trait so
//! the sync logic can be tested against an in-memory fake.

use log::error;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::mpsc,
    thread,
};

/// Key for the cached leaderboard snapshot
pub const SNAPSHOT_KEY: &str = "leaderboard_snapshot";
/// Key for the timestamp the snapshot was last updated at
pub const UPDATED_AT_KEY: &str = "leaderboard_updated_at";
/// Key for the cached hero banner config
pub const HERO_KEY: &str = "hero_config";
/// Key for the stored admin bearer token
pub const ADMIN_TOKEN_KEY: &str = "admin_token";

/// Key-value persistence capability used for the client cache and the
/// admin token
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Storage backed by a JSON file on disk. Values are loaded once when
/// opened; every change hands the full serialized map to a dedicated
/// writer thread so disk I/O never blocks the async workers.
pub struct FileStorage {
    values: Mutex<HashMap<String, String>>,
    writer: Option<mpsc::Sender<String>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl FileStorage {
    /// Opens the storage at the provided path, starting empty if the
    /// file is missing or unreadable
    pub fn open(path: impl Into<PathBuf>) -> FileStorage {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(data) => match serde_json::from_str(&data) {
                Ok(values) => values,
                Err(err) => {
                    error!("Client cache file is malformed, starting empty: {}", err);
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };

        let (writer, pending) = mpsc::channel::<String>();
        let worker = thread::spawn(move || {
            while let Ok(mut data) = pending.recv() {
                // Every message is a full map snapshot, only the
                // newest queued one needs to reach disk
                while let Ok(next) = pending.try_recv() {
                    data = next;
                }
                write_file(&path, &data);
            }
        });

        FileStorage {
            values: Mutex::new(values),
            writer: Some(writer),
            worker: Some(worker),
        }
    }

    /// Queues the current values for the writer thread
    fn flush(&self, values: &HashMap<String, String>) {
        let data = match serde_json::to_string_pretty(values) {
            Ok(value) => value,
            Err(err) => {
                error!("Failed to serialize client cache: {}", err);
                return;
            }
        };

        if let Some(writer) = &self.writer {
            let _ = writer.send(data);
        }
    }
}

impl Drop for FileStorage {
    /// Closes the write channel and waits for queued writes to land
    fn drop(&mut self) {
        drop(self.writer.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn write_file(path: &Path, data: &str) {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    if let Err(err) = fs::write(path, data) {
        error!("Failed to write client cache: {}", err);
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let values = &mut *self.values.lock();
        values.insert(key.to_string(), value.to_string());
        self.flush(values);
    }

    fn remove(&self, key: &str) {
        let values = &mut *self.values.lock();
        values.remove(key);
        self.flush(values);
    }
}

/// In-memory storage used by tests and for session-scoped admin tokens
/// that shouldn't outlive the process
#[derive(Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values.lock().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.values.lock().remove(key);
    }
}

#[cfg(test)]
mod test {
    use super::{FileStorage, MemoryStorage, Storage};
    use std::{env, fs};

    /// Tests basic get/set/remove behaviour of the in-memory storage
    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::default();
        assert_eq!(storage.get("a"), None);

        storage.set("a", "1");
        assert_eq!(storage.get("a"), Some("1".to_string()));

        storage.remove("a");
        assert_eq!(storage.get("a"), None);
    }

    /// Tests that values written to the file storage survive reopening
    #[test]
    fn test_file_storage_reopen() {
        let path = env::temp_dir().join(format!("tr-cache-{}.json", std::process::id()));
        let _ = fs::remove_file(&path);

        {
            let storage = FileStorage::open(&path);
            storage.set("snapshot", "[]");
        }

        let storage = FileStorage::open(&path);
        assert_eq!(storage.get("snapshot"), Some("[]".to_string()));

        let _ = fs::remove_file(&path);
    }

    /// Tests that rapid successive writes land newest-last: the
    /// reopened file holds the final value of every key
    #[test]
    fn test_file_storage_write_order() {
        let path = env::temp_dir().join(format!("tr-cache-order-{}.json", std::process::id()));
        let _ = fs::remove_file(&path);

        {
            let storage = FileStorage::open(&path);
            storage.set("a", "1");
            storage.set("a", "2");
            storage.set("b", "3");
        }

        let storage = FileStorage::open(&path);
        assert_eq!(storage.get("a"), Some("2".to_string()));
        assert_eq!(storage.get("b"), Some("3".to_string()));

        let _ = fs::remove_file(&path);
    }

    /// Tests that a malformed cache file falls back to empty storage
    #[test]
    fn test_file_storage_malformed() {
        let path = env::temp_dir().join(format!("tr-cache-bad-{}.json", std::process::id()));
        fs::write(&path, "not json").unwrap();

        let storage = FileStorage::open(&path);
        assert_eq!(storage.get("snapshot"), None);

        let _ = fs::remove_file(&path);
    }
}
