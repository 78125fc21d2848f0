//! File-backed key/value store for client-side state.
//!
//! Values are JSON. Every write goes to disk immediately and is broadcast as
//! a [`StorageEvent`] to all subscribers of the same store, so several views
//! holding clones of one store stay in sync. [`LocalStore::reload`] picks up
//! writes made by another process.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::warn;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access store file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode value: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StorageEvent {
    pub key: String,
    /// `None` when the key was removed.
    pub new_value: Option<Value>,
}

#[derive(Clone)]
pub struct LocalStore {
    inner: Arc<Inner>,
}

struct Inner {
    path: PathBuf,
    data: Mutex<Map<String, Value>>,
    events: broadcast::Sender<StorageEvent>,
}

impl LocalStore {
    /// Opens the store at `path`. A missing file is an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let data = read_map(&path)?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            inner: Arc::new(Inner {
                path,
                data: Mutex::new(data),
                events,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    fn data(&self) -> MutexGuard<'_, Map<String, Value>> {
        self.inner.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reads `key`. A value that no longer matches `T` reads as absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.data().get(key).cloned()?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("ignoring unreadable value for '{}': {}", key, e);
                None
            }
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(value)?;
        {
            let mut data = self.data();
            data.insert(key.to_string(), value.clone());
            write_map(&self.inner.path, &data)?;
        }
        self.notify(key, Some(value));
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        let removed = {
            let mut data = self.data();
            let removed = data.remove(key).is_some();
            if removed {
                write_map(&self.inner.path, &data)?;
            }
            removed
        };
        if removed {
            self.notify(key, None);
        }
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.inner.events.subscribe()
    }

    /// Re-reads the file and emits an event for every key that changed.
    pub fn reload(&self) -> Result<usize, StoreError> {
        let fresh = read_map(&self.inner.path)?;
        let mut events = Vec::new();
        {
            let mut data = self.data();
            for (key, value) in &fresh {
                if data.get(key) != Some(value) {
                    events.push(StorageEvent {
                        key: key.clone(),
                        new_value: Some(value.clone()),
                    });
                }
            }
            for key in data.keys() {
                if !fresh.contains_key(key) {
                    events.push(StorageEvent {
                        key: key.clone(),
                        new_value: None,
                    });
                }
            }
            *data = fresh;
        }

        let changed = events.len();
        for event in events {
            // No subscribers is fine.
            let _ = self.inner.events.send(event);
        }
        Ok(changed)
    }

    fn notify(&self, key: &str, new_value: Option<Value>) {
        let _ = self.inner.events.send(StorageEvent {
            key: key.to_string(),
            new_value,
        });
    }
}

fn read_map(path: &Path) -> Result<Map<String, Value>, StoreError> {
    if !path.exists() {
        return Ok(Map::new());
    }
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(&contents)? {
        Value::Object(map) => Ok(map),
        _ => {
            warn!("store file {} is not a JSON object, starting empty", path.display());
            Ok(Map::new())
        }
    }
}

fn write_map(path: &Path, data: &Map<String, Value>) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(data)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// One key of a [`LocalStore`] with a default, kept in memory.
pub struct LocalValue<T> {
    store: LocalStore,
    key: String,
    default: T,
    value: T,
}

impl<T> LocalValue<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    pub fn new(store: LocalStore, key: impl Into<String>, default: T) -> Self {
        let key = key.into();
        let value = store.get(&key).unwrap_or_else(|| default.clone());
        Self {
            store,
            key,
            default,
            value,
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn set(&mut self, value: T) -> Result<(), StoreError> {
        self.store.set(&self.key, &value)?;
        self.value = value;
        Ok(())
    }

    /// Applies a change made through another handle. Returns true when the
    /// event was for this key.
    pub fn sync(&mut self, event: &StorageEvent) -> bool {
        if event.key != self.key {
            return false;
        }
        self.value = match &event.new_value {
            Some(raw) => match serde_json::from_value(raw.clone()) {
                Ok(v) => v,
                Err(e) => {
                    warn!("ignoring unreadable update for '{}': {}", self.key, e);
                    return true;
                }
            },
            None => self.default.clone(),
        };
        true
    }
}
