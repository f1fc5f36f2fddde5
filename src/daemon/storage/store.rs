use std::{
    collections::HashMap,
    fmt::Display,
    future::Future,
    ops::Deref,
    path::PathBuf,
    sync::Mutex,
};

use anyhow::{anyhow, Result};
use fs4::tokio::AsyncFileExt;
use serde_json::{Map, Value};
use tokio::fs::File;
use tracing::debug;

use crate::fs::operations::{read_optional, write_atomically};

/// Keys of the persisted document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    TimeData,
    DailyStats,
    Settings,
}

impl StorageKey {
    pub const ALL: [StorageKey; 3] = [
        StorageKey::TimeData,
        StorageKey::DailyStats,
        StorageKey::Settings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::TimeData => "timeData",
            StorageKey::DailyStats => "dailyStats",
            StorageKey::Settings => "settings",
        }
    }
}

impl Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type StorageValues = HashMap<StorageKey, Value>;

/// Durable key-value state. Keys that are not stored are absent from the result of
/// [KeyValueStore::get]. A [KeyValueStore::set] either stores every passed key or none of them.
pub trait KeyValueStore {
    fn get(&self, keys: &[StorageKey]) -> impl Future<Output = Result<StorageValues>>;

    fn set(&self, values: StorageValues) -> impl Future<Output = Result<()>>;
}

impl<T: Deref> KeyValueStore for T
where
    T::Target: KeyValueStore,
{
    fn get(&self, keys: &[StorageKey]) -> impl Future<Output = Result<StorageValues>> {
        self.deref().get(keys)
    }

    fn set(&self, values: StorageValues) -> impl Future<Output = Result<()>> {
        self.deref().set(values)
    }
}

fn pick(document: &Map<String, Value>, keys: &[StorageKey]) -> StorageValues {
    keys.iter()
        .filter_map(|key| document.get(key.as_str()).map(|v| (*key, v.clone())))
        .collect()
}

/// The main realization of [KeyValueStore]. Everything lives in one JSON document, `state.json`.
/// The document is replaced as a whole on every write, so a reader sees either the old or the new
/// version.
pub struct JsonFileStore {
    document_path: PathBuf,
    lock_path: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&dir)?;

        Ok(Self {
            document_path: dir.join("state.json"),
            lock_path: dir.join("state.lock"),
        })
    }

    async fn open_lock(&self) -> Result<File> {
        Ok(File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
            .await?)
    }

    async fn read_document(&self) -> Result<Map<String, Value>> {
        match read_optional(&self.document_path).await? {
            None => Ok(Map::new()),
            Some(bytes) if bytes.is_empty() => Ok(Map::new()),
            Some(bytes) => match serde_json::from_slice::<Value>(&bytes)? {
                Value::Object(map) => Ok(map),
                other => Err(anyhow!(
                    "State document {:?} is not an object: {other}",
                    self.document_path
                )),
            },
        }
    }
}

impl KeyValueStore for JsonFileStore {
    async fn get(&self, keys: &[StorageKey]) -> Result<StorageValues> {
        let lock = self.open_lock().await?;
        lock.lock_shared()?;
        let result = self.read_document().await;
        lock.unlock_async().await?;
        Ok(pick(&result?, keys))
    }

    async fn set(&self, values: StorageValues) -> Result<()> {
        let lock = self.open_lock().await?;
        // Semi-safe acquire-release for the document
        lock.lock_exclusive()?;
        let result: Result<()> = async {
            let mut document = self.read_document().await?;
            for (key, value) in values {
                debug!("Writing {key}");
                document.insert(key.as_str().to_owned(), value);
            }
            let bytes = serde_json::to_vec(&Value::Object(document))?;
            write_atomically(&self.document_path, &bytes).await?;
            Ok(())
        }
        .await;
        lock.unlock_async().await?;
        result
    }
}

/// Keeps the document in memory. Used by ephemeral hosts and tests.
#[derive(Default)]
pub struct MemoryStore {
    document: Mutex<Map<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn document(&self) -> Result<std::sync::MutexGuard<'_, Map<String, Value>>> {
        self.document
            .lock()
            .map_err(|_| anyhow!("Memory store was poisoned"))
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, keys: &[StorageKey]) -> Result<StorageValues> {
        Ok(pick(&*self.document()?, keys))
    }

    async fn set(&self, values: StorageValues) -> Result<()> {
        let mut document = self.document()?;
        for (key, value) in values {
            document.insert(key.as_str().to_owned(), value);
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use serde_json::json;
    use tempfile::tempdir;

    use super::{JsonFileStore, KeyValueStore, MemoryStore, StorageKey, StorageValues};

    #[tokio::test]
    async fn test_file_store_missing_keys_are_absent() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonFileStore::new(dir.path().to_owned())?;

        let values = store.get(&StorageKey::ALL).await?;
        assert!(values.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_file_store_merges_writes() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonFileStore::new(dir.path().to_owned())?;

        store
            .set(StorageValues::from([(StorageKey::TimeData, json!([]))]))
            .await?;
        store
            .set(StorageValues::from([(
                StorageKey::Settings,
                json!({"autoTracking": false}),
            )]))
            .await?;

        let values = store.get(&StorageKey::ALL).await?;
        assert_eq!(values.len(), 2);
        assert_eq!(values[&StorageKey::TimeData], json!([]));
        assert_eq!(values[&StorageKey::Settings]["autoTracking"], json!(false));

        let reopened = JsonFileStore::new(dir.path().to_owned())?;
        let values = reopened.get(&[StorageKey::Settings]).await?;
        assert_eq!(values.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_file_store_rejects_corrupted_document() -> Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join("state.json"), b"{\"timeData\": [")?;
        let store = JsonFileStore::new(dir.path().to_owned())?;

        assert!(store.get(&[StorageKey::TimeData]).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_store_through_arc() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        store
            .set(StorageValues::from([(StorageKey::DailyStats, json!({}))]))
            .await?;
        let values = store.get(&[StorageKey::DailyStats, StorageKey::TimeData]).await?;
        assert_eq!(values.len(), 1);
        assert_eq!(values[&StorageKey::DailyStats], json!({}));
        Ok(())
    }
}
