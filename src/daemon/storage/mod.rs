//!  Storage is organized through [store::KeyValueStore].
//!  The basic idea is:
//!   - There is a single document with three keys: `timeData`, `dailyStats` and `settings`.
//!   - Values are plain JSON, the typed view lives in [entities].
//!   - Every write replaces the passed keys together, so related keys are written in one call.

pub mod entities;
pub mod store;

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

use entities::{DailyStatsMap, HistoryLog, Settings};
use store::{KeyValueStore, StorageKey, StorageValues};

/// Takes a typed value out of the result of [KeyValueStore::get]. Absent keys decode into the
/// default value.
pub fn decode<T: DeserializeOwned + Default>(
    values: &mut StorageValues,
    key: StorageKey,
) -> Result<T> {
    match values.remove(&key) {
        Some(Value::Null) | None => Ok(T::default()),
        Some(value) => serde_json::from_value(value).with_context(|| format!("Malformed {key}")),
    }
}

pub fn encode<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

fn default_value(key: StorageKey) -> Result<Value> {
    match key {
        StorageKey::TimeData => encode(&HistoryLog::new()),
        StorageKey::DailyStats => encode(&DailyStatsMap::new()),
        StorageKey::Settings => encode(&Settings::default()),
    }
}

/// Populates every absent key with its default value. Values that already exist are never
/// touched.
#[instrument(skip_all)]
pub async fn initialize(store: &impl KeyValueStore) -> Result<()> {
    let existing = store.get(&StorageKey::ALL).await?;

    let mut missing = StorageValues::new();
    for key in StorageKey::ALL {
        if !existing.contains_key(&key) {
            missing.insert(key, default_value(key)?);
        }
    }

    if missing.is_empty() {
        debug!("Storage is already initialized");
        return Ok(());
    }

    info!("Initializing {} storage keys", missing.len());
    store.set(missing).await
}
