//! Persistence of the two aggregates (`settings`, `transactions`).
//!
//! Each aggregate is written whole as JSON under a fixed key, wrapped in a
//! small envelope carrying a schema version. Values written before the
//! envelope existed (bare JSON) are still accepted on load.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{Settings, Transaction};

pub const SETTINGS_KEY: &str = "settings";
pub const TRANSACTIONS_KEY: &str = "transactions";

/// Schema version written into every envelope.
pub const SCHEMA_VERSION: u32 = 1;

/// Appended to a key to name the copy of a value that could not be read.
pub const UNREADABLE_SUFFIX: &str = ".unreadable";

/// Synchronous string key/value store scoped to one origin.
pub trait KeyValueStore: Send {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&mut self, key: &str, value: &str) -> Result<()>;
    /// Removing an absent key succeeds.
    fn remove_item(&mut self, key: &str) -> Result<()>;
    fn keys(&self) -> Result<Vec<String>>;
}

/// Process-local store, used for tests and throwaway sessions.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    items: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        self.items.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.items.keys().cloned().collect())
    }
}

/// Typed access to the aggregates on top of a [`KeyValueStore`].
pub struct PersistentStore {
    backend: Box<dyn KeyValueStore>,
}

impl PersistentStore {
    pub fn new(backend: impl KeyValueStore + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    pub fn backend(&self) -> &dyn KeyValueStore {
        self.backend.as_ref()
    }

    /// Raw JSON stored under `key`, unwrapped from its envelope.
    ///
    /// Absent keys, unparseable text and envelopes from a newer schema all
    /// read as `None`; the last two are logged.
    pub fn read_json(&self, key: &str) -> Result<Option<Value>> {
        let Some(raw) = self.backend.get_item(key)? else {
            return Ok(None);
        };
        match decode::<Value>(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(reason) => {
                warn!(key, %reason, "storage: ignoring unreadable value");
                Ok(None)
            }
        }
    }

    pub fn write_json(&mut self, key: &str, data: Value) -> Result<()> {
        let envelope = serde_json::json!({
            "schemaVersion": SCHEMA_VERSION,
            "data": data,
        });
        self.backend.set_item(key, &envelope.to_string())?;
        debug!(key, "storage: wrote aggregate");
        Ok(())
    }

    /// Parsed value under `key`, or `T::default()` when absent or unreadable.
    ///
    /// An unreadable value stays in place; [`PersistentStore::save`] moves it
    /// aside before the slot is overwritten.
    pub fn load<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        let Some(raw) = self.backend.get_item(key)? else {
            return Ok(T::default());
        };
        match decode::<T>(&raw) {
            Ok(parsed) => Ok(parsed),
            Err(reason) => {
                warn!(key, %reason, "storage: unreadable value, using default");
                Ok(T::default())
            }
        }
    }

    /// Write `value` under `key`. `T` is the type the slot loads as; a stored
    /// value that does not decode as `T` is first copied to a backup key.
    pub fn save<T>(&mut self, key: &str, value: &T) -> Result<()>
    where
        T: Serialize + DeserializeOwned,
    {
        self.preserve_unreadable::<T>(key)?;
        let data = serde_json::to_value(value)?;
        self.write_json(key, data)
    }

    fn preserve_unreadable<T: DeserializeOwned>(&mut self, key: &str) -> Result<()> {
        let Some(raw) = self.backend.get_item(key)? else {
            return Ok(());
        };
        if decode::<T>(&raw).is_ok() {
            return Ok(());
        }
        let backup = self.free_backup_key(key)?;
        self.backend.set_item(&backup, &raw)?;
        warn!(key, backup = %backup, "storage: kept unreadable value aside before overwrite");
        Ok(())
    }

    /// `{key}.unreadable`, or `{key}.unreadable.N` when earlier backups exist.
    fn free_backup_key(&self, key: &str) -> Result<String> {
        let taken = self.backend.keys()?;
        let base = format!("{key}{UNREADABLE_SUFFIX}");
        let mut candidate = base.clone();
        let mut n = 2;
        while taken.contains(&candidate) {
            candidate = format!("{base}.{n}");
            n += 1;
        }
        Ok(candidate)
    }

    pub fn remove(&mut self, key: &str) -> Result<()> {
        self.backend.remove_item(key)
    }

    pub fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.backend.get_item(key)?.is_some())
    }

    pub fn load_settings(&self) -> Result<Settings> {
        self.load(SETTINGS_KEY)
    }

    pub fn save_settings(&mut self, settings: &Settings) -> Result<()> {
        self.save(SETTINGS_KEY, settings)
    }

    pub fn clear_settings(&mut self) -> Result<()> {
        self.remove(SETTINGS_KEY)
    }

    pub fn load_transactions(&self) -> Result<Vec<Transaction>> {
        self.load(TRANSACTIONS_KEY)
    }

    pub fn save_transactions(&mut self, transactions: &[Transaction]) -> Result<()> {
        self.save(TRANSACTIONS_KEY, &transactions.to_vec())
    }
}

/// Stored text to `T`, or the reason it cannot be read.
fn decode<T: DeserializeOwned>(raw: &str) -> std::result::Result<T, String> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| format!("malformed JSON: {e}"))?;
    let data = unwrap_envelope(value)?;
    serde_json::from_value(data).map_err(|e| format!("wrong shape: {e}"))
}

fn unwrap_envelope(value: Value) -> std::result::Result<Value, String> {
    let version = value.get("schemaVersion").and_then(Value::as_u64);
    match (version, value) {
        (Some(v), _) if v > u64::from(SCHEMA_VERSION) => {
            Err(format!("written by schema v{v}"))
        }
        (Some(_), Value::Object(mut obj)) if obj.contains_key("data") => {
            Ok(obj.remove("data").unwrap_or(Value::Null))
        }
        // Legacy bare value.
        (_, value) => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::models::{Currency, TransactionStatus};
    use chrono::{TimeZone, Utc};

    fn sample_settings() -> Settings {
        Settings {
            shop_name: "Psar Thmey Corner".into(),
            shop_address: "St. 130, Phnom Penh".into(),
            shop_phone: "+855 12 345 678".into(),
            shop_email: "hello@corner.example".into(),
            currency: Currency::Khr,
            language: "en".into(),
            dark_mode: true,
        }
    }

    #[test]
    fn settings_round_trip_memory() {
        let mut store = PersistentStore::new(MemoryStore::new());
        let settings = sample_settings();
        store.save_settings(&settings).unwrap();
        assert_eq!(store.load_settings().unwrap(), settings);
    }

    #[test]
    fn settings_round_trip_sqlite() {
        let mut store = PersistentStore::new(SqliteStore::open_in_memory("app://t").unwrap());
        let settings = sample_settings();
        store.save_settings(&settings).unwrap();
        assert_eq!(store.load_settings().unwrap(), settings);
    }

    #[test]
    fn transactions_round_trip() {
        let mut store = PersistentStore::new(MemoryStore::new());
        let list = vec![Transaction {
            id: "TXN0001".into(),
            date: Utc.with_ymd_and_hms(2026, 5, 1, 9, 30, 0).unwrap(),
            customer: Some("Vanna".into()),
            amount: 42.0,
            status: TransactionStatus::Pending,
        }];
        store.save_transactions(&list).unwrap();
        assert_eq!(store.load_transactions().unwrap(), list);
    }

    #[test]
    fn absent_keys_load_defaults() {
        let store = PersistentStore::new(MemoryStore::new());
        assert_eq!(store.load_settings().unwrap(), Settings::default());
        assert!(store.load_transactions().unwrap().is_empty());
    }

    #[test]
    fn writes_are_wrapped_in_a_versioned_envelope() {
        let mut store = PersistentStore::new(MemoryStore::new());
        store.save_transactions(&[]).unwrap();
        let raw = store.backend().get_item(TRANSACTIONS_KEY).unwrap().unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["schemaVersion"], 1);
        assert_eq!(value["data"], serde_json::json!([]));
    }

    #[test]
    fn legacy_bare_values_still_load() {
        let mut backend = MemoryStore::new();
        backend
            .set_item(SETTINGS_KEY, r#"{"shopName":"Old Shop","darkMode":true}"#)
            .unwrap();
        let store = PersistentStore::new(backend);
        let loaded = store.load_settings().unwrap();
        assert_eq!(loaded.shop_name, "Old Shop");
        assert!(loaded.dark_mode);
        assert_eq!(loaded.currency, Currency::Usd);
    }

    // A corrupt blob must not take the whole page down.
    #[test]
    fn malformed_json_falls_back_to_default() {
        let mut backend = MemoryStore::new();
        backend.set_item(TRANSACTIONS_KEY, "[{not json").unwrap();
        backend.set_item(SETTINGS_KEY, "42").unwrap();
        let store = PersistentStore::new(backend);
        assert!(store.load_transactions().unwrap().is_empty());
        assert_eq!(store.load_settings().unwrap(), Settings::default());
    }

    #[test]
    fn newer_schema_is_ignored() {
        let mut backend = MemoryStore::new();
        backend
            .set_item(SETTINGS_KEY, r#"{"schemaVersion":9,"data":{"shopName":"Future"}}"#)
            .unwrap();
        let store = PersistentStore::new(backend);
        assert_eq!(store.load_settings().unwrap(), Settings::default());
    }

    fn ledger_row(id: &str, status: &str) -> Value {
        serde_json::json!({
            "id": id,
            "date": "2026-05-01T09:30:00Z",
            "customer": null,
            "amount": 2.0,
            "status": status,
        })
    }

    #[test]
    fn newer_schema_ledger_is_kept_aside_before_overwrite() {
        let newer = r#"{"schemaVersion":2,"data":[{"id":"TXNOLD","total":{"minor":100}}]}"#;
        let mut backend = MemoryStore::new();
        backend.set_item(TRANSACTIONS_KEY, newer).unwrap();
        let mut store = PersistentStore::new(backend);

        let mut ledger = store.load_transactions().unwrap();
        assert!(ledger.is_empty());
        ledger.push(Transaction {
            id: "TXNNEW".into(),
            date: Utc.with_ymd_and_hms(2026, 5, 2, 8, 0, 0).unwrap(),
            customer: None,
            amount: 1.0,
            status: TransactionStatus::Completed,
        });
        store.save_transactions(&ledger).unwrap();

        assert_eq!(
            store.backend().get_item("transactions.unreadable").unwrap().as_deref(),
            Some(newer)
        );
        assert_eq!(store.load_transactions().unwrap(), ledger);
    }

    #[test]
    fn one_bad_row_keeps_the_whole_ledger_aside() {
        let stored = serde_json::json!([
            ledger_row("TXNA", "completed"),
            ledger_row("TXNB", "refunded"),
        ])
        .to_string();
        let mut backend = MemoryStore::new();
        backend.set_item(TRANSACTIONS_KEY, &stored).unwrap();
        let mut store = PersistentStore::new(backend);

        assert!(store.load_transactions().unwrap().is_empty());
        store.save_transactions(&[]).unwrap();
        let kept = store.backend().get_item("transactions.unreadable").unwrap();
        assert_eq!(kept.as_deref(), Some(stored.as_str()));
        assert!(kept.is_some_and(|raw| raw.contains("TXNA")));
    }

    #[test]
    fn readable_values_are_overwritten_without_backup() {
        let mut store = PersistentStore::new(MemoryStore::new());
        store.save_settings(&Settings::default()).unwrap();
        store.save_settings(&sample_settings()).unwrap();
        store.save_transactions(&[]).unwrap();
        store.save_transactions(&[]).unwrap();
        assert_eq!(
            store.backend().keys().unwrap(),
            vec![SETTINGS_KEY.to_string(), TRANSACTIONS_KEY.to_string()]
        );
    }

    #[test]
    fn earlier_backups_are_not_clobbered() {
        let mut backend = MemoryStore::new();
        backend.set_item("settings.unreadable", "first").unwrap();
        backend.set_item(SETTINGS_KEY, "{broken").unwrap();
        let mut store = PersistentStore::new(backend);

        store.save_settings(&sample_settings()).unwrap();
        let backend = store.backend();
        assert_eq!(backend.get_item("settings.unreadable").unwrap().as_deref(), Some("first"));
        assert_eq!(
            backend.get_item("settings.unreadable.2").unwrap().as_deref(),
            Some("{broken")
        );
        assert_eq!(store.load_settings().unwrap(), sample_settings());
    }

    #[test]
    fn clear_settings_removes_the_key() {
        let mut store = PersistentStore::new(MemoryStore::new());
        store.save_settings(&sample_settings()).unwrap();
        assert!(store.contains(SETTINGS_KEY).unwrap());
        store.clear_settings().unwrap();
        assert!(!store.contains(SETTINGS_KEY).unwrap());
    }
}
