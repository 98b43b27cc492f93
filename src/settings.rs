//! Viewer color/opacity settings.
//!
//! Settings live as one JSON blob under [`SETTINGS_KEY`] in a key-value store.
//! Loading merges the stored values over the defaults; every save merges a
//! patch, persists the whole blob and then notifies subscribers.

use std::collections::HashMap;
use std::fmt;

use log::{debug, warn};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{ReplayError, Result};

/// Storage key of the settings blob.
pub const SETTINGS_KEY: &str = "logViewerSettings";

// ============================================================================
// Settings
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub primary_plane_color: String,
    pub secondary_plane_color: String,
    pub primary_path_color: String,
    pub secondary_path_color: String,
    pub boundary_color: String,
    pub boundary_fill_color: String,
    /// 0.0 - 1.0; older blobs store it as a string
    #[serde(deserialize_with = "number_or_string")]
    pub boundary_fill_opacity: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            primary_plane_color: "#ff0000".to_string(),
            secondary_plane_color: "#faa200".to_string(),
            primary_path_color: "#00f2ff".to_string(),
            secondary_path_color: "#00ff00".to_string(),
            boundary_color: "#ff0000".to_string(),
            boundary_fill_color: "#3700ff".to_string(),
            boundary_fill_opacity: 0.2,
        }
    }
}

fn number_or_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

impl Settings {
    /// Overlay the keys of a JSON object onto these settings.
    ///
    /// Unknown keys are ignored.
    pub fn merged(&self, patch: &Value) -> Result<Self> {
        let Value::Object(patch) = patch else {
            return Err(ReplayError::Parse {
                message: "settings patch must be a JSON object".to_string(),
            });
        };
        let mut base = serde_json::to_value(self)?;
        if let Value::Object(fields) = &mut base {
            for (key, value) in patch {
                fields.insert(key.clone(), value.clone());
            }
        }
        Ok(serde_json::from_value(base)?)
    }
}

// ============================================================================
// Key-Value Storage
// ============================================================================

/// String key-value storage, the local-storage analogue.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// SQLite-backed key-value store.
#[cfg(feature = "persistence")]
pub struct SqliteStore {
    db: rusqlite::Connection,
}

#[cfg(feature = "persistence")]
impl SqliteStore {
    /// Open (or create) the database at `db_path`.
    pub fn new(db_path: &str) -> Result<Self> {
        let db = rusqlite::Connection::open(db_path)?;
        Self::init(db)
    }

    pub fn in_memory() -> Result<Self> {
        let db = rusqlite::Connection::open_in_memory()?;
        Self::init(db)
    }

    fn init(db: rusqlite::Connection) -> Result<Self> {
        db.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(Self { db })
    }
}

#[cfg(feature = "persistence")]
impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        use rusqlite::OptionalExtension;

        let value = self
            .db
            .query_row(
                "SELECT value FROM kv WHERE key = ?",
                rusqlite::params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.db.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key, value],
        )?;
        Ok(())
    }
}

// ============================================================================
// Settings Store
// ============================================================================

/// Callback invoked with the new settings after every save.
pub type SettingsCallback = Box<dyn FnMut(&Settings)>;

/// Handle for removing a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

/// Settings bound to a backing store, with change subscribers.
pub struct SettingsStore<S: KeyValueStore> {
    store: S,
    settings: Settings,
    subscribers: Vec<(SubscriptionId, SettingsCallback)>,
    next_subscription: u64,
}

impl<S: KeyValueStore> fmt::Debug for SettingsStore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsStore")
            .field("settings", &self.settings)
            .field("subscribers", &self.subscribers.len())
            .finish_non_exhaustive()
    }
}

impl<S: KeyValueStore> SettingsStore<S> {
    /// Load settings from `store`, merged over the defaults.
    ///
    /// A missing or unreadable blob yields the defaults.
    pub fn load(store: S) -> Self {
        let settings = match store.get(SETTINGS_KEY) {
            Ok(Some(blob)) => Self::parse_blob(&blob),
            Ok(None) => Settings::default(),
            Err(e) => {
                warn!("[SettingsStore] could not read settings: {}", e);
                Settings::default()
            }
        };
        Self {
            store,
            settings,
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }

    /// Stored keys are applied one at a time; a key with a bad value keeps
    /// its default without discarding the others.
    fn parse_blob(blob: &str) -> Settings {
        let stored = match serde_json::from_str::<Value>(blob) {
            Ok(Value::Object(fields)) => fields,
            Ok(_) => {
                warn!("[SettingsStore] settings blob is not an object, using defaults");
                return Settings::default();
            }
            Err(e) => {
                warn!("[SettingsStore] ignoring corrupt settings blob: {}", e);
                return Settings::default();
            }
        };

        let mut settings = Settings::default();
        for (key, value) in stored {
            let mut single = Map::new();
            single.insert(key.clone(), value);
            match settings.merged(&Value::Object(single)) {
                Ok(next) => settings = next,
                Err(e) => warn!("[SettingsStore] ignoring stored '{}': {}", key, e),
            }
        }
        settings
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn backing_store(&self) -> &S {
        &self.store
    }

    /// Merge `patch` (a JSON object), persist and notify.
    pub fn save(&mut self, patch: &Value) -> Result<()> {
        let next = self.settings.merged(patch)?;
        self.commit(next)
    }

    /// Typed variant of [`save`](Self::save).
    pub fn update(&mut self, f: impl FnOnce(&mut Settings)) -> Result<()> {
        let mut next = self.settings.clone();
        f(&mut next);
        self.commit(next)
    }

    /// Restore the defaults, persist and notify.
    pub fn reset(&mut self) -> Result<()> {
        self.commit(Settings::default())
    }

    fn commit(&mut self, next: Settings) -> Result<()> {
        let blob = serde_json::to_string(&next)?;
        self.store.set(SETTINGS_KEY, &blob)?;
        self.settings = next;
        debug!("[SettingsStore] saved, notifying {} subscribers", self.subscribers.len());
        for (_, callback) in self.subscribers.iter_mut() {
            callback(&self.settings);
        }
        Ok(())
    }

    pub fn subscribe(&mut self, callback: SettingsCallback) -> SubscriptionId {
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        self.subscribers.push((id, callback));
        id
    }

    /// Returns whether the subscriber existed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_defaults_when_empty() {
        let settings = SettingsStore::load(MemoryStore::new());
        assert_eq!(settings.get(), &Settings::default());
        assert_eq!(settings.get().secondary_plane_color, "#faa200");
    }

    #[test]
    fn test_stored_values_merge_over_defaults() {
        let mut kv = MemoryStore::new();
        kv.set(
            SETTINGS_KEY,
            r##"{"primaryPathColor":"#123456","boundaryFillOpacity":"0.5","legacyKey":1}"##,
        )
        .unwrap();

        let settings = SettingsStore::load(kv);
        assert_eq!(settings.get().primary_path_color, "#123456");
        assert_eq!(settings.get().boundary_fill_opacity, 0.5);
        assert_eq!(settings.get().boundary_color, "#ff0000");
    }

    #[test]
    fn test_corrupt_blob_falls_back() {
        let mut kv = MemoryStore::new();
        kv.set(SETTINGS_KEY, "{not json").unwrap();
        assert_eq!(SettingsStore::load(kv).get(), &Settings::default());
    }

    #[test]
    fn test_bad_key_keeps_the_rest() {
        let mut kv = MemoryStore::new();
        kv.set(
            SETTINGS_KEY,
            r##"{"boundaryColor":5,"primaryPathColor":"#123456","boundaryFillOpacity":"x"}"##,
        )
        .unwrap();

        let settings = SettingsStore::load(kv);
        assert_eq!(settings.get().primary_path_color, "#123456");
        assert_eq!(settings.get().boundary_color, "#ff0000");
        assert_eq!(settings.get().boundary_fill_opacity, 0.2);
    }

    #[test]
    fn test_save_persists_and_notifies() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);

        let mut settings = SettingsStore::load(MemoryStore::new());
        settings.subscribe(Box::new(move |s| sink.borrow_mut().push(s.boundary_color.clone())));

        settings.save(&json!({"boundaryColor": "#00ff00"})).unwrap();
        settings.update(|s| s.boundary_color = "#0000ff".to_string()).unwrap();

        assert_eq!(*seen.borrow(), vec!["#00ff00", "#0000ff"]);

        let blob = settings.backing_store().get(SETTINGS_KEY).unwrap().unwrap();
        let reloaded = SettingsStore::load({
            let mut kv = MemoryStore::new();
            kv.set(SETTINGS_KEY, &blob).unwrap();
            kv
        });
        assert_eq!(reloaded.get().boundary_color, "#0000ff");
    }

    #[test]
    fn test_reset_and_unsubscribe() {
        let count = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&count);

        let mut settings = SettingsStore::load(MemoryStore::new());
        let id = settings.subscribe(Box::new(move |_| *sink.borrow_mut() += 1));
        settings.save(&json!({"primaryPlaneColor": "#ffffff"})).unwrap();
        settings.reset().unwrap();
        assert_eq!(settings.get(), &Settings::default());

        assert!(settings.unsubscribe(id));
        assert!(!settings.unsubscribe(id));
        settings.reset().unwrap();
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn test_non_object_patch_rejected() {
        let mut settings = SettingsStore::load(MemoryStore::new());
        assert!(matches!(
            settings.save(&json!(["nope"])),
            Err(ReplayError::Parse { .. })
        ));
    }

    #[cfg(feature = "persistence")]
    #[test]
    fn test_sqlite_store_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("settings.db");
        let path = path.to_str().unwrap();

        {
            let mut settings = SettingsStore::load(SqliteStore::new(path).unwrap());
            settings.save(&json!({"boundaryFillOpacity": 0.7})).unwrap();
            settings.save(&json!({"boundaryFillColor": "#abcdef"})).unwrap();
        }

        let settings = SettingsStore::load(SqliteStore::new(path).unwrap());
        assert_eq!(settings.get().boundary_fill_opacity, 0.7);
        assert_eq!(settings.get().boundary_fill_color, "#abcdef");
    }
}
