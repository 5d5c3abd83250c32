//! Persisted session settings.
//!
//! A small key-value storage of JSON values, the way a browser game keeps its state in local storage. The file
//! backend re-reads its file on every lookup so a second process sharing it is noticed by the reconciliation poll.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::{self, File};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use crate::*;

pub trait ConfigStore: Send + Sync {
    fn get_value(&self, key: &str) -> ConfigResult<Option<Value>>;

    fn set_value(&self, key: &str, value: Value) -> ConfigResult<()>;

    fn delete(&self, key: &str) -> ConfigResult<()>;

    fn get<T: DeserializeOwned>(&self, key: &str) -> ConfigResult<Option<T>>
    where
        Self: Sized,
    {
        Ok(self
            .get_value(key)?
            .map(serde_json::from_value)
            .transpose()?)
    }

    fn set<T: Serialize>(&self, key: &str, value: &T) -> ConfigResult<()>
    where
        Self: Sized,
    {
        self.set_value(key, serde_json::to_value(value)?)
    }
}

impl<T: ConfigStore + ?Sized> ConfigStore for Arc<T> {
    fn get_value(&self, key: &str) -> ConfigResult<Option<Value>> {
        (**self).get_value(key)
    }

    fn set_value(&self, key: &str, value: Value) -> ConfigResult<()> {
        (**self).set_value(key, value)
    }

    fn delete(&self, key: &str) -> ConfigResult<()> {
        (**self).delete(key)
    }
}

#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    values: RwLock<Map<String, Value>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get_value(&self, key: &str) -> ConfigResult<Option<Value>> {
        let values = self.values.read().map_err(|_| ConfigError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn set_value(&self, key: &str, value: Value) -> ConfigResult<()> {
        let mut values = self.values.write().map_err(|_| ConfigError::Poisoned)?;
        values.insert(key.to_owned(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> ConfigResult<()> {
        let mut values = self.values.write().map_err(|_| ConfigError::Poisoned)?;
        values.remove(key);
        Ok(())
    }
}

/// One JSON object per file, replaced atomically on every write.
#[derive(Debug)]
pub struct FileConfigStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileConfigStore {
    pub fn open(path: impl Into<PathBuf>) -> ConfigResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let store = Self {
            path,
            write_lock: Mutex::new(()),
        };
        // fail early on an unreadable file instead of on the first reveal
        store.read_map()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> ConfigResult<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str(&content)? {
            Value::Object(map) => Ok(map),
            _ => Err(ConfigError::NotAnObject),
        }
    }

    fn write_map(&self, map: &Map<String, Value>) -> ConfigResult<()> {
        let tmp = self.path.with_extension("tmp");
        {
            let mut file = File::create(&tmp)?;
            serde_json::to_writer_pretty(&mut file, map)?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut Map<String, Value>)) -> ConfigResult<()> {
        let _guard = self.write_lock.lock().map_err(|_| ConfigError::Poisoned)?;
        let mut map = self.read_map()?;
        f(&mut map);
        self.write_map(&map)
    }
}

impl ConfigStore for FileConfigStore {
    fn get_value(&self, key: &str) -> ConfigResult<Option<Value>> {
        Ok(self.read_map()?.remove(key))
    }

    fn set_value(&self, key: &str, value: Value) -> ConfigResult<()> {
        self.update(|map| {
            map.insert(key.to_owned(), value);
        })
    }

    fn delete(&self, key: &str) -> ConfigResult<()> {
        self.update(|map| {
            map.remove(key);
        })
    }
}

/// Camera position in pixels.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraOffset {
    pub x: f64,
    pub y: f64,
}

impl CameraOffset {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Everything about a session that survives a restart.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SessionConfig {
    pub seed: Option<Seed>,
    pub first_click: bool,
    /// Set once a mine was revealed, reveals are refused until a reset.
    pub game_over: bool,
    pub camera_offset: CameraOffset,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            seed: None,
            first_click: true,
            game_over: false,
            camera_offset: CameraOffset::default(),
        }
    }
}

impl SessionConfig {
    pub const SEED_KEY: &'static str = "seed";
    pub const FIRST_CLICK_KEY: &'static str = "first_click";
    pub const GAME_OVER_KEY: &'static str = "game_over";
    pub const CAMERA_OFFSET_KEY: &'static str = "camera_offset";

    /// Loads the stored settings, defaulting anything missing or unreadable.
    pub fn load<C: ConfigStore>(store: &C) -> ConfigResult<Self> {
        let defaults = Self::default();
        let seed: Option<Seed> = load_key(store, Self::SEED_KEY)?;
        let first_click = load_key(store, Self::FIRST_CLICK_KEY)?.unwrap_or(defaults.first_click);
        let game_over = load_key(store, Self::GAME_OVER_KEY)?.unwrap_or(defaults.game_over);
        let camera_offset = load_key(store, Self::CAMERA_OFFSET_KEY)?.unwrap_or(defaults.camera_offset);

        let config = Self {
            seed,
            // a started game without a seed cannot be continued
            first_click: first_click || seed.is_none(),
            game_over: game_over && seed.is_some(),
            camera_offset,
        };
        log::debug!("Loaded session config: {config:?}");
        Ok(config)
    }

    pub fn save_seed<C: ConfigStore>(store: &C, seed: Option<Seed>) -> ConfigResult<()> {
        match seed {
            Some(seed) => store.set(Self::SEED_KEY, &seed),
            None => store.delete(Self::SEED_KEY),
        }
    }

    pub fn save_first_click<C: ConfigStore>(store: &C, first_click: bool) -> ConfigResult<()> {
        store.set(Self::FIRST_CLICK_KEY, &first_click)
    }

    pub fn save_game_over<C: ConfigStore>(store: &C, game_over: bool) -> ConfigResult<()> {
        store.set(Self::GAME_OVER_KEY, &game_over)
    }

    pub fn save_camera_offset<C: ConfigStore>(store: &C, offset: CameraOffset) -> ConfigResult<()> {
        store.set(Self::CAMERA_OFFSET_KEY, &offset)
    }

    /// Drops every persisted key, returning the store to a fresh session.
    pub fn clear<C: ConfigStore>(store: &C) -> ConfigResult<()> {
        store.delete(Self::SEED_KEY)?;
        store.delete(Self::FIRST_CLICK_KEY)?;
        store.delete(Self::GAME_OVER_KEY)?;
        store.delete(Self::CAMERA_OFFSET_KEY)
    }
}

fn load_key<C: ConfigStore, T: DeserializeOwned>(store: &C, key: &str) -> ConfigResult<Option<T>> {
    match store.get(key) {
        Err(ConfigError::Serialization(err)) => {
            log::warn!("Ignoring unreadable config value {key:?}: {err}");
            Ok(None)
        }
        result => result,
    }
}
