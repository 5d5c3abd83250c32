use thiserror::Error;

/// Failures of the revealed-tile store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not encode or decode tile: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Corrupt journal entry at line {line}")]
    Corrupt { line: usize },
    #[error("Store lock poisoned")]
    Poisoned,
}

/// Failures of the persisted session configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not encode or decode config value: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Config file is not a JSON object")]
    NotAnObject,
    #[error("Config lock poisoned")]
    Poisoned,
}

#[derive(Error, Debug)]
pub enum GameError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = core::result::Result<T, GameError>;

pub type StoreResult<T> = core::result::Result<T, StoreError>;

pub type ConfigResult<T> = core::result::Result<T, ConfigError>;
