use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Category store not found: {path}")]
    StoreNotFound { path: PathBuf },

    #[error("Failed to read category store {path}: {message}")]
    StoreRead { path: PathBuf, message: String },

    #[error("Failed to write category store {path}: {message}")]
    StoreWrite { path: PathBuf, message: String },

    #[error("Failed to close category store {path}: {message}")]
    StoreClose { path: PathBuf, message: String },

    #[error("Failed to parse {path} at line {line}: {message}")]
    TextConfigParse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("localconfig.vdf not found: {path}")]
    LocalConfigMissing { path: PathBuf },

    #[error("Malformed record '{key}': {message}")]
    Structural { key: String, message: String },

    #[error("Cannot derive an app id: {message}")]
    GeneratorInput { message: String },

    #[error("Config parse error in {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("Unknown config key: {key}")]
    ConfigKeyNotFound { key: String },

    #[error("Local app data directory not found")]
    LocalAppDataNotFound,

    #[error("{failed} of {total} sync units failed, first: {first}")]
    UnitsFailed {
        failed: usize,
        total: usize,
        first: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    /// A store that was never written is an empty store, not a failure.
    pub fn is_store_not_found(&self) -> bool {
        matches!(self, Self::StoreNotFound { .. })
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::StoreRead { .. } | Self::StoreWrite { .. } | Self::StoreClose { .. } => 2,
            Self::TextConfigParse { .. } | Self::LocalConfigMissing { .. } => 3,
            Self::Structural { .. } => 4,
            Self::ConfigParse { .. } | Self::ConfigKeyNotFound { .. } => 5,
            Self::UnitsFailed { .. } => 6,
            _ => 1,
        }
    }
}
