use thiserror::Error;

/// Errors raised by theme lookups and palette parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThemeError {
    #[error("Unknown theme: {0}")]
    UnknownTheme(String),

    #[error("Invalid color for role '{role}': {value}")]
    InvalidColor { role: String, value: String },

    #[error("Malformed palette override for '{theme}': {message}")]
    MalformedOverride { theme: String, message: String },
}

/// Failures of the durable key-value store.
///
/// These never reach callers of the theme store: a failed read is treated as
/// "nothing stored" and a failed write is logged.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Problems reading or writing the settings file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine config path")]
    NoConfigDir,

    #[error("Failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON in settings.json: {0}")]
    Json(#[from] serde_json::Error),
}
