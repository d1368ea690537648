//! Error types for the recognition and dispatch pipeline

use thiserror::Error;

/// Main error type for voxdeck
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Language detection error: {0}")]
    Detect(#[from] DetectError),

    #[error("Decision log error: {0}")]
    Logger(#[from] LoggerError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Invalid configuration value: {field} = {value}")]
    InvalidValue { field: String, value: String },

    #[error("Unknown language code: {0}")]
    UnknownLanguage(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),
}

/// Errors raised while compiling trigger patterns
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Invalid pattern '{pattern}' for {command}: {source}")]
    InvalidPattern {
        command: String,
        pattern: String,
        source: regex::Error,
    },

    #[error("Pattern '{pattern}' for {command} has {groups} capturing groups, at most one is allowed")]
    TooManyGroups {
        command: String,
        pattern: String,
        groups: usize,
    },
}

/// Language classifier errors
#[derive(Error, Debug)]
pub enum DetectError {
    #[error("Classifier could not determine a language")]
    Undetermined,

    #[error("Classifier failed: {0}")]
    Classifier(String),

    #[error("Failed to build detection worker pool: {0}")]
    Pool(String),
}

/// Decision log storage errors
#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Corrupt record at line {line}: {reason}")]
    Corrupt { line: usize, reason: String },
}

/// Dispatch loop errors
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Speech input is not available")]
    SpeechUnavailable,

    #[error("Dispatch loop already started")]
    AlreadyStarted,

    #[error("Failed to spawn producer thread: {0}")]
    Spawn(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
