//! Error types shared across CycleWatch crates.

use std::path::PathBuf;

/// Top-level error type for CycleWatch operations.
#[derive(Debug, thiserror::Error)]
pub enum CyclewatchError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Zone error: {message}")]
    Zone { message: String },

    #[error("Detection stream error: {message}")]
    Stream { message: String },

    #[error("Store error: {message}")]
    Store { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using CyclewatchError.
pub type CyclewatchResult<T> = Result<T, CyclewatchError>;

impl CyclewatchError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn zone(msg: impl Into<String>) -> Self {
        Self::Zone {
            message: msg.into(),
        }
    }

    pub fn stream(msg: impl Into<String>) -> Self {
        Self::Stream {
            message: msg.into(),
        }
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }
}
