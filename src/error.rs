use photo_capture::{ConfigError, PhotoManagerError, SchemaError};
use std::fmt;

/// Central error types for the photo manager host
#[derive(Debug)]
pub enum AppError {
    /// Database error (rusqlite)
    Database(rusqlite::Error),
    /// Filesystem error
    Filesystem(std::io::Error),
    /// Invalid or unreadable configuration
    Config(String),
    /// Capture or delete request failed
    Photo(PhotoManagerError),
    /// Shared store could not be read or written
    Store(SchemaError),
    /// Validation error (e.g. malformed commands)
    Validation(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Database(e) => write!(f, "Database error: {}", e),
            AppError::Filesystem(e) => write!(f, "Filesystem error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Photo(e) => write!(f, "Photo error: {}", e),
            AppError::Store(e) => write!(f, "Store error: {}", e),
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        AppError::Database(e)
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Filesystem(e)
    }
}

impl From<PhotoManagerError> for AppError {
    fn from(e: PhotoManagerError) -> Self {
        AppError::Photo(e)
    }
}

impl From<SchemaError> for AppError {
    fn from(e: SchemaError) -> Self {
        AppError::Store(e)
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}

impl From<toml::de::Error> for AppError {
    fn from(e: toml::de::Error) -> Self {
        AppError::Config(e.to_string())
    }
}

/// User-friendly error messages for the UI
impl AppError {
    pub fn user_message(&self) -> String {
        match self {
            AppError::Database(_) | AppError::Store(_) => {
                "Your photos could not be saved. Please try again.".to_string()
            }
            AppError::Filesystem(_) => {
                "Error accessing files. Please check app permissions.".to_string()
            }
            AppError::Config(msg) => format!("Invalid settings: {}", msg),
            AppError::Photo(e) => match e {
                PhotoManagerError::CaptureHardwareDenied(_) => {
                    "Camera access was denied.".to_string()
                }
                PhotoManagerError::CaptureHardwareError(_) => {
                    "The camera is not available right now.".to_string()
                }
                PhotoManagerError::CaptureRelocationError(_) => {
                    "The photo could not be stored.".to_string()
                }
                PhotoManagerError::DeleteFileResolutionError(_)
                | PhotoManagerError::DeleteFileRemovalError(_) => {
                    "The photo could not be deleted.".to_string()
                }
            },
            AppError::Validation(msg) => msg.clone(),
        }
    }
}
