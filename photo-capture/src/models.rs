use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use ulid::Ulid;

/// Category assigned to photos captured without a configured category
pub const DEFAULT_CATEGORY: &str = "(none)";

/// Per-category quota used when the host does not configure one
pub const DEFAULT_MAX_PHOTOS: u32 = 3;

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

/// A captured photo as held in the shared store
///
/// Field names follow the host's persisted layout (`internalName`, `src`, ...),
/// and `filename` is accepted as an older alias for `internalName`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRecord {
    pub id: String,
    pub src: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(alias = "filename")]
    pub internal_name: String,
    /// Older entries carry no date; they get the time they were loaded
    #[serde(default = "Local::now")]
    pub date: DateTime<Local>,
    #[serde(default)]
    pub uploaded: bool,
    #[serde(default)]
    pub modified: bool,
}

impl PhotoRecord {
    pub fn new(id: String, src: String, category: String, internal_name: String) -> Self {
        Self {
            id,
            src,
            category,
            description: String::new(),
            internal_name,
            date: Local::now(),
            uploaded: false,
            modified: false,
        }
    }

    /// True when the artifact lives in memory (a `data:` URI) rather than in device storage
    pub fn is_placeholder(&self) -> bool {
        self.src.starts_with("data:")
    }
}

/// Generates a time-ordered photo id, unique within and across sessions
pub fn new_photo_id() -> String {
    format!("job-{}", Ulid::new())
}

/// Storage-facing file name for a photo id
pub fn internal_name_for(id: &str) -> String {
    format!("{}.jpg", id)
}

/// JPEG compression levels the camera accepts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum CaptureQuality {
    Low,
    #[default]
    Medium,
    High,
    Maximum,
}

impl CaptureQuality {
    pub fn percent(self) -> u8 {
        match self {
            CaptureQuality::Low => 50,
            CaptureQuality::Medium => 75,
            CaptureQuality::High => 90,
            CaptureQuality::Maximum => 100,
        }
    }
}

impl TryFrom<u8> for CaptureQuality {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            50 => Ok(CaptureQuality::Low),
            75 => Ok(CaptureQuality::Medium),
            90 => Ok(CaptureQuality::High),
            100 => Ok(CaptureQuality::Maximum),
            other => Err(ConfigError::InvalidQuality(other)),
        }
    }
}

impl From<CaptureQuality> for u8 {
    fn from(quality: CaptureQuality) -> Self {
        quality.percent()
    }
}

/// Options handed to a capture provider for a single capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureOptions {
    pub width: u32,
    pub height: u32,
    pub quality: CaptureQuality,
}

/// Error type for invalid photo manager configuration
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidQuality(u8),
    InvalidDimension(&'static str),
    InvalidTimeout(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidQuality(q) => {
                write!(f, "Capture quality must be one of 50, 75, 90, 100 (got {})", q)
            }
            ConfigError::InvalidDimension(field) => write!(f, "{} must be greater than 0", field),
            ConfigError::InvalidTimeout(field) => write!(f, "{} must be greater than 0", field),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Configuration of a photo manager instance
///
/// Built once when the widget is initialised. Unknown keys are rejected when
/// deserialized so that typos in the host configuration surface early.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PhotoManagerConfig {
    /// Target width passed to the camera
    pub capture_width: u32,
    /// Target height passed to the camera
    pub capture_height: u32,
    pub capture_quality: CaptureQuality,
    /// Category assigned to newly captured photos
    pub capture_category: String,
    /// Category filter for listing; `None` lists every photo
    pub display_category: Option<String>,
    /// Quota for the capture category, 0 disables capturing
    pub max_photos: u32,
    pub camera_timeout_secs: u64,
    pub storage_timeout_secs: u64,
}

impl Default for PhotoManagerConfig {
    fn default() -> Self {
        Self {
            capture_width: 1024,
            capture_height: 768,
            capture_quality: CaptureQuality::default(),
            capture_category: default_category(),
            display_category: None,
            max_photos: DEFAULT_MAX_PHOTOS,
            camera_timeout_secs: 60,
            storage_timeout_secs: 10,
        }
    }
}

impl PhotoManagerConfig {
    /// Checks ranges and normalises the category fields
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        if self.capture_width == 0 {
            return Err(ConfigError::InvalidDimension("capture_width"));
        }
        if self.capture_height == 0 {
            return Err(ConfigError::InvalidDimension("capture_height"));
        }
        if self.camera_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout("camera_timeout_secs"));
        }
        if self.storage_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout("storage_timeout_secs"));
        }

        self.capture_category = crate::policy::normalize_category(Some(&self.capture_category));
        self.display_category = self
            .display_category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        Ok(self)
    }

    pub fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            width: self.capture_width,
            height: self.capture_height,
            quality: self.capture_quality,
        }
    }

    pub fn camera_timeout(&self) -> Duration {
        Duration::from_secs(self.camera_timeout_secs)
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_secs(self.storage_timeout_secs)
    }
}

/// Payload handed to the editing collaborator
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EditRequest {
    pub id: String,
    #[serde(rename = "photosContainer")]
    pub photos: Vec<PhotoRecord>,
}

/// Lifecycle events emitted to the host
#[derive(Debug, Clone, PartialEq)]
pub enum PhotoEvent {
    /// A photo was captured and stored
    CaptureComplete { id: String },
    /// The capture quota was just reached or was already exhausted
    MaxPhotosTaken { max_photos: u32 },
    /// The user asked to edit a photo and no edit handler is installed
    EditPhoto(EditRequest),
    /// The last photo was removed
    CollectionEmpty,
    CaptureFailed { stage: &'static str },
    DeleteFailed { id: String, reason: String },
}
