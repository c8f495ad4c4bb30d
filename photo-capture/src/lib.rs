//! # Photo Capture
//!
//! Photo capture and management core for the photo widget.
//!
//! This crate provides:
//! - An ordered, session-scoped store of photo records
//! - Per-category capture quotas
//! - Interchangeable capture providers (placeholder image or device camera)
//! - A controller that serializes capture/delete requests per category and
//!   reports lifecycle events to the host
//! - Persistence of the record collection in the host's shared SQLite store
//!
//! ## Platform Separation
//!
//! Only `camera` touches platform APIs (Android JNI). Everything else is
//! plain logic and can be exercised with test doubles.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use photo_capture::{
//!     LocalFileSystem, MediaStore, PhotoManager, PhotoManagerConfig, SyntheticProvider,
//! };
//! use std::sync::Arc;
//!
//! let config = PhotoManagerConfig {
//!     capture_category: "roof".to_string(),
//!     max_photos: 2,
//!     ..Default::default()
//! };
//!
//! let storage = Arc::new(LocalFileSystem::new("./photos"));
//! let (manager, mut events) =
//!     PhotoManager::new(config, MediaStore::new(), Arc::new(SyntheticProvider), storage)?;
//! manager.take_photo(None).await?;
//! ```

pub mod camera;
pub mod manager;
pub mod models;
pub mod policy;
pub mod provider;
pub mod schema;
pub mod storage;
pub mod store;

pub use camera::{Camera, CameraError, PlatformCamera};
pub use manager::{CaptureReport, EditHandler, EventReceiver, PhotoManager, PhotoManagerError};
pub use models::{
    CaptureOptions, CaptureQuality, ConfigError, EditRequest, PhotoEvent, PhotoManagerConfig,
    PhotoRecord, DEFAULT_CATEGORY, DEFAULT_MAX_PHOTOS,
};
pub use provider::{
    release_artifact, Artifact, CaptureFailure, CaptureProvider, DeviceProvider, ReleaseFailure,
    SyntheticProvider,
};
pub use schema::{init_store_schema, load_media_store, save_media_store, SchemaError, PHOTOS_KEY};
pub use storage::{ArtifactStorage, LocalFileSystem, StorageError};
pub use store::MediaStore;
