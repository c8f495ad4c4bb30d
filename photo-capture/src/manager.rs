use crate::models::{
    internal_name_for, new_photo_id, ConfigError, EditRequest, PhotoEvent, PhotoManagerConfig,
    PhotoRecord,
};
use crate::policy;
use crate::provider::{release_artifact, CaptureFailure, CaptureProvider, ReleaseFailure};
use crate::storage::ArtifactStorage;
use crate::store::MediaStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Receiving end of the photo manager's lifecycle events
pub type EventReceiver = UnboundedReceiver<PhotoEvent>;

/// Host supplied edit handler, called instead of emitting `EditPhoto`
pub type EditHandler = Box<dyn Fn(EditRequest) + Send + Sync>;

/// Error type for capture and delete requests
#[derive(Debug, Clone, PartialEq)]
pub enum PhotoManagerError {
    CaptureHardwareDenied(String),
    CaptureHardwareError(String),
    CaptureRelocationError(String),
    DeleteFileResolutionError(String),
    DeleteFileRemovalError(String),
}

impl std::fmt::Display for PhotoManagerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhotoManagerError::CaptureHardwareDenied(msg) => {
                write!(f, "Camera access denied: {}", msg)
            }
            PhotoManagerError::CaptureHardwareError(msg) => write!(f, "Camera error: {}", msg),
            PhotoManagerError::CaptureRelocationError(msg) => {
                write!(f, "Could not store photo: {}", msg)
            }
            PhotoManagerError::DeleteFileResolutionError(msg) => {
                write!(f, "Could not find photo file: {}", msg)
            }
            PhotoManagerError::DeleteFileRemovalError(msg) => {
                write!(f, "Could not remove photo file: {}", msg)
            }
        }
    }
}

impl std::error::Error for PhotoManagerError {}

impl From<CaptureFailure> for PhotoManagerError {
    fn from(failure: CaptureFailure) -> Self {
        match failure {
            CaptureFailure::HardwareDenied(msg) => PhotoManagerError::CaptureHardwareDenied(msg),
            CaptureFailure::HardwareError(msg) => PhotoManagerError::CaptureHardwareError(msg),
            CaptureFailure::RelocationError(msg) => PhotoManagerError::CaptureRelocationError(msg),
        }
    }
}

impl From<ReleaseFailure> for PhotoManagerError {
    fn from(failure: ReleaseFailure) -> Self {
        match failure {
            ReleaseFailure::Resolution(msg) => PhotoManagerError::DeleteFileResolutionError(msg),
            ReleaseFailure::Removal(msg) => PhotoManagerError::DeleteFileRemovalError(msg),
        }
    }
}

/// Outcome of a capture request that did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureReport {
    /// A record was added; `quota_reached` is set when it used the last slot
    Captured { id: String, quota_reached: bool },
    /// The quota was already exhausted, the camera was not touched
    Rejected { max_photos: u32 },
}

/// Phases a capture request moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaptureState {
    Checking,
    Capturing,
    Committing,
    Rejected,
}

/// Phases a delete request moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeleteState {
    Locating,
    NotFound,
    Removing,
}

/// Counts a request as in flight until dropped
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Photo capture and deletion controller
///
/// Owns the session's `MediaStore`. Capture and delete requests for the same
/// category are queued on a per-category lane, so a request only checks the
/// quota once every earlier request of that category has committed or failed.
///
/// Stored files are released through `storage`, whichever provider captured
/// them.
pub struct PhotoManager {
    config: PhotoManagerConfig,
    store: Mutex<MediaStore>,
    provider: Arc<dyn CaptureProvider>,
    storage: Arc<dyn ArtifactStorage>,
    lanes: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    events: UnboundedSender<PhotoEvent>,
    edit_handler: Option<EditHandler>,
    in_flight: AtomicUsize,
}

impl PhotoManager {
    /// Creates a controller; the returned receiver yields its lifecycle events
    pub fn new(
        config: PhotoManagerConfig,
        store: MediaStore,
        provider: Arc<dyn CaptureProvider>,
        storage: Arc<dyn ArtifactStorage>,
    ) -> Result<(Self, EventReceiver), ConfigError> {
        let config = config.validated()?;
        let (events, receiver) = mpsc::unbounded_channel();

        log::info!(
            "Photo manager ready: provider={}, category={}, max_photos={}",
            provider.name(),
            config.capture_category,
            config.max_photos
        );

        Ok((
            Self {
                config,
                store: Mutex::new(store),
                provider,
                storage,
                lanes: Mutex::new(HashMap::new()),
                events,
                edit_handler: None,
                in_flight: AtomicUsize::new(0),
            },
            receiver,
        ))
    }

    pub fn with_edit_handler(mut self, handler: EditHandler) -> Self {
        self.edit_handler = Some(handler);
        self
    }

    pub fn config(&self) -> &PhotoManagerConfig {
        &self.config
    }

    fn store(&self) -> MutexGuard<'_, MediaStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lane(&self, category: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut lanes = self.lanes.lock().unwrap_or_else(PoisonError::into_inner);
        lanes
            .entry(policy::category_key(category))
            .or_default()
            .clone()
    }

    fn begin(&self) -> InFlight<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlight(&self.in_flight)
    }

    fn emit(&self, event: PhotoEvent) {
        if self.events.send(event).is_err() {
            log::debug!("No listener for photo events");
        }
    }

    /// True when no capture or delete request is in progress
    pub fn is_idle(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) == 0
    }

    /// Takes a photo in the configured capture category
    ///
    /// `filename` overrides the storage-facing name of the new photo.
    pub async fn take_photo(
        &self,
        filename: Option<&str>,
    ) -> Result<CaptureReport, PhotoManagerError> {
        let _in_flight = self.begin();
        let category = self.config.capture_category.clone();
        let max_photos = self.config.max_photos;

        let lane = self.lane(&category);
        let _turn = lane.lock().await;

        log::debug!("Capture in {}: {:?}", category, CaptureState::Checking);
        let current = self.store().count_by_category(&category);
        if policy::is_blocked(max_photos, current) {
            log::warn!(
                "Capture in {}: {:?} ({} of {} photos taken)",
                category,
                CaptureState::Rejected,
                current,
                max_photos
            );
            self.emit(PhotoEvent::MaxPhotosTaken { max_photos });
            return Ok(CaptureReport::Rejected { max_photos });
        }

        let id = new_photo_id();
        let internal_name = match filename.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => internal_name_for(&id),
        };
        let options = self.config.capture_options();

        log::debug!("Capture {}: {:?}", id, CaptureState::Capturing);
        let artifact = match self.provider.capture(&options, &internal_name).await {
            Ok(artifact) => artifact,
            Err(failure) => {
                log::warn!("Capture {} failed: {}", id, failure);
                self.emit(PhotoEvent::CaptureFailed {
                    stage: failure.stage(),
                });
                return Err(failure.into());
            }
        };

        log::debug!("Capture {}: {:?}", id, CaptureState::Committing);
        let record = PhotoRecord::new(id.clone(), artifact.src(), category.clone(), internal_name);
        let count_after_add = {
            let mut store = self.store();
            store.add(record);
            store.count_by_category(&category)
        };
        self.emit(PhotoEvent::CaptureComplete { id: id.clone() });

        let quota_reached = policy::just_reached_limit(max_photos, count_after_add);
        if quota_reached {
            log::info!("Photo quota of {} reached for {}", max_photos, category);
            self.emit(PhotoEvent::MaxPhotosTaken { max_photos });
        }

        Ok(CaptureReport::Captured { id, quota_reached })
    }

    /// Deletes a photo and releases its artifact
    ///
    /// Returns `Ok(false)` when no photo has this id. If the artifact cannot be
    /// released the record is kept.
    pub async fn delete_photo(&self, id: &str) -> Result<bool, PhotoManagerError> {
        let _in_flight = self.begin();

        log::debug!("Delete {}: {:?}", id, DeleteState::Locating);
        let category = self.store().get(id).map(|p| p.category.clone());
        let Some(category) = category else {
            log::debug!("Delete {}: {:?}", id, DeleteState::NotFound);
            return Ok(false);
        };

        let lane = self.lane(&category);
        let _turn = lane.lock().await;

        // An earlier request in the lane may have removed it meanwhile
        let record = self.store().get(id).cloned();
        let Some(record) = record else {
            log::debug!("Delete {}: {:?}", id, DeleteState::NotFound);
            return Ok(false);
        };

        log::debug!("Delete {}: {:?}", id, DeleteState::Removing);
        if !record.is_placeholder() {
            let released =
                release_artifact(self.storage.as_ref(), &record.src, self.config.storage_timeout())
                    .await;
            if let Err(failure) = released {
                log::error!("Keeping photo {}: {}", id, failure);
                self.emit(PhotoEvent::DeleteFailed {
                    id: id.to_string(),
                    reason: failure.to_string(),
                });
                return Err(failure.into());
            }
        }

        let now_empty = {
            let mut store = self.store();
            store.remove(id);
            store.is_empty()
        };
        if now_empty {
            self.emit(PhotoEvent::CollectionEmpty);
        }

        Ok(true)
    }

    /// Deletes every photo, stopping at the first failure
    pub async fn clear_photos(&self) -> Result<usize, PhotoManagerError> {
        let ids: Vec<String> = self.store().list().iter().map(|p| p.id.clone()).collect();

        let mut removed = 0;
        for id in ids {
            if self.delete_photo(&id).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Hands an edit request to the host; returns false for unknown ids
    pub fn edit_photo(&self, id: &str) -> bool {
        let request = {
            let store = self.store();
            if !store.contains(id) {
                return false;
            }
            EditRequest {
                id: id.to_string(),
                photos: store.list().to_vec(),
            }
        };

        match &self.edit_handler {
            Some(handler) => handler(request),
            None => self.emit(PhotoEvent::EditPhoto(request)),
        }
        true
    }

    /// Description update performed by the editing collaborator
    pub fn update_description(&self, id: &str, description: &str) -> bool {
        self.store().update_description(id, description)
    }

    pub fn photos(&self) -> Vec<PhotoRecord> {
        self.store().list().to_vec()
    }

    /// Photos matching the configured display category
    pub fn displayed_photos(&self) -> Vec<PhotoRecord> {
        self.store()
            .filter_by_category(self.config.display_category.as_deref())
    }

    /// Captures still allowed in the capture category
    pub fn remaining_captures(&self) -> usize {
        let taken = self.store().count_by_category(&self.config.capture_category);
        (self.config.max_photos as usize).saturating_sub(taken)
    }

    /// Read access to the store, e.g. for persisting it
    pub fn with_store<R>(&self, f: impl FnOnce(&MediaStore) -> R) -> R {
        f(&self.store())
    }
}
