//! Capture providers
//!
//! A provider turns a capture request into an image artifact. The synthetic
//! provider is used when no camera is present and hands out a placeholder
//! image; the device provider drives the camera and then relocates the
//! resulting file into persistent storage.
//!
//! Releasing a stored artifact does not depend on the provider that produced
//! it, see [`release_artifact`].

use crate::camera::{Camera, CameraError};
use crate::models::CaptureOptions;
use crate::storage::{ArtifactStorage, StorageError};
use base64::{engine::general_purpose, Engine as _};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Boxed future returned by the capability traits
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 1x1 transparent GIF handed out by the synthetic provider
pub const PLACEHOLDER_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x01, 0x44, 0x00, 0x3b,
];

/// Image produced by a successful capture
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    /// Raw image bytes kept in memory
    Bytes { data: Vec<u8>, mime: &'static str },
    /// Resolvable reference, e.g. a path inside persistent storage
    Uri(String),
}

impl Artifact {
    /// The `src` a photo record stores for this artifact
    pub fn src(&self) -> String {
        match self {
            Artifact::Bytes { data, mime } => {
                format!("data:{};base64,{}", mime, general_purpose::STANDARD.encode(data))
            }
            Artifact::Uri(uri) => uri.clone(),
        }
    }
}

/// Why a capture did not produce an artifact
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureFailure {
    HardwareDenied(String),
    HardwareError(String),
    RelocationError(String),
}

impl CaptureFailure {
    /// Stage identifier reported to the host
    pub fn stage(&self) -> &'static str {
        match self {
            CaptureFailure::HardwareDenied(_) => "hardware-denied",
            CaptureFailure::HardwareError(_) => "hardware-error",
            CaptureFailure::RelocationError(_) => "relocation-error",
        }
    }
}

impl std::fmt::Display for CaptureFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureFailure::HardwareDenied(msg) => write!(f, "Camera access denied: {}", msg),
            CaptureFailure::HardwareError(msg) => write!(f, "Camera error: {}", msg),
            CaptureFailure::RelocationError(msg) => {
                write!(f, "Could not move photo into storage: {}", msg)
            }
        }
    }
}

impl std::error::Error for CaptureFailure {}

impl From<CameraError> for CaptureFailure {
    fn from(err: CameraError) -> Self {
        match err {
            CameraError::PermissionDenied(msg) => CaptureFailure::HardwareDenied(msg),
            CameraError::Cancelled(msg) => CaptureFailure::HardwareDenied(msg),
            other => CaptureFailure::HardwareError(other.to_string()),
        }
    }
}

/// Why a persistent artifact could not be released
#[derive(Debug, Clone, PartialEq)]
pub enum ReleaseFailure {
    Resolution(String),
    Removal(String),
}

impl std::fmt::Display for ReleaseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReleaseFailure::Resolution(msg) => write!(f, "Could not resolve photo file: {}", msg),
            ReleaseFailure::Removal(msg) => write!(f, "Could not remove photo file: {}", msg),
        }
    }
}

impl std::error::Error for ReleaseFailure {}

/// Source of new image artifacts
pub trait CaptureProvider: Send + Sync {
    /// Short name used in log output
    fn name(&self) -> &'static str;

    /// Acquires a new image stored under `internal_name`
    fn capture<'a>(
        &'a self,
        options: &'a CaptureOptions,
        internal_name: &'a str,
    ) -> BoxFuture<'a, Result<Artifact, CaptureFailure>>;
}

/// Provider used when no camera hardware is available
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticProvider;

impl CaptureProvider for SyntheticProvider {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn capture<'a>(
        &'a self,
        _options: &'a CaptureOptions,
        internal_name: &'a str,
    ) -> BoxFuture<'a, Result<Artifact, CaptureFailure>> {
        Box::pin(async move {
            log::debug!("Synthetic capture for {}", internal_name);
            Ok(Artifact::Bytes {
                data: PLACEHOLDER_GIF.to_vec(),
                mime: "image/gif",
            })
        })
    }
}

/// Runs one storage stage with a time limit, flattening failures into a message
async fn run_stage<T>(
    limit: Duration,
    stage: &str,
    fut: impl Future<Output = Result<T, StorageError>>,
) -> Result<T, String> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(_) => Err(format!("{} timed out after {:?}", stage, limit)),
    }
}

/// Resolves and removes the stored file behind `src`
///
/// A file that is already gone counts as released.
pub async fn release_artifact(
    storage: &dyn ArtifactStorage,
    src: &str,
    limit: Duration,
) -> Result<(), ReleaseFailure> {
    let entry = match tokio::time::timeout(limit, storage.resolve(src)).await {
        Ok(Ok(entry)) => entry,
        Ok(Err(StorageError::NotFound(path))) => {
            log::warn!("Photo file {} is already gone", path);
            return Ok(());
        }
        Ok(Err(e)) => return Err(ReleaseFailure::Resolution(e.to_string())),
        Err(_) => {
            return Err(ReleaseFailure::Resolution(format!(
                "resolve timed out after {:?}",
                limit
            )))
        }
    };

    run_stage(limit, "remove", storage.remove(entry))
        .await
        .map_err(ReleaseFailure::Removal)
}

/// Removes a file whose move finished after the capture had already failed
async fn discard_late_move(
    storage: Arc<dyn ArtifactStorage>,
    moving: JoinHandle<Result<String, StorageError>>,
) {
    let src = match moving.await {
        Ok(Ok(src)) => src,
        Ok(Err(e)) => {
            log::debug!("Timed out move failed later: {}", e);
            return;
        }
        Err(e) => {
            log::warn!("Timed out move task ended abnormally: {}", e);
            return;
        }
    };

    log::warn!("Move into {} finished after its timeout, removing it", src);
    let removed = match storage.resolve(&src).await {
        Ok(entry) => storage.remove(entry).await,
        Err(e) => Err(e),
    };
    if let Err(e) = removed {
        log::error!("Could not remove orphaned photo file {}: {}", src, e);
    }
}

/// Provider driving a device camera
///
/// Capture is a three stage pipeline: take the picture, resolve the returned
/// handle to a file, move that file into persistent storage. The artifact is
/// only reported once the last stage succeeded.
pub struct DeviceProvider {
    camera: Arc<dyn Camera>,
    storage: Arc<dyn ArtifactStorage>,
    camera_timeout: Duration,
    storage_timeout: Duration,
}

impl DeviceProvider {
    pub fn new(
        camera: Arc<dyn Camera>,
        storage: Arc<dyn ArtifactStorage>,
        camera_timeout: Duration,
        storage_timeout: Duration,
    ) -> Self {
        Self {
            camera,
            storage,
            camera_timeout,
            storage_timeout,
        }
    }
}

impl CaptureProvider for DeviceProvider {
    fn name(&self) -> &'static str {
        "device"
    }

    fn capture<'a>(
        &'a self,
        options: &'a CaptureOptions,
        internal_name: &'a str,
    ) -> BoxFuture<'a, Result<Artifact, CaptureFailure>> {
        Box::pin(async move {
            let handle =
                match tokio::time::timeout(self.camera_timeout, self.camera.take_picture(options))
                    .await
                {
                    Ok(result) => result.map_err(CaptureFailure::from)?,
                    Err(_) => {
                        return Err(CaptureFailure::HardwareError(format!(
                            "camera timed out after {:?}",
                            self.camera_timeout
                        )))
                    }
                };
            log::debug!("Camera returned {}", handle);

            let entry = run_stage(self.storage_timeout, "resolve", self.storage.resolve(&handle))
                .await
                .map_err(CaptureFailure::RelocationError)?;

            // A timed out move keeps running on the blocking pool, so it gets
            // its own task and a late result is removed again
            let storage = Arc::clone(&self.storage);
            let name = internal_name.to_string();
            let mut moving =
                tokio::spawn(async move { storage.move_into_storage(entry, &name).await });

            let src = match tokio::time::timeout(self.storage_timeout, &mut moving).await {
                Ok(Ok(result)) => {
                    result.map_err(|e| CaptureFailure::RelocationError(e.to_string()))?
                }
                Ok(Err(e)) => {
                    return Err(CaptureFailure::RelocationError(format!(
                        "move task failed: {}",
                        e
                    )))
                }
                Err(_) => {
                    tokio::spawn(discard_late_move(Arc::clone(&self.storage), moving));
                    return Err(CaptureFailure::RelocationError(format!(
                        "move timed out after {:?}",
                        self.storage_timeout
                    )));
                }
            };

            log::debug!("Photo stored at {}", src);
            Ok(Artifact::Uri(src))
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::CaptureQuality;
    use std::path::PathBuf;
    use std::sync::Mutex;

    pub(crate) fn options() -> CaptureOptions {
        CaptureOptions {
            width: 1024,
            height: 768,
            quality: CaptureQuality::Medium,
        }
    }

    /// Camera double returning a scripted result, or never answering
    pub(crate) struct FakeCamera {
        pub result: Option<Result<String, CameraError>>,
    }

    impl Camera for FakeCamera {
        fn take_picture<'a>(
            &'a self,
            _options: &'a CaptureOptions,
        ) -> BoxFuture<'a, Result<String, CameraError>> {
            let result = self.result.clone();
            Box::pin(async move {
                match result {
                    Some(result) => result,
                    None => std::future::pending().await,
                }
            })
        }
    }

    /// Storage double recording calls, failing or stalling on demand
    #[derive(Default)]
    pub(crate) struct FakeStorage {
        pub fail_resolve: Option<StorageError>,
        pub fail_move: bool,
        pub fail_remove: bool,
        /// Resolve never answers
        pub stall_resolve: bool,
        /// Remove never answers
        pub stall_remove: bool,
        /// Move only finishes after this long
        pub move_delay: Option<Duration>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeStorage {
        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ArtifactStorage for FakeStorage {
        fn resolve<'a>(&'a self, uri: &'a str) -> BoxFuture<'a, Result<PathBuf, StorageError>> {
            self.calls.lock().unwrap().push(format!("resolve {}", uri));
            let result = match &self.fail_resolve {
                Some(StorageError::NotFound(p)) => Err(StorageError::NotFound(p.clone())),
                Some(e) => Err(StorageError::Other(e.to_string())),
                None => Ok(PathBuf::from(uri)),
            };
            let stall = self.stall_resolve;
            Box::pin(async move {
                if stall {
                    std::future::pending::<()>().await;
                }
                result
            })
        }

        fn move_into_storage<'a>(
            &'a self,
            entry: PathBuf,
            internal_name: &'a str,
        ) -> BoxFuture<'a, Result<String, StorageError>> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("move {} {}", entry.display(), internal_name));
            let fail = self.fail_move;
            let delay = self.move_delay;
            Box::pin(async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                if fail {
                    Err(StorageError::Other("disk full".to_string()))
                } else {
                    Ok(format!("/persistent/{}", internal_name))
                }
            })
        }

        fn remove<'a>(&'a self, entry: PathBuf) -> BoxFuture<'a, Result<(), StorageError>> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("remove {}", entry.display()));
            let fail = self.fail_remove;
            let stall = self.stall_remove;
            Box::pin(async move {
                if stall {
                    std::future::pending::<()>().await;
                }
                if fail {
                    Err(StorageError::Other("read-only filesystem".to_string()))
                } else {
                    Ok(())
                }
            })
        }
    }

    fn device(camera: FakeCamera, storage: Arc<FakeStorage>) -> DeviceProvider {
        DeviceProvider::new(
            Arc::new(camera),
            storage,
            Duration::from_secs(60),
            Duration::from_secs(10),
        )
    }

    #[tokio::test]
    async fn test_synthetic_provider_returns_placeholder() {
        let artifact = SyntheticProvider
            .capture(&options(), "job-1.jpg")
            .await
            .unwrap();
        let src = artifact.src();
        assert!(src.starts_with("data:image/gif;base64,"));

        let encoded = src.trim_start_matches("data:image/gif;base64,");
        let decoded = general_purpose::STANDARD.decode(encoded).unwrap();
        assert!(decoded.starts_with(b"GIF89a"));
    }

    #[tokio::test]
    async fn test_device_pipeline_relocates_file() {
        let storage = Arc::new(FakeStorage::default());
        let provider = device(
            FakeCamera {
                result: Some(Ok("/cache/IMG_001.jpg".to_string())),
            },
            storage.clone(),
        );

        let artifact = provider.capture(&options(), "job-1.jpg").await.unwrap();
        assert_eq!(artifact, Artifact::Uri("/persistent/job-1.jpg".to_string()));
        assert_eq!(
            *storage.calls.lock().unwrap(),
            vec![
                "resolve /cache/IMG_001.jpg".to_string(),
                "move /cache/IMG_001.jpg job-1.jpg".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_camera_denial_maps_to_hardware_denied() {
        let storage = Arc::new(FakeStorage::default());
        let provider = device(
            FakeCamera {
                result: Some(Err(CameraError::PermissionDenied("no camera".to_string()))),
            },
            storage.clone(),
        );

        let err = provider.capture(&options(), "job-1.jpg").await.unwrap_err();
        assert_eq!(err.stage(), "hardware-denied");
        assert!(storage.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_move_failure_maps_to_relocation_error() {
        let storage = Arc::new(FakeStorage {
            fail_move: true,
            ..Default::default()
        });
        let provider = device(
            FakeCamera {
                result: Some(Ok("/cache/IMG_001.jpg".to_string())),
            },
            storage,
        );

        let err = provider.capture(&options(), "job-1.jpg").await.unwrap_err();
        assert!(matches!(err, CaptureFailure::RelocationError(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_camera_times_out() {
        let provider = device(FakeCamera { result: None }, Arc::new(FakeStorage::default()));

        let err = provider.capture(&options(), "job-1.jpg").await.unwrap_err();
        assert_eq!(err.stage(), "hardware-error");
    }

    #[tokio::test]
    async fn test_resolve_failure_maps_to_relocation_error() {
        let storage = Arc::new(FakeStorage {
            fail_resolve: Some(StorageError::Other("bad handle".to_string())),
            ..Default::default()
        });
        let provider = device(
            FakeCamera {
                result: Some(Ok("content://media/42".to_string())),
            },
            storage.clone(),
        );

        let err = provider.capture(&options(), "job-1.jpg").await.unwrap_err();
        assert_eq!(err, CaptureFailure::RelocationError("bad handle".to_string()));
        assert_eq!(storage.calls(), vec!["resolve content://media/42".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_resolve_times_out() {
        let storage = Arc::new(FakeStorage {
            stall_resolve: true,
            ..Default::default()
        });
        let provider = device(
            FakeCamera {
                result: Some(Ok("/cache/IMG_001.jpg".to_string())),
            },
            storage.clone(),
        );

        let err = provider.capture(&options(), "job-1.jpg").await.unwrap_err();
        assert_eq!(err.stage(), "relocation-error");
        assert!(err.to_string().contains("resolve timed out"));
        // nothing was moved
        assert_eq!(storage.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_move_is_cleaned_up() {
        let storage = Arc::new(FakeStorage {
            move_delay: Some(Duration::from_secs(15)),
            ..Default::default()
        });
        let provider = device(
            FakeCamera {
                result: Some(Ok("/cache/IMG_001.jpg".to_string())),
            },
            storage.clone(),
        );

        let err = provider.capture(&options(), "job-1.jpg").await.unwrap_err();
        assert!(
            matches!(err, CaptureFailure::RelocationError(ref msg) if msg.contains("move timed out"))
        );

        // let the move finish in the background
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(
            storage.calls(),
            vec![
                "resolve /cache/IMG_001.jpg".to_string(),
                "move /cache/IMG_001.jpg job-1.jpg".to_string(),
                "resolve /persistent/job-1.jpg".to_string(),
                "remove /persistent/job-1.jpg".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_release_of_missing_file_succeeds() {
        let storage = FakeStorage {
            fail_resolve: Some(StorageError::NotFound("/persistent/job-1.jpg".to_string())),
            ..Default::default()
        };

        release_artifact(&storage, "/persistent/job-1.jpg", Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(storage.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_release_resolution_failure() {
        let storage = FakeStorage {
            fail_resolve: Some(StorageError::Other("permission denied".to_string())),
            ..Default::default()
        };

        let err = release_artifact(&storage, "/persistent/job-1.jpg", Duration::from_secs(10))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ReleaseFailure::Resolution("permission denied".to_string())
        );
        // never tries to remove what it could not resolve
        assert_eq!(storage.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_release_removal_failure() {
        let storage = FakeStorage {
            fail_remove: true,
            ..Default::default()
        };

        let err = release_artifact(&storage, "/persistent/job-1.jpg", Duration::from_secs(10))
            .await
            .unwrap_err();
        assert!(matches!(err, ReleaseFailure::Removal(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_stages_time_out() {
        let limit = Duration::from_secs(10);
        let stalled_resolve = FakeStorage {
            stall_resolve: true,
            ..Default::default()
        };
        let err = release_artifact(&stalled_resolve, "/persistent/job-1.jpg", limit)
            .await
            .unwrap_err();
        assert!(matches!(err, ReleaseFailure::Resolution(ref msg) if msg.contains("timed out")));

        let stalled_remove = FakeStorage {
            stall_remove: true,
            ..Default::default()
        };
        let err = release_artifact(&stalled_remove, "/persistent/job-1.jpg", limit)
            .await
            .unwrap_err();
        assert!(matches!(err, ReleaseFailure::Removal(ref msg) if msg.contains("timed out")));
    }
}
