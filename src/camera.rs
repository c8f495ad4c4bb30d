// Chooses the capture provider once at startup. The photo manager itself
// never learns which one it got.

use crate::config::AppConfig;
use photo_capture::{
    ArtifactStorage, CaptureProvider, DeviceProvider, PlatformCamera, SyntheticProvider,
};
use std::sync::Arc;

pub fn select_provider(
    config: &AppConfig,
    storage: Arc<dyn ArtifactStorage>,
) -> Arc<dyn CaptureProvider> {
    if config.force_synthetic_camera {
        log::info!("Placeholder camera forced by configuration");
        return Arc::new(SyntheticProvider);
    }

    let camera = PlatformCamera::default();
    match camera.is_available() {
        Ok(true) => {
            log::info!("Using device camera");
            Arc::new(DeviceProvider::new(
                Arc::new(camera),
                storage,
                config.photos.camera_timeout(),
                config.photos.storage_timeout(),
            ))
        }
        Ok(false) => {
            log::info!("No camera available, using placeholder images");
            Arc::new(SyntheticProvider)
        }
        Err(e) => {
            log::warn!("Camera check failed ({}), using placeholder images", e);
            Arc::new(SyntheticProvider)
        }
    }
}
