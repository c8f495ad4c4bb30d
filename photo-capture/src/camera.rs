// Platform camera bridge
//
// On Android the host activity launches the camera intent and publishes the
// resulting file path; we call into it over JNI and poll for the outcome.
// Other platforms have no camera and report that instead.

use crate::models::CaptureOptions;
use crate::provider::BoxFuture;
use image::codecs::jpeg::JpegEncoder;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub enum CameraError {
    PermissionDenied(String),
    Timeout(String),
    Cancelled(String),
    PlatformNotSupported(String),
    Other(String),
}

impl std::fmt::Display for CameraError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            CameraError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            CameraError::Cancelled(msg) => write!(f, "Cancelled: {}", msg),
            CameraError::PlatformNotSupported(msg) => write!(f, "Platform not supported: {}", msg),
            CameraError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for CameraError {}

/// Camera capability: takes a picture and returns a transient file handle
pub trait Camera: Send + Sync {
    fn take_picture<'a>(
        &'a self,
        options: &'a CaptureOptions,
    ) -> BoxFuture<'a, Result<String, CameraError>>;
}

const DEFAULT_MAIN_ACTIVITY_CLASS: &str = "org/photomanager/app/MainActivity";

/// Polling interval and attempts while waiting for the camera activity (60 s)
#[cfg(target_os = "android")]
const POLL_INTERVAL_MS: u64 = 100;
#[cfg(target_os = "android")]
const POLL_ATTEMPTS: u32 = 600;

#[cfg(target_os = "android")]
use jni::objects::{JClass, JObject, JString, JValue};

#[cfg(target_os = "android")]
use ndk_context::android_context;

/// Camera of the device the app runs on
///
/// `main_activity_class` is the fully qualified activity class in slash
/// format (e.g. "com/example/myapp/MainActivity").
#[derive(Debug, Clone)]
pub struct PlatformCamera {
    pub main_activity_class: String,
}

impl Default for PlatformCamera {
    fn default() -> Self {
        Self {
            main_activity_class: DEFAULT_MAIN_ACTIVITY_CLASS.to_string(),
        }
    }
}

impl Camera for PlatformCamera {
    fn take_picture<'a>(
        &'a self,
        options: &'a CaptureOptions,
    ) -> BoxFuture<'a, Result<String, CameraError>> {
        let camera = self.clone();
        let options = *options;
        Box::pin(async move {
            tokio::task::spawn_blocking(move || -> Result<String, CameraError> {
                let path = camera.capture_blocking()?;
                fit_capture(&path, &options)?;
                Ok(path)
            })
            .await
            .map_err(|e| CameraError::Other(format!("Task join error: {}", e)))?
        })
    }
}

/// Downscales a captured JPEG into the requested bounds and re-encodes it at
/// the requested quality, in place
pub fn fit_capture(path: &str, options: &CaptureOptions) -> Result<(), CameraError> {
    let img = image::open(path)
        .map_err(|e| CameraError::Other(format!("Failed to load capture: {}", e)))?;

    let img = if img.width() > options.width || img.height() > options.height {
        img.resize(
            options.width,
            options.height,
            image::imageops::FilterType::Lanczos3,
        )
    } else {
        img
    };

    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, options.quality.percent());
    img.to_rgb8()
        .write_with_encoder(encoder)
        .map_err(|e| CameraError::Other(format!("Failed to encode capture: {}", e)))?;

    std::fs::write(Path::new(path), buffer)
        .map_err(|e| CameraError::Other(format!("Failed to write capture: {}", e)))?;

    log::debug!(
        "Capture fitted to {}x{} at quality {}",
        img.width(),
        img.height(),
        options.quality.percent()
    );
    Ok(())
}

#[cfg(target_os = "android")]
fn get_app_class_loader<'a>(env: &mut jni::JNIEnv<'a>) -> Result<JObject<'a>, CameraError> {
    let at_cls = env
        .find_class("android/app/ActivityThread")
        .map_err(|e| CameraError::Other(format!("ActivityThread not found: {}", e)))?;
    let at = env
        .call_static_method(
            &at_cls,
            "currentActivityThread",
            "()Landroid/app/ActivityThread;",
            &[],
        )
        .and_then(|v| v.l())
        .map_err(|e| CameraError::Other(format!("currentActivityThread failed: {}", e)))?;

    let app = env
        .call_method(&at, "getApplication", "()Landroid/app/Application;", &[])
        .and_then(|v| v.l())
        .map_err(|e| CameraError::Other(format!("getApplication failed: {}", e)))?;

    // Fallback: system context
    let ctx = if app.is_null() {
        env.call_method(&at, "getSystemContext", "()Landroid/app/ContextImpl;", &[])
            .and_then(|v| v.l())
            .map_err(|e| CameraError::Other(format!("getSystemContext failed: {}", e)))?
    } else {
        app
    };

    env.call_method(&ctx, "getClassLoader", "()Ljava/lang/ClassLoader;", &[])
        .and_then(|v| v.l())
        .map_err(|e| CameraError::Other(format!("getClassLoader failed: {}", e)))
}

#[cfg(target_os = "android")]
fn load_class<'a>(
    env: &mut jni::JNIEnv<'a>,
    loader: &JObject<'a>,
    fq_slash: &str,
) -> Result<JClass<'a>, CameraError> {
    // ClassLoader.loadClass wants dot notation
    let name: JString = env
        .new_string(fq_slash.replace('/', "."))
        .map_err(|e| CameraError::Other(format!("new_string failed: {}", e)))?;
    let cls_obj = env
        .call_method(
            loader,
            "loadClass",
            "(Ljava/lang/String;)Ljava/lang/Class;",
            &[JValue::Object(&JObject::from(name))],
        )
        .and_then(|v| v.l())
        .map_err(|e| CameraError::Other(format!("ClassLoader.loadClass failed: {}", e)))?;
    Ok(JClass::from(cls_obj))
}

#[cfg(target_os = "android")]
fn get_activity_instance<'a>(
    env: &mut jni::JNIEnv<'a>,
    class_name: &str,
) -> Result<(JObject<'a>, JClass<'a>), CameraError> {
    let loader = get_app_class_loader(env)?;
    let cls = load_class(env, &loader, class_name)?;
    let signature = format!("()L{};", class_name);

    let instance = match env.call_static_method(&cls, "getInstance", &signature, &[]) {
        Ok(val) => val
            .l()
            .map_err(|e| CameraError::Other(format!("getInstance() invalid: {}", e)))?,
        Err(_) => {
            if env.exception_check().unwrap_or(false) {
                let _ = env.exception_clear();
            }
            // Kotlin companion object without @JvmStatic
            let comp_signature = format!("L{}$Companion;", class_name);
            let companion = env
                .get_static_field(&cls, "Companion", &comp_signature)
                .and_then(|v| v.l())
                .map_err(|e| CameraError::Other(format!("Companion lookup failed: {}", e)))?;
            if companion.is_null() {
                return Err(CameraError::Other(
                    "MainActivity.Companion is null - activity not initialized?".to_string(),
                ));
            }
            env.call_method(&companion, "getInstance", &signature, &[])
                .and_then(|v| v.l())
                .map_err(|e| CameraError::Other(format!("Companion.getInstance() failed: {}", e)))?
        }
    };

    if instance.is_null() {
        return Err(CameraError::Other(
            "MainActivity instance is null - activity not initialized?".to_string(),
        ));
    }

    Ok((instance, cls))
}

#[cfg(target_os = "android")]
fn read_static_string(
    env: &mut jni::JNIEnv,
    cls: &JClass,
    method: &str,
) -> Result<Option<String>, CameraError> {
    let obj = match env
        .call_static_method(cls, method, "()Ljava/lang/String;", &[])
        .and_then(|v| v.l())
    {
        Ok(obj) if !obj.is_null() => obj,
        _ => return Ok(None),
    };
    let value: String = env
        .get_string((&obj).into())
        .map_err(|e| CameraError::Other(format!("String conversion failed: {}", e)))?
        .into();
    Ok(Some(value))
}

#[cfg(target_os = "android")]
fn classify_activity_error(message: String) -> CameraError {
    let lower = message.to_lowercase();
    if lower.contains("cancel") {
        CameraError::Cancelled(message)
    } else if lower.contains("permission") || lower.contains("denied") {
        CameraError::PermissionDenied(message)
    } else {
        CameraError::Other(message)
    }
}

impl PlatformCamera {
    /// Launches the camera and blocks until a photo path or an error arrives
    #[cfg(target_os = "android")]
    pub fn capture_blocking(&self) -> Result<String, CameraError> {
        let vm_ptr = android_context().vm() as *mut *const jni::sys::JNIInvokeInterface_;
        let vm = unsafe { jni::JavaVM::from_raw(vm_ptr) }
            .map_err(|e| CameraError::Other(format!("JavaVM failed: {}", e)))?;
        let mut env = vm
            .attach_current_thread()
            .map_err(|e| CameraError::Other(format!("JNI attach failed: {}", e)))?;

        let (activity, main_cls) = get_activity_instance(&mut env, &self.main_activity_class)?;

        env.call_static_method(&main_cls, "clearLastError", "()V", &[])
            .map_err(|e| CameraError::Other(format!("clearLastError failed: {}", e)))?;
        env.call_method(&activity, "launchCamera", "()V", &[])
            .map_err(|e| CameraError::Other(format!("launchCamera failed: {}", e)))?;

        for _ in 0..POLL_ATTEMPTS {
            std::thread::sleep(std::time::Duration::from_millis(POLL_INTERVAL_MS));

            if let Some(path) = read_static_string(&mut env, &main_cls, "getLastPhotoPath")? {
                return Ok(path);
            }
            if let Some(err) = read_static_string(&mut env, &main_cls, "getLastError")? {
                return Err(classify_activity_error(err));
            }
        }

        Err(CameraError::Timeout("Camera timeout - no photo taken".to_string()))
    }

    #[cfg(not(target_os = "android"))]
    pub fn capture_blocking(&self) -> Result<String, CameraError> {
        Err(CameraError::PlatformNotSupported(
            "Camera not available on this platform".to_string(),
        ))
    }

    /// Whether a camera can be used right now
    #[cfg(target_os = "android")]
    pub fn is_available(&self) -> Result<bool, CameraError> {
        let vm_ptr = android_context().vm() as *mut *const jni::sys::JNIInvokeInterface_;
        let vm = unsafe { jni::JavaVM::from_raw(vm_ptr) }
            .map_err(|e| CameraError::Other(format!("JavaVM failed: {}", e)))?;
        let mut env = vm
            .attach_current_thread()
            .map_err(|e| CameraError::Other(format!("JNI attach failed: {}", e)))?;

        let (activity, _cls) = get_activity_instance(&mut env, &self.main_activity_class)?;

        env.call_method(&activity, "hasCameraPermission", "()Z", &[])
            .and_then(|v| v.z())
            .map_err(|e| CameraError::Other(format!("hasCameraPermission failed: {}", e)))
    }

    #[cfg(not(target_os = "android"))]
    pub fn is_available(&self) -> Result<bool, CameraError> {
        Ok(false)
    }
}
