// This is free and unencumbered software released into the public domain.

//! The camera framework as seen by the controller.
//!
//! Every external collaborator (permissions, display, camera service,
//! viewfinder widget, user notices) is a trait here; backends under
//! [`crate::shared::drivers`] provide the implementations.

use crate::shared::{
    CameraError, DeviceStateCallback, MainExecutor, SessionStateCallback, SurfaceCallback,
};
use derive_more::Display;
use std::{
    any::Any,
    borrow::Cow,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraBackend {
    Android,
    Sim,
}

impl dogma::Named for CameraBackend {
    fn name(&self) -> Cow<'_, str> {
        match self {
            CameraBackend::Android => "camera2".into(),
            CameraBackend::Sim => "sim".into(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq, Hash)]
#[display("{width}x{height}")]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permission {
    Camera,
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::Camera => "android.permission.CAMERA",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LensFacing {
    Front,
    Back,
    External,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraCharacteristics {
    pub camera_id: String,
    pub lens_facing: LensFacing,
    pub sensor_orientation: u32,
}

/// Device-level error codes, numbered as `CameraDevice.StateCallback` does.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum DeviceErrorCode {
    #[display("camera in use")]
    CameraInUse,
    #[display("max cameras in use")]
    MaxCamerasInUse,
    #[display("camera disabled")]
    CameraDisabled,
    #[display("camera device")]
    CameraDevice,
    #[display("camera service")]
    CameraService,
    #[display("unknown ({_0})")]
    Unknown(i32),
}

impl From<i32> for DeviceErrorCode {
    fn from(code: i32) -> Self {
        match code {
            1 => Self::CameraInUse,
            2 => Self::MaxCamerasInUse,
            3 => Self::CameraDisabled,
            4 => Self::CameraDevice,
            5 => Self::CameraService,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SurfaceRequest {
    pub resolution: Size,
    pub characteristics: CameraCharacteristics,
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[display("surface#{_0}")]
pub struct SurfaceId(pub u64);

/// Backend-native object behind a [`Surface`] (a window, a frame queue).
pub trait SurfaceHandle: fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

#[derive(Clone, Debug)]
pub struct Surface {
    id: SurfaceId,
    size: Size,
    handle: Option<Arc<dyn SurfaceHandle>>,
}

impl PartialEq for Surface {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Surface {}

impl Surface {
    pub fn new(size: Size, handle: Option<Arc<dyn SurfaceHandle>>) -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self {
            id: SurfaceId(NEXT_ID.fetch_add(1, Ordering::Relaxed)),
            size,
            handle,
        }
    }

    pub fn id(&self) -> SurfaceId {
        self.id
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn handle_as<T: 'static>(&self) -> Option<&T> {
        self.handle.as_ref()?.as_any().downcast_ref::<T>()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputConfiguration {
    pub surface: Surface,
}

impl OutputConfiguration {
    pub fn new(surface: Surface) -> Self {
        Self { surface }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionType {
    #[default]
    Regular,
}

pub struct SessionConfiguration {
    pub session_type: SessionType,
    pub outputs: Vec<OutputConfiguration>,
    /// Context the session callbacks are delivered on.
    pub executor: MainExecutor,
    pub callback: Arc<dyn SessionStateCallback>,
}

impl fmt::Debug for SessionConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfiguration")
            .field("session_type", &self.session_type)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestTemplate {
    Preview,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureRequest {
    pub template: RequestTemplate,
    pub targets: Vec<Surface>,
}

#[derive(Debug)]
pub struct CaptureRequestBuilder {
    template: RequestTemplate,
    targets: Vec<Surface>,
}

impl CaptureRequestBuilder {
    pub fn new(template: RequestTemplate) -> Self {
        Self {
            template,
            targets: Vec::new(),
        }
    }

    pub fn add_target(&mut self, surface: &Surface) -> &mut Self {
        if !self.targets.contains(surface) {
            self.targets.push(surface.clone());
        }
        self
    }

    pub fn build(self) -> CaptureRequest {
        CaptureRequest {
            template: self.template,
            targets: self.targets,
        }
    }
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
#[display("{_0}")]
pub struct SequenceId(pub i32);

pub trait PermissionService: Send {
    fn check(&self, permission: Permission) -> bool;
    fn request(&self, permissions: &[Permission], request_code: i32);
}

pub trait DisplayMetrics: Send {
    /// Full-screen size in pixels.
    fn pixel_size(&self) -> Size;
}

pub trait CameraManager: Send {
    fn camera_ids(&self) -> Result<Vec<String>, CameraError>;
    fn characteristics(&self, camera_id: &str) -> Result<CameraCharacteristics, CameraError>;
    fn open_camera(
        &self,
        camera_id: &str,
        callback: Arc<dyn DeviceStateCallback>,
    ) -> Result<(), CameraError>;
}

pub trait CameraDevice: fmt::Debug + Send {
    fn id(&self) -> &str;
    /// Outcome arrives through `config.callback`.
    fn create_capture_session(&mut self, config: SessionConfiguration) -> Result<(), CameraError>;
    fn create_capture_request(
        &self,
        template: RequestTemplate,
    ) -> Result<CaptureRequestBuilder, CameraError>;
}

pub trait CaptureSession: fmt::Debug + Send {
    fn set_repeating_request(&mut self, request: &CaptureRequest)
    -> Result<SequenceId, CameraError>;
}

pub trait Viewfinder: Send {
    /// Outcome arrives through `callback`.
    fn request_surface(&self, request: SurfaceRequest, callback: Arc<dyn SurfaceCallback>);
}

pub trait Notifier: Send {
    fn notify(&self, message: &str);
}

/// Notices routed to the log, for hosts without a toast surface.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    fn notify(&self, message: &str) {
        trace_event!(info, notice = message, "user notice");
    }
}

pub struct Platform {
    pub backend: CameraBackend,
    pub permissions: Box<dyn PermissionService>,
    pub display: Box<dyn DisplayMetrics>,
    pub cameras: Box<dyn CameraManager>,
    pub viewfinder: Box<dyn Viewfinder>,
    pub notifier: Box<dyn Notifier>,
}

impl fmt::Debug for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Platform")
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_error_codes_follow_camera2_numbering() {
        assert_eq!(DeviceErrorCode::from(1), DeviceErrorCode::CameraInUse);
        assert_eq!(DeviceErrorCode::from(4), DeviceErrorCode::CameraDevice);
        assert_eq!(DeviceErrorCode::from(5), DeviceErrorCode::CameraService);
        assert_eq!(DeviceErrorCode::from(42), DeviceErrorCode::Unknown(42));
        assert_eq!(DeviceErrorCode::Unknown(42).to_string(), "unknown (42)");
    }

    #[test]
    fn surfaces_compare_by_id() {
        let a = Surface::new(Size::new(4, 4), None);
        let b = Surface::new(Size::new(4, 4), None);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(Size::new(1080, 2400).to_string(), "1080x2400");
    }

    #[test]
    fn request_builder_ignores_duplicate_targets() {
        let surface = Surface::new(Size::new(8, 8), None);
        let mut builder = CaptureRequestBuilder::new(RequestTemplate::Preview);
        builder.add_target(&surface).add_target(&surface);
        let request = builder.build();
        assert_eq!(request.targets, vec![surface]);
        assert_eq!(request.template, RequestTemplate::Preview);
    }
}
