// This is free and unencumbered software released into the public domain.

//! Camera2 NDK backend.
//!
//! The host activity owns the window the preview renders into and the
//! runtime permission flow; both are handed in through
//! [`AndroidCameraDriver::platform`].

mod camera_device;
mod camera_manager;
mod camera_status;
mod capture_request;
mod capture_session;
mod native_window;

pub use camera_device::*;
pub use camera_manager::*;
pub use camera_status::*;
pub use capture_request::*;
pub use capture_session::*;
pub use native_window::*;

use crate::shared::{
    CameraBackend, CameraError, LogNotifier, Permission, PermissionService, Platform,
};
use ndk_sys::{ANativeWindow, android_get_device_api_level};
use std::{
    borrow::Cow,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

#[link(name = "camera2ndk")]
unsafe extern "C" {}

/// First API level shipping the camera NDK.
pub const MIN_API_LEVEL: u32 = 24;

pub type PermissionRequestHook = Box<dyn Fn(&[Permission], i32) + Send + 'static>;

/// Runtime permission state as reported by the host activity.
pub struct HostPermissions {
    granted: Arc<AtomicBool>,
    on_request: PermissionRequestHook,
}

impl HostPermissions {
    pub fn new(granted: Arc<AtomicBool>, on_request: PermissionRequestHook) -> Self {
        Self {
            granted,
            on_request,
        }
    }
}

impl PermissionService for HostPermissions {
    fn check(&self, permission: Permission) -> bool {
        permission == Permission::Camera && self.granted.load(Ordering::SeqCst)
    }

    fn request(&self, permissions: &[Permission], request_code: i32) {
        (self.on_request)(permissions, request_code)
    }
}

#[derive(Clone, Debug)]
pub struct AndroidCameraDriver {
    pub api_level: u32,
}

impl dogma::Named for AndroidCameraDriver {
    fn name(&self) -> Cow<'_, str> {
        "camera2".into()
    }
}

impl AndroidCameraDriver {
    pub fn open() -> Result<Self, CameraError> {
        let api_level = unsafe { android_get_device_api_level() } as u32;
        trace_event!(debug, api_level, "android_get_device_api_level");
        if api_level < MIN_API_LEVEL {
            return Err(CameraError::unsupported(format!(
                "camera NDK requires API level {MIN_API_LEVEL}, device has {api_level}"
            )));
        }
        Ok(Self { api_level })
    }

    /// Platform services rendering into `window`.
    ///
    /// # Safety
    ///
    /// `window` must be a valid `ANativeWindow`; it is acquired here and
    /// released when the last surface referencing it is dropped.
    pub unsafe fn platform(
        &self,
        window: *mut ANativeWindow,
        permissions: HostPermissions,
    ) -> Result<Platform, CameraError> {
        let window = Arc::new(unsafe { NativeWindow::acquire(window) }?);
        Ok(Platform {
            backend: CameraBackend::Android,
            permissions: Box::new(permissions),
            display: Box::new(NativeWindowDisplay::new(window.clone())),
            cameras: Box::new(NdkCameraManager::new()),
            viewfinder: Box::new(NativeWindowViewfinder::new(window)),
            notifier: Box::new(LogNotifier),
        })
    }
}
