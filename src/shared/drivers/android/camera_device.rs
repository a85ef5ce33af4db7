// This is free and unencumbered software released into the public domain.

use super::NdkCaptureSession;
use crate::shared::{
    CameraDevice, CameraError, CaptureRequestBuilder, DeviceErrorCode, DeviceStateCallback,
    RequestTemplate, SessionConfiguration,
};
use core::{
    ffi::{c_int, c_void},
    ptr::null_mut,
};
use ndk_sys::{ACameraDevice, ACameraDevice_StateCallbacks, ACameraDevice_close};
use std::sync::Arc;

/// Context for the NDK device callbacks. Boxed so its address stays fixed
/// for as long as the device is open.
pub struct DeviceBridge {
    camera_id: String,
    callback: Arc<dyn DeviceStateCallback>,
    state_callbacks: ACameraDevice_StateCallbacks,
}

impl DeviceBridge {
    pub(crate) fn new(camera_id: &str, callback: Arc<dyn DeviceStateCallback>) -> Box<Self> {
        let mut bridge = Box::new(Self {
            camera_id: camera_id.into(),
            callback,
            state_callbacks: ACameraDevice_StateCallbacks {
                context: null_mut(),
                onDisconnected: Some(on_disconnected),
                onError: Some(on_error),
            },
        });
        bridge.state_callbacks.context = (&mut *bridge as *mut Self).cast::<c_void>();
        bridge
    }

    pub(crate) fn state_callbacks_mut(&mut self) -> *mut ACameraDevice_StateCallbacks {
        &mut self.state_callbacks
    }
}

unsafe extern "C" fn on_disconnected(context: *mut c_void, _device: *mut ACameraDevice) {
    let bridge = unsafe { &*context.cast::<DeviceBridge>() };
    bridge.callback.on_disconnected(&bridge.camera_id);
}

unsafe extern "C" fn on_error(context: *mut c_void, _device: *mut ACameraDevice, error: c_int) {
    let bridge = unsafe { &*context.cast::<DeviceBridge>() };
    bridge.callback.on_error(&bridge.camera_id, DeviceErrorCode::from(error));
}

pub struct NdkCameraDevice {
    camera_id: String,
    pub(crate) handle: *mut ACameraDevice,
    _bridge: Box<DeviceBridge>,
}

// The camera NDK serializes device calls internally.
unsafe impl Send for NdkCameraDevice {}

impl core::fmt::Debug for NdkCameraDevice {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NdkCameraDevice")
            .field("camera_id", &self.camera_id)
            .field("handle", &self.handle)
            .finish()
    }
}

impl Drop for NdkCameraDevice {
    fn drop(&mut self) {
        unsafe {
            ACameraDevice_close(self.handle);
        }
        self.handle = null_mut();
    }
}

impl NdkCameraDevice {
    pub(crate) fn new(
        camera_id: &str,
        handle: *mut ACameraDevice,
        bridge: Box<DeviceBridge>,
    ) -> Self {
        Self {
            camera_id: camera_id.into(),
            handle,
            _bridge: bridge,
        }
    }
}

impl CameraDevice for NdkCameraDevice {
    fn id(&self) -> &str {
        &self.camera_id
    }

    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    fn create_capture_session(&mut self, config: SessionConfiguration) -> Result<(), CameraError> {
        match NdkCaptureSession::open(self.handle, &config.outputs) {
            Ok(session) => config.callback.on_configured(Box::new(session)),
            Err(err) => {
                trace_event!(
                    warn,
                    camera_id = %self.camera_id,
                    %err,
                    "ACameraDevice_createCaptureSession"
                );
                config.callback.on_configure_failed();
            },
        }
        Ok(())
    }

    fn create_capture_request(
        &self,
        template: RequestTemplate,
    ) -> Result<CaptureRequestBuilder, CameraError> {
        if self.handle.is_null() {
            return Err(CameraError::Disconnected(self.camera_id.clone()));
        }
        // The native ACaptureRequest is built when the session submits it.
        Ok(CaptureRequestBuilder::new(template))
    }
}
