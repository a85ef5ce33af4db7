// This is free and unencumbered software released into the public domain.

use super::{NativeWindow, NativeWindowSurface, check};
use crate::shared::{CameraError, CaptureRequest, RequestTemplate};
use core::ptr::null_mut;
use ndk_sys::{
    ACameraDevice, ACameraDevice_createCaptureRequest, ACameraDevice_request_template,
    ACameraOutputTarget, ACameraOutputTarget_create, ACameraOutputTarget_free, ACaptureRequest,
    ACaptureRequest_addTarget, ACaptureRequest_free,
};
use std::sync::Arc;

#[derive(Debug)]
struct OutputTarget {
    handle: *mut ACameraOutputTarget,
    _window: Arc<NativeWindow>,
}

impl Drop for OutputTarget {
    fn drop(&mut self) {
        unsafe { ACameraOutputTarget_free(self.handle) };
        self.handle = null_mut();
    }
}

/// Native counterpart of a [`CaptureRequest`].
#[derive(Debug)]
pub struct NativeCaptureRequest {
    pub(crate) handle: *mut ACaptureRequest,
    _targets: Vec<OutputTarget>,
}

impl Drop for NativeCaptureRequest {
    fn drop(&mut self) {
        // Targets are freed after the request that references them.
        unsafe { ACaptureRequest_free(self.handle) };
        self.handle = null_mut();
    }
}

fn native_template(template: RequestTemplate) -> ACameraDevice_request_template {
    match template {
        RequestTemplate::Preview => ACameraDevice_request_template::TEMPLATE_PREVIEW,
    }
}

impl NativeCaptureRequest {
    pub(crate) fn new(
        device: *mut ACameraDevice,
        request: &CaptureRequest,
    ) -> Result<Self, CameraError> {
        let mut result = Self {
            handle: null_mut(),
            _targets: Vec::with_capacity(request.targets.len()),
        };
        let status = unsafe {
            ACameraDevice_createCaptureRequest(
                device,
                native_template(request.template),
                &mut result.handle,
            )
        };
        check(status, "creating capture request")?;

        for surface in &request.targets {
            let window = surface
                .handle_as::<NativeWindowSurface>()
                .map(|s| s.window.clone())
                .ok_or_else(|| {
                    CameraError::surface_unavailable(format!(
                        "{} is not backed by an ANativeWindow",
                        surface.id()
                    ))
                })?;

            // See: https://developer.android.com/ndk/reference/group/camera#acameraoutputtarget_create
            let mut target = OutputTarget {
                handle: null_mut(),
                _window: window.clone(),
            };
            let status = unsafe { ACameraOutputTarget_create(window.handle, &mut target.handle) };
            check(status, "creating output target")?;

            let status = unsafe { ACaptureRequest_addTarget(result.handle, target.handle) };
            check(status, "adding request target")?;
            result._targets.push(target);
        }
        Ok(result)
    }
}
