// This is free and unencumbered software released into the public domain.

use super::{NativeCaptureRequest, NativeWindowSurface, check};
use crate::shared::{
    CameraError, CaptureRequest, CaptureSession, OutputConfiguration, SequenceId,
};
use core::{ffi::c_void, ptr::null_mut};
use ndk_sys::{
    ACameraCaptureSession, ACameraCaptureSession_close,
    ACameraCaptureSession_setRepeatingRequest, ACameraCaptureSession_stateCallbacks,
    ACameraDevice, ACameraDevice_createCaptureSession, ACaptureSessionOutput,
    ACaptureSessionOutput_create, ACaptureSessionOutput_free, ACaptureSessionOutputContainer,
    ACaptureSessionOutputContainer_add, ACaptureSessionOutputContainer_create,
    ACaptureSessionOutputContainer_free,
};
use std::sync::Arc;

#[derive(Debug)]
struct SessionOutput {
    handle: *mut ACaptureSessionOutput,
    _window: Arc<super::NativeWindow>,
}

impl Drop for SessionOutput {
    fn drop(&mut self) {
        // See: https://developer.android.com/ndk/reference/group/camera#acapturesessionoutput_free
        unsafe { ACaptureSessionOutput_free(self.handle) };
        self.handle = null_mut();
    }
}

#[derive(Debug)]
struct OutputContainer {
    handle: *mut ACaptureSessionOutputContainer,
    outputs: Vec<SessionOutput>,
}

impl Drop for OutputContainer {
    fn drop(&mut self) {
        // See: https://developer.android.com/ndk/reference/group/camera#acapturesessionoutputcontainer_free
        unsafe { ACaptureSessionOutputContainer_free(self.handle) };
        self.handle = null_mut();
    }
}

impl OutputContainer {
    fn new(outputs: &[OutputConfiguration]) -> Result<Self, CameraError> {
        let mut container = Self {
            handle: null_mut(),
            outputs: Vec::with_capacity(outputs.len()),
        };
        let status = unsafe { ACaptureSessionOutputContainer_create(&mut container.handle) };
        check(status, "creating session output container")?;

        for output in outputs {
            let window = output
                .surface
                .handle_as::<NativeWindowSurface>()
                .map(|s| s.window.clone())
                .ok_or_else(|| {
                    CameraError::surface_unavailable(format!(
                        "{} is not backed by an ANativeWindow",
                        output.surface.id()
                    ))
                })?;

            let mut session_output = SessionOutput {
                handle: null_mut(),
                _window: window.clone(),
            };
            let status =
                unsafe { ACaptureSessionOutput_create(window.handle, &mut session_output.handle) };
            check(status, "creating session output")?;

            let status = unsafe {
                ACaptureSessionOutputContainer_add(container.handle, session_output.handle)
            };
            check(status, "adding session output")?;
            container.outputs.push(session_output);
        }
        Ok(container)
    }
}

unsafe extern "C" fn on_ready(_context: *mut c_void, _session: *mut ACameraCaptureSession) {
    trace_event!(debug, "ACameraCaptureSession#onReady");
}

unsafe extern "C" fn on_active(_context: *mut c_void, _session: *mut ACameraCaptureSession) {
    trace_event!(debug, "ACameraCaptureSession#onActive");
}

unsafe extern "C" fn on_closed(_context: *mut c_void, _session: *mut ACameraCaptureSession) {
    trace_event!(debug, "ACameraCaptureSession#onClosed");
}

pub struct NdkCaptureSession {
    handle: *mut ACameraCaptureSession,
    device: *mut ACameraDevice,
    _state_callbacks: Box<ACameraCaptureSession_stateCallbacks>,
    _outputs: OutputContainer,
    repeating: Option<NativeCaptureRequest>,
}

// Session calls are serialized by the camera NDK.
unsafe impl Send for NdkCaptureSession {}

impl core::fmt::Debug for NdkCaptureSession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NdkCaptureSession")
            .field("handle", &self.handle)
            .field("repeating", &self.repeating.is_some())
            .finish()
    }
}

impl Drop for NdkCaptureSession {
    fn drop(&mut self) {
        unsafe { ACameraCaptureSession_close(self.handle) };
        self.handle = null_mut();
    }
}

impl NdkCaptureSession {
    /// Creates the session. The NDK configures synchronously, so success
    /// here is the "configured" signal.
    pub(crate) fn open(
        device: *mut ACameraDevice,
        outputs: &[OutputConfiguration],
    ) -> Result<Self, CameraError> {
        let container = OutputContainer::new(outputs)?;
        let state_callbacks = Box::new(ACameraCaptureSession_stateCallbacks {
            context: null_mut(),
            onClosed: Some(on_closed),
            onReady: Some(on_ready),
            onActive: Some(on_active),
        });

        let mut handle = null_mut();
        let status = unsafe {
            ACameraDevice_createCaptureSession(
                device,
                container.handle,
                &*state_callbacks,
                &mut handle,
            )
        };
        check(status, "creating capture session")?;

        Ok(Self {
            handle,
            device,
            _state_callbacks: state_callbacks,
            _outputs: container,
            repeating: None,
        })
    }
}

impl CaptureSession for NdkCaptureSession {
    /// See: https://developer.android.com/ndk/reference/group/camera#acameracapturesession_setrepeatingrequest
    fn set_repeating_request(
        &mut self,
        request: &CaptureRequest,
    ) -> Result<SequenceId, CameraError> {
        let native = NativeCaptureRequest::new(self.device, request)?;

        let mut requests = native.handle;
        let mut sequence_id = 0;
        let status = unsafe {
            ACameraCaptureSession_setRepeatingRequest(
                self.handle,
                null_mut(),
                1,
                &mut requests,
                &mut sequence_id,
            )
        };
        trace_event!(debug, status = status.0, "ACameraCaptureSession_setRepeatingRequest");
        check(status, "submitting repeating request")?;

        // The previous repeating request is replaced; keep the new one alive.
        self.repeating = Some(native);
        Ok(SequenceId(sequence_id))
    }
}
