// This is free and unencumbered software released into the public domain.

use crate::shared::CameraError;
use derive_more::Display;
use ndk_sys::camera_status_t;

pub type CameraResult<T = ()> = core::result::Result<T, CameraStatus>;

#[derive(Clone, Copy, Debug, Display)]
#[display("camera_status_t({})", _0.0)]
pub struct CameraStatus(pub(crate) camera_status_t);

impl core::error::Error for CameraStatus {}

impl Default for CameraStatus {
    fn default() -> Self {
        CameraStatus(camera_status_t::ACAMERA_OK)
    }
}

impl From<camera_status_t> for CameraStatus {
    fn from(input: camera_status_t) -> Self {
        Self(input)
    }
}

impl CameraStatus {
    pub fn check(status: camera_status_t) -> CameraResult {
        if status == camera_status_t::ACAMERA_OK {
            Ok(())
        } else {
            Err(status.into())
        }
    }

    pub fn into_error(self, context: &'static str) -> CameraError {
        match self.0 {
            camera_status_t::ACAMERA_ERROR_CAMERA_DISCONNECTED => {
                CameraError::Disconnected(context.into())
            },
            camera_status_t::ACAMERA_ERROR_PERMISSION_DENIED => CameraError::PermissionDenied,
            _ => CameraError::driver(context, self),
        }
    }
}

/// Maps a failed NDK status onto [`CameraError`].
pub(crate) fn check(status: camera_status_t, context: &'static str) -> Result<(), CameraError> {
    CameraStatus::check(status).map_err(|s| s.into_error(context))
}
