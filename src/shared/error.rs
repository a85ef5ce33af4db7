// This is free and unencumbered software released into the public domain.

use crate::shared::DeviceErrorCode;
use std::error::Error as StdError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("no camera device available")]
    NoCamera,

    #[error("camera permission has not been granted")]
    PermissionDenied,

    #[error("viewfinder already started (state: {0})")]
    AlreadyStarted(String),

    #[error("camera device {0} disconnected")]
    Disconnected(String),

    #[error("camera device {camera_id} reported error: {code}")]
    Device {
        camera_id: String,
        code: DeviceErrorCode,
    },

    #[error("preview surface unavailable: {0}")]
    SurfaceUnavailable(String),

    #[error("capture session configuration failed")]
    SessionConfigureFailed,

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("stream closed")]
    Closed,

    #[error("driver error while {context}")]
    DriverError {
        context: &'static str,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("{0}")]
    Other(String),
}

impl CameraError {
    #[inline]
    pub fn driver(context: &'static str, source: impl StdError + Send + Sync + 'static) -> Self {
        Self::DriverError {
            context,
            source: Box::new(source),
        }
    }

    #[inline]
    pub fn surface_unavailable(msg: impl Into<String>) -> Self {
        Self::SurfaceUnavailable(msg.into())
    }

    #[inline]
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    #[inline]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}
