// This is free and unencumbered software released into the public domain.

//! Lifecycle callbacks, delivered onto the controller's main context.
//!
//! The framework may invoke the handlers below from any thread. Each
//! handler only posts a [`Callback`] to the [`MainExecutor`]; the
//! controller drains that queue one message at a time on its own thread.

use crate::shared::{CameraDevice, CameraError, CaptureSession, DeviceErrorCode, Surface};
use std::{
    fmt,
    sync::mpsc::{Receiver, Sender, channel},
};

pub trait DeviceStateCallback: Send + Sync {
    fn on_opened(&self, device: Box<dyn CameraDevice>);
    fn on_disconnected(&self, camera_id: &str);
    fn on_error(&self, camera_id: &str, error: DeviceErrorCode);
}

pub trait SessionStateCallback: Send + Sync {
    fn on_configured(&self, session: Box<dyn CaptureSession>);
    fn on_configure_failed(&self);
}

pub trait SurfaceCallback: Send + Sync {
    fn on_success(&self, surface: Surface);
    fn on_failure(&self, error: CameraError);
}

#[derive(Debug)]
pub enum Callback {
    DeviceOpened(Box<dyn CameraDevice>),
    DeviceDisconnected { camera_id: String },
    DeviceError { camera_id: String, error: DeviceErrorCode },
    SurfaceReady(Surface),
    SurfaceFailed(CameraError),
    SessionConfigured(Box<dyn CaptureSession>),
    SessionConfigureFailed,
}

impl Callback {
    pub fn name(&self) -> &'static str {
        match self {
            Callback::DeviceOpened(_) => "onOpened",
            Callback::DeviceDisconnected { .. } => "onDisconnected",
            Callback::DeviceError { .. } => "onError",
            Callback::SurfaceReady(_) => "onSurfaceReady",
            Callback::SurfaceFailed(_) => "onSurfaceFailed",
            Callback::SessionConfigured(_) => "onConfigured",
            Callback::SessionConfigureFailed => "onConfigureFailed",
        }
    }
}

#[derive(Clone)]
pub struct MainExecutor {
    tx: Sender<Callback>,
}

impl fmt::Debug for MainExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MainExecutor")
    }
}

impl MainExecutor {
    pub fn channel() -> (Self, Receiver<Callback>) {
        let (tx, rx) = channel();
        (Self { tx }, rx)
    }

    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    pub fn post(&self, callback: Callback) {
        if let Err(err) = self.tx.send(callback) {
            trace_event!(
                debug,
                callback = err.0.name(),
                "main context gone, dropping callback"
            );
        }
    }
}

#[derive(Clone, Debug)]
pub struct DeviceCallbacks {
    executor: MainExecutor,
}

impl DeviceCallbacks {
    pub fn new(executor: MainExecutor) -> Self {
        Self { executor }
    }
}

impl DeviceStateCallback for DeviceCallbacks {
    fn on_opened(&self, device: Box<dyn CameraDevice>) {
        self.executor.post(Callback::DeviceOpened(device));
    }

    fn on_disconnected(&self, camera_id: &str) {
        self.executor.post(Callback::DeviceDisconnected {
            camera_id: camera_id.into(),
        });
    }

    fn on_error(&self, camera_id: &str, error: DeviceErrorCode) {
        self.executor.post(Callback::DeviceError {
            camera_id: camera_id.into(),
            error,
        });
    }
}

#[derive(Clone, Debug)]
pub struct SessionCallbacks {
    executor: MainExecutor,
}

impl SessionCallbacks {
    pub fn new(executor: MainExecutor) -> Self {
        Self { executor }
    }
}

impl SessionStateCallback for SessionCallbacks {
    fn on_configured(&self, session: Box<dyn CaptureSession>) {
        self.executor.post(Callback::SessionConfigured(session));
    }

    fn on_configure_failed(&self) {
        self.executor.post(Callback::SessionConfigureFailed);
    }
}

#[derive(Clone, Debug)]
pub struct SurfaceCallbacks {
    executor: MainExecutor,
}

impl SurfaceCallbacks {
    pub fn new(executor: MainExecutor) -> Self {
        Self { executor }
    }
}

impl SurfaceCallback for SurfaceCallbacks {
    fn on_success(&self, surface: Surface) {
        self.executor.post(Callback::SurfaceReady(surface));
    }

    fn on_failure(&self, error: CameraError) {
        self.executor.post(Callback::SurfaceFailed(error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::Size;
    use std::thread;

    #[test]
    fn handlers_post_in_call_order() {
        let (executor, rx) = MainExecutor::channel();
        let device = DeviceCallbacks::new(executor.clone());
        let surface = SurfaceCallbacks::new(executor.clone());
        let session = SessionCallbacks::new(executor);

        device.on_error("0", DeviceErrorCode::CameraInUse);
        surface.on_success(Surface::new(Size::new(2, 2), None));
        session.on_configure_failed();

        let names: Vec<_> = rx.try_iter().map(|cb| cb.name()).collect();
        assert_eq!(names, ["onError", "onSurfaceReady", "onConfigureFailed"]);
    }

    #[test]
    fn handlers_may_fire_from_other_threads() {
        let (executor, rx) = MainExecutor::channel();
        let device = DeviceCallbacks::new(executor);
        thread::spawn(move || device.on_disconnected("1"))
            .join()
            .unwrap();

        match rx.try_recv() {
            Ok(Callback::DeviceDisconnected { camera_id }) => assert_eq!(camera_id, "1"),
            other => panic!("unexpected callback: {other:?}"),
        }
    }

    #[test]
    fn posting_after_receiver_dropped_is_harmless() {
        let (executor, rx) = MainExecutor::channel();
        drop(rx);
        SessionCallbacks::new(executor).on_configure_failed();
    }
}
