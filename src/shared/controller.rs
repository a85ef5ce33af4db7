// This is free and unencumbered software released into the public domain.

use crate::shared::{
    CameraBackend, CameraDevice, CameraError, Callback, CaptureSession, DeviceCallbacks,
    DeviceErrorCode, MainExecutor, OutputConfiguration, Permission, Platform, RequestTemplate,
    SequenceId, SessionCallbacks, SessionConfiguration, SessionType, Surface, SurfaceCallbacks,
    SurfaceRequest, ViewfinderConfig,
};
use derive_more::Display;
use std::{
    sync::{
        Arc,
        mpsc::{Receiver, RecvTimeoutError},
    },
    time::{Duration, Instant},
};

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum Failure {
    #[display("permission denied")]
    PermissionDenied,
    #[display("no camera")]
    NoCamera,
    #[display("device open failed")]
    DeviceOpen,
    #[display("device disconnected")]
    Disconnected,
    #[display("device error: {_0}")]
    DeviceError(DeviceErrorCode),
    #[display("surface unavailable")]
    SurfaceUnavailable,
    #[display("session configure failed")]
    SessionConfigureFailed,
    #[display("repeating request failed")]
    RepeatingRequestFailed,
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum ControllerState {
    Uninitialized,
    AwaitingPermission,
    PermissionChecked,
    DeviceOpening,
    DeviceReady,
    SessionConfiguring,
    Streaming,
    #[display("Failed({_0})")]
    Failed(Failure),
}

impl ControllerState {
    /// No further progress without outside input.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            ControllerState::Streaming
                | ControllerState::Failed(_)
                | ControllerState::AwaitingPermission
        )
    }
}

/// Brings a camera preview up through permission check, device open,
/// surface request, session configuration and a repeating preview request.
///
/// Framework callbacks are queued on the controller's [`MainExecutor`] and
/// handled one at a time by [`dispatch_pending`](Self::dispatch_pending) or
/// [`run_until_settled`](Self::run_until_settled). Each handle is stored
/// once, by the callback that produces it, and only in the state that
/// awaits it.
///
/// Nothing is closed explicitly; the device, session and surface live until
/// the controller is dropped.
pub struct ViewfinderController {
    config: ViewfinderConfig,
    executor: MainExecutor,
    inbox: Receiver<Callback>,
    state: ControllerState,
    camera_id: Option<String>,
    // Dropped in declaration order: session, surface, device, then the
    // platform services that produced them.
    session: Option<Box<dyn CaptureSession>>,
    surface: Option<Surface>,
    device: Option<Box<dyn CameraDevice>>,
    repeating: Option<SequenceId>,
    platform: Platform,
}

impl core::fmt::Debug for ViewfinderController {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ViewfinderController")
            .field("platform", &self.platform)
            .field("state", &self.state)
            .field("camera_id", &self.camera_id)
            .field("surface", &self.surface.as_ref().map(|s| s.id()))
            .field("repeating", &self.repeating)
            .finish()
    }
}

impl ViewfinderController {
    pub fn new(platform: Platform, config: ViewfinderConfig) -> Self {
        let (executor, inbox) = MainExecutor::channel();
        Self {
            config,
            executor,
            inbox,
            state: ControllerState::Uninitialized,
            camera_id: None,
            session: None,
            surface: None,
            device: None,
            repeating: None,
            platform,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn backend(&self) -> CameraBackend {
        self.platform.backend
    }

    pub fn config(&self) -> &ViewfinderConfig {
        &self.config
    }

    pub fn camera_id(&self) -> Option<&str> {
        self.camera_id.as_deref()
    }

    pub fn device(&self) -> Option<&dyn CameraDevice> {
        self.device.as_deref()
    }

    pub fn surface(&self) -> Option<&Surface> {
        self.surface.as_ref()
    }

    pub fn session(&self) -> Option<&dyn CaptureSession> {
        self.session.as_deref()
    }

    pub fn repeating_sequence(&self) -> Option<SequenceId> {
        self.repeating
    }

    /// Handle for posting callbacks onto this controller's main context.
    pub fn executor(&self) -> MainExecutor {
        self.executor.clone()
    }

    /// Screen creation: checks the camera permission and opens the first
    /// enumerated camera.
    ///
    /// Only valid once; later calls fail with [`CameraError::AlreadyStarted`]
    /// and have no effect.
    pub fn on_create(&mut self) -> Result<(), CameraError> {
        if self.state != ControllerState::Uninitialized {
            return Err(CameraError::AlreadyStarted(self.state.to_string()));
        }

        let granted = self.platform.permissions.check(Permission::Camera);
        if !granted {
            trace_event!(
                info,
                code = self.config.permission_request_code,
                "requesting camera permission"
            );
            self.platform
                .permissions
                .request(&[Permission::Camera], self.config.permission_request_code);

            if self.config.gate_on_permission {
                self.transition(ControllerState::AwaitingPermission);
                return Ok(());
            }
            trace_event!(warn, "opening camera without a confirmed permission");
        }

        self.transition(ControllerState::PermissionChecked);
        self.open_device()
    }

    /// Result of the permission request issued by [`on_create`](Self::on_create).
    pub fn on_request_permissions_result(
        &mut self,
        request_code: i32,
        granted: bool,
    ) -> Result<(), CameraError> {
        if request_code != self.config.permission_request_code
            || self.state != ControllerState::AwaitingPermission
        {
            trace_event!(
                debug,
                request_code,
                state = %self.state,
                "ignoring permission result"
            );
            return Ok(());
        }

        if !granted {
            self.transition(ControllerState::Failed(Failure::PermissionDenied));
            return Err(CameraError::PermissionDenied);
        }

        self.transition(ControllerState::PermissionChecked);
        self.open_device()
    }

    /// Handles every callback queued so far; returns how many were handled.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(callback) = self.inbox.try_recv() {
            self.handle(callback);
            handled += 1;
        }
        handled
    }

    /// Handles callbacks as they arrive until the state settles or the
    /// timeout elapses.
    pub fn run_until_settled(&mut self, timeout: Duration) -> ControllerState {
        let deadline = Instant::now() + timeout;
        self.dispatch_pending();
        while !self.state.is_settled() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.inbox.recv_timeout(remaining) {
                Ok(callback) => self.handle(callback),
                Err(RecvTimeoutError::Timeout) => break,
                // The controller holds a sender itself.
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.state
    }

    fn transition(&mut self, next: ControllerState) {
        trace_event!(debug, from = %self.state, to = %next, "state transition");
        if self.config.diagnostics {
            trace_event!(
                debug,
                camera_id = ?self.camera_id,
                device = self.device.is_some(),
                surface = ?self.surface.as_ref().map(|s| s.id()),
                session = self.session.is_some(),
                "controller handles"
            );
        }
        self.state = next;
    }

    fn fail(&mut self, failure: Failure) {
        self.transition(ControllerState::Failed(failure));
    }

    fn open_device(&mut self) -> Result<(), CameraError> {
        let camera_id = match self.platform.cameras.camera_ids() {
            Ok(ids) => ids.into_iter().next(),
            Err(err) => {
                self.fail(Failure::NoCamera);
                return Err(err);
            },
        };
        let Some(camera_id) = camera_id else {
            self.fail(Failure::NoCamera);
            return Err(CameraError::NoCamera);
        };

        trace_event!(info, camera_id = %camera_id, "opening camera");
        let callbacks = Arc::new(DeviceCallbacks::new(self.executor.clone()));
        self.camera_id = Some(camera_id.clone());
        self.transition(ControllerState::DeviceOpening);

        if let Err(err) = self.platform.cameras.open_camera(&camera_id, callbacks) {
            trace_event!(error, camera_id = %camera_id, %err, "camera open failed");
            self.fail(Failure::DeviceOpen);
            return Err(err);
        }
        Ok(())
    }

    fn handle(&mut self, callback: Callback) {
        trace_event!(debug, callback = callback.name(), state = %self.state, "callback");
        match callback {
            Callback::DeviceOpened(device) => self.on_device_opened(device),
            Callback::DeviceDisconnected { camera_id } => {
                self.on_device_lost(&camera_id, Failure::Disconnected, "onDisconnected")
            },
            Callback::DeviceError { camera_id, error } => {
                self.on_device_lost(&camera_id, Failure::DeviceError(error), "onError")
            },
            Callback::SurfaceReady(surface) => self.on_surface_ready(surface),
            Callback::SurfaceFailed(err) => self.on_surface_failed(err),
            Callback::SessionConfigured(session) => self.on_session_configured(session),
            Callback::SessionConfigureFailed => self.on_session_configure_failed(),
        }
    }

    fn on_device_opened(&mut self, device: Box<dyn CameraDevice>) {
        if self.state != ControllerState::DeviceOpening || self.device.is_some() {
            trace_event!(warn, camera_id = device.id(), state = %self.state, "unexpected onOpened");
            return;
        }

        self.platform.notifier.notify("onOpened");
        self.device = Some(device);
        self.transition(ControllerState::DeviceReady);
        self.request_surface();
    }

    fn on_device_lost(&mut self, camera_id: &str, failure: Failure, notice: &str) {
        let live = matches!(
            self.state,
            ControllerState::DeviceOpening
                | ControllerState::DeviceReady
                | ControllerState::SessionConfiguring
                | ControllerState::Streaming
        );
        if !live || self.camera_id.as_deref() != Some(camera_id) {
            trace_event!(debug, camera_id, state = %self.state, "ignoring device callback");
            return;
        }

        trace_event!(warn, camera_id, %failure, "camera device lost");
        self.platform.notifier.notify(notice);
        self.fail(failure);
    }

    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    fn request_surface(&mut self) {
        let Some(camera_id) = self.camera_id.clone() else {
            return;
        };

        let characteristics = match self.platform.cameras.characteristics(&camera_id) {
            Ok(characteristics) => characteristics,
            Err(err) => {
                trace_event!(warn, camera_id = %camera_id, %err, "camera characteristics unavailable");
                self.fail(Failure::SurfaceUnavailable);
                return;
            },
        };

        let resolution = self.platform.display.pixel_size();
        trace_event!(debug, %resolution, "requesting preview surface");
        let request = SurfaceRequest {
            resolution,
            characteristics,
        };
        let callbacks = Arc::new(SurfaceCallbacks::new(self.executor.clone()));
        self.platform.viewfinder.request_surface(request, callbacks);
    }

    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    fn on_surface_ready(&mut self, surface: Surface) {
        if self.state != ControllerState::DeviceReady || self.surface.is_some() {
            trace_event!(warn, surface = %surface.id(), state = %self.state, "unexpected surface");
            return;
        }

        let config = SessionConfiguration {
            session_type: SessionType::Regular,
            outputs: vec![OutputConfiguration::new(surface.clone())],
            executor: self.executor.clone(),
            callback: Arc::new(SessionCallbacks::new(self.executor.clone())),
        };
        self.surface = Some(surface);
        self.transition(ControllerState::SessionConfiguring);

        let Some(device) = self.device.as_mut() else {
            return;
        };
        if let Err(err) = device.create_capture_session(config) {
            trace_event!(error, %err, "capture session configure error");
            self.fail(Failure::SessionConfigureFailed);
        }
    }

    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    fn on_surface_failed(&mut self, err: CameraError) {
        if self.state != ControllerState::DeviceReady {
            return;
        }
        trace_event!(warn, %err, "preview surface request failed");
        self.fail(Failure::SurfaceUnavailable);
    }

    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    fn on_session_configured(&mut self, session: Box<dyn CaptureSession>) {
        if self.state != ControllerState::SessionConfiguring || self.session.is_some() {
            trace_event!(warn, state = %self.state, "unexpected onConfigured");
            return;
        }
        self.session = Some(session);

        match self.start_preview() {
            Ok(sequence) => {
                trace_event!(info, %sequence, "preview streaming");
                self.repeating = Some(sequence);
                self.transition(ControllerState::Streaming);
            },
            Err(err) => {
                trace_event!(error, %err, "capture session configure error");
                self.fail(Failure::RepeatingRequestFailed);
            },
        }
    }

    fn start_preview(&mut self) -> Result<SequenceId, CameraError> {
        let (Some(device), Some(surface), Some(session)) = (
            self.device.as_ref(),
            self.surface.as_ref(),
            self.session.as_mut(),
        ) else {
            return Err(CameraError::other("preview started before handles were ready"));
        };

        let mut builder = device.create_capture_request(RequestTemplate::Preview)?;
        builder.add_target(surface);
        session.set_repeating_request(&builder.build())
    }

    fn on_session_configure_failed(&mut self) {
        if self.state != ControllerState::SessionConfiguring {
            return;
        }
        trace_event!(error, "capture session configure error");
        self.fail(Failure::SessionConfigureFailed);
    }
}

#[cfg(all(test, feature = "sim"))]
mod tests {
    use super::*;
    use crate::shared::drivers::sim::{DeviceOutcome, SimConfig, SimFramework};

    fn controller(sim: &SimFramework) -> ViewfinderController {
        ViewfinderController::new(sim.platform(), ViewfinderConfig::default())
    }

    #[test]
    fn duplicate_opened_is_ignored() {
        let sim = SimFramework::default();
        sim.set_device_outcome(DeviceOutcome::Pending);
        let mut vf = controller(&sim);

        vf.on_create().unwrap();
        assert_eq!(vf.state(), ControllerState::DeviceOpening);

        assert!(sim.fire_device_opened());
        assert!(sim.fire_device_opened());
        vf.dispatch_pending();

        assert_eq!(vf.state(), ControllerState::Streaming);
        assert_eq!(sim.surface_requests().len(), 1);
        assert_eq!(sim.sessions().len(), 1);
        assert_eq!(sim.notices(), vec!["onOpened".to_string()]);
    }

    #[test]
    fn late_callbacks_leave_streaming_untouched() {
        let sim = SimFramework::default();
        let mut vf = controller(&sim);
        vf.on_create().unwrap();
        assert_eq!(
            vf.run_until_settled(Duration::from_secs(2)),
            ControllerState::Streaming
        );

        let executor = vf.executor();
        executor.post(Callback::SessionConfigureFailed);
        executor.post(Callback::SurfaceReady(Surface::new(
            crate::shared::Size::new(2, 2),
            None,
        )));
        assert_eq!(vf.dispatch_pending(), 2);

        assert_eq!(vf.state(), ControllerState::Streaming);
        assert_eq!(sim.sessions().len(), 1);
        assert_eq!(sim.repeating_requests().len(), 1);
    }

    #[test]
    fn device_callback_for_other_camera_is_ignored() {
        let sim = SimFramework::default();
        let mut vf = controller(&sim);
        vf.on_create().unwrap();
        vf.run_until_settled(Duration::from_secs(2));

        vf.executor().post(Callback::DeviceDisconnected {
            camera_id: "1".into(),
        });
        vf.dispatch_pending();
        assert_eq!(vf.state(), ControllerState::Streaming);
    }

    #[test]
    fn permission_result_with_foreign_code_is_ignored() {
        let sim = SimFramework::new(SimConfig::default().with_permission(false));
        let mut vf = controller(&sim);
        vf.on_create().unwrap();
        assert_eq!(vf.state(), ControllerState::AwaitingPermission);

        vf.on_request_permissions_result(7, true).unwrap();
        assert_eq!(vf.state(), ControllerState::AwaitingPermission);
        assert!(sim.opened_cameras().is_empty());
    }

    #[test]
    fn empty_camera_list_fails_without_opening() {
        let sim = SimFramework::new(SimConfig::default().with_camera_ids(Vec::<String>::new()));
        let mut vf = controller(&sim);

        assert!(matches!(vf.on_create(), Err(CameraError::NoCamera)));
        assert_eq!(vf.state(), ControllerState::Failed(Failure::NoCamera));
        assert!(sim.opened_cameras().is_empty());
    }

    #[test]
    fn state_names_render_for_logs() {
        assert_eq!(ControllerState::Streaming.to_string(), "Streaming");
        assert_eq!(
            ControllerState::Failed(Failure::Disconnected).to_string(),
            "Failed(device disconnected)"
        );
    }
}
