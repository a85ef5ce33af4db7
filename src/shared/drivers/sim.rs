// This is free and unencumbered software released into the public domain.

//! In-process camera framework.
//!
//! Implements every platform trait with scripted outcomes and records each
//! call the controller makes. Callbacks fire synchronously from inside the
//! triggering call; they still reach the controller through its main-context
//! queue, so ordering matches a real framework posting to the main looper.

use crate::shared::{
    CameraBackend, CameraCharacteristics, CameraDevice, CameraError, CameraManager,
    CaptureRequest, CaptureRequestBuilder, CaptureSession, DeviceErrorCode, DeviceStateCallback,
    Delivery, DisplayMetrics, Frame, FrameDispatcher, FrameQueue, FrameSink, LensFacing,
    Notifier, Permission, PermissionService, Platform, RequestTemplate, SequenceId,
    SessionConfiguration, SessionType, Size, StreamEvent, StreamStats, Surface, SurfaceCallback,
    SurfaceHandle, SurfaceId, SurfaceRequest, Viewfinder,
};
use bytes::Bytes;
use std::{
    any::Any,
    borrow::Cow,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
        mpsc::{Receiver, sync_channel},
    },
    thread::JoinHandle,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

#[derive(Clone, Debug)]
pub struct SimConfig {
    pub camera_ids: Vec<String>,
    pub display: Size,
    pub permission_granted: bool,
    pub fps: f64,
    /// Frames queued per repeating request; unbounded when `None`.
    pub frame_limit: Option<usize>,
    pub buffer_frames: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            camera_ids: vec!["0".into(), "1".into()],
            display: Size::new(1080, 2400),
            permission_granted: true,
            fps: 30.0,
            frame_limit: None,
            buffer_frames: 2,
        }
    }
}

impl SimConfig {
    pub fn with_display(mut self, display: Size) -> Self {
        self.display = display;
        self
    }

    pub fn with_camera_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.camera_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_permission(mut self, granted: bool) -> Self {
        self.permission_granted = granted;
        self
    }

    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_frame_limit(mut self, limit: usize) -> Self {
        self.frame_limit = Some(limit);
        self
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeviceOutcome {
    #[default]
    Opened,
    Disconnected,
    Error(DeviceErrorCode),
    /// Open succeeds but no callback fires until one is triggered.
    Pending,
    /// `open_camera` itself returns an error.
    Rejected,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SurfaceOutcome {
    #[default]
    Ready,
    Failed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionOutcome {
    #[default]
    Configured,
    ConfigureFailed,
    /// Configuration never completes.
    Pending,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedSession {
    pub camera_id: String,
    pub session_type: SessionType,
    pub outputs: Vec<SurfaceId>,
}

#[derive(Default)]
struct SimState {
    config: SimConfig,
    device_outcome: DeviceOutcome,
    surface_outcome: SurfaceOutcome,
    session_outcome: SessionOutcome,
    fail_request_creation: bool,
    fail_repeating: bool,
    permission_checks: usize,
    permission_requests: Vec<(Vec<Permission>, i32)>,
    opened: Vec<String>,
    device_callback: Option<(String, Arc<dyn DeviceStateCallback>)>,
    surface_requests: Vec<SurfaceRequest>,
    surfaces: Vec<Surface>,
    sessions: Vec<RecordedSession>,
    repeating_requests: Vec<CaptureRequest>,
    notices: Vec<String>,
}

type Shared = Arc<Mutex<SimState>>;

fn lock(state: &Shared) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(|p| p.into_inner())
}

/// Frame queue behind a simulated preview surface.
#[derive(Debug)]
pub struct SimSurface {
    queue: FrameQueue,
}

impl SurfaceHandle for SimSurface {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Test double for the whole camera stack.
///
/// Dropping it stops frame production and the dispatcher thread.
pub struct SimFramework {
    state: Shared,
    stop: Arc<AtomicBool>,
    dispatcher: FrameDispatcher,
    events_rx: Receiver<StreamEvent>,
    producers: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl core::fmt::Debug for SimFramework {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimFramework")
            .field("config", &lock(&self.state).config)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl dogma::Named for SimFramework {
    fn name(&self) -> Cow<'_, str> {
        "sim".into()
    }
}

impl Default for SimFramework {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl Drop for SimFramework {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        let producers = core::mem::take(
            &mut *self.producers.lock().unwrap_or_else(|p| p.into_inner()),
        );
        for producer in producers {
            let _ = producer.join();
        }
        self.dispatcher.stop();
    }
}

impl SimFramework {
    pub fn new(config: SimConfig) -> Self {
        let (events_tx, events_rx) = sync_channel(64);
        let dispatcher = FrameDispatcher::new(config.buffer_frames, events_tx);
        let state = SimState {
            config,
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            stop: Arc::new(AtomicBool::new(false)),
            dispatcher,
            events_rx,
            producers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Platform services backed by this framework.
    pub fn platform(&self) -> Platform {
        Platform {
            backend: CameraBackend::Sim,
            permissions: Box::new(SimPermissions {
                state: self.state.clone(),
            }),
            display: Box::new(SimDisplay {
                state: self.state.clone(),
            }),
            cameras: Box::new(SimCameraManager {
                state: self.state.clone(),
                streaming: self.streaming(),
            }),
            viewfinder: Box::new(SimViewfinder {
                state: self.state.clone(),
                queue: self.dispatcher.queue(),
            }),
            notifier: Box::new(SimNotifier {
                state: self.state.clone(),
            }),
        }
    }

    fn streaming(&self) -> Streaming {
        Streaming {
            stop: self.stop.clone(),
            producers: self.producers.clone(),
        }
    }

    pub fn add_sink(&self, sink: FrameSink) {
        self.dispatcher.add_sink(sink);
    }

    /// Renderer lifecycle and frame drops.
    pub fn events(&self) -> &Receiver<StreamEvent> {
        &self.events_rx
    }

    pub fn stream_stats(&self) -> StreamStats {
        self.dispatcher.stats()
    }

    pub fn set_permission_granted(&self, granted: bool) {
        lock(&self.state).config.permission_granted = granted;
    }

    pub fn set_device_outcome(&self, outcome: DeviceOutcome) {
        lock(&self.state).device_outcome = outcome;
    }

    pub fn set_surface_outcome(&self, outcome: SurfaceOutcome) {
        lock(&self.state).surface_outcome = outcome;
    }

    pub fn set_session_outcome(&self, outcome: SessionOutcome) {
        lock(&self.state).session_outcome = outcome;
    }

    pub fn fail_request_creation(&self, fail: bool) {
        lock(&self.state).fail_request_creation = fail;
    }

    pub fn fail_repeating_request(&self, fail: bool) {
        lock(&self.state).fail_repeating = fail;
    }

    /// Fires `onOpened` for a device left [`DeviceOutcome::Pending`].
    pub fn fire_device_opened(&self) -> bool {
        let Some((camera_id, callback)) = self.device_callback() else {
            return false;
        };
        callback.on_opened(Box::new(SimCameraDevice {
            camera_id,
            state: self.state.clone(),
            streaming: self.streaming(),
        }));
        true
    }

    /// Fires `onDisconnected` on the most recently opened device.
    pub fn fire_device_disconnected(&self) -> bool {
        let Some((camera_id, callback)) = self.device_callback() else {
            return false;
        };
        callback.on_disconnected(&camera_id);
        true
    }

    /// Fires `onError` on the most recently opened device.
    pub fn fire_device_error(&self, error: DeviceErrorCode) -> bool {
        let Some((camera_id, callback)) = self.device_callback() else {
            return false;
        };
        callback.on_error(&camera_id, error);
        true
    }

    fn device_callback(&self) -> Option<(String, Arc<dyn DeviceStateCallback>)> {
        lock(&self.state).device_callback.clone()
    }

    pub fn permission_checks(&self) -> usize {
        lock(&self.state).permission_checks
    }

    pub fn permission_requests(&self) -> Vec<(Vec<Permission>, i32)> {
        lock(&self.state).permission_requests.clone()
    }

    pub fn opened_cameras(&self) -> Vec<String> {
        lock(&self.state).opened.clone()
    }

    pub fn surface_requests(&self) -> Vec<SurfaceRequest> {
        lock(&self.state).surface_requests.clone()
    }

    pub fn surfaces(&self) -> Vec<Surface> {
        lock(&self.state).surfaces.clone()
    }

    pub fn sessions(&self) -> Vec<RecordedSession> {
        lock(&self.state).sessions.clone()
    }

    pub fn repeating_requests(&self) -> Vec<CaptureRequest> {
        lock(&self.state).repeating_requests.clone()
    }

    pub fn notices(&self) -> Vec<String> {
        lock(&self.state).notices.clone()
    }
}

#[derive(Clone)]
struct Streaming {
    stop: Arc<AtomicBool>,
    producers: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl Streaming {
    /// Feeds `queue` until `limit` frames were queued; dropped frames are
    /// retried on the next tick.
    fn spawn(&self, queue: FrameQueue, size: Size, fps: f64, limit: Option<usize>) {
        let stop = self.stop.clone();
        let interval = Duration::from_secs_f64(1.0 / fps.max(0.1));
        let pattern = test_pattern(size);

        let join = std::thread::spawn(move || {
            let mut queued = 0usize;
            while !stop.load(Ordering::Relaxed) && limit.is_none_or(|n| queued < n) {
                let frame = Frame::new_bgra(pattern.clone(), size.width, size.height, now_ns());
                match queue.push(frame) {
                    Delivery::Queued => queued += 1,
                    Delivery::Dropped => {},
                    Delivery::Closed => break,
                }
                std::thread::sleep(interval);
            }
        });

        self.producers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(join);
    }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Horizontal BGRA gradient.
fn test_pattern(size: Size) -> Bytes {
    let (w, h) = (size.width as usize, size.height as usize);
    let mut data = Vec::with_capacity(w * h * 4);
    for _ in 0..h {
        for x in 0..w {
            let v = if w > 1 { (x * 255 / (w - 1)) as u8 } else { 0 };
            data.extend_from_slice(&[v, v, v, 0xff]);
        }
    }
    Bytes::from(data)
}

struct SimPermissions {
    state: Shared,
}

impl PermissionService for SimPermissions {
    fn check(&self, permission: Permission) -> bool {
        let mut state = lock(&self.state);
        state.permission_checks += 1;
        permission == Permission::Camera && state.config.permission_granted
    }

    fn request(&self, permissions: &[Permission], request_code: i32) {
        lock(&self.state)
            .permission_requests
            .push((permissions.to_vec(), request_code));
    }
}

struct SimDisplay {
    state: Shared,
}

impl DisplayMetrics for SimDisplay {
    fn pixel_size(&self) -> Size {
        lock(&self.state).config.display
    }
}

struct SimCameraManager {
    state: Shared,
    streaming: Streaming,
}

impl CameraManager for SimCameraManager {
    fn camera_ids(&self) -> Result<Vec<String>, CameraError> {
        Ok(lock(&self.state).config.camera_ids.clone())
    }

    fn characteristics(&self, camera_id: &str) -> Result<CameraCharacteristics, CameraError> {
        let state = lock(&self.state);
        let index = state
            .config
            .camera_ids
            .iter()
            .position(|id| id == camera_id)
            .ok_or(CameraError::NoCamera)?;
        Ok(CameraCharacteristics {
            camera_id: camera_id.into(),
            lens_facing: if index == 0 {
                LensFacing::Back
            } else {
                LensFacing::Front
            },
            sensor_orientation: if index == 0 { 90 } else { 270 },
        })
    }

    fn open_camera(
        &self,
        camera_id: &str,
        callback: Arc<dyn DeviceStateCallback>,
    ) -> Result<(), CameraError> {
        let outcome = {
            let mut state = lock(&self.state);
            if !state.config.camera_ids.iter().any(|id| id == camera_id) {
                return Err(CameraError::NoCamera);
            }
            if state.device_outcome == DeviceOutcome::Rejected {
                return Err(CameraError::other(format!(
                    "camera {camera_id} refused to open"
                )));
            }
            state.opened.push(camera_id.into());
            state.device_callback = Some((camera_id.into(), callback.clone()));
            state.device_outcome
        };

        match outcome {
            DeviceOutcome::Opened => callback.on_opened(Box::new(SimCameraDevice {
                camera_id: camera_id.into(),
                state: self.state.clone(),
                streaming: self.streaming.clone(),
            })),
            DeviceOutcome::Disconnected => callback.on_disconnected(camera_id),
            DeviceOutcome::Error(code) => callback.on_error(camera_id, code),
            DeviceOutcome::Pending | DeviceOutcome::Rejected => {},
        }
        Ok(())
    }
}

struct SimCameraDevice {
    camera_id: String,
    state: Shared,
    streaming: Streaming,
}

impl core::fmt::Debug for SimCameraDevice {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimCameraDevice")
            .field("camera_id", &self.camera_id)
            .finish_non_exhaustive()
    }
}

impl CameraDevice for SimCameraDevice {
    fn id(&self) -> &str {
        &self.camera_id
    }

    fn create_capture_session(&mut self, config: SessionConfiguration) -> Result<(), CameraError> {
        let outcome = {
            let mut state = lock(&self.state);
            state.sessions.push(RecordedSession {
                camera_id: self.camera_id.clone(),
                session_type: config.session_type,
                outputs: config.outputs.iter().map(|o| o.surface.id()).collect(),
            });
            state.session_outcome
        };

        match outcome {
            SessionOutcome::Configured => config.callback.on_configured(Box::new(SimCaptureSession {
                state: self.state.clone(),
                streaming: self.streaming.clone(),
                outputs: config.outputs.into_iter().map(|o| o.surface).collect(),
                next_sequence: 1,
            })),
            SessionOutcome::ConfigureFailed => config.callback.on_configure_failed(),
            SessionOutcome::Pending => {},
        }
        Ok(())
    }

    fn create_capture_request(
        &self,
        template: RequestTemplate,
    ) -> Result<CaptureRequestBuilder, CameraError> {
        if lock(&self.state).fail_request_creation {
            return Err(CameraError::other("capture request creation failed"));
        }
        Ok(CaptureRequestBuilder::new(template))
    }
}

struct SimCaptureSession {
    state: Shared,
    streaming: Streaming,
    outputs: Vec<Surface>,
    next_sequence: i32,
}

impl core::fmt::Debug for SimCaptureSession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimCaptureSession")
            .field("outputs", &self.outputs)
            .field("next_sequence", &self.next_sequence)
            .finish_non_exhaustive()
    }
}

impl CaptureSession for SimCaptureSession {
    fn set_repeating_request(
        &mut self,
        request: &CaptureRequest,
    ) -> Result<SequenceId, CameraError> {
        let (fps, limit) = {
            let mut state = lock(&self.state);
            if state.fail_repeating {
                return Err(CameraError::other("repeating request rejected"));
            }
            if let Some(target) = request.targets.iter().find(|t| !self.outputs.contains(t)) {
                return Err(CameraError::other(format!(
                    "{} is not an output of this session",
                    target.id()
                )));
            }
            state.repeating_requests.push(request.clone());
            (state.config.fps, state.config.frame_limit)
        };

        for target in &request.targets {
            if let Some(surface) = target.handle_as::<SimSurface>() {
                self.streaming
                    .spawn(surface.queue.clone(), target.size(), fps, limit);
            }
        }

        let sequence = SequenceId(self.next_sequence);
        self.next_sequence += 1;
        Ok(sequence)
    }
}

struct SimViewfinder {
    state: Shared,
    queue: FrameQueue,
}

impl Viewfinder for SimViewfinder {
    fn request_surface(&self, request: SurfaceRequest, callback: Arc<dyn SurfaceCallback>) {
        let outcome = {
            let mut state = lock(&self.state);
            state.surface_requests.push(request.clone());
            state.surface_outcome
        };

        match outcome {
            SurfaceOutcome::Ready => {
                let handle = Arc::new(SimSurface {
                    queue: self.queue.clone(),
                });
                let surface = Surface::new(request.resolution, Some(handle));
                lock(&self.state).surfaces.push(surface.clone());
                callback.on_success(surface);
            },
            SurfaceOutcome::Failed => callback.on_failure(CameraError::surface_unavailable(
                "viewfinder detached",
            )),
        }
    }
}

struct SimNotifier {
    state: Shared,
}

impl Notifier for SimNotifier {
    fn notify(&self, message: &str) {
        trace_event!(debug, notice = message, "sim notice");
        lock(&self.state).notices.push(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::{Callback, DeviceCallbacks, MainExecutor, SurfaceCallbacks};

    #[test]
    fn test_pattern_is_bgra_sized() {
        let data = test_pattern(Size::new(3, 2));
        assert_eq!(data.len(), 3 * 2 * 4);
        assert_eq!(&data[..4], &[0, 0, 0, 0xff]);
        assert_eq!(&data[8..12], &[255, 255, 255, 0xff]);
    }

    #[test]
    fn open_records_and_posts_opened() {
        let sim = SimFramework::default();
        let platform = sim.platform();
        let (executor, rx) = MainExecutor::channel();

        platform
            .cameras
            .open_camera("0", Arc::new(DeviceCallbacks::new(executor)))
            .unwrap();

        assert_eq!(sim.opened_cameras(), vec!["0".to_string()]);
        match rx.try_recv() {
            Ok(Callback::DeviceOpened(device)) => assert_eq!(device.id(), "0"),
            other => panic!("unexpected callback: {other:?}"),
        }
    }

    #[test]
    fn unknown_camera_is_rejected() {
        let sim = SimFramework::default();
        let (executor, _rx) = MainExecutor::channel();
        let result = sim
            .platform()
            .cameras
            .open_camera("9", Arc::new(DeviceCallbacks::new(executor)));
        assert!(matches!(result, Err(CameraError::NoCamera)));
        assert!(sim.opened_cameras().is_empty());
    }

    #[test]
    fn failed_surface_reports_failure() {
        let sim = SimFramework::default();
        sim.set_surface_outcome(SurfaceOutcome::Failed);
        let platform = sim.platform();
        let (executor, rx) = MainExecutor::channel();

        let request = SurfaceRequest {
            resolution: Size::new(4, 4),
            characteristics: platform.cameras.characteristics("0").unwrap(),
        };
        platform
            .viewfinder
            .request_surface(request, Arc::new(SurfaceCallbacks::new(executor)));

        assert!(matches!(rx.try_recv(), Ok(Callback::SurfaceFailed(_))));
        assert!(sim.surfaces().is_empty());
        assert_eq!(sim.surface_requests().len(), 1);
    }

    #[test]
    fn first_camera_faces_back() {
        let sim = SimFramework::default();
        let chars = sim.platform().cameras.characteristics("0").unwrap();
        assert_eq!(chars.lens_facing, LensFacing::Back);
        assert_eq!(chars.sensor_orientation, 90);
    }
}
