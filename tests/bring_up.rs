// This is free and unencumbered software released into the public domain.

#![cfg(feature = "sim")]

use camera_viewfinder::shared::{
    CAMERA_PERMISSION_REQUEST_CODE, CameraError, ControllerState, DeviceErrorCode, Failure,
    Frame, Permission, RequestTemplate, SessionType, Size, StreamEvent, ViewfinderConfig,
    ViewfinderController,
    drivers::sim::{DeviceOutcome, SessionOutcome, SimConfig, SimFramework, SurfaceOutcome},
};
use std::{
    sync::{Arc, mpsc::channel},
    time::Duration,
};

const SETTLE: Duration = Duration::from_secs(2);

fn start(sim: &SimFramework) -> ViewfinderController {
    let mut vf = ViewfinderController::new(sim.platform(), ViewfinderConfig::default());
    vf.on_create().expect("on_create");
    vf.run_until_settled(SETTLE);
    vf
}

#[test]
fn granted_permission_opens_without_prompting() {
    let sim = SimFramework::default();
    let vf = start(&sim);

    assert_eq!(sim.permission_checks(), 1);
    assert!(sim.permission_requests().is_empty());
    assert_eq!(sim.opened_cameras(), vec!["0".to_string()]);
    assert_eq!(vf.camera_id(), Some("0"));
}

#[test]
fn denied_permission_requests_once_with_fixed_code() {
    let sim = SimFramework::new(SimConfig::default().with_permission(false));
    let vf = start(&sim);

    assert_eq!(
        sim.permission_requests(),
        vec![(vec![Permission::Camera], CAMERA_PERMISSION_REQUEST_CODE)]
    );
    assert_eq!(CAMERA_PERMISSION_REQUEST_CODE, 101);
    assert_eq!(vf.state(), ControllerState::AwaitingPermission);
    assert!(sim.opened_cameras().is_empty());
}

#[test]
fn granting_permission_later_resumes_bring_up() {
    let sim = SimFramework::new(SimConfig::default().with_permission(false));
    let mut vf = start(&sim);

    sim.set_permission_granted(true);
    vf.on_request_permissions_result(CAMERA_PERMISSION_REQUEST_CODE, true)
        .unwrap();
    assert_eq!(vf.run_until_settled(SETTLE), ControllerState::Streaming);
    assert_eq!(sim.permission_requests().len(), 1);
}

#[test]
fn denying_permission_fails_the_controller() {
    let sim = SimFramework::new(SimConfig::default().with_permission(false));
    let mut vf = start(&sim);

    let result = vf.on_request_permissions_result(CAMERA_PERMISSION_REQUEST_CODE, false);
    assert!(matches!(result, Err(CameraError::PermissionDenied)));
    assert_eq!(
        vf.state(),
        ControllerState::Failed(Failure::PermissionDenied)
    );
    assert!(sim.opened_cameras().is_empty());
}

#[test]
fn ungated_permission_opens_anyway() {
    let sim = SimFramework::new(SimConfig::default().with_permission(false));
    let config = ViewfinderConfig::default().with_permission_gate(false);
    let mut vf = ViewfinderController::new(sim.platform(), config);
    vf.on_create().unwrap();

    assert_eq!(sim.permission_requests().len(), 1);
    assert_eq!(sim.opened_cameras(), vec!["0".to_string()]);
    assert_eq!(vf.run_until_settled(SETTLE), ControllerState::Streaming);
}

#[test]
fn opened_device_is_stored_and_surface_matches_display() {
    let display = Size::new(720, 1280);
    let sim = SimFramework::new(SimConfig::default().with_display(display));
    let vf = start(&sim);

    assert_eq!(vf.device().map(|d| d.id()), Some("0"));

    let requests = sim.surface_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].resolution, display);
    assert_eq!(requests[0].characteristics.camera_id, "0");
    assert_eq!(sim.notices(), vec!["onOpened".to_string()]);
}

#[test]
fn device_error_never_reaches_session_configuration() {
    let sim = SimFramework::default();
    sim.set_device_outcome(DeviceOutcome::Error(DeviceErrorCode::CameraInUse));
    let vf = start(&sim);

    assert_eq!(
        vf.state(),
        ControllerState::Failed(Failure::DeviceError(DeviceErrorCode::CameraInUse))
    );
    assert!(vf.device().is_none());
    assert!(sim.surface_requests().is_empty());
    assert!(sim.sessions().is_empty());
    assert_eq!(sim.notices(), vec!["onError".to_string()]);
}

#[test]
fn disconnect_during_open_surfaces_notice() {
    let sim = SimFramework::default();
    sim.set_device_outcome(DeviceOutcome::Disconnected);
    let vf = start(&sim);

    assert_eq!(vf.state(), ControllerState::Failed(Failure::Disconnected));
    assert!(sim.sessions().is_empty());
    assert_eq!(sim.notices(), vec!["onDisconnected".to_string()]);
}

#[test]
fn rejected_open_fails_without_notice() {
    let sim = SimFramework::default();
    sim.set_device_outcome(DeviceOutcome::Rejected);
    let mut vf = ViewfinderController::new(sim.platform(), ViewfinderConfig::default());

    assert!(vf.on_create().is_err());
    assert_eq!(vf.state(), ControllerState::Failed(Failure::DeviceOpen));
    // Only device callbacks raise notices; a refused open is logged.
    assert!(sim.notices().is_empty());
}

#[test]
fn device_error_while_configuring_fails_with_notice() {
    let sim = SimFramework::default();
    sim.set_device_outcome(DeviceOutcome::Pending);
    sim.set_session_outcome(SessionOutcome::Pending);
    let mut vf = ViewfinderController::new(sim.platform(), ViewfinderConfig::default());

    vf.on_create().unwrap();
    assert!(sim.fire_device_opened());
    vf.dispatch_pending();
    assert_eq!(vf.state(), ControllerState::SessionConfiguring);

    assert!(sim.fire_device_error(DeviceErrorCode::CameraService));
    vf.dispatch_pending();

    assert_eq!(
        vf.state(),
        ControllerState::Failed(Failure::DeviceError(DeviceErrorCode::CameraService))
    );
    assert!(vf.session().is_none());
    assert!(sim.repeating_requests().is_empty());
    assert_eq!(
        sim.notices(),
        vec!["onOpened".to_string(), "onError".to_string()]
    );
}

#[test]
fn session_has_exactly_one_output_for_the_surface() {
    let sim = SimFramework::default();
    let vf = start(&sim);

    let surface = vf.surface().expect("surface").clone();
    assert_eq!(sim.surfaces(), vec![surface.clone()]);

    let sessions = sim.sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].session_type, SessionType::Regular);
    assert_eq!(sessions[0].outputs, vec![surface.id()]);
}

#[test]
fn surface_failure_stops_before_session() {
    let sim = SimFramework::default();
    sim.set_surface_outcome(SurfaceOutcome::Failed);
    let vf = start(&sim);

    assert_eq!(
        vf.state(),
        ControllerState::Failed(Failure::SurfaceUnavailable)
    );
    assert!(vf.surface().is_none());
    assert!(sim.sessions().is_empty());
    // Only the device-open notice; surface failures are logged.
    assert_eq!(sim.notices(), vec!["onOpened".to_string()]);
}

#[test]
fn configured_session_gets_repeating_preview_request() {
    let sim = SimFramework::default();
    let vf = start(&sim);

    assert_eq!(vf.state(), ControllerState::Streaming);
    assert!(vf.session().is_some());
    assert!(vf.repeating_sequence().is_some());

    let requests = sim.repeating_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].template, RequestTemplate::Preview);
    assert_eq!(requests[0].targets, vec![vf.surface().unwrap().clone()]);
}

#[test]
fn configure_failure_is_logged_only() {
    let sim = SimFramework::default();
    sim.set_session_outcome(SessionOutcome::ConfigureFailed);
    let vf = start(&sim);

    assert_eq!(
        vf.state(),
        ControllerState::Failed(Failure::SessionConfigureFailed)
    );
    assert!(vf.session().is_none());
    assert!(sim.repeating_requests().is_empty());
    assert_eq!(sim.notices(), vec!["onOpened".to_string()]);
}

#[test]
fn repeating_request_failure_is_caught() {
    let sim = SimFramework::default();
    sim.fail_repeating_request(true);
    let vf = start(&sim);

    assert_eq!(
        vf.state(),
        ControllerState::Failed(Failure::RepeatingRequestFailed)
    );
    assert!(vf.repeating_sequence().is_none());
    assert!(sim.repeating_requests().is_empty());
    assert_eq!(sim.notices(), vec!["onOpened".to_string()]);
}

#[test]
fn request_creation_failure_is_caught() {
    let sim = SimFramework::default();
    sim.fail_request_creation(true);
    let vf = start(&sim);

    assert_eq!(
        vf.state(),
        ControllerState::Failed(Failure::RepeatingRequestFailed)
    );
    assert!(sim.repeating_requests().is_empty());
}

#[test]
fn reentry_after_streaming_does_not_resubmit() {
    let sim = SimFramework::default();
    let mut vf = start(&sim);
    assert_eq!(vf.state(), ControllerState::Streaming);

    assert!(matches!(
        vf.on_create(),
        Err(CameraError::AlreadyStarted(_))
    ));
    vf.run_until_settled(SETTLE);

    assert_eq!(vf.state(), ControllerState::Streaming);
    assert_eq!(sim.opened_cameras().len(), 1);
    assert_eq!(sim.sessions().len(), 1);
    assert_eq!(sim.repeating_requests().len(), 1);
}

#[test]
fn disconnect_while_streaming_fails_with_notice() {
    let sim = SimFramework::default();
    let mut vf = start(&sim);

    assert!(sim.fire_device_disconnected());
    vf.dispatch_pending();

    assert_eq!(vf.state(), ControllerState::Failed(Failure::Disconnected));
    assert_eq!(
        sim.notices(),
        vec!["onOpened".to_string(), "onDisconnected".to_string()]
    );
}

#[test]
fn streaming_delivers_frames_into_the_surface() {
    let display = Size::new(16, 8);
    let sim = SimFramework::new(
        SimConfig::default()
            .with_display(display)
            .with_fps(120.0)
            .with_frame_limit(3),
    );
    let (frames_tx, frames_rx) = channel();
    sim.add_sink(Arc::new(move |frame: Frame| {
        let _ = frames_tx.send(frame);
    }));

    let vf = start(&sim);
    assert_eq!(vf.state(), ControllerState::Streaming);

    let frame = frames_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("a preview frame");
    assert_eq!((frame.width, frame.height), (16, 8));
    assert_eq!(frame.data.len(), 16 * 8 * 4);
    assert_eq!(frame.stride, 16 * 4);
}

#[test]
fn frame_limit_counts_only_rendered_frames_with_a_slow_sink() {
    let sim = SimFramework::new(
        SimConfig::default()
            .with_display(Size::new(4, 4))
            .with_fps(240.0)
            .with_frame_limit(10),
    );
    let (frames_tx, frames_rx) = channel();
    sim.add_sink(Arc::new(move |frame: Frame| {
        std::thread::sleep(Duration::from_millis(30));
        let _ = frames_tx.send(frame);
    }));

    let vf = start(&sim);
    assert_eq!(vf.state(), ControllerState::Streaming);

    for n in 0..10 {
        frames_rx
            .recv_timeout(Duration::from_secs(5))
            .unwrap_or_else(|_| panic!("frame {n} of 10 never rendered"));
    }
    assert!(frames_rx.recv_timeout(Duration::from_millis(200)).is_err());

    let stats = sim.stream_stats();
    assert_eq!(stats.queued(), 10);
    assert!(stats.dropped() > 0);
    assert!(
        sim.events()
            .try_iter()
            .any(|event| matches!(event, StreamEvent::FrameDropped))
    );
}
