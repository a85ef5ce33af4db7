// This is free and unencumbered software released into the public domain.

#[cfg(not(feature = "std"))]
compile_error!("camera-viewfinder requires the 'std' feature");

use asimov_module::SysexitsError::{self, *};
use camera_viewfinder::{
    cli::{handle_error, info_user, warn_user},
    shared::{
        CameraError, ControllerState, DeviceErrorCode, Failure, Frame, Size, StreamEvent,
        ViewfinderConfig, ViewfinderController,
        drivers::sim::{DeviceOutcome, SessionOutcome, SimConfig, SimFramework, SurfaceOutcome},
    },
};
use clap::Parser;
use clientele::StandardOptions;
use dogma::Named;
use serde_json::json;
use std::{
    error::Error as StdError,
    io::{self, Write},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

/// Runs the viewfinder bring-up against the simulated camera framework.
#[derive(Debug, Parser)]
struct Options {
    #[clap(flatten)]
    flags: StandardOptions,

    /// Display size in pixels; the preview surface is requested at this size.
    #[arg(long, value_parser = parse_dimensions, default_value = "1080x2400")]
    display: (u32, u32),

    #[arg(long, value_enum, default_value = "granted")]
    permission: PermissionScenario,

    /// Open the camera without waiting for a confirmed permission.
    #[arg(long)]
    no_permission_gate: bool,

    /// Inject a failure at one bring-up step.
    #[arg(long, value_enum)]
    fail: Option<FailureScenario>,

    /// Stop after this many frames (0 runs until interrupted).
    #[arg(short = 'n', long, default_value = "0")]
    frames: usize,

    #[arg(short, long, value_parser = parse_frequency, default_value = "30")]
    frequency: f64,

    #[arg(
        value_name = "FORMAT",
        short = 'o',
        long = "output",
        value_enum,
        default_value = "text"
    )]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum PermissionScenario {
    Granted,
    /// Denied at startup, granted from the prompt.
    PromptGrant,
    /// Denied at startup and from the prompt.
    PromptDeny,
    /// Denied at startup, prompt never answered.
    Ignored,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum FailureScenario {
    DeviceError,
    Disconnect,
    Surface,
    Configure,
    Repeating,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Jsonl,
}

pub fn main() -> Result<SysexitsError, Box<dyn StdError>> {
    asimov_module::dotenv().ok();
    let args = asimov_module::args_os()?;
    let options = Options::parse_from(args);

    if options.flags.version {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return Ok(EX_OK);
    }

    if options.flags.license {
        print!("{}", include_str!("../../UNLICENSE"));
        return Ok(EX_OK);
    }

    #[cfg(feature = "tracing")]
    asimov_module::init_tracing_subscriber(&options.flags).expect("failed to initialize logging");

    let exit_code = match run_viewfinder(&options) {
        Ok(()) => EX_OK,
        Err(err) => handle_error(&err, &options.flags),
    };

    Ok(exit_code)
}

fn run_viewfinder(opts: &Options) -> Result<(), CameraError> {
    info_user(&opts.flags, "starting camera viewfinder");

    let quit = Arc::new(AtomicBool::new(false));
    {
        let quit2 = Arc::clone(&quit);
        ctrlc::set_handler(move || {
            quit2.store(true, Ordering::SeqCst);
        })
        .map_err(|e| CameraError::other(format!("{e}")))?;
    }

    let (width, height) = opts.display;
    let mut sim_config = SimConfig::default()
        .with_display(Size::new(width, height))
        .with_fps(opts.frequency)
        .with_permission(matches!(opts.permission, PermissionScenario::Granted));
    if opts.frames > 0 {
        sim_config = sim_config.with_frame_limit(opts.frames);
    }

    let sim = SimFramework::new(sim_config);
    match opts.fail {
        Some(FailureScenario::DeviceError) => {
            sim.set_device_outcome(DeviceOutcome::Error(DeviceErrorCode::CameraDevice))
        },
        Some(FailureScenario::Disconnect) => sim.set_device_outcome(DeviceOutcome::Disconnected),
        Some(FailureScenario::Surface) => sim.set_surface_outcome(SurfaceOutcome::Failed),
        Some(FailureScenario::Configure) => {
            sim.set_session_outcome(SessionOutcome::ConfigureFailed)
        },
        Some(FailureScenario::Repeating) => sim.fail_repeating_request(true),
        None => {},
    }

    let frames = Arc::new(AtomicUsize::new(0));
    {
        let frames = Arc::clone(&frames);
        let quit = Arc::clone(&quit);
        let output = opts.output;
        sim.add_sink(Arc::new(move |frame: Frame| {
            let n = frames.fetch_add(1, Ordering::SeqCst) + 1;
            if let Err(err) = print_frame(output, n, &frame) {
                if err.kind() == io::ErrorKind::BrokenPipe {
                    quit.store(true, Ordering::SeqCst);
                }
            }
        }));
    }

    let config = ViewfinderConfig::default()
        .with_permission_gate(!opts.no_permission_gate)
        .with_diagnostics(opts.flags.debug || opts.flags.verbose >= 3);
    let mut viewfinder = ViewfinderController::new(sim.platform(), config);
    info_user(
        &opts.flags,
        &format!("camera backend: {}", viewfinder.backend().name()),
    );

    viewfinder.on_create()?;
    let mut state = settle(&mut viewfinder, opts.output, ControllerState::Uninitialized);

    if state == ControllerState::AwaitingPermission {
        let code = viewfinder.config().permission_request_code;
        match opts.permission {
            PermissionScenario::PromptGrant => {
                info_user(&opts.flags, "permission granted from prompt");
                sim.set_permission_granted(true);
                viewfinder.on_request_permissions_result(code, true)?;
            },
            PermissionScenario::PromptDeny => {
                viewfinder.on_request_permissions_result(code, false)?;
            },
            PermissionScenario::Granted | PermissionScenario::Ignored => {
                warn_user(&opts.flags, "camera permission not granted; nothing to show");
                return Ok(());
            },
        }
        state = settle(&mut viewfinder, opts.output, state);
    }

    let mut dropped = 0usize;
    while state == ControllerState::Streaming && !quit.load(Ordering::SeqCst) {
        if opts.frames > 0 && frames.load(Ordering::SeqCst) >= opts.frames {
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
        for event in sim.events().try_iter() {
            match event {
                StreamEvent::FrameDropped => dropped += 1,
                StreamEvent::Error(err) => {
                    warn_user(&opts.flags, &format!("preview stream: {err}"))
                },
                StreamEvent::Started | StreamEvent::Stopped => {},
            }
        }
        viewfinder.dispatch_pending();
        state = report_state(&viewfinder, opts.output, state);
    }
    if dropped > 0 {
        warn_user(
            &opts.flags,
            &format!("dropped {dropped} frames; output could not keep up"),
        );
    }

    match state {
        ControllerState::Failed(failure) => Err(failure_to_error(&viewfinder, failure)),
        ControllerState::Streaming => {
            info_user(
                &opts.flags,
                &format!("rendered {} frames", frames.load(Ordering::SeqCst)),
            );
            Ok(())
        },
        other => Err(CameraError::other(format!("viewfinder stalled in {other}"))),
    }
}

fn settle(
    viewfinder: &mut ViewfinderController,
    output: OutputFormat,
    previous: ControllerState,
) -> ControllerState {
    viewfinder.run_until_settled(Duration::from_secs(5));
    report_state(viewfinder, output, previous)
}

fn report_state(
    viewfinder: &ViewfinderController,
    output: OutputFormat,
    previous: ControllerState,
) -> ControllerState {
    let state = viewfinder.state();
    if state != previous {
        let _ = match output {
            OutputFormat::Text => writeln!(io::stdout(), "state: {state}"),
            OutputFormat::Jsonl => writeln!(
                io::stdout(),
                "{}",
                json!({
                    "state": state.to_string(),
                    "camera": viewfinder.camera_id(),
                    "surface": viewfinder.surface().map(|s| s.id().0),
                })
            ),
        };
    }
    state
}

fn print_frame(output: OutputFormat, n: usize, frame: &Frame) -> io::Result<()> {
    let mut out = io::stdout().lock();
    match output {
        OutputFormat::Text => writeln!(
            out,
            "frame #{n}: {}x{} stride={} bytes={}",
            frame.width,
            frame.height,
            frame.stride,
            frame.data.len()
        ),
        OutputFormat::Jsonl => writeln!(
            out,
            "{}",
            json!({
                "frame": n,
                "width": frame.width,
                "height": frame.height,
                "timestamp_ns": frame.timestamp_ns,
            })
        ),
    }
}

fn failure_to_error(viewfinder: &ViewfinderController, failure: Failure) -> CameraError {
    let camera_id = viewfinder.camera_id().unwrap_or_default().to_string();
    match failure {
        Failure::PermissionDenied => CameraError::PermissionDenied,
        Failure::NoCamera => CameraError::NoCamera,
        Failure::Disconnected => CameraError::Disconnected(camera_id),
        Failure::DeviceError(code) => CameraError::Device { camera_id, code },
        Failure::SurfaceUnavailable => CameraError::surface_unavailable("viewfinder refused"),
        Failure::SessionConfigureFailed => CameraError::SessionConfigureFailed,
        Failure::DeviceOpen | Failure::RepeatingRequestFailed => {
            CameraError::other(failure.to_string())
        },
    }
}

fn parse_dimensions(s: &str) -> Result<(u32, u32), String> {
    let s = s.trim().replace('×', "x");
    let parts: Vec<&str> = s.split('x').map(|t| t.trim()).collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(format!("Invalid format '{s}'. Use WxH (e.g., 1080x2400)"));
    }

    let width: u32 = parts[0]
        .parse()
        .map_err(|_| format!("Invalid width: {}", parts[0]))?;
    let height: u32 = parts[1]
        .parse()
        .map_err(|_| format!("Invalid height: {}", parts[1]))?;

    if !(16..=7680).contains(&width) {
        return Err(format!("Width {width} is out of reasonable range (16-7680)"));
    }
    if !(16..=7680).contains(&height) {
        return Err(format!("Height {height} is out of reasonable range (16-7680)"));
    }

    Ok((width, height))
}

fn parse_frequency(s: &str) -> Result<f64, String> {
    let freq: f64 = s.parse().map_err(|_| format!("Invalid frequency: {s}"))?;

    if freq <= 0.0 {
        return Err("Frequency must be positive".to_string());
    }
    if freq > 240.0 {
        return Err(format!("Frequency {freq} Hz exceeds reasonable maximum (240 Hz)"));
    }
    if freq < 0.1 {
        return Err(format!("Frequency {freq} Hz is below reasonable minimum (0.1 Hz)"));
    }

    Ok(freq)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_display_dimensions() {
        assert_eq!(parse_dimensions("1080x2400"), Ok((1080, 2400)));
        assert_eq!(parse_dimensions(" 720 × 1280 "), Ok((720, 1280)));
        assert!(parse_dimensions("1080").is_err());
        assert!(parse_dimensions("8x8").is_err());
    }

    #[test]
    fn rejects_out_of_range_frequency() {
        assert!(parse_frequency("0").is_err());
        assert!(parse_frequency("500").is_err());
        assert_eq!(parse_frequency("30"), Ok(30.0));
    }
}
