// This is free and unencumbered software released into the public domain.

//! CLI helpers (error reporting, verbosity handling).

use crate::shared::CameraError;
use asimov_module::SysexitsError::{self, *};
use clientele::StandardOptions;

pub fn handle_error(err: &CameraError, flags: &StandardOptions) -> SysexitsError {
    #[cfg(feature = "tracing")]
    {
        use asimov_module::tracing::{debug, error};

        error!(target: "camera_viewfinder", %err, "viewfinder command failed");

        if flags.debug || flags.verbose >= 2 {
            debug!(target: "camera_viewfinder", ?err, "detailed error");
        }
    }

    report_error(err, flags);
    map_error_to_sysexit(err)
}

pub fn info_user(flags: &StandardOptions, msg: &str) {
    if flags.debug || flags.verbose >= 1 {
        eprintln!("INFO: {msg}");
    }

    #[cfg(feature = "tracing")]
    asimov_module::tracing::info!(target: "camera_viewfinder", "{msg}");
}

pub fn warn_user(flags: &StandardOptions, msg: &str) {
    if flags.debug || flags.verbose >= 1 {
        eprintln!("WARN: {msg}");
    }

    #[cfg(feature = "tracing")]
    asimov_module::tracing::warn!(target: "camera_viewfinder", "{msg}");
}

fn report_error(err: &CameraError, flags: &StandardOptions) {
    use std::error::Error as _;
    use std::io::Write;

    let mut stderr = std::io::stderr();
    let _ = writeln!(stderr, "ERROR: {err}");

    if flags.debug || flags.verbose >= 2 {
        let mut source = err.source();
        while let Some(cause) = source {
            let _ = writeln!(stderr, "  Caused by: {}", cause);
            source = cause.source();
        }
    }
}

pub fn map_error_to_sysexit(err: &CameraError) -> SysexitsError {
    match err {
        CameraError::NoCamera => EX_UNAVAILABLE,
        CameraError::PermissionDenied => EX_NOPERM,
        CameraError::AlreadyStarted(_) => EX_SOFTWARE,
        CameraError::Disconnected(_) => EX_UNAVAILABLE,
        CameraError::Device { .. } => EX_UNAVAILABLE,
        CameraError::SurfaceUnavailable(_) => EX_UNAVAILABLE,
        CameraError::SessionConfigureFailed => EX_SOFTWARE,
        CameraError::Unsupported(_) => EX_UNAVAILABLE,
        CameraError::Closed => EX_IOERR,
        CameraError::DriverError { .. } => EX_SOFTWARE,
        CameraError::Other(_) => EX_SOFTWARE,
    }
}
