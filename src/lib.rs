// This is free and unencumbered software released into the public domain.

//! Rear-camera viewfinder.
//!
//! Brings up a Camera2-style capture pipeline (permission, device, surface,
//! session, repeating preview request) and streams the preview into a
//! viewfinder surface. See [`shared::ViewfinderController`].

macro_rules! trace_event {
    ($level:ident, $($arg:tt)+) => {
        #[cfg(feature = "tracing")]
        asimov_module::tracing::$level!(target: "camera_viewfinder", $($arg)+);
    };
}

#[cfg(feature = "cli")]
pub mod cli;
pub mod shared;
