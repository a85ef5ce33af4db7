// This is free and unencumbered software released into the public domain.

/// Request code attached to the runtime camera permission request.
pub const CAMERA_PERMISSION_REQUEST_CODE: i32 = 101;

#[derive(Clone, Debug)]
pub struct ViewfinderConfig {
    pub permission_request_code: i32,
    /// Hold the device open until the camera permission is confirmed.
    /// When disabled the permission is requested and the camera is opened
    /// regardless of the outcome.
    pub gate_on_permission: bool,
    pub diagnostics: bool,
}

impl Default for ViewfinderConfig {
    fn default() -> Self {
        Self {
            permission_request_code: CAMERA_PERMISSION_REQUEST_CODE,
            gate_on_permission: true,
            diagnostics: false,
        }
    }
}

impl ViewfinderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_permission_request_code(mut self, code: i32) -> Self {
        self.permission_request_code = code;
        self
    }

    pub fn with_permission_gate(mut self, enabled: bool) -> Self {
        self.gate_on_permission = enabled;
        self
    }

    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }
}
