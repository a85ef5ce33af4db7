// This is free and unencumbered software released into the public domain.

use crate::shared::{
    CameraError, DisplayMetrics, Size, Surface, SurfaceCallback, SurfaceHandle, SurfaceRequest,
    Viewfinder,
};
use ndk_sys::{
    ANativeWindow, ANativeWindow_acquire, ANativeWindow_getHeight, ANativeWindow_getWidth,
    ANativeWindow_release, ANativeWindow_setBuffersGeometry,
};
use std::{any::Any, sync::Arc};

#[derive(Debug)]
pub struct NativeWindow {
    pub(crate) handle: *mut ANativeWindow,
}

// ANativeWindow is reference counted and thread-safe.
unsafe impl Send for NativeWindow {}
unsafe impl Sync for NativeWindow {}

impl Drop for NativeWindow {
    fn drop(&mut self) {
        unsafe { ANativeWindow_release(self.handle) }
    }
}

impl NativeWindow {
    /// # Safety
    ///
    /// `handle` must point to a live `ANativeWindow`.
    pub unsafe fn acquire(handle: *mut ANativeWindow) -> Result<Self, CameraError> {
        if handle.is_null() {
            return Err(CameraError::surface_unavailable("null ANativeWindow"));
        }
        unsafe { ANativeWindow_acquire(handle) };
        Ok(Self { handle })
    }

    pub fn size(&self) -> Size {
        let (width, height) = unsafe {
            (
                ANativeWindow_getWidth(self.handle),
                ANativeWindow_getHeight(self.handle),
            )
        };
        Size::new(width.max(0) as u32, height.max(0) as u32)
    }
}

#[derive(Debug)]
pub struct NativeWindowSurface {
    pub window: Arc<NativeWindow>,
}

impl SurfaceHandle for NativeWindowSurface {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct NativeWindowDisplay {
    window: Arc<NativeWindow>,
}

impl NativeWindowDisplay {
    pub fn new(window: Arc<NativeWindow>) -> Self {
        Self { window }
    }
}

impl DisplayMetrics for NativeWindowDisplay {
    fn pixel_size(&self) -> Size {
        self.window.size()
    }
}

pub struct NativeWindowViewfinder {
    window: Arc<NativeWindow>,
}

impl NativeWindowViewfinder {
    pub fn new(window: Arc<NativeWindow>) -> Self {
        Self { window }
    }
}

impl Viewfinder for NativeWindowViewfinder {
    fn request_surface(&self, request: SurfaceRequest, callback: Arc<dyn SurfaceCallback>) {
        let Size { width, height } = request.resolution;
        // Format 0 keeps the window's current format.
        let rc = unsafe {
            ANativeWindow_setBuffersGeometry(self.window.handle, width as i32, height as i32, 0)
        };
        if rc != 0 {
            callback.on_failure(CameraError::surface_unavailable(format!(
                "ANativeWindow_setBuffersGeometry({width}x{height}) returned {rc}"
            )));
            return;
        }

        let handle = Arc::new(NativeWindowSurface {
            window: self.window.clone(),
        });
        callback.on_success(Surface::new(request.resolution, Some(handle)));
    }
}
