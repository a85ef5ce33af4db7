// This is free and unencumbered software released into the public domain.

use super::{DeviceBridge, NdkCameraDevice, check};
use crate::shared::{
    CameraCharacteristics, CameraError, CameraManager, DeviceStateCallback, LensFacing,
};
use core::{ffi::CStr, mem::zeroed, ptr::null_mut};
use ndk_sys::{
    ACameraManager, ACameraManager_create, ACameraManager_delete,
    ACameraManager_deleteCameraIdList, ACameraManager_getCameraCharacteristics,
    ACameraManager_getCameraIdList, ACameraManager_openCamera, ACameraMetadata_const_entry,
    ACameraMetadata_free, ACameraMetadata_getConstEntry, acamera_metadata_tag, camera_status_t,
};
use scopeguard::defer;
use std::{ffi::CString, sync::Arc};

// ACAMERA_LENS_FACING values.
const LENS_FACING_FRONT: u8 = 0;
const LENS_FACING_BACK: u8 = 1;

#[derive(Debug)]
pub struct NdkCameraManager {
    pub(crate) handle: *mut ACameraManager,
}

// ACameraManager calls are thread-safe.
unsafe impl Send for NdkCameraManager {}

impl Drop for NdkCameraManager {
    fn drop(&mut self) {
        unsafe {
            ACameraManager_delete(self.handle);
        }
        self.handle = null_mut();
    }
}

impl Default for NdkCameraManager {
    fn default() -> Self {
        Self::new()
    }
}

impl NdkCameraManager {
    pub fn new() -> Self {
        Self {
            handle: unsafe { ACameraManager_create() },
        }
    }
}

fn c_camera_id(camera_id: &str) -> Result<CString, CameraError> {
    CString::new(camera_id).map_err(|e| CameraError::driver("encoding camera id", e))
}

impl CameraManager for NdkCameraManager {
    fn camera_ids(&self) -> Result<Vec<String>, CameraError> {
        let mut list_ptr = null_mut();
        let status = unsafe { ACameraManager_getCameraIdList(self.handle, &mut list_ptr) };
        check(status, "listing cameras")?;

        defer! {
            unsafe { ACameraManager_deleteCameraIdList(list_ptr); }
        }

        let list = unsafe { &*list_ptr };
        if list.numCameras < 1 {
            return Ok(Vec::new());
        }

        let ids = unsafe { core::slice::from_raw_parts(list.cameraIds, list.numCameras as usize) };
        Ok(ids
            .iter()
            .map(|p| unsafe { CStr::from_ptr(*p) }.to_string_lossy().into_owned())
            .collect())
    }

    fn characteristics(&self, camera_id: &str) -> Result<CameraCharacteristics, CameraError> {
        let id = c_camera_id(camera_id)?;
        let mut metadata = null_mut();
        let status = unsafe {
            ACameraManager_getCameraCharacteristics(self.handle, id.as_ptr(), &mut metadata)
        };
        check(status, "reading camera characteristics")?;

        defer! {
            unsafe { ACameraMetadata_free(metadata); }
        }

        let mut entry: ACameraMetadata_const_entry = unsafe { zeroed() };
        let lens_facing = unsafe {
            let status = ACameraMetadata_getConstEntry(
                metadata,
                acamera_metadata_tag::ACAMERA_LENS_FACING.0,
                &mut entry,
            );
            match status == camera_status_t::ACAMERA_OK && entry.count > 0 {
                true => match *entry.data.u8_ {
                    LENS_FACING_FRONT => LensFacing::Front,
                    LENS_FACING_BACK => LensFacing::Back,
                    _ => LensFacing::External,
                },
                false => LensFacing::External,
            }
        };

        let sensor_orientation = unsafe {
            let status = ACameraMetadata_getConstEntry(
                metadata,
                acamera_metadata_tag::ACAMERA_SENSOR_ORIENTATION.0,
                &mut entry,
            );
            match status == camera_status_t::ACAMERA_OK && entry.count > 0 {
                true => (*entry.data.i32_).max(0) as u32,
                false => 0,
            }
        };

        Ok(CameraCharacteristics {
            camera_id: camera_id.into(),
            lens_facing,
            sensor_orientation,
        })
    }

    fn open_camera(
        &self,
        camera_id: &str,
        callback: Arc<dyn DeviceStateCallback>,
    ) -> Result<(), CameraError> {
        let id = c_camera_id(camera_id)?;

        let mut bridge = DeviceBridge::new(camera_id, callback.clone());
        let mut handle = null_mut();
        let status = unsafe {
            ACameraManager_openCamera(
                self.handle,
                id.as_ptr(),
                bridge.state_callbacks_mut(),
                &mut handle,
            )
        };
        trace_event!(debug, camera_id, status = status.0, "ACameraManager_openCamera");
        check(status, "opening camera")?;

        // The NDK hands the device back synchronously.
        callback.on_opened(Box::new(NdkCameraDevice::new(camera_id, handle, bridge)));
        Ok(())
    }
}
