use std::ffi::CStr;
use std::mem::size_of;

use libc::{c_char, c_int};
use paste::paste;
use xiapi_sys::*;

use crate::error::{check, Result};
use crate::image::Image;

pub struct Camera {
    device_handle: HANDLE,
}

pub struct AcquisitionBuffer {
    camera: Camera,
}

/// Number of XIMEA devices currently connected.
pub fn number_devices() -> Result<u32> {
    let mut count: DWORD = 0;
    let err = unsafe { xiapi_sys::xiGetNumberDevices(&mut count) };
    check("xiGetNumberDevices", err)?;
    Ok(count)
}

pub fn open_device(dev_id: Option<u32>) -> Result<Camera> {
    let mut device_handle: HANDLE = std::ptr::null_mut();
    let dev_id = dev_id.unwrap_or(0);
    let err = unsafe { xiapi_sys::xiOpenDevice(dev_id, &mut device_handle) };
    check("xiOpenDevice", err)?;
    Ok(Camera { device_handle })
}

impl Drop for Camera {
    fn drop(&mut self) {
        unsafe {
            xiapi_sys::xiCloseDevice(self.device_handle);
        }
    }
}

/// Generates typed accessors for an xiAPI parameter.
macro_rules! param {
    ($name:ident, $prm:ident, int) => {
        paste! {
            #[doc = "Set the `" $name "` parameter."]
            pub fn [<set_ $name>](&mut self, value: i32) -> Result<()> {
                self.set_param_int($prm.as_ptr() as *const c_char, value)
            }

            #[doc = "Read the `" $name "` parameter."]
            pub fn $name(&self) -> Result<i32> {
                self.param_int($prm.as_ptr() as *const c_char)
            }
        }
    };
    ($name:ident, $prm:ident, float) => {
        paste! {
            #[doc = "Set the `" $name "` parameter."]
            pub fn [<set_ $name>](&mut self, value: f32) -> Result<()> {
                self.set_param_float($prm.as_ptr() as *const c_char, value)
            }

            #[doc = "Read the `" $name "` parameter."]
            pub fn $name(&self) -> Result<f32> {
                self.param_float($prm.as_ptr() as *const c_char)
            }
        }
    };
}

impl Camera {
    param!(exposure, XI_PRM_EXPOSURE, float);
    param!(gain, XI_PRM_GAIN, float);
    param!(width, XI_PRM_WIDTH, int);
    param!(height, XI_PRM_HEIGHT, int);
    param!(offset_x, XI_PRM_OFFSET_X, int);
    param!(offset_y, XI_PRM_OFFSET_Y, int);
    param!(image_data_format, XI_PRM_IMAGE_DATA_FORMAT, int);
    param!(trg_source, XI_PRM_TRG_SOURCE, int);
    param!(gpi_selector, XI_PRM_GPI_SELECTOR, int);
    param!(gpi_mode, XI_PRM_GPI_MODE, int);
    param!(output_data_bit_depth, XI_PRM_OUTPUT_DATA_BIT_DEPTH, int);
    param!(output_data_packing, XI_PRM_OUTPUT_DATA_PACKING, int);
    param!(aeag, XI_PRM_AEAG, int);
    param!(acq_timing_mode, XI_PRM_ACQ_TIMING_MODE, int);
    param!(framerate, XI_PRM_FRAMERATE, float);

    /// Set an integer parameter by its xiAPI name.
    ///
    /// `prm` must point to a nul-terminated parameter name.
    pub fn set_param_int(&mut self, prm: *const c_char, value: i32) -> Result<()> {
        let err = unsafe { xiapi_sys::xiSetParamInt(self.device_handle, prm, value as c_int) };
        check("xiSetParamInt", err)
    }

    /// Set a floating point parameter by its xiAPI name.
    pub fn set_param_float(&mut self, prm: *const c_char, value: f32) -> Result<()> {
        let err = unsafe { xiapi_sys::xiSetParamFloat(self.device_handle, prm, value) };
        check("xiSetParamFloat", err)
    }

    pub fn param_int(&self, prm: *const c_char) -> Result<i32> {
        let mut value: c_int = 0;
        let err = unsafe { xiapi_sys::xiGetParamInt(self.device_handle, prm, &mut value) };
        check("xiGetParamInt", err)?;
        Ok(value)
    }

    pub fn param_float(&self, prm: *const c_char) -> Result<f32> {
        let mut value: f32 = 0.0;
        let err = unsafe { xiapi_sys::xiGetParamFloat(self.device_handle, prm, &mut value) };
        check("xiGetParamFloat", err)?;
        Ok(value)
    }

    /// Read a string parameter such as the device name.
    pub fn param_string(&self, prm: *const c_char) -> Result<String> {
        let mut buf = [0 as c_char; 256];
        let err = unsafe {
            xiapi_sys::xiGetParamString(
                self.device_handle,
                prm,
                buf.as_mut_ptr() as *mut std::ffi::c_void,
                buf.len() as DWORD,
            )
        };
        check("xiGetParamString", err)?;
        // The SDK always nul-terminates inside the given size.
        let value = unsafe { CStr::from_ptr(buf.as_ptr()) };
        Ok(value.to_string_lossy().into_owned())
    }

    /// Model name of the device.
    pub fn device_name(&self) -> Result<String> {
        self.param_string(XI_PRM_DEVICE_NAME.as_ptr() as *const c_char)
    }

    pub fn start_acquisition(self) -> Result<AcquisitionBuffer> {
        let err = unsafe { xiapi_sys::xiStartAcquisition(self.device_handle) };
        check("xiStartAcquisition", err)?;
        Ok(AcquisitionBuffer { camera: self })
    }
}

impl AcquisitionBuffer {
    pub fn stop_acquisition(self) -> Result<Camera> {
        let err = unsafe { xiapi_sys::xiStopAcquisition(self.camera.device_handle) };
        check("xiStopAcquisition", err)?;
        Ok(self.camera)
    }

    /// Wait for the next image.
    ///
    /// # Arguments
    ///
    /// * `timeout`: Time to wait in milliseconds. Waits indefinitely if `None`.
    ///
    /// returns: Result<Image<T>> The image borrows the acquisition buffer and
    /// stays valid until the next call.
    pub fn next_image<T>(&self, timeout: Option<u32>) -> Result<Image<'_, T>> {
        let timeout = timeout.unwrap_or(u32::MAX);
        let mut xi_img: XI_IMG = unsafe { std::mem::zeroed() };
        xi_img.size = size_of::<XI_IMG>() as _;
        let err = unsafe { xiapi_sys::xiGetImage(self.camera.device_handle, timeout, &mut xi_img) };
        check("xiGetImage", err)?;
        Ok(Image {
            xi_img,
            pix_type: std::marker::PhantomData,
        })
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }
}
