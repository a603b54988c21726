//! The seam between [crate::XimeaSensor] and the camera SDK.

use log::{debug, warn};

use crate::camera::{open_device, AcquisitionBuffer, Camera};
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::param::{DataFormat, Param, ParamValue};

/// An opened camera, driven through generic property writes.
pub trait Device {
    fn set(&mut self, param: Param, value: ParamValue) -> Result<()>;
    fn get(&self, param: Param) -> Result<ParamValue>;
    /// synchronous (blocking) frame acquisition
    fn read(&mut self) -> Result<Frame>;
    fn is_opened(&self) -> bool;
    /// Stop acquiring and close the handle. Idempotent.
    fn release(&mut self);
}

/// Opens devices by index.
pub trait DeviceOpener {
    type Device: Device;

    fn open(&mut self, index: u32) -> Result<Self::Device>;
}

enum State {
    Idle(Camera),
    Acquiring(AcquisitionBuffer),
    Released,
}

/// A XIMEA camera opened through xiAPI.
///
/// Acquisition starts on the first read. Writing a property that cannot
/// change while acquiring stops acquisition; the next read restarts it.
pub struct XiDevice {
    state: State,
    format: DataFormat,
    timeout_ms: u32,
}

impl XiDevice {
    fn camera(&self) -> Result<&Camera> {
        match &self.state {
            State::Idle(cam) => Ok(cam),
            State::Acquiring(buf) => Ok(buf.camera()),
            State::Released => Err(Error::NotOpen),
        }
    }

    /// Make sure the device is idle and hand out the camera.
    fn idle_camera(&mut self) -> Result<&mut Camera> {
        if let State::Acquiring(_) = self.state {
            if let State::Acquiring(buf) = std::mem::replace(&mut self.state, State::Released) {
                debug!("stopping acquisition");
                self.state = State::Idle(buf.stop_acquisition()?);
            }
        }
        match &mut self.state {
            State::Idle(cam) => Ok(cam),
            _ => Err(Error::NotOpen),
        }
    }

    fn camera_mut(&mut self, param: Param) -> Result<&mut Camera> {
        if param.needs_idle() {
            return self.idle_camera();
        }
        match &mut self.state {
            State::Idle(cam) => Ok(cam),
            State::Acquiring(buf) => Ok(buf.camera_mut()),
            State::Released => Err(Error::NotOpen),
        }
    }

    fn acquisition(&mut self) -> Result<&AcquisitionBuffer> {
        if let State::Idle(_) = self.state {
            if let State::Idle(cam) = std::mem::replace(&mut self.state, State::Released) {
                debug!("starting acquisition");
                self.state = State::Acquiring(cam.start_acquisition()?);
            }
        }
        match &self.state {
            State::Acquiring(buf) => Ok(buf),
            _ => Err(Error::NotOpen),
        }
    }
}

impl Device for XiDevice {
    fn set(&mut self, param: Param, value: ParamValue) -> Result<()> {
        let cam = self.camera_mut(param)?;
        match param {
            Param::TriggerSource => cam.set_trg_source(value.as_i32())?,
            Param::GpiSelector => cam.set_gpi_selector(value.as_i32())?,
            Param::GpiMode => cam.set_gpi_mode(value.as_i32())?,
            Param::DataFormat => cam.set_image_data_format(value.as_i32())?,
            Param::OutputBitDepth => cam.set_output_data_bit_depth(value.as_i32())?,
            Param::OutputBitPacking => cam.set_output_data_packing(value.as_i32())?,
            Param::AutoExposureGain => cam.set_aeag(value.as_i32())?,
            Param::Width => cam.set_width(value.as_i32())?,
            Param::Height => cam.set_height(value.as_i32())?,
            Param::OffsetX => cam.set_offset_x(value.as_i32())?,
            Param::OffsetY => cam.set_offset_y(value.as_i32())?,
            Param::Exposure => cam.set_exposure(value.as_f32())?,
            Param::Gain => cam.set_gain(value.as_f32())?,
            Param::AcqTimingMode => cam.set_acq_timing_mode(value.as_i32())?,
            Param::FrameRate => cam.set_framerate(value.as_f32())?,
        }
        if param == Param::DataFormat {
            self.format = DataFormat::try_from(value.as_i32() as u32)?;
        }
        Ok(())
    }

    fn get(&self, param: Param) -> Result<ParamValue> {
        let cam = self.camera()?;
        let value: ParamValue = match param {
            Param::TriggerSource => cam.trg_source()?.into(),
            Param::GpiSelector => cam.gpi_selector()?.into(),
            Param::GpiMode => cam.gpi_mode()?.into(),
            Param::DataFormat => cam.image_data_format()?.into(),
            Param::OutputBitDepth => cam.output_data_bit_depth()?.into(),
            Param::OutputBitPacking => cam.output_data_packing()?.into(),
            Param::AutoExposureGain => cam.aeag()?.into(),
            Param::Width => cam.width()?.into(),
            Param::Height => cam.height()?.into(),
            Param::OffsetX => cam.offset_x()?.into(),
            Param::OffsetY => cam.offset_y()?.into(),
            Param::Exposure => cam.exposure()?.into(),
            Param::Gain => cam.gain()?.into(),
            Param::AcqTimingMode => cam.acq_timing_mode()?.into(),
            Param::FrameRate => cam.framerate()?.into(),
        };
        Ok(value)
    }

    fn read(&mut self) -> Result<Frame> {
        let format = self.format;
        let timeout = Some(self.timeout_ms);
        let buf = self.acquisition()?;
        let frame = if format.is_wide() {
            Frame::from_image_u16(&buf.next_image::<u16>(timeout)?, format)?
        } else {
            Frame::from_image_u8(&buf.next_image::<u8>(timeout)?, format)?
        };
        Ok(frame)
    }

    fn is_opened(&self) -> bool {
        !matches!(self.state, State::Released)
    }

    fn release(&mut self) {
        if let State::Acquiring(buf) = std::mem::replace(&mut self.state, State::Released) {
            // The camera closes on drop either way.
            if let Err(e) = buf.stop_acquisition() {
                warn!("failed to stop acquisition: {}", e);
            }
        }
    }
}

/// Opens [XiDevice]s.
#[derive(Debug, Clone)]
pub struct XiOpener {
    timeout_ms: u32,
}

impl XiOpener {
    pub fn new(timeout_ms: u32) -> Self {
        XiOpener { timeout_ms }
    }
}

impl DeviceOpener for XiOpener {
    type Device = XiDevice;

    fn open(&mut self, index: u32) -> Result<XiDevice> {
        let cam = open_device(Some(index))?;
        let format = cam
            .image_data_format()
            .and_then(|code| DataFormat::try_from(code as u32))
            .unwrap_or_else(|e| {
                debug!("device format not usable ({}), assuming mono8", e);
                DataFormat::Mono8
            });
        Ok(XiDevice {
            state: State::Idle(cam),
            format,
            timeout_ms: self.timeout_ms,
        })
    }
}
