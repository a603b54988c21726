//! Sensor driver for XIMEA cameras.
//!
//! [XimeaSensor] opens a camera, pushes exposure, gain, region of interest,
//! trigger and data format settings to it, and reads frames, reopening the
//! camera when a read fails. The [calibration] module lets an operator tune
//! exposure and gain against a live histogram and pick the zone of
//! interest to stream.

pub use calibration::{ConsoleTuner, FixedSelection, NoTuning, Tuner, TuningSession, ZoiSelector};
pub use camera::*;
pub use config::SensorConfig;
pub use device::{Device, DeviceOpener, XiDevice, XiOpener};
pub use error::{Error, Result};
pub use frame::{Frame, FrameData};
pub use histogram::Histogram;
pub use param::{DataFormat, Param, ParamValue};
pub use roi::{Roi, Selection};
pub use sensor::{StopHandle, XimeaSensor};

pub use xiapi_sys::XI_RETURN;

pub mod calibration;
pub mod camera;
pub mod config;
pub mod device;
pub mod error;
pub mod frame;
pub mod histogram;
pub mod image;
pub mod param;
pub mod roi;
pub mod sensor;

#[cfg(test)]
mod tests {
    use crate::{open_device, SensorConfig, XimeaSensor};

    #[test]
    #[ignore = "needs a connected camera"]
    #[serial_test::file_serial]
    fn start_stop_acquisition() -> crate::Result<()> {
        let cam = open_device(None)?;
        let acq = cam.start_acquisition()?;
        acq.stop_acquisition()?;
        Ok(())
    }

    #[test]
    #[ignore = "needs a connected camera"]
    #[serial_test::file_serial]
    fn sensor_reads_configured_region() -> crate::Result<()> {
        let mut config = SensorConfig::default();
        config.roi.width = 256;
        config.roi.height = 128;
        let mut sensor = XimeaSensor::from_config(config);
        sensor.open()?;
        let frame = sensor.get_image()?;
        assert_eq!((frame.width(), frame.height()), (256, 128));
        sensor.close();
        Ok(())
    }
}
