use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::calibration::{Tuner, TuningSession, ZoiSelector};
use crate::config::SensorConfig;
use crate::device::{Device, DeviceOpener, XiOpener};
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::param::{self, Param, ParamValue};
use crate::roi::Roi;

/// Requests a running acquisition to stop, e.g. from a Ctrl-C handler.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// A XIMEA camera with its acquisition settings.
///
/// The settings live in a [SensorConfig] that is pushed to the device each
/// time it is opened, so a reopened device streams the same way as before.
pub struct XimeaSensor<O: DeviceOpener = XiOpener> {
    opener: O,
    config: SensorConfig,
    device: Option<O::Device>,
    stop: StopHandle,
}

impl XimeaSensor<XiOpener> {
    /// A sensor backed by xiAPI.
    pub fn from_config(config: SensorConfig) -> Self {
        let opener = XiOpener::new(config.timeout_ms);
        XimeaSensor::new(opener, config)
    }
}

impl<O: DeviceOpener> XimeaSensor<O> {
    /// Create the sensor. The device is not opened yet.
    pub fn new(opener: O, config: SensorConfig) -> Self {
        XimeaSensor {
            opener,
            config,
            device: None,
            stop: StopHandle::default(),
        }
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    pub fn roi(&self) -> Roi {
        self.config.roi
    }

    pub fn exposure(&self) -> f32 {
        self.config.exposure_us
    }

    pub fn gain(&self) -> f32 {
        self.config.gain_db
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn is_open(&self) -> bool {
        self.device.as_ref().map_or(false, |d| d.is_opened())
    }

    /// Property writes performed when the device is opened, in order.
    ///
    /// Fails if a region value does not fit a device property.
    pub fn startup_params(&self) -> Result<Vec<(Param, ParamValue)>> {
        let cfg = &self.config;
        let mut params: Vec<(Param, ParamValue)> = Vec::new();
        if cfg.external_trigger {
            params.push((Param::TriggerSource, param::TRIGGER_EDGE_RISING.into()));
            params.push((Param::GpiSelector, param::GPI_PORT_1.into()));
            params.push((Param::GpiMode, param::GPI_MODE_TRIGGER.into()));
        }
        params.push((Param::DataFormat, ParamValue::Int(cfg.data_format.code() as i32)));
        if cfg.data_format.is_wide() {
            // 10-bit packed transport keeps the frame rate up
            params.push((Param::OutputBitDepth, param::BIT_DEPTH_10.into()));
            params.push((Param::OutputBitPacking, param::SWITCH_ON.into()));
        }
        params.push((Param::AutoExposureGain, param::SWITCH_OFF.into()));
        params.push((Param::Width, ParamValue::try_from(cfg.roi.width)?));
        params.push((Param::Height, ParamValue::try_from(cfg.roi.height)?));
        params.push((Param::OffsetY, ParamValue::try_from(cfg.roi.offset_y)?));
        params.push((Param::OffsetX, ParamValue::try_from(cfg.roi.offset_x)?));
        params.push((Param::Exposure, cfg.exposure_us.into()));
        params.push((Param::Gain, cfg.gain_db.into()));
        if let Some(fps) = cfg.framerate {
            params.push((Param::AcqTimingMode, param::TIMING_FRAME_RATE_LIMIT.into()));
            params.push((Param::FrameRate, fps.into()));
        }
        Ok(params)
    }

    /// Open the device and push the current settings to it.
    ///
    /// A property the device refuses is logged and skipped. An already
    /// open device is closed first.
    pub fn open(&mut self) -> Result<()> {
        if self.device.is_some() {
            self.close();
        }
        let params = self.startup_params()?;
        info!("opening XIMEA device {}", self.config.device);
        let mut device = self.opener.open(self.config.device)?;
        for (param, value) in params {
            debug!("{} = {}", param, value);
            if let Err(e) = device.set(param, value) {
                warn!("could not set {} to {}: {}", param, value, e);
            }
        }
        // first frame primes the acquisition
        if let Err(e) = device.read() {
            warn!("warm-up read failed: {}", e);
        }
        self.device = Some(device);
        Ok(())
    }

    /// Read one frame.
    ///
    /// A failed read closes and reopens the device, then reads again, up
    /// to [SensorConfig::reopen_attempts] times. After a stop request the
    /// device is closed and [Error::Interrupted] returned instead.
    pub fn get_image(&mut self) -> Result<Frame> {
        let mut attempts = 0;
        loop {
            if self.stop.is_requested() {
                info!("stop requested, closing camera ...");
                self.close();
                return Err(Error::Interrupted);
            }
            let result = match self.device.as_mut() {
                Some(device) => device.read(),
                None => Err(Error::NotOpen),
            };
            let err = match result {
                Ok(frame) => return Ok(frame),
                Err(e) => e,
            };
            // a stop may arrive while the read is blocked
            if self.stop.is_requested() {
                info!("stop requested during read ({}), closing camera ...", err);
                self.close();
                return Err(Error::Interrupted);
            }
            if attempts >= self.config.reopen_attempts {
                return Err(Error::ReadFailed {
                    attempts,
                    source: Box::new(err),
                });
            }
            attempts += 1;
            warn!("frame read failed ({}), resetting the camera", err);
            self.close();
            if let Err(e) = self.open() {
                return Err(Error::ReadFailed {
                    attempts,
                    source: Box::new(e),
                });
            }
        }
    }

    fn write(&mut self, param: Param, value: ParamValue) -> Result<()> {
        let device = self.device.as_mut().ok_or(Error::NotOpen)?;
        device.set(param, value)
    }

    pub fn set_exposure(&mut self, exposure_us: f32) -> Result<()> {
        self.write(Param::Exposure, exposure_us.into())?;
        self.config.exposure_us = exposure_us;
        Ok(())
    }

    pub fn set_gain(&mut self, gain_db: f32) -> Result<()> {
        self.write(Param::Gain, gain_db.into())?;
        self.config.gain_db = gain_db;
        Ok(())
    }

    pub fn set_width(&mut self, width: u32) -> Result<()> {
        self.write(Param::Width, ParamValue::try_from(width)?)?;
        self.config.roi.width = width;
        Ok(())
    }

    pub fn set_height(&mut self, height: u32) -> Result<()> {
        self.write(Param::Height, ParamValue::try_from(height)?)?;
        self.config.roi.height = height;
        Ok(())
    }

    pub fn set_offset_x(&mut self, offset_x: u32) -> Result<()> {
        self.write(Param::OffsetX, ParamValue::try_from(offset_x)?)?;
        self.config.roi.offset_x = offset_x;
        Ok(())
    }

    pub fn set_offset_y(&mut self, offset_y: u32) -> Result<()> {
        self.write(Param::OffsetY, ParamValue::try_from(offset_y)?)?;
        self.config.roi.offset_y = offset_y;
        Ok(())
    }

    /// Release the device. Closing a closed sensor does nothing.
    pub fn close(&mut self) {
        info!("closing camera...");
        match self.device.take() {
            Some(mut device) if device.is_opened() => {
                device.release();
                info!("cam closed");
            }
            _ => info!("cam already closed"),
        }
    }

    /// Stream the full sensor again.
    pub fn reset_zoi(&mut self) -> Result<()> {
        let full = Roi::full_sensor();
        self.set_offset_y(full.offset_y)?;
        self.set_offset_x(full.offset_x)?;
        self.set_height(full.height)?;
        self.set_width(full.width)?;
        Ok(())
    }

    /// Let `selector` pick a zone of interest on a fresh frame and stream
    /// only that zone.
    ///
    /// The selection is cut to the streamed region first. Without a
    /// selection, or when nothing of it lies inside the region, the current
    /// region is kept (after alignment).
    pub fn set_zoi<S: ZoiSelector + ?Sized>(&mut self, selector: &mut S) -> Result<Roi> {
        let frame = self.get_image()?;
        let current = self.config.roi;
        let selection = selector
            .select(&frame)
            .and_then(|sel| sel.clamp_to(current.width, current.height));
        let (xmin, xmax, ymin, ymax) = match selection {
            Some(selection) => selection.to_sensor(&current)?,
            None => {
                info!("no zone selected, keeping the current region");
                current.bounds()
            }
        };
        let roi = Roi::aligned(xmin, xmax, ymin, ymax)?;
        self.set_height(roi.height)?;
        self.set_width(roi.width)?;
        self.set_offset_y(roi.offset_y)?;
        self.set_offset_x(roi.offset_x)?;
        info!(
            "zone of interest {}x{} at ({}, {})",
            roi.width, roi.height, roi.offset_x, roi.offset_y
        );
        Ok(roi)
    }

    /// Interactive setup: tune exposure and gain, pick the zone of
    /// interest, then reopen the device with the chosen settings.
    pub fn calibrate<T, S>(&mut self, tuner: &mut T, selector: &mut S) -> Result<&SensorConfig>
    where
        T: Tuner + ?Sized,
        S: ZoiSelector + ?Sized,
    {
        if !self.is_open() {
            self.open()?;
        }
        tuner.tune(&mut TuningSession::new(self))?;
        self.set_zoi(selector)?;
        self.close();
        self.open()?;
        info!(
            "calibrated: exposure {} us, gain {} dB",
            self.config.exposure_us, self.config.gain_db
        );
        Ok(&self.config)
    }
}

impl<O: DeviceOpener> Drop for XimeaSensor<O> {
    fn drop(&mut self) {
        if let Some(device) = self.device.as_mut() {
            device.release();
        }
    }
}

impl<O: DeviceOpener> fmt::Display for XimeaSensor<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cfg = &self.config;
        writeln!(f, " Exposure: {}", cfg.exposure_us)?;
        match cfg.framerate {
            Some(fps) => writeln!(f, " FPS: {}", fps)?,
            None => writeln!(f, " FPS: free running")?,
        }
        writeln!(f, " Numdevice: {}", cfg.device)?;
        writeln!(f, " Width: {}", cfg.roi.width)?;
        writeln!(f, " Height: {}", cfg.roi.height)?;
        writeln!(f, " X offset: {}", cfg.roi.offset_x)?;
        write!(f, " Y offset: {}", cfg.roi.offset_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::FixedSelection;
    use crate::device::mock::{Event, MockOpener, FRAME_HEIGHT, FRAME_WIDTH};
    use crate::param::DataFormat;
    use crate::roi::Selection;

    fn sensor(config: SensorConfig) -> (XimeaSensor<MockOpener>, MockOpener) {
        let opener = MockOpener::default();
        (XimeaSensor::new(opener.clone(), config), opener)
    }

    fn names(params: &[(Param, ParamValue)]) -> Vec<Param> {
        params.iter().map(|(p, _)| *p).collect()
    }

    #[test]
    fn open_pushes_settings_in_order() {
        let (mut s, opener) = sensor(SensorConfig::default());
        s.open().unwrap();
        assert!(s.is_open());
        let script = opener.script.borrow();
        assert_eq!(script.events[0], Event::Open(0));
        assert_eq!(
            names(&script.sets()),
            vec![
                Param::DataFormat,
                Param::AutoExposureGain,
                Param::Width,
                Param::Height,
                Param::OffsetY,
                Param::OffsetX,
                Param::Exposure,
                Param::Gain,
            ]
        );
        assert_eq!(script.sets()[6].1, ParamValue::Float(10_000.0));
        // warm-up read
        assert_eq!(script.events.last(), Some(&Event::Read));
    }

    #[test]
    fn external_trigger_and_ten_bit_settings() {
        let cfg = SensorConfig {
            device: 2,
            external_trigger: true,
            data_format: DataFormat::Raw16,
            framerate: Some(30.0),
            ..Default::default()
        };
        let (s, _) = sensor(cfg);
        let params = s.startup_params().unwrap();
        assert_eq!(
            names(&params)[..6],
            [
                Param::TriggerSource,
                Param::GpiSelector,
                Param::GpiMode,
                Param::DataFormat,
                Param::OutputBitDepth,
                Param::OutputBitPacking,
            ]
        );
        assert_eq!(params[3].1, ParamValue::Int(6));
        assert_eq!(params[4].1, ParamValue::Int(10));
        let tail = &params[params.len() - 2..];
        assert_eq!(tail[0].0, Param::AcqTimingMode);
        assert_eq!(tail[1], (Param::FrameRate, ParamValue::Float(30.0)));
    }

    #[test]
    fn rejected_property_does_not_abort_open() {
        let (mut s, opener) = sensor(SensorConfig::default());
        opener.script.borrow_mut().rejected.push(Param::Width);
        s.open().unwrap();
        assert!(s.is_open());
        assert!(names(&opener.script.borrow().sets()).contains(&Param::Gain));
    }

    #[test]
    fn open_failure_is_reported() {
        let (mut s, opener) = sensor(SensorConfig::default());
        opener.script.borrow_mut().opens.push_back(false);
        assert!(matches!(s.open(), Err(Error::Xi { .. })));
        assert!(!s.is_open());
    }

    #[test]
    fn failed_read_reopens_once() {
        let (mut s, opener) = sensor(SensorConfig::default());
        s.open().unwrap();
        opener.script.borrow_mut().reads.push_back(false);
        let frame = s.get_image().unwrap();
        assert_eq!(frame.width(), FRAME_WIDTH);
        let script = opener.script.borrow();
        assert_eq!(script.count(&Event::Open(0)), 2);
        assert_eq!(script.count(&Event::Release), 1);
    }

    #[test]
    fn read_gives_up_after_reopen_attempts() {
        let (mut s, opener) = sensor(SensorConfig::default());
        s.open().unwrap();
        // fails: read, warm-up after reopen, read after reopen
        opener
            .script
            .borrow_mut()
            .reads
            .extend([false, false, false]);
        match s.get_image() {
            Err(Error::ReadFailed { attempts, .. }) => assert_eq!(attempts, 1),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn failed_reopen_is_reported() {
        let (mut s, opener) = sensor(SensorConfig::default());
        s.open().unwrap();
        {
            let mut script = opener.script.borrow_mut();
            script.reads.push_back(false);
            script.opens.push_back(false);
        }
        match s.get_image() {
            Err(Error::ReadFailed { attempts, source }) => {
                assert_eq!(attempts, 1);
                assert!(matches!(
                    *source,
                    Error::Xi {
                        call: "xiOpenDevice",
                        ..
                    }
                ));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(!s.is_open());
        assert_eq!(opener.script.borrow().count(&Event::Open(0)), 2);
    }

    #[test]
    fn stop_during_failed_read_skips_reopen() {
        for reopen_attempts in [0, 1, 3] {
            let cfg = SensorConfig {
                reopen_attempts,
                ..Default::default()
            };
            let (mut s, opener) = sensor(cfg);
            s.open().unwrap();
            {
                let mut script = opener.script.borrow_mut();
                script.reads.push_back(false);
                script.stop_on_failed_read = Some(s.stop_handle());
            }
            assert!(matches!(s.get_image(), Err(Error::Interrupted)));
            assert!(!s.is_open());
            let script = opener.script.borrow();
            assert_eq!(script.count(&Event::Open(0)), 1);
            assert_eq!(script.count(&Event::Release), 1);
        }
    }

    #[test]
    fn oversized_region_is_rejected_before_writing() {
        let (mut s, opener) = sensor(SensorConfig::default());
        s.open().unwrap();
        let writes = opener.script.borrow().sets().len();
        assert!(matches!(s.set_width(u32::MAX), Err(Error::OutOfRange(_))));
        assert!(matches!(
            s.set_offset_x(i32::MAX as u32 + 1),
            Err(Error::OutOfRange(_))
        ));
        assert_eq!(s.roi(), Roi::full_sensor());
        assert_eq!(opener.script.borrow().sets().len(), writes);
    }

    #[test]
    fn oversized_configured_region_fails_open() {
        let cfg = SensorConfig {
            roi: Roi {
                width: u32::MAX,
                ..Roi::full_sensor()
            },
            ..Default::default()
        };
        let (mut s, opener) = sensor(cfg);
        assert!(matches!(s.open(), Err(Error::OutOfRange(_))));
        assert!(!s.is_open());
        assert_eq!(opener.script.borrow().count(&Event::Open(0)), 0);
    }

    #[test]
    fn stop_request_closes_and_interrupts() {
        let (mut s, opener) = sensor(SensorConfig::default());
        s.open().unwrap();
        s.stop_handle().request_stop();
        assert!(matches!(s.get_image(), Err(Error::Interrupted)));
        assert!(!s.is_open());
        assert_eq!(opener.script.borrow().count(&Event::Release), 1);
    }

    #[test]
    fn setters_need_an_open_device() {
        let (mut s, _) = sensor(SensorConfig::default());
        assert!(matches!(s.set_exposure(500.0), Err(Error::NotOpen)));
        assert_eq!(s.exposure(), 10_000.0);
    }

    #[test]
    fn setters_update_cached_values() {
        let (mut s, opener) = sensor(SensorConfig::default());
        s.open().unwrap();
        s.set_exposure(2500.0).unwrap();
        s.set_gain(3.0).unwrap();
        assert_eq!(s.exposure(), 2500.0);
        assert_eq!(s.gain(), 3.0);
        let sets = opener.script.borrow().sets();
        assert_eq!(
            sets[sets.len() - 2..],
            [
                (Param::Exposure, ParamValue::Float(2500.0)),
                (Param::Gain, ParamValue::Float(3.0)),
            ]
        );
    }

    #[test]
    fn close_twice_is_harmless() {
        let (mut s, opener) = sensor(SensorConfig::default());
        s.open().unwrap();
        s.close();
        s.close();
        assert_eq!(opener.script.borrow().count(&Event::Release), 1);
    }

    #[test]
    fn reset_zoi_restores_full_sensor() {
        let cfg = SensorConfig {
            roi: Roi {
                offset_x: 100,
                offset_y: 50,
                width: 640,
                height: 480,
            },
            ..Default::default()
        };
        let (mut s, opener) = sensor(cfg);
        s.open().unwrap();
        s.reset_zoi().unwrap();
        assert_eq!(s.roi(), Roi::full_sensor());
        let sets = opener.script.borrow().sets();
        assert_eq!(
            names(&sets[sets.len() - 4..]),
            vec![Param::OffsetY, Param::OffsetX, Param::Height, Param::Width]
        );
    }

    #[test]
    fn zoi_selection_is_aligned_and_applied() {
        let cfg = SensorConfig {
            roi: Roi {
                offset_x: 100,
                offset_y: 40,
                width: 800,
                height: 600,
            },
            ..Default::default()
        };
        let (mut s, opener) = sensor(cfg);
        s.open().unwrap();
        let mut selector = FixedSelection(Some(Selection {
            xmin: 3,
            xmax: 211,
            ymin: 11,
            ymax: 100,
        }));
        let roi = s.set_zoi(&mut selector).unwrap();
        // sensor bounds x 103..311, y 51..140
        assert_eq!(
            roi,
            Roi {
                offset_x: 100,
                offset_y: 50,
                width: 208,
                height: 90,
            }
        );
        assert_eq!(s.roi(), roi);
        let sets = opener.script.borrow().sets();
        assert_eq!(
            sets[sets.len() - 4..],
            [
                (Param::Height, ParamValue::Int(90)),
                (Param::Width, ParamValue::Int(208)),
                (Param::OffsetY, ParamValue::Int(50)),
                (Param::OffsetX, ParamValue::Int(100)),
            ]
        );
    }

    #[test]
    fn zoi_selection_is_cut_to_streamed_region() {
        let cfg = SensorConfig {
            roi: Roi {
                offset_x: 1800,
                offset_y: 0,
                width: 248,
                height: 480,
            },
            ..Default::default()
        };
        let (mut s, _) = sensor(cfg);
        s.open().unwrap();
        let mut selector = FixedSelection(Some(Selection {
            xmin: 0,
            xmax: 1000,
            ymin: 10,
            ymax: 100,
        }));
        let roi = s.set_zoi(&mut selector).unwrap();
        assert_eq!(
            roi,
            Roi {
                offset_x: 1800,
                offset_y: 10,
                width: 248,
                height: 90,
            }
        );
        assert!(roi.offset_x + roi.width <= crate::roi::FULL_SENSOR_WIDTH);
    }

    #[test]
    fn zoi_selection_outside_region_keeps_region() {
        let cfg = SensorConfig {
            roi: Roi {
                offset_x: 100,
                offset_y: 40,
                width: 64,
                height: 32,
            },
            ..Default::default()
        };
        let region = cfg.roi;
        let (mut s, _) = sensor(cfg);
        s.open().unwrap();
        let mut selector = FixedSelection(Some(Selection {
            xmin: 500,
            xmax: 900,
            ymin: 0,
            ymax: 20,
        }));
        let roi = s.set_zoi(&mut selector).unwrap();
        assert_eq!(roi, region);
    }

    #[test]
    fn zoi_without_selection_keeps_region() {
        let cfg = SensorConfig {
            roi: Roi {
                offset_x: 6,
                offset_y: 3,
                width: 642,
                height: 481,
            },
            ..Default::default()
        };
        let (mut s, _) = sensor(cfg);
        s.open().unwrap();
        let roi = s.set_zoi(&mut FixedSelection(None)).unwrap();
        // x 6..648 -> 4..648, y 3..484 -> 2..484
        assert_eq!(
            roi,
            Roi {
                offset_x: 4,
                offset_y: 2,
                width: 644,
                height: 482,
            }
        );
    }

    #[test]
    fn selector_sees_a_frame() {
        let (mut s, _) = sensor(SensorConfig::default());
        s.open().unwrap();
        let mut seen = None;
        let mut selector = |frame: &Frame| -> Option<Selection> {
            seen = Some((frame.width(), frame.height()));
            None
        };
        s.set_zoi(&mut selector).unwrap();
        assert_eq!(seen, Some((FRAME_WIDTH, FRAME_HEIGHT)));
    }

    #[test]
    fn display_lists_settings() {
        let (s, _) = sensor(SensorConfig::default());
        let text = s.to_string();
        assert!(text.contains(" Exposure: 10000"));
        assert!(text.contains(" FPS: free running"));
        assert!(text.contains(" Width: 2048"));
        assert!(text.ends_with(" Y offset: 0"));
    }
}
