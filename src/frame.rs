use std::fmt;

#[cfg(feature = "image")]
use image::{DynamicImage, ImageBuffer, Luma};

use crate::error::{Error, Result};
use crate::image::Image;
use crate::param::DataFormat;

/// Pixel samples of a frame, tightly packed in row-major order.
#[derive(Clone, PartialEq)]
pub enum FrameData {
    U8(Vec<u8>),
    U16(Vec<u16>),
}

impl FrameData {
    pub fn len(&self) -> usize {
        match self {
            FrameData::U8(d) => d.len(),
            FrameData::U16(d) => d.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate the samples widened to `u16`.
    pub fn samples(&self) -> Box<dyn Iterator<Item = u16> + '_> {
        match self {
            FrameData::U8(d) => Box::new(d.iter().map(|&v| v as u16)),
            FrameData::U16(d) => Box::new(d.iter().copied()),
        }
    }
}

/// An owned frame copied out of the acquisition buffer.
#[derive(Clone, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    format: DataFormat,
    data: FrameData,
    /// framenumber from the camera
    pub nframe: u32,
    /// raw timestamp from the camera
    pub device_timestamp: u64,
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Frame {{ width: {}, height: {}, format: {}, nframe: {} }}",
            self.width, self.height, self.format, self.nframe
        )
    }
}

impl Frame {
    /// Build a frame from packed samples.
    ///
    /// The number of samples must be `width * height`.
    pub fn new(width: u32, height: u32, format: DataFormat, data: FrameData) -> Result<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(Error::InvalidFrame(format!(
                "{} samples for a {}x{} frame",
                data.len(),
                width,
                height
            )));
        }
        Ok(Frame {
            width,
            height,
            format,
            data,
            nframe: 0,
            device_timestamp: 0,
        })
    }

    pub(crate) fn from_image_u8(image: &Image<'_, u8>, format: DataFormat) -> Result<Self> {
        let data = FrameData::U8(image.to_packed_vec());
        Ok(Frame::new(image.width(), image.height(), format, data)?.stamped(image))
    }

    pub(crate) fn from_image_u16(image: &Image<'_, u16>, format: DataFormat) -> Result<Self> {
        let data = FrameData::U16(image.to_packed_vec());
        Ok(Frame::new(image.width(), image.height(), format, data)?.stamped(image))
    }

    fn stamped<T>(mut self, image: &Image<'_, T>) -> Self {
        self.nframe = image.nframe();
        self.device_timestamp = image.timestamp_raw();
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> DataFormat {
        self.format
    }

    pub fn data(&self) -> &FrameData {
        &self.data
    }

    /// Sample at column `x`, row `y`, widened to `u16`.
    pub fn sample(&self, x: u32, y: u32) -> Option<u16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = y as usize * self.width as usize + x as usize;
        match &self.data {
            FrameData::U8(d) => d.get(idx).map(|&v| v as u16),
            FrameData::U16(d) => d.get(idx).copied(),
        }
    }

    /// Smallest and largest sample, used as display limits.
    pub fn min_max(&self) -> Option<(u16, u16)> {
        self.data.samples().fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }

    /// Mean intensity.
    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.data.samples().map(u64::from).sum();
        sum as f64 / self.data.len() as f64
    }
}

#[cfg(feature = "image")]
impl Frame {
    /// Converts the frame to a grayscale [DynamicImage].
    ///
    /// 10-bit samples are scaled up to the full 16-bit range.
    pub fn to_dynamic_image(&self) -> DynamicImage {
        match &self.data {
            FrameData::U8(d) => {
                let buf = ImageBuffer::<Luma<u8>, _>::from_raw(self.width, self.height, d.clone());
                DynamicImage::ImageLuma8(buf.expect("frame size checked at construction"))
            }
            FrameData::U16(d) => {
                let shift = 16 - self.format.bit_depth();
                let scaled = d.iter().map(|&v| v << shift).collect();
                let buf = ImageBuffer::<Luma<u16>, _>::from_raw(self.width, self.height, scaled);
                DynamicImage::ImageLuma16(buf.expect("frame size checked at construction"))
            }
        }
    }

    /// Save the frame; the format follows the file extension.
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> crate::Result<()> {
        self.to_dynamic_image().save(path)?;
        Ok(())
    }
}
