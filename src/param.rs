//! Device properties addressed by code, the way the sensor pushes its
//! configuration.

use std::fmt;

use serde::{Deserialize, Serialize};
use xiapi_sys::{XI_ACQ_TIMING_MODE, XI_BIT_DEPTH, XI_GPI_MODE, XI_SWITCH, XI_TRG_SOURCE};

use crate::error::Error;

/// A device property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    TriggerSource,
    GpiSelector,
    GpiMode,
    DataFormat,
    OutputBitDepth,
    OutputBitPacking,
    AutoExposureGain,
    Width,
    Height,
    OffsetX,
    OffsetY,
    Exposure,
    Gain,
    AcqTimingMode,
    FrameRate,
}

impl Param {
    /// Changing this property while acquiring requires acquisition to be
    /// stopped first.
    pub fn needs_idle(self) -> bool {
        matches!(
            self,
            Param::DataFormat
                | Param::OutputBitDepth
                | Param::OutputBitPacking
                | Param::Width
                | Param::Height
        )
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A property value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Int(i32),
    Float(f32),
}

impl ParamValue {
    pub fn as_i32(self) -> i32 {
        match self {
            ParamValue::Int(v) => v,
            ParamValue::Float(v) => v.round() as i32,
        }
    }

    pub fn as_f32(self) -> f32 {
        match self {
            ParamValue::Int(v) => v as f32,
            ParamValue::Float(v) => v,
        }
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v)
    }
}

impl TryFrom<u32> for ParamValue {
    type Error = Error;

    fn try_from(v: u32) -> Result<Self, Error> {
        i32::try_from(v)
            .map(ParamValue::Int)
            .map_err(|_| Error::OutOfRange(v))
    }
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        ParamValue::Float(v)
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
        }
    }
}

pub const TRIGGER_EDGE_RISING: i32 = XI_TRG_SOURCE::XI_TRG_EDGE_RISING as i32;
pub const GPI_PORT_1: i32 = 1;
pub const GPI_MODE_TRIGGER: i32 = XI_GPI_MODE::XI_GPI_TRIGGER as i32;
pub const BIT_DEPTH_10: i32 = XI_BIT_DEPTH::XI_BPP_10 as i32;
pub const SWITCH_ON: i32 = XI_SWITCH::XI_ON as i32;
pub const SWITCH_OFF: i32 = XI_SWITCH::XI_OFF as i32;
pub const TIMING_FRAME_RATE_LIMIT: i32 =
    XI_ACQ_TIMING_MODE::XI_ACQ_TIMING_MODE_FRAME_RATE_LIMIT as i32;

/// Pixel data format delivered by the camera.
///
/// The discriminants are the xiAPI image format codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    /// 8 bits per pixel
    #[default]
    Mono8 = 0,
    /// 16 bits per pixel, 10 significant bits
    Mono16 = 1,
    /// 8 bits per pixel, unprocessed sensor data
    Raw8 = 5,
    /// 16 bits per pixel, 10 significant bits, unprocessed sensor data
    Raw16 = 6,
}

impl DataFormat {
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Samples are stored in 16 bits.
    pub fn is_wide(self) -> bool {
        matches!(self, DataFormat::Mono16 | DataFormat::Raw16)
    }

    /// Significant bits per sample.
    pub fn bit_depth(self) -> u32 {
        if self.is_wide() {
            10
        } else {
            8
        }
    }

    /// Number of distinct intensity levels.
    pub fn levels(self) -> u32 {
        1 << self.bit_depth()
    }
}

impl TryFrom<u32> for DataFormat {
    type Error = Error;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(DataFormat::Mono8),
            1 => Ok(DataFormat::Mono16),
            5 => Ok(DataFormat::Raw8),
            6 => Ok(DataFormat::Raw16),
            other => Err(Error::UnsupportedFormat(other)),
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataFormat::Mono8 => "mono8",
            DataFormat::Mono16 => "mono16",
            DataFormat::Raw8 => "raw8",
            DataFormat::Raw16 => "raw16",
        };
        f.write_str(name)
    }
}
