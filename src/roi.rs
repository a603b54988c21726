use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Full sensor size used when the region of interest is reset.
pub const FULL_SENSOR_WIDTH: u32 = 2048;
pub const FULL_SENSOR_HEIGHT: u32 = 2048;

/// Horizontal bounds are aligned to this many pixels.
pub const X_ALIGN: u32 = 4;
/// Vertical bounds are aligned to this many lines.
pub const Y_ALIGN: u32 = 2;

/// Selections narrower or shorter than this are discarded.
pub const MIN_SPAN: u32 = 5;

/// Roi represents a region of interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    /// Offset from the left in the horizontal direction
    #[serde(default)]
    pub offset_x: u32,

    /// Offset from the top in the vertical direction
    #[serde(default)]
    pub offset_y: u32,

    /// Image width
    #[serde(default = "default_width")]
    pub width: u32,

    /// Image height
    #[serde(default = "default_height")]
    pub height: u32,
}

fn default_width() -> u32 {
    FULL_SENSOR_WIDTH
}

fn default_height() -> u32 {
    FULL_SENSOR_HEIGHT
}

impl Default for Roi {
    fn default() -> Self {
        Roi::full_sensor()
    }
}

impl Roi {
    pub fn full_sensor() -> Self {
        Roi {
            offset_x: 0,
            offset_y: 0,
            width: FULL_SENSOR_WIDTH,
            height: FULL_SENSOR_HEIGHT,
        }
    }

    /// Build a region from sensor bounds, flooring X bounds to a multiple
    /// of [X_ALIGN] and Y bounds to a multiple of [Y_ALIGN].
    pub fn aligned(xmin: u32, xmax: u32, ymin: u32, ymax: u32) -> Result<Self> {
        let xmin = xmin - xmin % X_ALIGN;
        let xmax = xmax - xmax % X_ALIGN;
        let ymin = ymin - ymin % Y_ALIGN;
        let ymax = ymax - ymax % Y_ALIGN;
        if xmax <= xmin || ymax <= ymin {
            return Err(Error::InvalidRoi(format!(
                "empty region x={}..{} y={}..{} after alignment",
                xmin, xmax, ymin, ymax
            )));
        }
        Ok(Roi {
            offset_x: xmin,
            offset_y: ymin,
            width: xmax - xmin,
            height: ymax - ymin,
        })
    }

    /// (xmin, xmax, ymin, ymax) in sensor coordinates.
    pub fn bounds(&self) -> (u32, u32, u32, u32) {
        (
            self.offset_x,
            self.offset_x + self.width,
            self.offset_y,
            self.offset_y + self.height,
        )
    }
}

/// A rectangle dragged by an operator on a displayed frame, in frame
/// pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub xmin: u32,
    pub xmax: u32,
    pub ymin: u32,
    pub ymax: u32,
}

impl Selection {
    /// Build a selection from the press and release corners of a drag.
    ///
    /// Corners may come in any order. Returns `None` when the rectangle
    /// spans less than [MIN_SPAN] pixels in either direction.
    pub fn from_corners(press: (f64, f64), release: (f64, f64)) -> Option<Self> {
        let round = |v: f64| v.round().max(0.0) as u32;
        let (x1, y1) = (round(press.0), round(press.1));
        let (x2, y2) = (round(release.0), round(release.1));
        let sel = Selection {
            xmin: x1.min(x2),
            xmax: x1.max(x2),
            ymin: y1.min(y2),
            ymax: y1.max(y2),
        };
        if sel.xmax - sel.xmin < MIN_SPAN || sel.ymax - sel.ymin < MIN_SPAN {
            return None;
        }
        Some(sel)
    }

    /// Cut the selection down to a `width` x `height` frame.
    ///
    /// Returns `None` when what is left spans less than [MIN_SPAN] pixels
    /// in either direction.
    pub fn clamp_to(self, width: u32, height: u32) -> Option<Self> {
        let sel = Selection {
            xmin: self.xmin.min(width),
            xmax: self.xmax.min(width),
            ymin: self.ymin.min(height),
            ymax: self.ymax.min(height),
        };
        if sel.xmax - sel.xmin < MIN_SPAN || sel.ymax - sel.ymin < MIN_SPAN {
            return None;
        }
        Some(sel)
    }

    /// Move the selection from frame coordinates to sensor coordinates.
    pub fn to_sensor(self, origin: &Roi) -> Result<(u32, u32, u32, u32)> {
        let shift = |v: u32, offset: u32| {
            v.checked_add(offset).ok_or_else(|| {
                Error::InvalidRoi(format!("selection {:?} overflows at offset {}", self, offset))
            })
        };
        Ok((
            shift(self.xmin, origin.offset_x)?,
            shift(self.xmax, origin.offset_x)?,
            shift(self.ymin, origin.offset_y)?,
            shift(self.ymax, origin.offset_y)?,
        ))
    }
}
