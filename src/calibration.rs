//! Operator-driven setup of exposure, gain and the zone of interest.
//!
//! The sensor only knows the [Tuner] and [ZoiSelector] traits; how the
//! operator sees frames and gives input is up to the implementation.
//! [ConsoleTuner] is a line-oriented front-end.

use std::io::{BufRead, Write};
use std::ops::RangeInclusive;

use log::debug;

use crate::device::DeviceOpener;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::histogram::Histogram;
use crate::roi::Selection;
use crate::sensor::XimeaSensor;

/// Exposure an operator may choose, in microseconds.
pub const EXPOSURE_RANGE_US: RangeInclusive<f32> = 200.0..=50_000.0;
/// Gain an operator may choose, in dB.
pub const GAIN_RANGE_DB: RangeInclusive<f32> = -1.0..=6.0;

/// What an operator looks at while tuning.
#[derive(Debug, Clone)]
pub struct Preview {
    pub frame: Frame,
    pub histogram: Histogram,
    /// Display limits, `None` for an empty frame.
    pub limits: Option<(u16, u16)>,
}

/// Exclusive access to an open sensor while exposure and gain are tuned.
pub struct TuningSession<'s, O: DeviceOpener> {
    sensor: &'s mut XimeaSensor<O>,
}

impl<'s, O: DeviceOpener> TuningSession<'s, O> {
    pub fn new(sensor: &'s mut XimeaSensor<O>) -> Self {
        TuningSession { sensor }
    }

    /// Grab a frame and compute what is displayed for it.
    pub fn preview(&mut self) -> Result<Preview> {
        let frame = self.sensor.get_image()?;
        let histogram = Histogram::compute(&frame);
        let limits = frame.min_max();
        Ok(Preview {
            frame,
            histogram,
            limits,
        })
    }

    pub fn exposure(&self) -> f32 {
        self.sensor.exposure()
    }

    pub fn gain(&self) -> f32 {
        self.sensor.gain()
    }

    /// Set the exposure, clamped to [EXPOSURE_RANGE_US]. Returns the value
    /// applied.
    pub fn set_exposure(&mut self, exposure_us: f32) -> Result<f32> {
        let value = clamp(exposure_us, &EXPOSURE_RANGE_US);
        self.sensor.set_exposure(value)?;
        Ok(value)
    }

    /// Set the gain, clamped to [GAIN_RANGE_DB]. Returns the value applied.
    pub fn set_gain(&mut self, gain_db: f32) -> Result<f32> {
        let value = clamp(gain_db, &GAIN_RANGE_DB);
        self.sensor.set_gain(value)?;
        Ok(value)
    }
}

fn clamp(v: f32, range: &RangeInclusive<f32>) -> f32 {
    v.clamp(*range.start(), *range.end())
}

/// Drives a [TuningSession] until the operator is satisfied.
pub trait Tuner {
    fn tune<O: DeviceOpener>(&mut self, session: &mut TuningSession<'_, O>) -> Result<()>;
}

/// Keeps exposure and gain as configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTuning;

impl Tuner for NoTuning {
    fn tune<O: DeviceOpener>(&mut self, _session: &mut TuningSession<'_, O>) -> Result<()> {
        Ok(())
    }
}

/// Picks a zone of interest on a frame.
pub trait ZoiSelector {
    /// `None` keeps the current region.
    fn select(&mut self, frame: &Frame) -> Option<Selection>;
}

impl<F> ZoiSelector for F
where
    F: FnMut(&Frame) -> Option<Selection>,
{
    fn select(&mut self, frame: &Frame) -> Option<Selection> {
        self(frame)
    }
}

/// A selection decided in advance, e.g. from the command line.
#[derive(Debug, Clone, Copy)]
pub struct FixedSelection(pub Option<Selection>);

impl ZoiSelector for FixedSelection {
    fn select(&mut self, frame: &Frame) -> Option<Selection> {
        let sel = self.0?;
        if sel.xmax > frame.width() || sel.ymax > frame.height() {
            debug!(
                "selection {:?} exceeds the {}x{} frame and will be cut to it",
                sel,
                frame.width(),
                frame.height()
            );
        }
        Some(sel)
    }
}

const HELP: &str = "commands: exposure <us> | gain <db> | show | done";

/// Tuning over a text stream.
///
/// Reads one command per line from `input`:
///
/// * `exposure <us>` (or `e`): set the exposure
/// * `gain <db>` (or `g`): set the gain
/// * `show` (or `s`): grab a frame and print its statistics and histogram
/// * `done` / `quit` (or `q`), or end of input: finish
pub struct ConsoleTuner<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> ConsoleTuner<R, W> {
    pub fn new(input: R, output: W) -> Self {
        ConsoleTuner { input, output }
    }

    pub fn into_inner(self) -> (R, W) {
        (self.input, self.output)
    }

    fn print_preview(&mut self, preview: &Preview) -> Result<()> {
        let frame = &preview.frame;
        write!(
            self.output,
            "frame {}: {}x{} {}",
            frame.nframe,
            frame.width(),
            frame.height(),
            frame.format()
        )?;
        if let Some((lo, hi)) = preview.limits {
            write!(self.output, ", range {}..{}", lo, hi)?;
        }
        writeln!(self.output, ", mean {:.1}", frame.mean())?;
        writeln!(self.output, "|{}|", sparkline(&preview.histogram, 64))?;
        Ok(())
    }
}

impl<R: BufRead, W: Write> Tuner for ConsoleTuner<R, W> {
    fn tune<O: DeviceOpener>(&mut self, session: &mut TuningSession<'_, O>) -> Result<()> {
        writeln!(
            self.output,
            "exposure {} us, gain {} dB; {}",
            session.exposure(),
            session.gain(),
            HELP
        )?;
        let mut line = String::new();
        loop {
            write!(self.output, "> ")?;
            self.output.flush()?;
            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                writeln!(self.output)?;
                return Ok(());
            }
            let mut words = line.split_whitespace();
            let Some(cmd) = words.next() else {
                continue;
            };
            let arg = words.next().map(str::parse::<f32>);
            let outcome = match (cmd, arg) {
                ("exposure" | "e", Some(Ok(v))) => session
                    .set_exposure(v)
                    .map(|v| format!("exposure = {} us", v)),
                ("gain" | "g", Some(Ok(v))) => session.set_gain(v).map(|v| format!("gain = {} dB", v)),
                ("show" | "s", None) => match session.preview() {
                    Ok(preview) => {
                        self.print_preview(&preview)?;
                        continue;
                    }
                    Err(e) => Err(e),
                },
                ("done" | "quit" | "q", None) => return Ok(()),
                _ => Ok(format!("unknown command {:?}; {}", line.trim(), HELP)),
            };
            match outcome {
                Ok(msg) => writeln!(self.output, "{}", msg)?,
                Err(Error::Interrupted) => return Err(Error::Interrupted),
                Err(e) => writeln!(self.output, "error: {}", e)?,
            }
        }
    }
}

/// Render the display curve of `hist` on one line of at most `width`
/// block characters. Adjacent bins are merged by taking their maximum.
pub fn sparkline(hist: &Histogram, width: usize) -> String {
    const BLOCKS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
    let curve = hist.display_curve();
    let width = width.max(1);
    let per_col = ((curve.len() + width - 1) / width).max(1);
    curve
        .chunks(per_col)
        .map(|chunk| {
            let v = chunk.iter().copied().fold(0.0, f64::max);
            BLOCKS[(v * 8.0).round() as usize]
        })
        .collect()
}
