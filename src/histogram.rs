use crate::frame::Frame;
use crate::param::DataFormat;

/// Width of a histogram bin in intensity levels.
pub const BIN_WIDTH: u32 = 4;

/// Intensity histogram of a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    counts: Vec<u64>,
}

impl Histogram {
    /// An empty histogram sized for `format`.
    pub fn new(format: DataFormat) -> Self {
        let bins = (format.levels() / BIN_WIDTH) as usize;
        Histogram {
            counts: vec![0; bins],
        }
    }

    /// Count the samples of `frame`.
    ///
    /// Bins are exactly [BIN_WIDTH] levels wide. Every sample at or above
    /// the lower edge of the top bin (252 for 8-bit, 1020 for 10-bit)
    /// is counted in the last bin, so no sample is left out. A histogram
    /// limited to the frame's maximum would drop those samples and use
    /// slightly narrower bins.
    pub fn compute(frame: &Frame) -> Self {
        let mut hist = Histogram::new(frame.format());
        let last = hist.counts.len() - 1;
        for v in frame.data().samples() {
            let bin = (v as usize / BIN_WIDTH as usize).min(last);
            hist.counts[bin] += 1;
        }
        hist
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn bins(&self) -> usize {
        self.counts.len()
    }

    /// Lower intensity of each bin: 0, 4, 8, ...
    pub fn bin_labels(&self) -> impl Iterator<Item = u32> {
        (0..self.counts.len() as u32).map(|i| i * BIN_WIDTH)
    }

    /// Curve for display: square root of the counts, so that a dominant bin
    /// does not flatten the others, normalised to `[0, 1]`.
    ///
    /// A flat histogram gives all zeros.
    pub fn display_curve(&self) -> Vec<f64> {
        let roots: Vec<f64> = self.counts.iter().map(|&c| (c as f64).sqrt()).collect();
        let lo = roots.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = roots.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let span = hi - lo;
        if span <= 0.0 {
            return vec![0.0; roots.len()];
        }
        roots.iter().map(|r| (r - lo) / span).collect()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::frame::FrameData;

    #[test]
    fn bin_count_follows_bit_depth() {
        assert_eq!(Histogram::new(DataFormat::Mono8).bins(), 64);
        assert_eq!(Histogram::new(DataFormat::Raw8).bins(), 64);
        assert_eq!(Histogram::new(DataFormat::Mono16).bins(), 256);
        let labels: Vec<u32> = Histogram::new(DataFormat::Mono8).bin_labels().collect();
        assert_eq!(labels[..3], [0, 4, 8]);
        assert_eq!(*labels.last().unwrap(), 252);
    }

    #[test]
    fn samples_land_in_bins() {
        let frame = Frame::new(
            3,
            2,
            DataFormat::Mono8,
            FrameData::U8(vec![0, 3, 4, 255, 252, 100]),
        ).unwrap();
        let hist = Histogram::compute(&frame);
        assert_eq!(hist.counts()[0], 2);
        assert_eq!(hist.counts()[1], 1);
        assert_eq!(hist.counts()[25], 1);
        assert_eq!(hist.counts()[63], 2);
        assert_eq!(hist.counts().iter().sum::<u64>(), 6);
    }

    #[test]
    fn out_of_range_samples_go_to_last_bin() {
        let frame = Frame::new(2, 1, DataFormat::Mono16, FrameData::U16(vec![1023, 4000])).unwrap();
        let hist = Histogram::compute(&frame);
        assert_eq!(hist.counts()[255], 2);
    }

    #[test]
    fn display_curve_is_normalized_sqrt() {
        let frame = Frame::new(
            5,
            1,
            DataFormat::Mono8,
            FrameData::U8(vec![0, 0, 0, 0, 4]),
        ).unwrap();
        let curve = Histogram::compute(&frame).display_curve();
        assert_relative_eq!(curve[0], 1.0);
        // sqrt(1) over a span of sqrt(4) - 0
        assert_relative_eq!(curve[1], 0.5);
        assert_relative_eq!(curve[2], 0.0);
    }

    #[test]
    fn flat_histogram_gives_zero_curve() {
        let hist = Histogram::new(DataFormat::Mono8);
        assert!(hist.display_curve().iter().all(|&v| v == 0.0));
    }
}
