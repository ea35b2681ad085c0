use gastrack_calc::{Bearing, CalibrationTable, ConcentrationVector, DifferentialFrame, Estimator};
use gastrack_format::RawSnapshot;

/// Everything derived from one acquisition cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frame: DifferentialFrame,
    pub concentrations: ConcentrationVector,
    pub bearing: Bearing,
}

/// Turns a pair of snapshots into a [`FrameReport`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameProcessor {
    calibration: CalibrationTable,
    estimator: Estimator,
}

impl FrameProcessor {
    pub fn new(calibration: CalibrationTable, estimator: Estimator) -> Self {
        Self {
            calibration,
            estimator,
        }
    }

    pub fn process(&self, after: &RawSnapshot, before: &RawSnapshot) -> FrameReport {
        let frame = DifferentialFrame::between(after, before);
        let concentrations = self.calibration.concentrations(&frame);
        let bearing = self.estimator.estimate(&concentrations);
        FrameReport {
            frame,
            concentrations,
            bearing,
        }
    }
}
