use core::ops::Deref;

use gastrack_format::{MODULE_COUNT, MODULE_SIDE};

use crate::frame::{CellLocation, DifferentialFrame};

/// Affine map from a differential reading to a concentration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub slope: f64,
    pub intercept: f64,
}

impl Calibration {
    pub const IDENTITY: Self = Self {
        slope: 1.0,
        intercept: 0.0,
    };

    pub fn apply(&self, raw: i32) -> f64 {
        raw as f64 * self.slope + self.intercept
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Per-module calibration, read off one reference cell of each module.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationTable {
    modules: [Calibration; MODULE_COUNT],
    reference_row: usize,
    reference_column: usize,
}

impl CalibrationTable {
    /// `None` if the reference cell lies outside a module grid
    pub fn new(
        modules: [Calibration; MODULE_COUNT],
        reference_row: usize,
        reference_column: usize,
    ) -> Option<Self> {
        if reference_row >= MODULE_SIDE || reference_column >= MODULE_SIDE {
            return None;
        }
        Some(Self {
            modules,
            reference_row,
            reference_column,
        })
    }

    pub fn modules(&self) -> &[Calibration; MODULE_COUNT] {
        &self.modules
    }

    pub fn reference_cell(&self) -> (usize, usize) {
        (self.reference_row, self.reference_column)
    }

    pub fn concentrations(&self, frame: &DifferentialFrame) -> ConcentrationVector {
        let mut values = [0f64; MODULE_COUNT];
        values.iter_mut().enumerate().for_each(|(module, c)| {
            let raw = frame.cell(CellLocation {
                module,
                row: self.reference_row,
                column: self.reference_column,
            });
            *c = self.modules[module].apply(raw);
        });
        ConcentrationVector(values)
    }
}

impl Default for CalibrationTable {
    /// Identity calibration read at the centre cell
    fn default() -> Self {
        Self {
            modules: [Calibration::IDENTITY; MODULE_COUNT],
            reference_row: 1,
            reference_column: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(transparent)]
pub struct ConcentrationVector([f64; MODULE_COUNT]);

impl ConcentrationVector {
    pub const fn new(values: [f64; MODULE_COUNT]) -> Self {
        Self(values)
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self(self.0.map(|c| c * factor))
    }
}

impl Deref for ConcentrationVector {
    type Target = [f64; MODULE_COUNT];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
