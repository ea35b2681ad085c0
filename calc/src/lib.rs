#![cfg_attr(not(any(test, feature = "std")), no_std)]

//! Host-side arithmetic: differencing two snapshots, reshaping the result
//! into module grids, calibrating each module's reference cell and
//! estimating where the gas comes from.

pub mod calibration;
pub mod estimator;
pub mod frame;
pub mod geometry;

pub use calibration::{Calibration, CalibrationTable, ConcentrationVector};
pub use estimator::{Bearing, BearingEstimate, Estimator, DEFAULT_EPSILON};
pub use frame::{CellLocation, DifferentialFrame, ModuleGrid};
pub use geometry::{Position, SensorGeometry, WeightVector};
