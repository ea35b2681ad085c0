use gastrack_format::MODULE_COUNT;

use crate::calibration::ConcentrationVector;
use crate::geometry::{SensorGeometry, WeightVector};

/// Total weighted mass at or below which no estimate is made
pub const DEFAULT_EPSILON: f64 = 1e-9;

/// Weighted-centroid estimate of where the gas comes from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BearingEstimate {
    pub x: f64,
    pub y: f64,
}

impl BearingEstimate {
    /// Counter-clockwise from +x, in degrees
    pub fn angle_deg(&self) -> f64 {
        libm::atan2(self.y, self.x).to_degrees()
    }

    pub fn magnitude(&self) -> f64 {
        libm::hypot(self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bearing {
    Located(BearingEstimate),
    /// The weighted mass was zero: no module contributed
    Undefined,
}

impl Bearing {
    pub fn estimate(&self) -> Option<BearingEstimate> {
        match self {
            Self::Located(estimate) => Some(*estimate),
            Self::Undefined => None,
        }
    }
}

/// Geometry and weights are fixed at construction; `estimate` is pure.
#[derive(Debug, Clone, Copy)]
pub struct Estimator {
    geometry: SensorGeometry,
    weights: WeightVector,
    epsilon: f64,
}

impl Estimator {
    pub fn new(geometry: SensorGeometry) -> Self {
        Self::with_epsilon(geometry, DEFAULT_EPSILON)
    }

    pub fn with_epsilon(geometry: SensorGeometry, epsilon: f64) -> Self {
        Self {
            weights: geometry.weights(),
            geometry,
            epsilon: libm::fabs(epsilon),
        }
    }

    pub fn geometry(&self) -> &SensorGeometry {
        &self.geometry
    }

    pub fn weights(&self) -> &WeightVector {
        &self.weights
    }

    pub fn estimate(&self, concentrations: &ConcentrationVector) -> Bearing {
        let mut mass = [0f64; MODULE_COUNT];
        mass.iter_mut()
            .zip(self.weights.iter().zip(concentrations.iter()))
            .for_each(|(m, (w, c))| *m = w * c);

        let total: f64 = mass.iter().sum();
        if !total.is_finite() || libm::fabs(total) <= self.epsilon {
            return Bearing::Undefined;
        }

        let (sx, sy) = self
            .geometry
            .positions()
            .iter()
            .zip(mass.iter())
            .fold((0f64, 0f64), |(sx, sy), (p, m)| {
                (sx + p.x as f64 * m, sy + p.y as f64 * m)
            });

        Bearing::Located(BearingEstimate {
            x: sx / total,
            y: sy / total,
        })
    }
}

impl Default for Estimator {
    fn default() -> Self {
        Self::new(SensorGeometry::default())
    }
}
