use core::ops::Deref;

use gastrack_format::MODULE_COUNT;

/// Module position in the rig plane, in grid units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const ORIGIN: Self = Self::new(0, 0);

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn distance_squared(&self) -> f64 {
        let (x, y) = (self.x as f64, self.y as f64);
        x * x + y * y
    }

    /// Inverse-square weight of this position. The origin has no
    /// defined distance and weighs 0, leaving it out of any estimate.
    pub fn weight(&self) -> f64 {
        let d2 = self.distance_squared();
        if d2 == 0.0 {
            0.0
        } else {
            1.0 / d2
        }
    }
}

/// Where each sensor module sits, indexed by module number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorGeometry([Position; MODULE_COUNT]);

impl SensorGeometry {
    pub const fn new(positions: [Position; MODULE_COUNT]) -> Self {
        Self(positions)
    }

    pub fn positions(&self) -> &[Position; MODULE_COUNT] {
        &self.0
    }

    pub fn weights(&self) -> WeightVector {
        WeightVector(self.0.map(|p| p.weight()))
    }
}

impl Default for SensorGeometry {
    /// Centre module with the other four on the diagonals
    fn default() -> Self {
        Self([
            Position::ORIGIN,
            Position::new(-1, 1),
            Position::new(-1, -1),
            Position::new(1, -1),
            Position::new(1, 1),
        ])
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(transparent)]
pub struct WeightVector([f64; MODULE_COUNT]);

impl Deref for WeightVector {
    type Target = [f64; MODULE_COUNT];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
