#![cfg_attr(not(test), no_std)]

pub mod command;
pub mod frame;
pub mod snapshot;

pub use command::Command;
pub use frame::{HostToRig, RigToHost};
pub use snapshot::{MalformedResponse, RawSnapshot};

/// Rows addressed by the row selector bus
pub const ROWS: usize = 15;
/// Columns swept per row by the column selector bus
pub const COLUMNS: usize = 3;
/// Cells in one full-array snapshot
pub const CELL_COUNT: usize = ROWS * COLUMNS;

/// Sensor modules on the rig, each a 3x3 grid of cells
pub const MODULE_COUNT: usize = 5;
/// Side length of a module's cell grid
pub const MODULE_SIDE: usize = 3;
/// Cells per module
pub const MODULE_CELLS: usize = MODULE_SIDE * MODULE_SIDE;
