use core::ops::Deref;

use gastrack_format::{RawSnapshot, CELL_COUNT, MODULE_CELLS, MODULE_COUNT, MODULE_SIDE};

/// A module's cells, `[row][column]`
pub type ModuleGrid = [[i32; MODULE_SIDE]; MODULE_SIDE];

/// Where a snapshot index lands once reshaped into module grids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellLocation {
    pub module: usize,
    pub row: usize,
    pub column: usize,
}

impl CellLocation {
    pub fn from_index(index: usize) -> Self {
        debug_assert!(index < CELL_COUNT);
        let within = index % MODULE_CELLS;
        Self {
            module: index / MODULE_CELLS,
            row: within / MODULE_SIDE,
            column: within % MODULE_SIDE,
        }
    }

    pub fn index(&self) -> usize {
        self.module * MODULE_CELLS + self.row * MODULE_SIDE + self.column
    }
}

/// Snapshot-to-snapshot difference. Signed: a cell may read lower
/// after the heater comes back on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct DifferentialFrame([i32; CELL_COUNT]);

impl DifferentialFrame {
    /// `after - before`, cell by cell
    pub fn between(after: &RawSnapshot, before: &RawSnapshot) -> Self {
        let mut cells = [0i32; CELL_COUNT];
        cells
            .iter_mut()
            .zip(after.iter().zip(before.iter()))
            .for_each(|(d, (a, b))| *d = *a as i32 - *b as i32);
        Self(cells)
    }

    pub const fn from_cells(cells: [i32; CELL_COUNT]) -> Self {
        Self(cells)
    }

    pub fn cell(&self, location: CellLocation) -> i32 {
        self.0[location.index()]
    }

    pub fn module(&self, module: usize) -> ModuleGrid {
        let mut grid = [[0i32; MODULE_SIDE]; MODULE_SIDE];
        let cells = &self.0[module * MODULE_CELLS..(module + 1) * MODULE_CELLS];
        for (row, chunk) in grid.iter_mut().zip(cells.chunks(MODULE_SIDE)) {
            row.copy_from_slice(chunk);
        }
        grid
    }

    pub fn modules(&self) -> [ModuleGrid; MODULE_COUNT] {
        let mut modules = [[[0i32; MODULE_SIDE]; MODULE_SIDE]; MODULE_COUNT];
        modules
            .iter_mut()
            .enumerate()
            .for_each(|(m, grid)| *grid = self.module(m));
        modules
    }
}

impl Deref for DifferentialFrame {
    type Target = [i32; CELL_COUNT];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
