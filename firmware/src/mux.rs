use embedded_hal::digital::v2::OutputPin;
use gastrack_format::{COLUMNS, ROWS};

use crate::Error;

/// Four output pins carrying a 4-bit address, bit `i` on pin `i`.
pub struct SelectorBus<P> {
    pins: [P; 4],
}

impl<P: OutputPin> SelectorBus<P> {
    pub fn new(pins: [P; 4]) -> Self {
        Self { pins }
    }

    pub fn select(&mut self, address: u8) -> Result<(), Error> {
        debug_assert!(address < 16);
        for (bit, pin) in self.pins.iter_mut().enumerate() {
            let driven = if (address >> bit) & 1 == 1 {
                pin.set_high()
            } else {
                pin.set_low()
            };
            driven.map_err(|_| Error::SelectorPin)?;
        }
        Ok(())
    }

    pub fn free(self) -> [P; 4] {
        self.pins
    }
}

/// Column bus address for a cell. The column bus shares its address
/// space with the row grouping, so the three columns of a row sit right
/// after the first row of that row's group of three.
pub const fn column_address(row: u8, column: u8) -> u8 {
    let base = row - (row % 3);
    base + column
}

/// Drives the row and column selector buses.
pub struct Multiplexer<P> {
    row_bus: SelectorBus<P>,
    column_bus: SelectorBus<P>,
}

impl<P: OutputPin> Multiplexer<P> {
    pub fn new(row_bus: SelectorBus<P>, column_bus: SelectorBus<P>) -> Self {
        Self {
            row_bus,
            column_bus,
        }
    }

    /// Routes cell (`row`, `column`) to the converter.
    ///
    /// # Panics
    /// If `row` or `column` lies outside the array.
    pub fn select_cell(&mut self, row: u8, column: u8) -> Result<(), Error> {
        assert!((row as usize) < ROWS, "row {} out of range", row);
        assert!((column as usize) < COLUMNS, "column {} out of range", column);
        self.row_bus.select(row)?;
        self.column_bus.select(column_address(row, column))
    }

    pub fn free(self) -> (SelectorBus<P>, SelectorBus<P>) {
        (self.row_bus, self.column_bus)
    }
}

#[cfg(test)]
mod test {
    use core::convert::Infallible;
    use std::cell::Cell;
    use std::rc::Rc;

    use proptest::prelude::*;

    use super::*;

    #[derive(Clone)]
    struct Line(Rc<Cell<bool>>);

    impl OutputPin for Line {
        type Error = Infallible;

        fn set_low(&mut self) -> Result<(), Infallible> {
            self.0.set(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.0.set(true);
            Ok(())
        }
    }

    struct Tap {
        lines: [Rc<Cell<bool>>; 4],
    }

    impl Tap {
        fn bus() -> (Self, SelectorBus<Line>) {
            let lines: [Rc<Cell<bool>>; 4] = Default::default();
            let pins = [
                Line(lines[0].clone()),
                Line(lines[1].clone()),
                Line(lines[2].clone()),
                Line(lines[3].clone()),
            ];
            (Self { lines }, SelectorBus::new(pins))
        }

        fn value(&self) -> u8 {
            self.lines
                .iter()
                .enumerate()
                .fold(0, |acc, (bit, l)| acc | ((l.get() as u8) << bit))
        }
    }

    #[test]
    fn bus_puts_lsb_on_first_pin() {
        let (tap, mut bus) = Tap::bus();
        bus.select(0b0001).unwrap();
        assert!(tap.lines[0].get());
        assert!(!tap.lines[3].get());
        bus.select(0b1010).unwrap();
        assert_eq!(tap.value(), 0b1010);
    }

    #[test]
    fn column_addresses_of_known_rows() {
        assert_eq!([0, 1, 2].map(|c| column_address(0, c)), [0, 1, 2]);
        assert_eq!([0, 1, 2].map(|c| column_address(4, c)), [3, 4, 5]);
        assert_eq!([0, 1, 2].map(|c| column_address(14, c)), [12, 13, 14]);
    }

    #[test]
    #[should_panic]
    fn row_past_array_panics() {
        let (_, rows) = Tap::bus();
        let (_, cols) = Tap::bus();
        Multiplexer::new(rows, cols).select_cell(15, 0).ok();
    }

    #[test]
    #[should_panic]
    fn column_past_array_panics() {
        let (_, rows) = Tap::bus();
        let (_, cols) = Tap::bus();
        Multiplexer::new(rows, cols).select_cell(0, 3).ok();
    }

    proptest! {
        #[test]
        fn buses_follow_cell_address(row in 0u8..15, column in 0u8..3) {
            let (row_tap, rows) = Tap::bus();
            let (col_tap, cols) = Tap::bus();
            let mut mux = Multiplexer::new(rows, cols);
            mux.select_cell(row, column).unwrap();
            prop_assert_eq!(row_tap.value(), row);
            prop_assert_eq!(col_tap.value(), (row - row % 3) + column);
        }
    }
}
