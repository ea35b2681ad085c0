use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::blocking::spi::Transfer;
use embedded_hal::digital::v2::OutputPin;
use gastrack_format::{RawSnapshot, COLUMNS, ROWS};

use crate::channel::ChannelReader;
use crate::mux::Multiplexer;
use crate::{Error, ScanFailed};

/// Sweeps the multiplexer over every cell and reads each one.
pub struct ArrayScanner<P, SPI, CS, D> {
    mux: Multiplexer<P>,
    reader: ChannelReader<SPI, CS, D>,
}

impl<P, SPI, CS, D> ArrayScanner<P, SPI, CS, D>
where
    P: OutputPin,
    SPI: Transfer<u8>,
    CS: OutputPin,
    D: DelayMs<u8> + DelayUs<u16>,
{
    pub fn new(mux: Multiplexer<P>, reader: ChannelReader<SPI, CS, D>) -> Self {
        Self { mux, reader }
    }

    /// Rows outer, columns inner; cell (`row`, `column`) lands at
    /// `row * COLUMNS + column`. The first failing cell aborts the scan
    /// and nothing read so far is returned.
    pub fn scan(&mut self) -> Result<RawSnapshot, ScanFailed> {
        let mut snapshot = RawSnapshot::default();
        for row in 0..ROWS as u8 {
            for column in 0..COLUMNS as u8 {
                let sample = self
                    .read_cell(row, column)
                    .map_err(|cause| ScanFailed { row, column, cause })?;
                snapshot[row as usize * COLUMNS + column as usize] = sample;
            }
        }
        Ok(snapshot)
    }

    pub fn read_cell(&mut self, row: u8, column: u8) -> Result<u16, Error> {
        self.mux.select_cell(row, column)?;
        self.reader.read_settled()
    }

    pub fn pause_us(&mut self, us: u16) {
        self.reader.delay_us(us);
    }

    pub fn free(self) -> (Multiplexer<P>, ChannelReader<SPI, CS, D>) {
        (self.mux, self.reader)
    }
}
