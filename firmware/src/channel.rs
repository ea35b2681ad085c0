use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::blocking::spi::Transfer;
use embedded_hal::digital::v2::OutputPin;

use crate::consts::{BUSY_BYTE, MAX_BUSY_POLLS, SETTLE_DELAY_MS, SETTLING_READS};
use crate::Error;

/// Reads one converter sample over SPI, with a software chip-select.
pub struct ChannelReader<SPI, CS, D> {
    spi: SPI,
    cs: CS,
    delay: D,
    max_busy_polls: u32,
}

impl<SPI, CS, D> ChannelReader<SPI, CS, D>
where
    SPI: Transfer<u8>,
    CS: OutputPin,
    D: DelayMs<u8> + DelayUs<u16>,
{
    /// Takes the bus and parks chip-select high (deasserted).
    pub fn new(spi: SPI, mut cs: CS, delay: D) -> Result<Self, Error> {
        cs.set_high().map_err(|_| Error::ChipSelect)?;
        Ok(Self {
            spi,
            cs,
            delay,
            max_busy_polls: MAX_BUSY_POLLS,
        })
    }

    pub fn with_max_busy_polls(mut self, polls: u32) -> Self {
        self.max_busy_polls = polls.max(1);
        self
    }

    /// One read cycle: wait out the busy byte, then take a big-endian sample.
    /// Chip-select is released on every path out.
    pub fn read_raw(&mut self) -> Result<u16, Error> {
        self.cs.set_low().map_err(|_| Error::ChipSelect)?;
        let sample = self.transact();
        let released = self.cs.set_high().map_err(|_| Error::ChipSelect);
        let sample = sample?;
        released?;
        Ok(sample)
    }

    /// The kept sample after the settling reads.
    pub fn read_settled(&mut self) -> Result<u16, Error> {
        for _ in 0..SETTLING_READS {
            self.read_raw()?;
            self.delay.delay_ms(SETTLE_DELAY_MS);
        }
        self.read_raw()
    }

    pub fn delay_us(&mut self, us: u16) {
        self.delay.delay_us(us);
    }

    pub fn free(self) -> (SPI, CS, D) {
        (self.spi, self.cs, self.delay)
    }

    fn transact(&mut self) -> Result<u16, Error> {
        let mut polls = 0;
        loop {
            let mut status = [0u8; 1];
            let status = self.spi.transfer(&mut status).map_err(|_| Error::Spi)?;
            polls += 1;
            if status[0] != BUSY_BYTE {
                break;
            }
            if polls >= self.max_busy_polls {
                log::warn!("converter busy after {} polls", polls);
                return Err(Error::ReadTimeout { polls });
            }
        }

        let mut data = [0u8; 2];
        let data = self.spi.transfer(&mut data).map_err(|_| Error::Spi)?;
        Ok(u16::from_be_bytes([data[0], data[1]]))
    }
}
