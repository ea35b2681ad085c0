use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::blocking::spi::Transfer;
use embedded_hal::digital::v2::OutputPin;
use gastrack_format::{Command, HostToRig, RawSnapshot, RigToHost};

use crate::consts::IDLE_DELAY_US;
use crate::scanner::ArrayScanner;
use crate::{Error, ScanFailed};

/// Owns every piece of rig hardware: the scanner and the two switched
/// outputs (heater and filter).
pub struct Rig<P, SPI, CS, H, D> {
    scanner: ArrayScanner<P, SPI, CS, D>,
    heater: H,
    filter: H,
    heating: bool,
}

impl<P, SPI, CS, H, D> Rig<P, SPI, CS, H, D>
where
    P: OutputPin,
    SPI: Transfer<u8>,
    CS: OutputPin,
    H: OutputPin,
    D: DelayMs<u8> + DelayUs<u16>,
{
    /// Powers up the way the rig boots: filter off, heater on.
    pub fn new(scanner: ArrayScanner<P, SPI, CS, D>, heater: H, mut filter: H) -> Result<Self, Error> {
        filter.set_low().map_err(|_| Error::Filter)?;
        let mut rig = Self {
            scanner,
            heater,
            filter,
            heating: false,
        };
        rig.set_heater(true)?;
        Ok(rig)
    }

    pub fn heating(&self) -> bool {
        self.heating
    }

    pub fn set_heater(&mut self, on: bool) -> Result<(), Error> {
        let driven = if on {
            self.heater.set_high()
        } else {
            self.heater.set_low()
        };
        driven.map_err(|_| Error::Heater)?;
        self.heating = on;
        Ok(())
    }

    pub fn scan(&mut self) -> Result<RawSnapshot, ScanFailed> {
        self.scanner.scan()
    }

    /// Acts on one request; `Some` is the reply to send back.
    pub fn handle(&mut self, request: &HostToRig) -> Option<RigToHost> {
        let command = request.command();
        if command.is_none() {
            log::warn!("ignoring unknown command {:?}", request.token.as_str());
        }
        self.execute(command)
    }

    pub fn execute(&mut self, command: Option<Command>) -> Option<RigToHost> {
        match command {
            Some(Command::HeatingOff) => match self.set_heater(false) {
                Ok(()) => None,
                Err(e) => {
                    log::warn!("heating_off: {}", e);
                    Some(RigToHost::HeaterFault { on: false })
                }
            },
            Some(Command::Data1) => {
                let scanned = self.scanner.scan();
                // The heater comes back on after the scan, even a failed one
                match self.set_heater(true) {
                    Ok(()) => Self::reply(scanned),
                    Err(e) => {
                        log::warn!("data1: {}", e);
                        Some(RigToHost::HeaterFault { on: true })
                    }
                }
            }
            Some(Command::Data2) => Self::reply(self.scanner.scan()),
            None => {
                self.scanner.pause_us(IDLE_DELAY_US);
                None
            }
        }
    }

    pub fn free(self) -> (ArrayScanner<P, SPI, CS, D>, H, H) {
        (self.scanner, self.heater, self.filter)
    }

    fn reply(scanned: Result<RawSnapshot, ScanFailed>) -> Option<RigToHost> {
        match scanned {
            Ok(snapshot) => match snapshot.encode() {
                Ok(text) => Some(RigToHost::Snapshot(text)),
                Err(e) => {
                    log::error!("{}", e);
                    None
                }
            },
            Err(failed) => {
                log::warn!("{}", failed);
                Some(RigToHost::ScanFailed {
                    row: failed.row,
                    column: failed.column,
                })
            }
        }
    }
}
