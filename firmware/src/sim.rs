//! A software stand-in for the rig hardware.
//!
//! [`SimBoard`] hands out pins, an SPI bus and a delay that implement the
//! same `embedded-hal` traits as the real peripherals, all backed by one
//! virtual sensor array. The converter answers a read cycle the way the
//! real one does: a few busy bytes, a ready byte, then the sample MSB first.

use std::sync::{Arc, Mutex, MutexGuard};

use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::blocking::spi::Transfer;
use embedded_hal::digital::v2::OutputPin;
use gastrack_format::{COLUMNS, MODULE_CELLS, ROWS};

use crate::channel::ChannelReader;
use crate::consts::BUSY_BYTE;
use crate::mux::{Multiplexer, SelectorBus};
use crate::rig::Rig;
use crate::scanner::ArrayScanner;
use crate::Error;

pub type SimRig = Rig<SimPin, SimSpi, SimPin, SimPin, SimDelay>;

/// What the virtual converter sees when a read cycle starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    pub row_bus: u8,
    pub column_bus: u8,
    pub heating: bool,
}

impl Reading {
    /// Snapshot index of the addressed cell, if the buses form a valid address
    pub fn cell_index(&self) -> Option<usize> {
        if self.row_bus as usize >= ROWS {
            return None;
        }
        let base = self.row_bus - self.row_bus % 3;
        let column = self.column_bus.checked_sub(base)?;
        if (column as usize) < COLUMNS {
            Some(self.row_bus as usize * COLUMNS + column as usize)
        } else {
            None
        }
    }
}

type Response = Box<dyn Fn(Reading) -> u16 + Send>;

/// Idle baseline plus, with the heater on, a rise that grows with the
/// module number, so the far corner reads strongest.
pub fn default_response(reading: Reading) -> u16 {
    let index = reading.cell_index().unwrap_or(0);
    let baseline = 1000 + index as u16;
    if reading.heating {
        baseline + 50 * (index / MODULE_CELLS + 1) as u16
    } else {
        baseline
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Idle,
    Status { busy_left: u32, reading: Reading },
    High(u16),
    Low(u8),
}

struct Board {
    row_bus: u8,
    column_bus: u8,
    chip_selected: bool,
    heating: bool,
    filtering: bool,
    phase: Phase,
    busy_polls: u32,
    jammed: Option<usize>,
    heater_stuck: bool,
    response: Response,
    readings: Vec<Reading>,
    elapsed_us: u64,
}

impl Board {
    fn drive(&mut self, line: Line, high: bool) -> Result<(), PinFault> {
        match line {
            Line::Row(bit) => set_bit(&mut self.row_bus, bit, high),
            Line::Column(bit) => set_bit(&mut self.column_bus, bit, high),
            Line::Heater if self.heater_stuck => return Err(PinFault),
            Line::Heater => self.heating = high,
            Line::Filter => self.filtering = high,
            Line::ChipSelect => {
                let selecting = !high && !self.chip_selected;
                self.chip_selected = !high;
                if selecting {
                    self.start_read();
                } else if high {
                    self.phase = Phase::Idle;
                }
            }
        }
        Ok(())
    }

    fn start_read(&mut self) {
        let reading = Reading {
            row_bus: self.row_bus,
            column_bus: self.column_bus,
            heating: self.heating,
        };
        self.readings.push(reading);
        let busy_left = if self.jammed.is_some() && self.jammed == reading.cell_index() {
            u32::MAX
        } else {
            self.busy_polls
        };
        self.phase = Phase::Status { busy_left, reading };
    }

    fn clock_byte(&mut self) -> u8 {
        match self.phase {
            Phase::Idle => 0x00,
            Phase::Status { busy_left, reading } if busy_left > 0 => {
                self.phase = Phase::Status {
                    busy_left: busy_left - 1,
                    reading,
                };
                BUSY_BYTE
            }
            Phase::Status { reading, .. } => {
                self.phase = Phase::High((self.response)(reading));
                0x00
            }
            Phase::High(sample) => {
                self.phase = Phase::Low(sample as u8);
                (sample >> 8) as u8
            }
            Phase::Low(lsb) => {
                self.phase = Phase::Idle;
                lsb
            }
        }
    }
}

fn set_bit(bus: &mut u8, bit: u8, high: bool) {
    if high {
        *bus |= 1 << bit;
    } else {
        *bus &= !(1 << bit);
    }
}

#[derive(Debug, Clone, Copy)]
enum Line {
    Row(u8),
    Column(u8),
    ChipSelect,
    Heater,
    Filter,
}

/// Shared handle to the virtual board. Clones see the same board.
#[derive(Clone)]
pub struct SimBoard {
    board: Arc<Mutex<Board>>,
}

impl SimBoard {
    pub fn new() -> Self {
        Self::with_response(default_response)
    }

    pub fn with_response<F>(response: F) -> Self
    where
        F: Fn(Reading) -> u16 + Send + 'static,
    {
        Self {
            board: Arc::new(Mutex::new(Board {
                row_bus: 0,
                column_bus: 0,
                chip_selected: false,
                heating: false,
                filtering: false,
                phase: Phase::Idle,
                busy_polls: 2,
                jammed: None,
                heater_stuck: false,
                response: Box::new(response),
                readings: Vec::new(),
                elapsed_us: 0,
            })),
        }
    }

    /// Wires a full rig to this board.
    pub fn rig(&self) -> Result<SimRig, Error> {
        let bus = |line: fn(u8) -> Line| {
            SelectorBus::new([0, 1, 2, 3].map(|bit| self.pin(line(bit))))
        };
        let mux = Multiplexer::new(bus(Line::Row), bus(Line::Column));
        let reader = ChannelReader::new(
            SimSpi { board: self.clone() },
            self.pin(Line::ChipSelect),
            SimDelay { board: self.clone() },
        )?;
        Rig::new(
            ArrayScanner::new(mux, reader),
            self.pin(Line::Heater),
            self.pin(Line::Filter),
        )
    }

    /// Busy bytes the converter sends before each ready byte
    pub fn set_busy_polls(&self, polls: u32) {
        self.lock().busy_polls = polls;
    }

    /// Leaves the converter busy forever whenever this cell is addressed
    pub fn jam_cell(&self, row: u8, column: u8) {
        self.lock().jammed = Some(row as usize * COLUMNS + column as usize);
    }

    pub fn clear_jam(&self) {
        self.lock().jammed = None;
    }

    /// While stuck, driving the heater pin fails and leaves it as it was
    pub fn stick_heater(&self, stuck: bool) {
        self.lock().heater_stuck = stuck;
    }

    pub fn heating(&self) -> bool {
        self.lock().heating
    }

    pub fn filtering(&self) -> bool {
        self.lock().filtering
    }

    pub fn chip_selected(&self) -> bool {
        self.lock().chip_selected
    }

    /// Every read cycle started so far, oldest first
    pub fn readings(&self) -> Vec<Reading> {
        self.lock().readings.clone()
    }

    pub fn clear_readings(&self) {
        self.lock().readings.clear();
    }

    /// Total time spent in delays, in microseconds
    pub fn elapsed_us(&self) -> u64 {
        self.lock().elapsed_us
    }

    fn pin(&self, line: Line) -> SimPin {
        SimPin {
            board: self.clone(),
            line,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Board> {
        self.board.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SimBoard {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SimPin {
    board: SimBoard,
    line: Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinFault;

impl OutputPin for SimPin {
    type Error = PinFault;

    fn set_low(&mut self) -> Result<(), PinFault> {
        self.board.lock().drive(self.line, false)
    }

    fn set_high(&mut self) -> Result<(), PinFault> {
        self.board.lock().drive(self.line, true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotSelected;

pub struct SimSpi {
    board: SimBoard,
}

impl Transfer<u8> for SimSpi {
    type Error = NotSelected;

    fn transfer<'w>(&mut self, words: &'w mut [u8]) -> Result<&'w [u8], NotSelected> {
        let mut board = self.board.lock();
        if !board.chip_selected {
            return Err(NotSelected);
        }
        for word in words.iter_mut() {
            *word = board.clock_byte();
        }
        Ok(words)
    }
}

/// Records delays instead of sleeping
pub struct SimDelay {
    board: SimBoard,
}

impl DelayMs<u8> for SimDelay {
    fn delay_ms(&mut self, ms: u8) {
        self.board.lock().elapsed_us += ms as u64 * 1000;
    }
}

impl DelayUs<u16> for SimDelay {
    fn delay_us(&mut self, us: u16) {
        self.board.lock().elapsed_us += us as u64;
    }
}
