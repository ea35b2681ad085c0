#![cfg_attr(not(any(test, feature = "std")), no_std)]

//! Rig-side acquisition: addressing a cell through the two selector buses,
//! reading it over SPI, scanning the whole array and answering the host's
//! commands.
//!
//! Everything here is generic over `embedded-hal` traits; the hardware is
//! owned by a [`rig::Rig`] handle rather than living in globals.

pub mod consts {
    /// Byte the converter returns while a conversion is still running
    pub const BUSY_BYTE: u8 = 0x10;
    /// Polls of a busy converter before a read is given up
    pub const MAX_BUSY_POLLS: u32 = 10_000;

    /// Discarded reads before the one that is kept
    pub const SETTLING_READS: usize = 2;
    /// Pause after each discarded read, in milliseconds
    pub const SETTLE_DELAY_MS: u8 = 1;

    /// Pause when a command is not recognised, in microseconds
    pub const IDLE_DELAY_US: u16 = 100;

    /// Port the rig listens on
    pub const LISTEN_PORT: u16 = 54080;
}

pub mod channel;
pub mod error;
pub mod mux;
pub mod rig;
pub mod scanner;

#[cfg(feature = "std")]
pub mod session;
#[cfg(feature = "std")]
pub mod sim;

pub use error::{Error, ScanFailed};
