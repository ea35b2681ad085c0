use thiserror::Error;

/// Hardware faults, with the HAL's own error types erased at the driver boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    #[error("selector pin could not be driven")]
    SelectorPin,
    #[error("chip-select pin could not be driven")]
    ChipSelect,
    #[error("SPI transfer failed")]
    Spi,
    #[error("converter still busy after {polls} polls")]
    ReadTimeout { polls: u32 },
    #[error("heater output could not be driven")]
    Heater,
    #[error("filter output could not be driven")]
    Filter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("scan failed at row {row}, column {column}: {cause}")]
pub struct ScanFailed {
    pub row: u8,
    pub column: u8,
    pub cause: Error,
}
