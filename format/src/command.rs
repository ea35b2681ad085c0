#[cfg(feature = "defmt_impl")]
use defmt::Format;

pub const HEATING_OFF: &str = "heating_off";
pub const DATA1: &str = "data1";
pub const DATA2: &str = "data2";

/// A command the rig acts on. Tokens that don't map to a command
/// are still valid on the wire; the rig just idles on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt_impl", derive(Format))]
pub enum Command {
    /// Switch the heater off
    HeatingOff,
    /// Scan, then switch the heater back on
    Data1,
    /// Scan, heater untouched
    Data2,
}

impl Command {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            HEATING_OFF => Some(Self::HeatingOff),
            DATA1 => Some(Self::Data1),
            DATA2 => Some(Self::Data2),
            _ => None,
        }
    }

    pub const fn token(&self) -> &'static str {
        match self {
            Self::HeatingOff => HEATING_OFF,
            Self::Data1 => DATA1,
            Self::Data2 => DATA2,
        }
    }

    /// Whether the rig answers this command with a snapshot
    pub const fn expects_response(&self) -> bool {
        matches!(self, Self::Data1 | Self::Data2)
    }
}
