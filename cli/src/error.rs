use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use gastrack_format::frame::FrameError;
use gastrack_format::MalformedResponse;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("connecting to {address} timed out after {timeout:?}")]
    ConnectTimeout { address: SocketAddr, timeout: Duration },

    #[error("could not connect to {address}: {source}")]
    Connect {
        address: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("gave up connecting after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("cancelled")]
    Cancelled,

    #[error("link error: {0}")]
    Io(#[from] io::Error),

    #[error("no response from the rig within {0:?}")]
    ResponseTimeout(Duration),

    #[error("the rig closed the link")]
    LinkClosed,

    #[error("the rig could not read row {row}, column {column}")]
    ScanFailed { row: u8, column: u8 },

    #[error("the rig could not switch its heater {}", on_off(.on))]
    HeaterFault { on: bool },

    #[error("malformed response: {0}")]
    MalformedResponse(#[from] MalformedResponse),

    #[error("the rig never answers `{command}`")]
    UnexpectedResponse { command: &'static str },

    #[error("framing error: {0}")]
    Frame(#[from] FrameError),

    #[error("not connected to the rig")]
    NotConnected,

    #[error("invalid configuration: {0}")]
    Config(String),
}

fn on_off(on: &bool) -> &'static str {
    if *on {
        "on"
    } else {
        "off"
    }
}

impl Error {
    /// Whether the link is left in an unknown state and must be reopened
    pub fn is_link_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::LinkClosed | Self::ResponseTimeout(_)
        )
    }
}
