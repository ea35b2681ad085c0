//! Host side of the gas-tracking rig: connect to the rig, run acquisition
//! cycles and turn each pair of snapshots into a frame, concentrations and
//! a bearing.

pub mod cancel;
pub mod cmd;
pub mod config;
pub mod error;
pub mod link;
pub mod orchestrator;
pub mod report;
pub mod store;

#[cfg(feature = "python")]
mod python_wrappers;
#[cfg(feature = "python")]
pub use python_wrappers::*;

pub use cancel::CancelToken;
pub use config::Config;
pub use error::{Error, Result};
pub use link::{CommandChannel, ConnectOptions, Link};
pub use orchestrator::{Event, Orchestrator, State};
pub use report::{FrameProcessor, FrameReport};

use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, error};

/// Connects on its own thread and hands the link to `orchestrator` once up.
/// Progress is reported on `events`; a final failure as one more
/// [`Event::ConnectionFailed`].
pub fn connect_in_background(
    options: ConnectOptions,
    orchestrator: Arc<Orchestrator<Link>>,
    events: Sender<Event>,
    cancel: CancelToken,
) -> JoinHandle<()> {
    thread::spawn(move || match link::connect(&options, &cancel, &events) {
        Ok(link) => orchestrator.attach(link),
        Err(Error::Cancelled) => debug!("connect cancelled"),
        Err(e) => {
            error!(error = %e, "giving up on the rig");
            events.send(Event::ConnectionFailed(e.to_string())).ok();
        }
    })
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub mod consts {
    use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
    use std::time::Duration;

    use gastrack_firmware::consts::LISTEN_PORT;

    pub const RIG_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 8, 165);

    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const CONNECT_BACKOFF: Duration = Duration::from_secs(1);
    pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

    pub const SETTLE: Duration = Duration::from_millis(4950);
    pub const BETWEEN_SCANS: Duration = Duration::from_millis(100);
    pub const REST: Duration = Duration::from_millis(4950);

    pub fn default_address() -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(RIG_IP, LISTEN_PORT))
    }
}
