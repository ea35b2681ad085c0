//! Host end of the rig link: connect with retry, then request/response
//! over COBS-framed postcard messages.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};

use gastrack_format::frame::{write_frame, REQUEST_FRAME_SIZE, RESPONSE_FRAME_SIZE};
use gastrack_format::{Command, HostToRig, RawSnapshot, RigToHost};
use postcard::{CobsAccumulator, FeedResult};
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::consts;
use crate::error::{Error, Result};
use crate::orchestrator::Event;

/// What the acquisition cycle needs from a link. [`Link`] is the TCP one.
pub trait CommandChannel: Send {
    /// Sends a command the rig does not answer.
    fn send(&mut self, command: Command) -> Result<()>;

    /// Sends a command and waits for the snapshot it produces.
    fn fetch_snapshot(&mut self, command: Command) -> Result<RawSnapshot>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectOptions {
    pub address: SocketAddr,
    pub timeout: Duration,
    pub backoff: Duration,
    /// `None` keeps retrying until cancelled
    pub max_attempts: Option<u32>,
    pub response_timeout: Duration,
}

impl ConnectOptions {
    pub fn new(address: SocketAddr) -> Self {
        Self {
            address,
            timeout: consts::CONNECT_TIMEOUT,
            backoff: consts::CONNECT_BACKOFF,
            max_attempts: None,
            response_timeout: consts::RESPONSE_TIMEOUT,
        }
    }
}

/// Connects to the rig, retrying with a fixed backoff. Each failed attempt
/// is reported as [`Event::ConnectionFailed`], success as [`Event::Connected`].
pub fn connect(options: &ConnectOptions, cancel: &CancelToken, events: &Sender<Event>) -> Result<Link> {
    let mut attempts = 0u32;
    loop {
        cancel.check()?;
        attempts += 1;
        debug!(address = %options.address, attempt = attempts, "connecting");

        let failure = match TcpStream::connect_timeout(&options.address, options.timeout) {
            Ok(stream) => {
                let link = Link::new(stream, options.response_timeout)?;
                info!(address = %options.address, "connected to rig");
                events.send(Event::Connected).ok();
                return Ok(link);
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                Error::ConnectTimeout {
                    address: options.address,
                    timeout: options.timeout,
                }
            }
            Err(source) => Error::Connect {
                address: options.address,
                source,
            },
        };

        warn!(attempt = attempts, error = %failure, "connect failed");
        events.send(Event::ConnectionFailed(failure.to_string())).ok();

        if options.max_attempts.map_or(false, |max| attempts >= max) {
            return Err(Error::RetriesExhausted { attempts });
        }
        cancel.sleep(options.backoff)?;
    }
}

pub struct Link {
    stream: TcpStream,
    accumulator: CobsAccumulator<RESPONSE_FRAME_SIZE>,
    /// Bytes read past the end of the last response
    pending: Vec<u8>,
    tx_buf: [u8; REQUEST_FRAME_SIZE],
    response_timeout: Duration,
}

impl Link {
    pub fn new(stream: TcpStream, response_timeout: Duration) -> Result<Self> {
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            accumulator: CobsAccumulator::new(),
            pending: Vec::new(),
            tx_buf: [0u8; REQUEST_FRAME_SIZE],
            response_timeout,
        })
    }

    pub fn peer_addr(&self) -> Result<SocketAddr> {
        Ok(self.stream.peer_addr()?)
    }

    /// Sends any token, known to the rig or not.
    pub fn send_message(&mut self, msg: &HostToRig) -> Result<()> {
        let frame = write_frame(msg, &mut self.tx_buf)?;
        self.stream.write_all(frame)?;
        self.stream.flush()?;
        Ok(())
    }

    /// Waits for the next complete message, up to the response timeout.
    pub fn receive(&mut self) -> Result<RigToHost> {
        let deadline = Instant::now() + self.response_timeout;
        let mut chunk = [0u8; 128];
        let mut input = std::mem::take(&mut self.pending);
        loop {
            let mut window = &input[..];
            while !window.is_empty() {
                window = match self.accumulator.feed::<RigToHost>(window) {
                    FeedResult::Consumed => break,
                    FeedResult::OverFull(rest) => {
                        warn!("oversized frame from rig, dropping it");
                        rest
                    }
                    FeedResult::DeserError(rest) => {
                        warn!("undecodable frame from rig, dropping it");
                        rest
                    }
                    FeedResult::Success { data, remaining } => {
                        self.pending = remaining.to_vec();
                        return Ok(data);
                    }
                };
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(Error::ResponseTimeout(self.response_timeout));
            }
            self.stream.set_read_timeout(Some(deadline - now))?;
            let len = match self.stream.read(&mut chunk) {
                Ok(0) => return Err(Error::LinkClosed),
                Ok(len) => len,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => 0,
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                    return Err(Error::ResponseTimeout(self.response_timeout));
                }
                Err(e) => return Err(e.into()),
            };
            input = chunk[..len].to_vec();
        }
    }

    pub fn into_inner(self) -> TcpStream {
        self.stream
    }
}

impl CommandChannel for Link {
    fn send(&mut self, command: Command) -> Result<()> {
        debug!(command = command.token(), "sending");
        self.send_message(&HostToRig::from(command))
    }

    fn fetch_snapshot(&mut self, command: Command) -> Result<RawSnapshot> {
        if !command.expects_response() {
            return Err(Error::UnexpectedResponse {
                command: command.token(),
            });
        }
        self.send(command)?;
        // A failed `heating_off` shows up ahead of the reply it precedes
        let mut heater_fault = false;
        loop {
            match self.receive()? {
                RigToHost::HeaterFault { on: false } => {
                    warn!("rig could not switch its heater off");
                    heater_fault = true;
                }
                RigToHost::HeaterFault { on: true } => return Err(Error::HeaterFault { on: true }),
                RigToHost::ScanFailed { row, column } => return Err(Error::ScanFailed { row, column }),
                RigToHost::Snapshot(_) if heater_fault => return Err(Error::HeaterFault { on: false }),
                RigToHost::Snapshot(text) => return Ok(RawSnapshot::decode(&text)?),
            }
        }
    }
}
