//! The rig end of the link: a passive responder that serves one host at a time.

use std::io::{self, Read, Write};
use std::net::TcpListener;

use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::blocking::spi::Transfer;
use embedded_hal::digital::v2::OutputPin;
use gastrack_format::frame::{write_frame, REQUEST_FRAME_SIZE, RESPONSE_FRAME_SIZE};
use gastrack_format::HostToRig;
use postcard::{CobsAccumulator, FeedResult};

use crate::rig::Rig;

/// Accepts hosts one after another. While a session runs, later hosts wait
/// in the listen queue until it ends.
pub fn serve<P, SPI, CS, H, D>(listener: &TcpListener, rig: &mut Rig<P, SPI, CS, H, D>) -> io::Result<()>
where
    P: OutputPin,
    SPI: Transfer<u8>,
    CS: OutputPin,
    H: OutputPin,
    D: DelayMs<u8> + DelayUs<u16>,
{
    loop {
        let (stream, peer) = listener.accept()?;
        log::info!("session opened by {}", peer);
        match Session::new(stream).run(rig) {
            Ok(()) => log::info!("session with {} closed", peer),
            Err(e) => log::warn!("session with {} dropped: {}", peer, e),
        }
    }
}

pub struct Session<S> {
    stream: S,
    tx_buf: [u8; RESPONSE_FRAME_SIZE],
}

impl<S: Read + Write> Session<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            tx_buf: [0u8; RESPONSE_FRAME_SIZE],
        }
    }

    /// Answers requests until the host hangs up. Each request is handled
    /// to completion before the next one is read.
    pub fn run<P, SPI, CS, H, D>(&mut self, rig: &mut Rig<P, SPI, CS, H, D>) -> io::Result<()>
    where
        P: OutputPin,
        SPI: Transfer<u8>,
        CS: OutputPin,
        H: OutputPin,
        D: DelayMs<u8> + DelayUs<u16>,
    {
        let mut accumulator = CobsAccumulator::<REQUEST_FRAME_SIZE>::new();
        let mut rx_buf = [0u8; REQUEST_FRAME_SIZE];
        loop {
            let chunk_len = match self.stream.read(&mut rx_buf) {
                Ok(0) => return Ok(()),
                Ok(len) => len,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };

            let mut window = &rx_buf[..chunk_len];
            while !window.is_empty() {
                window = match accumulator.feed::<HostToRig>(window) {
                    FeedResult::Consumed => break,
                    FeedResult::OverFull(rest) => {
                        log::warn!("request too long, dropping it");
                        rest
                    }
                    FeedResult::DeserError(rest) => {
                        log::warn!("undecodable request, dropping it");
                        rest
                    }
                    FeedResult::Success { data, remaining } => {
                        self.respond(rig, &data)?;
                        remaining
                    }
                };
            }
        }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    fn respond<P, SPI, CS, H, D>(&mut self, rig: &mut Rig<P, SPI, CS, H, D>, request: &HostToRig) -> io::Result<()>
    where
        P: OutputPin,
        SPI: Transfer<u8>,
        CS: OutputPin,
        H: OutputPin,
        D: DelayMs<u8> + DelayUs<u16>,
    {
        log::debug!("received {:?}", request.token.as_str());
        if let Some(reply) = rig.handle(request) {
            let frame = write_frame(&reply, &mut self.tx_buf)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            self.stream.write_all(frame)?;
            self.stream.flush()?;
        }
        Ok(())
    }
}
