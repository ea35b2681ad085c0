//! Messages exchanged over the rig link.
//!
//! Every message is serialized with postcard and COBS-encoded, so each
//! frame on the stream ends with exactly one `0x00` byte. Receivers feed
//! whatever they read into a `postcard::CobsAccumulator` and get whole
//! messages back, however the transport chunks them.

#[cfg(feature = "defmt_impl")]
use defmt::Format;
use heapless::String;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::snapshot::ResponseText;
use crate::Command;

pub const TOKEN_CAPACITY: usize = 32;

/// Accumulator/buffer size for host-to-rig frames
pub const REQUEST_FRAME_SIZE: usize = 64;
/// Accumulator/buffer size for rig-to-host frames
pub const RESPONSE_FRAME_SIZE: usize = 384;

pub type Token = String<TOKEN_CAPACITY>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("command token is longer than {} bytes", TOKEN_CAPACITY)]
    TokenTooLong,
    #[error("message does not fit in the frame buffer")]
    Encode,
}

/// A command token, carried verbatim.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt_impl", derive(Format))]
pub struct HostToRig {
    pub token: Token,
}

impl HostToRig {
    pub fn new(token: &str) -> Result<Self, FrameError> {
        let mut t = Token::new();
        t.push_str(token).map_err(|_| FrameError::TokenTooLong)?;
        Ok(Self { token: t })
    }

    pub fn command(&self) -> Option<Command> {
        Command::from_token(&self.token)
    }
}

impl From<Command> for HostToRig {
    fn from(cmd: Command) -> Self {
        let mut token = Token::new();
        // Every command token is shorter than TOKEN_CAPACITY
        token.push_str(cmd.token()).ok();
        Self { token }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt_impl", derive(Format))]
pub enum RigToHost {
    /// Snapshot response text, `str<v0>. ... .<v44>.end`
    Snapshot(ResponseText),
    /// The scan aborted at this cell; no snapshot follows
    ScanFailed { row: u8, column: u8 },
    /// The heater could not be switched `on`/off. With `on: false` this is
    /// the only sign of a failed `heating_off`, and the reply to the next
    /// request still follows. With `on: true` it replaces the reply to `data1`.
    HeaterFault { on: bool },
}

/// Serializes and COBS-encodes `msg` into `buf`, returning the bytes to send.
pub fn write_frame<'a, T: Serialize>(msg: &T, buf: &'a mut [u8]) -> Result<&'a mut [u8], FrameError> {
    postcard::to_slice_cobs(msg, buf).map_err(|_| FrameError::Encode)
}

#[cfg(test)]
mod test {
    use postcard::{CobsAccumulator, FeedResult};

    use super::*;
    use crate::RawSnapshot;

    fn feed_all<T, const N: usize>(acc: &mut CobsAccumulator<N>, mut chunk: &[u8], out: &mut Vec<T>)
    where
        T: serde::de::DeserializeOwned,
    {
        while !chunk.is_empty() {
            chunk = match acc.feed::<T>(chunk) {
                FeedResult::Consumed => break,
                FeedResult::OverFull(rest) => rest,
                FeedResult::DeserError(rest) => rest,
                FeedResult::Success { data, remaining } => {
                    out.push(data);
                    remaining
                }
            };
        }
    }

    #[test]
    fn frames_end_with_single_sentinel() {
        let mut buf = [0u8; REQUEST_FRAME_SIZE];
        let frame = write_frame(&HostToRig::from(Command::HeatingOff), &mut buf).unwrap();
        assert_eq!(frame.last(), Some(&0));
        assert_eq!(frame.iter().filter(|b| **b == 0).count(), 1);
    }

    #[test]
    fn unknown_tokens_travel_verbatim() {
        let msg = HostToRig::new("reboot").unwrap();
        assert_eq!(msg.command(), None);
        assert_eq!(msg.token.as_str(), "reboot");
        assert_eq!(
            HostToRig::new("a token that is far too long for the buffer"),
            Err(FrameError::TokenTooLong)
        );
    }

    #[test]
    fn snapshot_survives_chunked_stream() {
        let mut snapshot = RawSnapshot::default();
        snapshot.iter_mut().enumerate().for_each(|(i, v)| *v = i as u16 * 1000);
        let msg = RigToHost::Snapshot(snapshot.encode().unwrap());

        let mut buf = [0u8; RESPONSE_FRAME_SIZE];
        let bytes = write_frame(&msg, &mut buf).unwrap().to_vec();

        let mut acc = CobsAccumulator::<RESPONSE_FRAME_SIZE>::new();
        let mut received = Vec::new();
        for chunk in bytes.chunks(7) {
            feed_all::<RigToHost, RESPONSE_FRAME_SIZE>(&mut acc, chunk, &mut received);
        }
        assert_eq!(received.len(), 1);
        match &received[0] {
            RigToHost::Snapshot(text) => assert_eq!(RawSnapshot::decode(text), Ok(snapshot)),
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn back_to_back_frames_split_cleanly() {
        let mut stream = Vec::new();
        let mut buf = [0u8; REQUEST_FRAME_SIZE];
        for cmd in [Command::HeatingOff, Command::Data1, Command::Data2] {
            stream.extend_from_slice(write_frame(&HostToRig::from(cmd), &mut buf).unwrap());
        }

        let mut acc = CobsAccumulator::<REQUEST_FRAME_SIZE>::new();
        let mut received: Vec<HostToRig> = Vec::new();
        feed_all::<HostToRig, REQUEST_FRAME_SIZE>(&mut acc, &stream, &mut received);
        let commands: Vec<_> = received.iter().map(|m| m.command()).collect();
        assert_eq!(
            commands,
            [Some(Command::HeatingOff), Some(Command::Data1), Some(Command::Data2)]
        );
    }

    #[test]
    fn heater_fault_precedes_the_next_reply() {
        let mut stream = Vec::new();
        let mut buf = [0u8; RESPONSE_FRAME_SIZE];
        let replies = [
            RigToHost::HeaterFault { on: false },
            RigToHost::ScanFailed { row: 2, column: 0 },
        ];
        for reply in &replies {
            stream.extend_from_slice(write_frame(reply, &mut buf).unwrap());
        }

        let mut acc = CobsAccumulator::<RESPONSE_FRAME_SIZE>::new();
        let mut received: Vec<RigToHost> = Vec::new();
        feed_all::<RigToHost, RESPONSE_FRAME_SIZE>(&mut acc, &stream, &mut received);
        assert_eq!(received, replies);
    }

    #[cfg(feature = "defmt_impl")]
    #[test]
    fn wire_types_derive_defmt_format() {
        fn assert_format<T: defmt::Format>() {}
        assert_format::<Command>();
        assert_format::<HostToRig>();
        assert_format::<RigToHost>();
    }
}
