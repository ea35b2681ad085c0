use core::fmt::Write;
use core::ops::{Deref, DerefMut};

use heapless::String;
use thiserror::Error;

use crate::CELL_COUNT;

/// Leading tag of a snapshot response
pub const RESPONSE_PREFIX: &str = "str";
/// Trailing tag of a snapshot response
pub const RESPONSE_TERMINATOR: &str = "end";

/// Bytes the host drops from the front of a response
pub const STRIP_LEADING: usize = 3;
/// Bytes the host drops from the back of a response: the
/// separator after the last value plus the terminator.
pub const STRIP_TRAILING: usize = 4;

/// Enough for 45 five-digit values with separators, prefix and terminator
pub const RESPONSE_CAPACITY: usize = 320;

pub type ResponseText = String<RESPONSE_CAPACITY>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MalformedResponse {
    #[error("response of {len} bytes is too short to hold prefix and terminator")]
    TooShort { len: usize },
    #[error("response body is not valid text at the trim boundaries")]
    NotText,
    #[error("value {index} is not an unsigned 16-bit integer")]
    InvalidValue { index: usize },
    #[error("expected {expected} values, found {found}")]
    WrongCount { expected: usize, found: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("snapshot does not fit in {} bytes", RESPONSE_CAPACITY)]
pub struct EncodeOverflow;

/// One reading per addressed cell, in scan order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct RawSnapshot(pub [u16; CELL_COUNT]);

impl RawSnapshot {
    pub const fn size() -> usize {
        CELL_COUNT
    }

    /// Renders the snapshot as `str<v0>.<v1>. ... .<v44>.end`
    pub fn encode(&self) -> Result<ResponseText, EncodeOverflow> {
        let mut text = ResponseText::new();
        text.push_str(RESPONSE_PREFIX).map_err(|_| EncodeOverflow)?;
        for value in self.iter() {
            write!(text, "{}.", value).map_err(|_| EncodeOverflow)?;
        }
        text.push_str(RESPONSE_TERMINATOR)
            .map_err(|_| EncodeOverflow)?;
        Ok(text)
    }

    pub fn decode(text: &str) -> Result<Self, MalformedResponse> {
        decode_values::<CELL_COUNT>(text).map(Self)
    }
}

impl Default for RawSnapshot {
    fn default() -> Self {
        Self([0u16; CELL_COUNT])
    }
}

impl Deref for RawSnapshot {
    type Target = [u16; CELL_COUNT];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for RawSnapshot {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// Drops the first [`STRIP_LEADING`] and last [`STRIP_TRAILING`] characters
/// and parses the rest as exactly `N` dot-separated decimal values.
/// The prefix and terminator contents are not checked.
///
/// The trim counts bytes, not chars: the rig only sends ASCII, and a
/// multi-byte char straddling a trim boundary is rejected as `NotText`.
pub fn decode_values<const N: usize>(text: &str) -> Result<[u16; N], MalformedResponse> {
    let len = text.len();
    if len < STRIP_LEADING + STRIP_TRAILING {
        return Err(MalformedResponse::TooShort { len });
    }
    let body = text
        .get(STRIP_LEADING..len - STRIP_TRAILING)
        .ok_or(MalformedResponse::NotText)?;

    let mut values = [0u16; N];
    let mut found = 0;
    for (index, part) in body.split('.').enumerate() {
        found += 1;
        if index >= N {
            continue;
        }
        values[index] = part
            .parse()
            .map_err(|_| MalformedResponse::InvalidValue { index })?;
    }

    if found != N {
        return Err(MalformedResponse::WrongCount { expected: N, found });
    }
    Ok(values)
}
