use std::convert::TryFrom;
use std::fmt::{Display, Formatter};

use itertools::Itertools;
use thiserror::Error;

pub const PAYLOAD_LENGTH: usize = 34;
pub const FRAME_MARKER: [u8; 2] = [0xff, 0xff];

// first byte of every full state payload
const LENGTH_MARKER: u8 = PAYLOAD_LENGTH as u8;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unexpected chunk length {0}")]
pub struct FrameLengthError(pub usize);

/// The 34-byte full state payload every decode and mutation works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanonicalPayload(pub [u8; PAYLOAD_LENGTH]);

impl CanonicalPayload {
    pub fn byte(&self, offset: usize) -> u8 {
        self.0[offset]
    }

    /// Reduces a chunk as delivered by the gateway to the canonical payload.
    ///
    /// Depending on the gateway firmware a chunk carries some or all of the
    /// `ff ff` marker in front of the payload, and always the checksum byte
    /// behind it. Gateways delivering 34 or 33 bytes have lost the length
    /// byte (and one header byte) as well; the first header byte they do carry
    /// is cleared and the missing ones are zero padded.
    pub fn normalize(chunk: &[u8]) -> Result<CanonicalPayload, FrameLengthError> {
        let padded;
        let window = match chunk.len() {
            37 => &chunk[2..36],
            36 => &chunk[1..35],
            35 => &chunk[..34],
            len @ (33 | 34) => {
                let missing = PAYLOAD_LENGTH + 1 - len;
                let mut buf = vec![0u8; missing];
                buf.extend_from_slice(chunk);
                buf[missing] = 0;
                buf[0] = LENGTH_MARKER;
                padded = buf;
                &padded[..PAYLOAD_LENGTH]
            }
            len => return Err(FrameLengthError(len)),
        };
        Self::try_from(window)
    }
}

impl TryFrom<&[u8]> for CanonicalPayload {
    type Error = FrameLengthError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        <[u8; PAYLOAD_LENGTH]>::try_from(bytes)
            .map(CanonicalPayload)
            .map_err(|_| FrameLengthError(bytes.len()))
    }
}

impl AsRef<[u8]> for CanonicalPayload {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

pub fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}

/// `ff ff`, the payload, then the checksum byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WireFrame(pub Vec<u8>);

impl WireFrame {
    pub fn encode<T: AsRef<[u8]>>(payload: T) -> WireFrame {
        let payload = payload.as_ref();
        let mut bytes = Vec::with_capacity(payload.len() + FRAME_MARKER.len() + 1);
        bytes.extend_from_slice(&FRAME_MARKER);
        bytes.extend_from_slice(payload);
        bytes.push(checksum(payload));
        WireFrame(bytes)
    }

    pub fn payload(&self) -> &[u8] {
        &self.0[FRAME_MARKER.len()..self.0.len() - 1]
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for WireFrame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Display for WireFrame {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", to_hex(&self.0))
    }
}

pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).join("")
}

/// Reads pairs of hex digits, skipping pairs that aren't valid hex.
///
/// A pair is skipped as a whole, so `0z` yields nothing rather than `0`.
pub fn bytes_from_hex(text: &str) -> Vec<u8> {
    text.as_bytes()
        .chunks(2)
        .filter_map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|digits| u8::from_str_radix(digits, 16).ok())
        })
        .collect()
}
