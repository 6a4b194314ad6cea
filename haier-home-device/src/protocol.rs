//! Wire protocol spoken by the unit through its serial-to-network gateway.
//!
//! Inbound chunks are normalized into a [`CanonicalPayload`](frame::CanonicalPayload),
//! decoded by [`codec::decode`], and outbound payloads are wrapped into a
//! [`WireFrame`](frame::WireFrame) before being written to the socket.

pub mod codec;
pub mod frame;
pub mod types;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error(transparent)]
    FrameLength(#[from] frame::FrameLengthError),
    #[error("No frame received yet to use as a command template")]
    NoTemplate,
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
