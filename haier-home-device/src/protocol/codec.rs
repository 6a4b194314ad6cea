use std::convert::TryFrom;

use crate::protocol::frame::CanonicalPayload;
use crate::protocol::types::{FanSpeed, Mode, Swing};
use crate::protocol::{ProtocolError, Result};
use crate::state::DeviceState;

/// Byte offsets into the canonical payload.
pub mod offset {
    pub const TEMPERATURE: usize = 11;
    /// `0x00` on commands, `0x7f` on responses echoed by the unit.
    pub const FRAME_TYPE: usize = 15;
    pub const MODE: usize = 21;
    pub const FAN_SPEED: usize = 23;
    pub const SWING: usize = 25;
    pub const REMOTE_LOCK: usize = 26;
    /// Power, health and compressor share this byte.
    pub const STATUS: usize = 27;
    pub const FRESH_AIR: usize = 29;
    pub const SETPOINT: usize = 33;
}

pub const SETPOINT_MIN: u8 = 16;
pub const SETPOINT_MAX: u8 = 30;

const FRAME_TYPE_COMMAND: u8 = 0x00;

const STATUS_POWER_ON: [u8; 4] = [1, 9, 17, 25];
const STATUS_POWER_OFF: [u8; 2] = [0, 16];
const STATUS_HEALTH: u8 = 25;
const STATUS_COMPRESSOR: u8 = 17;

pub const REMOTE_LOCKED: u8 = 128;

pub fn decode(payload: &CanonicalPayload) -> DeviceState {
    let status = payload.byte(offset::STATUS);
    DeviceState {
        temperature: Some(payload.byte(offset::TEMPERATURE)),
        mode: Mode::try_from(payload.byte(offset::MODE)).ok(),
        fan_speed: FanSpeed::try_from(payload.byte(offset::FAN_SPEED)).ok(),
        swing: Swing::try_from(payload.byte(offset::SWING)).ok(),
        remote_locked: Some(payload.byte(offset::REMOTE_LOCK) != 0),
        fresh_air: Some(payload.byte(offset::FRESH_AIR) != 0),
        setpoint: Some(u16::from(payload.byte(offset::SETPOINT)) + u16::from(SETPOINT_MIN)),
        power: if STATUS_POWER_ON.contains(&status) {
            Some(true)
        } else if STATUS_POWER_OFF.contains(&status) {
            Some(false)
        } else {
            None
        },
        health: Some(status == STATUS_HEALTH),
        compressor: Some(status == STATUS_COMPRESSOR),
    }
}

/// Fixed 10-byte commands that don't depend on the unit's current state.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum CannedCommand {
    Query,
    PowerOn,
    PowerOff,
    HealthOn,
    HealthOff,
}

impl CannedCommand {
    pub const fn payload(&self) -> [u8; 10] {
        let code = match self {
            CannedCommand::Query => 1,
            CannedCommand::PowerOn => 2,
            CannedCommand::PowerOff => 3,
            CannedCommand::HealthOff => 8,
            CannedCommand::HealthOn => 9,
        };
        [10, 0, 0, 0, 0, 0, 1, 1, 77, code]
    }
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum MutableField {
    Mode,
    FanSpeed,
    Swing,
    RemoteLock,
    FreshAir,
    Setpoint,
}

impl MutableField {
    pub const fn offset(&self) -> usize {
        match self {
            MutableField::Mode => offset::MODE,
            MutableField::FanSpeed => offset::FAN_SPEED,
            MutableField::Swing => offset::SWING,
            MutableField::RemoteLock => offset::REMOTE_LOCK,
            MutableField::FreshAir => offset::FRESH_AIR,
            MutableField::Setpoint => offset::SETPOINT,
        }
    }
}

/// One field patched into the last received payload. A `code` of `None`
/// means the requested value wasn't recognized and the byte is left alone.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct Mutation {
    pub field: MutableField,
    pub code: Option<u8>,
}

impl Mutation {
    pub fn apply(&self, template: &CanonicalPayload) -> CanonicalPayload {
        let mut payload = *template;
        if let Some(code) = self.code {
            payload.0[self.field.offset()] = code;
        }
        payload.0[offset::FRAME_TYPE] = FRAME_TYPE_COMMAND;
        payload
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum OutgoingCommand {
    Canned(CannedCommand),
    Mutation(Mutation),
    Raw(Vec<u8>),
}

impl OutgoingCommand {
    /// Payload to frame and send. Mutations need the last payload received
    /// from the unit.
    pub fn payload(&self, template: Option<&CanonicalPayload>) -> Result<Vec<u8>> {
        match self {
            OutgoingCommand::Canned(canned) => Ok(canned.payload().to_vec()),
            OutgoingCommand::Mutation(mutation) => template
                .map(|t| mutation.apply(t).0.to_vec())
                .ok_or(ProtocolError::NoTemplate),
            OutgoingCommand::Raw(bytes) => Ok(bytes.clone()),
        }
    }
}
