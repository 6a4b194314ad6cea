use std::convert::{Infallible, TryFrom};
use std::fmt;
use std::str::FromStr;

use num_traits::clamp;
use strum_macros::{Display, EnumString};
use thiserror::Error;

use crate::protocol::codec::{
    CannedCommand, MutableField, Mutation, OutgoingCommand, REMOTE_LOCKED, SETPOINT_MAX,
    SETPOINT_MIN,
};
use crate::protocol::frame::bytes_from_hex;
use crate::protocol::types::{FanSpeed, Mode, Swing};
use crate::protocol::ProtocolError;

/// Value of a write request as handed over by the state store.
#[derive(Clone, Debug, PartialEq)]
pub enum RequestValue {
    Bool(bool),
    Number(i64),
    Text(String),
}

impl RequestValue {
    fn as_number(&self) -> Option<i64> {
        match self {
            RequestValue::Bool(b) => Some(i64::from(*b)),
            RequestValue::Number(n) => Some(*n),
            RequestValue::Text(t) => t.trim().parse().ok(),
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            RequestValue::Bool(b) => Some(*b),
            RequestValue::Text(t) => match t.trim().to_lowercase().as_str() {
                "true" | "on" => Some(true),
                "false" | "off" => Some(false),
                _ => self.as_number().and_then(Self::number_as_bool),
            },
            RequestValue::Number(n) => Self::number_as_bool(*n),
        }
    }

    /// The unit reports a locked remote as 128, so that is taken as well.
    fn as_lock(&self) -> Option<bool> {
        match self.as_number() {
            Some(n) if n == i64::from(REMOTE_LOCKED) => Some(true),
            _ => self.as_bool(),
        }
    }

    fn number_as_bool(n: i64) -> Option<bool> {
        match n {
            0 => Some(false),
            1 => Some(true),
            _ => None,
        }
    }

    /// Setpoints may come in as fractional text; the fraction is dropped.
    fn as_setpoint(&self) -> Option<i64> {
        match self {
            RequestValue::Bool(_) => None,
            RequestValue::Number(n) => Some(*n),
            RequestValue::Text(t) => self
                .as_number()
                .or_else(|| t.trim().parse::<f64>().ok().map(|f| f.trunc() as i64)),
        }
    }

    /// Either a numeric protocol code or a symbolic token of `T`.
    fn as_code<T>(&self) -> Option<u8>
    where
        T: FromStr + TryFrom<u8> + Into<u8>,
    {
        match self.as_number() {
            Some(n) => u8::try_from(n)
                .ok()
                .and_then(|code| T::try_from(code).ok())
                .map(Into::into),
            None => match self {
                RequestValue::Text(t) => T::from_str(t.trim()).ok().map(Into::into),
                _ => None,
            },
        }
    }
}

impl FromStr for RequestValue {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "true" => RequestValue::Bool(true),
            "false" => RequestValue::Bool(false),
            _ => s
                .parse()
                .map(RequestValue::Number)
                .unwrap_or_else(|_| RequestValue::Text(s.to_string())),
        })
    }
}

impl fmt::Display for RequestValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestValue::Bool(b) => write!(f, "{}", b),
            RequestValue::Number(n) => write!(f, "{}", n),
            RequestValue::Text(t) => write!(f, "{}", t),
        }
    }
}

/// A (field, value) write request. The field may be a full dotted store id,
/// only its last segment is looked at.
#[derive(Clone, Debug, PartialEq)]
pub struct CommandRequest {
    pub field: String,
    pub value: RequestValue,
}

impl CommandRequest {
    pub fn new<F: Into<String>>(field: F, value: RequestValue) -> CommandRequest {
        CommandRequest {
            field: field.into(),
            value,
        }
    }
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum CommandField {
    #[strum(to_string = "power")]
    Power,
    #[strum(to_string = "health", serialize = "healthmode")]
    Health,
    #[strum(to_string = "mode")]
    Mode,
    #[strum(to_string = "fanspeed", serialize = "fan_speed")]
    FanSpeed,
    #[strum(to_string = "swing")]
    Swing,
    #[strum(to_string = "lockremote", serialize = "remotelocked")]
    RemoteLock,
    #[strum(to_string = "fresh", serialize = "freshair")]
    FreshAir,
    #[strum(to_string = "settemp", serialize = "setpoint")]
    Setpoint,
    #[strum(to_string = "raw")]
    Raw,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("Unknown or read-only field {0}")]
    UnknownField(String),
    #[error("Unrecognized value {value} for {field}")]
    UnrecognizedValue {
        field: CommandField,
        value: RequestValue,
    },
    #[error("Not connected")]
    NotConnected,
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

pub type Result<T> = std::result::Result<T, CommandError>;

/// Maps write requests onto codec commands.
///
/// Unrecognized values for mutation fields still produce a command that
/// leaves the field untouched, unless `strict` is set.
#[derive(Clone, Debug, Default)]
pub struct CommandTranslator {
    strict: bool,
}

impl CommandTranslator {
    pub fn new(strict: bool) -> CommandTranslator {
        CommandTranslator { strict }
    }

    pub fn translate(&self, request: &CommandRequest) -> Result<OutgoingCommand> {
        let name = request.field.rsplit('.').next().unwrap_or_default().trim();
        let field = CommandField::from_str(name)
            .map_err(|_| CommandError::UnknownField(request.field.clone()))?;
        let value = &request.value;

        let mutation = |mutable: MutableField, code: Option<u8>| {
            if code.is_none() {
                if self.strict {
                    return Err(CommandError::UnrecognizedValue {
                        field,
                        value: value.clone(),
                    });
                }
                warn!("unrecognized value {} for {}, sending it unchanged", value, field);
            }
            Ok(OutgoingCommand::Mutation(Mutation {
                field: mutable,
                code,
            }))
        };

        match field {
            CommandField::Power => Ok(OutgoingCommand::Canned(if value.as_bool() == Some(true) {
                CannedCommand::PowerOn
            } else {
                CannedCommand::PowerOff
            })),
            CommandField::Health => Ok(OutgoingCommand::Canned(if value.as_bool() == Some(true) {
                CannedCommand::HealthOn
            } else {
                CannedCommand::HealthOff
            })),
            CommandField::Mode => mutation(MutableField::Mode, value.as_code::<Mode>()),
            CommandField::FanSpeed => mutation(MutableField::FanSpeed, value.as_code::<FanSpeed>()),
            CommandField::Swing => mutation(MutableField::Swing, value.as_code::<Swing>()),
            CommandField::RemoteLock => mutation(
                MutableField::RemoteLock,
                value.as_lock().map(|locked| if locked { REMOTE_LOCKED } else { 0 }),
            ),
            CommandField::FreshAir => mutation(
                MutableField::FreshAir,
                value.as_bool().map(u8::from),
            ),
            CommandField::Setpoint => mutation(
                MutableField::Setpoint,
                value.as_setpoint().map(|requested| {
                    clamp(requested, i64::from(SETPOINT_MIN), i64::from(SETPOINT_MAX)) as u8
                        - SETPOINT_MIN
                }),
            ),
            CommandField::Raw => Ok(OutgoingCommand::Raw(bytes_from_hex(&value.to_string()))),
        }
    }
}
