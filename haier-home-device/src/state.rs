use std::fmt;

use strum_macros::Display;

use crate::protocol::types::{FanSpeed, Mode, Swing};

/// Field ids published to the state store.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Display)]
pub enum Field {
    #[strum(to_string = "temp")]
    Temperature,
    #[strum(to_string = "mode")]
    Mode,
    #[strum(to_string = "fanspeed")]
    FanSpeed,
    #[strum(to_string = "swing")]
    Swing,
    #[strum(to_string = "lockremote")]
    RemoteLocked,
    #[strum(to_string = "fresh")]
    FreshAir,
    #[strum(to_string = "settemp")]
    Setpoint,
    #[strum(to_string = "power")]
    Power,
    #[strum(to_string = "health")]
    Health,
    #[strum(to_string = "compressor")]
    Compressor,
    #[strum(to_string = "connection")]
    Connection,
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum StateValue {
    Bool(bool),
    Number(i64),
    Text(String),
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Bool(b) => write!(f, "{}", b),
            StateValue::Number(n) => write!(f, "{}", n),
            StateValue::Text(t) => write!(f, "{}", t),
        }
    }
}

/// A single (field, value) pair handed to the state store.
///
/// `ack` is set when the value was reported by the unit itself rather than
/// requested locally.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct StateUpdate {
    pub field: Field,
    pub value: StateValue,
    pub ack: bool,
}

impl StateUpdate {
    pub fn reported(field: Field, value: StateValue) -> StateUpdate {
        StateUpdate {
            field,
            value,
            ack: true,
        }
    }

    pub fn connection(connected: bool) -> StateUpdate {
        Self::reported(Field::Connection, StateValue::Bool(connected))
    }
}

/// Snapshot decoded from one payload. Fields the payload carried an unknown
/// code for stay `None` and are never published.
///
/// Power, health and compressor share one byte on the wire and are decoded
/// independently of each other, so combinations like health without power
/// can show up.
#[derive(Clone, Debug, Default, Hash, Eq, PartialEq)]
pub struct DeviceState {
    pub temperature: Option<u8>,
    pub mode: Option<Mode>,
    pub fan_speed: Option<FanSpeed>,
    pub swing: Option<Swing>,
    pub remote_locked: Option<bool>,
    pub fresh_air: Option<bool>,
    pub setpoint: Option<u16>,
    pub power: Option<bool>,
    pub health: Option<bool>,
    pub compressor: Option<bool>,
}

impl DeviceState {
    pub fn empty() -> DeviceState {
        DeviceState::default()
    }

    pub fn get(&self, field: Field) -> Option<StateValue> {
        match field {
            Field::Temperature => self.temperature.map(|t| StateValue::Number(t.into())),
            Field::Mode => self.mode.map(|m| StateValue::Text(m.to_string())),
            Field::FanSpeed => self.fan_speed.map(|s| StateValue::Text(s.to_string())),
            Field::Swing => self.swing.map(|s| StateValue::Text(s.to_string())),
            Field::RemoteLocked => self.remote_locked.map(StateValue::Bool),
            Field::FreshAir => self.fresh_air.map(StateValue::Bool),
            Field::Setpoint => self.setpoint.map(|s| StateValue::Number(s.into())),
            Field::Power => self.power.map(StateValue::Bool),
            Field::Health => self.health.map(StateValue::Bool),
            Field::Compressor => self.compressor.map(StateValue::Bool),
            Field::Connection => None,
        }
    }

    pub fn values(&self) -> Vec<(Field, StateValue)> {
        Self::FIELDS
            .iter()
            .filter_map(|field| self.get(*field).map(|value| (*field, value)))
            .collect()
    }

    /// Updates for every present field whose value differs from `previous`.
    pub fn diff(&self, previous: &DeviceState) -> Vec<StateUpdate> {
        self.values()
            .into_iter()
            .filter(|(field, value)| previous.get(*field).as_ref() != Some(value))
            .map(|(field, value)| StateUpdate::reported(field, value))
            .collect()
    }

    const FIELDS: [Field; 10] = [
        Field::Temperature,
        Field::Mode,
        Field::FanSpeed,
        Field::Swing,
        Field::RemoteLocked,
        Field::FreshAir,
        Field::Setpoint,
        Field::Power,
        Field::Health,
        Field::Compressor,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> DeviceState {
        DeviceState {
            temperature: Some(24),
            mode: Some(Mode::Cool),
            fan_speed: Some(FanSpeed::Auto),
            swing: Some(Swing::Off),
            remote_locked: Some(false),
            fresh_air: Some(false),
            setpoint: Some(22),
            power: Some(true),
            health: Some(false),
            compressor: Some(true),
        }
    }

    #[test]
    fn first_diff_reports_every_present_field() {
        let updates = state().diff(&DeviceState::empty());
        assert_eq!(updates.len(), 10);
        assert!(updates.iter().all(|u| u.ack));
        assert_eq!(
            updates[1],
            StateUpdate::reported(Field::Mode, StateValue::Text("cool".into()))
        );

        let partial = DeviceState {
            power: None,
            ..state()
        };
        let updates = partial.diff(&DeviceState::empty());
        assert_eq!(updates.len(), 9);
        assert!(updates.iter().all(|u| u.field != Field::Power));
    }

    #[test]
    fn unchanged_state_reports_nothing() {
        assert!(state().diff(&state()).is_empty());
    }

    #[test]
    fn reports_only_changed_fields() {
        let next = DeviceState {
            setpoint: Some(25),
            swing: Some(Swing::Both),
            ..state()
        };
        assert_eq!(
            next.diff(&state()),
            vec![
                StateUpdate::reported(Field::Swing, StateValue::Text("both".into())),
                StateUpdate::reported(Field::Setpoint, StateValue::Number(25)),
            ]
        );
    }

    #[test]
    fn field_ids() {
        assert_eq!(Field::Temperature.to_string(), "temp");
        assert_eq!(Field::RemoteLocked.to_string(), "lockremote");
        assert_eq!(Field::Connection.to_string(), "connection");
        assert_ne!(state(), DeviceState::empty());
    }
}
