use std::convert::TryFrom;

use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown protocol code {0}")]
pub struct UnknownCode(pub u8);

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Mode {
    Smart,
    Cool,
    Heat,
    Fan,
    Dry,
}

impl TryFrom<u8> for Mode {
    type Error = UnknownCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Mode::Smart),
            1 => Ok(Mode::Cool),
            2 => Ok(Mode::Heat),
            3 => Ok(Mode::Fan),
            4 => Ok(Mode::Dry),
            _ => Err(UnknownCode(code)),
        }
    }
}

impl From<Mode> for u8 {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Smart => 0,
            Mode::Cool => 1,
            Mode::Heat => 2,
            Mode::Fan => 3,
            Mode::Dry => 4,
        }
    }
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum FanSpeed {
    Max,
    Mid,
    Min,
    Auto,
}

impl TryFrom<u8> for FanSpeed {
    type Error = UnknownCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(FanSpeed::Max),
            1 => Ok(FanSpeed::Mid),
            2 => Ok(FanSpeed::Min),
            3 => Ok(FanSpeed::Auto),
            _ => Err(UnknownCode(code)),
        }
    }
}

impl From<FanSpeed> for u8 {
    fn from(speed: FanSpeed) -> Self {
        match speed {
            FanSpeed::Max => 0,
            FanSpeed::Mid => 1,
            FanSpeed::Min => 2,
            FanSpeed::Auto => 3,
        }
    }
}

/// Louver movement. Displays as the short tokens the store uses.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum Swing {
    #[strum(to_string = "off", serialize = "false")]
    Off,
    #[strum(to_string = "ud", serialize = "up-down")]
    UpDown,
    #[strum(to_string = "lr", serialize = "left-right")]
    LeftRight,
    #[strum(to_string = "both")]
    Both,
}

impl TryFrom<u8> for Swing {
    type Error = UnknownCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Swing::Off),
            1 => Ok(Swing::UpDown),
            2 => Ok(Swing::LeftRight),
            3 => Ok(Swing::Both),
            _ => Err(UnknownCode(code)),
        }
    }
}

impl From<Swing> for u8 {
    fn from(swing: Swing) -> Self {
        match swing {
            Swing::Off => 0,
            Swing::UpDown => 1,
            Swing::LeftRight => 2,
            Swing::Both => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn codes_round_trip() {
        Mode::iter().for_each(|m| assert_eq!(Mode::try_from(u8::from(m)), Ok(m)));
        FanSpeed::iter().for_each(|s| assert_eq!(FanSpeed::try_from(u8::from(s)), Ok(s)));
        Swing::iter().for_each(|s| assert_eq!(Swing::try_from(u8::from(s)), Ok(s)));
        assert_eq!(Mode::try_from(5), Err(UnknownCode(5)));
        assert_eq!(FanSpeed::try_from(4), Err(UnknownCode(4)));
        assert_eq!(Swing::try_from(0x80), Err(UnknownCode(0x80)));
    }

    #[test]
    fn tokens() {
        assert_eq!(Mode::from_str("HEAT"), Ok(Mode::Heat));
        assert_eq!(Mode::Smart.to_string(), "smart");
        assert_eq!(FanSpeed::from_str("Auto"), Ok(FanSpeed::Auto));
        assert_eq!(Swing::from_str("ud"), Ok(Swing::UpDown));
        assert_eq!(Swing::from_str("left-right"), Ok(Swing::LeftRight));
        assert_eq!(Swing::from_str("false"), Ok(Swing::Off));
        assert_eq!(Swing::Both.to_string(), "both");
        assert!(Mode::from_str("warm").is_err());
    }
}
