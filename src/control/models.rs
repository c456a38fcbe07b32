use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ControlError;

// ---------------------------------------------------------------------------
// Switch
// ---------------------------------------------------------------------------

/// Two-state value of a single actuator channel.
///
/// Serialised as the exact tokens `"ON"` / `"OFF"` the device firmware expects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Switch {
    On,
    #[default]
    Off,
}

impl Switch {
    pub fn is_on(self) -> bool {
        self == Switch::On
    }
}

impl From<bool> for Switch {
    fn from(on: bool) -> Self {
        if on {
            Switch::On
        } else {
            Switch::Off
        }
    }
}

impl FromStr for Switch {
    type Err = ();

    /// Case-sensitive: `"on"` is not a valid token.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ON" => Ok(Switch::On),
            "OFF" => Ok(Switch::Off),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Switch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Switch::On => "ON",
            Switch::Off => "OFF",
        })
    }
}

// ---------------------------------------------------------------------------
// ActuatorState
// ---------------------------------------------------------------------------

/// Combined state of the three actuator channels.
///
/// This is both the cached state and the exact JSON published on the control
/// topic: `{"led1":"ON","led2":"OFF","led3":"ON"}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ActuatorState {
    pub led1: Switch,
    pub led2: Switch,
    pub led3: Switch,
}

// ---------------------------------------------------------------------------
// ActuatorCommand
// ---------------------------------------------------------------------------

/// Unvalidated request body for `POST /api/led`.
///
/// Values are kept as raw strings so an unknown token is reported as a client
/// error naming the channel, rather than as a generic deserialisation failure.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ActuatorCommand {
    #[serde(alias = "ch1")]
    pub led1: Option<String>,
    #[serde(alias = "ch2")]
    pub led2: Option<String>,
    #[serde(alias = "ch3")]
    pub led3: Option<String>,
}

impl TryFrom<&ActuatorCommand> for ActuatorState {
    type Error = ControlError;

    /// All-or-nothing: the first invalid channel rejects the whole command.
    fn try_from(cmd: &ActuatorCommand) -> Result<Self, Self::Error> {
        Ok(Self {
            led1: channel("led1", cmd.led1.as_deref())?,
            led2: channel("led2", cmd.led2.as_deref())?,
            led3: channel("led3", cmd.led3.as_deref())?,
        })
    }
}

fn channel(name: &'static str, value: Option<&str>) -> Result<Switch, ControlError> {
    value
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| ControlError::InvalidToken {
            channel: name,
            value: value.map(str::to_owned),
        })
}
