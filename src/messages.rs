use std::fmt;

use serde_derive::{Deserialize, Serialize};

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Simulation,
    Real,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Simulation => f.write_str("simulation"),
            Mode::Real => f.write_str("real"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectivityState {
    Connected,
    Disconnected,
    Reconnecting,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub from: bool,
    pub to: bool,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", presence_name(self.from), presence_name(self.to))
    }
}

/// Body of `POST /sensor_data`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresenceEvent {
    pub value: u8,
}

impl PresenceEvent {
    pub fn new(present: bool) -> Self {
        PresenceEvent {
            value: present as u8,
        }
    }
}

pub fn presence_name(present: bool) -> &'static str {
    if present { "present" } else { "absent" }
}
