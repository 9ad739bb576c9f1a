use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Opaque account identifier supplied by the messaging gateway.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity(pub u64);

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Identity {
    type Err = std::num::ParseIntError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value.trim().parse::<u64>().map(Self)
    }
}

/// Account details shown to the administrator when access is requested.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub first_name: String,
    pub last_name: Option<String>,
    pub handle: Option<String>,
}

impl Profile {
    pub fn new(first_name: impl Into<String>) -> Self {
        Self { first_name: first_name.into(), last_name: None, handle: None }
    }

    pub fn with_last_name(mut self, last_name: impl Into<String>) -> Self {
        self.last_name = Some(last_name.into());
        self
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }

    pub fn display_name(&self) -> String {
        match self.last_name.as_deref().map(str::trim).filter(|last| !last.is_empty()) {
            Some(last) => format!("{} {last}", self.first_name.trim()),
            None => self.first_name.trim().to_owned(),
        }
    }

    pub fn handle_label(&self) -> String {
        match self.handle.as_deref().map(str::trim).filter(|handle| !handle.is_empty()) {
            Some(handle) => format!("@{}", handle.trim_start_matches('@')),
            None => "No username".to_owned(),
        }
    }
}
