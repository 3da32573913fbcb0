//! Device interface identifiers (interface class GUIDs).

use serde::Deserialize;
use std::{fmt, str::FromStr};
use thiserror::Error;
use uuid::Uuid;

/// A 128-bit device interface class identifier.
///
/// Text forms are the hyphenated GUID with or without braces, in either
/// case. [`InterfaceId::fields`] yields the platform `GUID` layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct InterfaceId(Uuid);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid interface id '{0}': expected xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx")]
pub struct ParseInterfaceIdError(pub String);

impl InterfaceId {
    /// Build from the identifier's big-endian 128-bit value,
    /// e.g. `InterfaceId::from_u128(0x8e6a6715_9abc_4043_88ef_9e39c6f63e0f)`.
    pub const fn from_u128(v: u128) -> Self {
        Self(Uuid::from_u128(v))
    }

    pub const fn to_u128(self) -> u128 {
        self.0.as_u128()
    }

    pub const fn from_fields(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Self(Uuid::from_fields(data1, data2, data3, &data4))
    }

    /// `(data1, data2, data3, data4)` as laid out in a platform `GUID`.
    pub fn fields(&self) -> (u32, u16, u16, [u8; 8]) {
        let (d1, d2, d3, d4) = self.0.as_fields();
        (d1, d2, d3, *d4)
    }
}

impl FromStr for InterfaceId {
    type Err = ParseInterfaceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        // `Uuid::parse_str` also takes the unhyphenated and urn forms;
        // interface ids are always written hyphenated.
        if !trimmed.contains('-') || trimmed.starts_with("urn:") {
            return Err(ParseInterfaceIdError(s.to_string()));
        }
        Uuid::parse_str(trimmed)
            .map(Self)
            .map_err(|_| ParseInterfaceIdError(s.to_string()))
    }
}

impl TryFrom<String> for InterfaceId {
    type Error = ParseInterfaceIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}
