//! Object and client identifiers

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier the host assigns to a client process when it connects to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub u32);

impl ClientId {
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl From<u32> for ClientId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an audio object (plug-in, device, stream, control) known to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AudioObjectId(pub u32);

impl AudioObjectId {
    /// The plug-in object itself
    pub const PLUG_IN: Self = Self(1);
    /// The main virtual device
    pub const DEVICE: Self = Self(2);

    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl From<u32> for AudioObjectId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for AudioObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_display_as_plain_integers() {
        assert_eq!(ClientId(7).to_string(), "7");
        assert_eq!(AudioObjectId::DEVICE.to_string(), "2");
    }

    #[test]
    fn test_object_id_constants() {
        assert_ne!(AudioObjectId::PLUG_IN, AudioObjectId::DEVICE);
        assert_eq!(AudioObjectId::from(2), AudioObjectId::DEVICE);
    }
}
