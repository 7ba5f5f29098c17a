//! Audio object property addressing
//!
//! Properties are identified by a four-character selector, a scope, and an
//! element, mirroring the way the host audio server addresses them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Four-character property selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertySelector(pub u32);

impl PropertySelector {
    /// Whether the device is currently doing IO ('goin')
    pub const DEVICE_IS_RUNNING: Self = Self::from_fourcc(*b"goin");
    /// Nominal sample rate ('nsrt')
    pub const NOMINAL_SAMPLE_RATE: Self = Self::from_fourcc(*b"nsrt");
    /// Objects owned by an object ('ownd')
    pub const OWNED_OBJECTS: Self = Self::from_fourcc(*b"ownd");
    /// Streams of a device ('stm#')
    pub const STREAMS: Self = Self::from_fourcc(*b"stm#");
    /// Controls of a device ('ctrl')
    pub const CONTROL_LIST: Self = Self::from_fourcc(*b"ctrl");
    /// Scalar value of a volume control ('lcsv')
    pub const LEVEL_SCALAR_VALUE: Self = Self::from_fourcc(*b"lcsv");
    /// Value of a boolean (mute) control ('bcvl')
    pub const BOOLEAN_VALUE: Self = Self::from_fourcc(*b"bcvl");

    pub const fn from_fourcc(code: [u8; 4]) -> Self {
        Self(u32::from_be_bytes(code))
    }

    pub const fn fourcc(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for PropertySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = self.fourcc();
        if code.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            write!(f, "'")?;
            for &b in &code {
                write!(f, "{}", b as char)?;
            }
            write!(f, "'")
        } else {
            write!(f, "{:#010x}", self.0)
        }
    }
}

/// Property scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PropertyScope {
    #[default]
    Global,
    Input,
    Output,
}

/// Full address of a property on an audio object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyAddress {
    pub selector: PropertySelector,
    pub scope: PropertyScope,
    /// Element index (0 = main element)
    pub element: u32,
}

impl PropertyAddress {
    /// Main element index
    pub const ELEMENT_MAIN: u32 = 0;

    /// Address a property in the global scope on the main element
    pub const fn global(selector: PropertySelector) -> Self {
        Self {
            selector,
            scope: PropertyScope::Global,
            element: Self::ELEMENT_MAIN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourcc_roundtrip() {
        let sel = PropertySelector::from_fourcc(*b"goin");
        assert_eq!(sel, PropertySelector::DEVICE_IS_RUNNING);
        assert_eq!(&sel.fourcc(), b"goin");
        assert_eq!(sel.to_string(), "'goin'");
    }

    #[test]
    fn test_non_printable_selector_displays_hex() {
        let sel = PropertySelector(0x0000_0001);
        assert_eq!(sel.to_string(), "0x00000001");
    }

    #[test]
    fn test_global_address() {
        let addr = PropertyAddress::global(PropertySelector::NOMINAL_SAMPLE_RATE);
        assert_eq!(addr.scope, PropertyScope::Global);
        assert_eq!(addr.element, PropertyAddress::ELEMENT_MAIN);
    }
}
