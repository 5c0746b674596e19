//! Platform identities and the pattern registry.
//!
//! Every platform the engine can drive has a fixed [`PlatformId`]. Its
//! regular expressions live in the [`PatternRegistry`], keyed by the
//! platform name, with the `generic` platform as fallback for missing keys.

mod definition;
mod registry;
pub mod vendors;

pub use definition::{PatternEntry, PlatformPatterns};
pub use registry::{GENERIC, PROMPT_DETECTION, PatternRegistry, split_alternation};

use std::fmt;
use std::str::FromStr;

use crate::error::PatternError;

/// Closed set of supported platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformId {
    /// Fallback for unclassified devices.
    Generic,
    /// Linux/Unix shell used as an intermediate hop.
    Jumphost,
    /// Classic IOS.
    Ios,
    /// IOS XE.
    Xe,
    /// NX-OS.
    NxOs,
    /// Classic 32-bit IOS XR.
    Xr,
    /// IOS XRv virtual router.
    XrV,
    /// 64-bit IOS XR.
    Exr,
    /// 64-bit IOS XR admin plane.
    Calvados,
    /// Wind River Linux shell of the XR control plane.
    Windriver,
}

impl PlatformId {
    /// All platforms.
    pub const ALL: [PlatformId; 10] = [
        PlatformId::Generic,
        PlatformId::Jumphost,
        PlatformId::Ios,
        PlatformId::Xe,
        PlatformId::NxOs,
        PlatformId::Xr,
        PlatformId::XrV,
        PlatformId::Exr,
        PlatformId::Calvados,
        PlatformId::Windriver,
    ];

    /// Name used as the registry key.
    pub fn name(self) -> &'static str {
        match self {
            PlatformId::Generic => "generic",
            PlatformId::Jumphost => "jumphost",
            PlatformId::Ios => "IOS",
            PlatformId::Xe => "XE",
            PlatformId::NxOs => "NX-OS",
            PlatformId::Xr => "XR",
            PlatformId::XrV => "XRv",
            PlatformId::Exr => "eXR",
            PlatformId::Calvados => "Calvados",
            PlatformId::Windriver => "Windriver",
        }
    }

    /// Look up a platform by registry name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PlatformId {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| PatternError::UnknownPlatform {
            platform: s.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_round_trip() {
        for id in PlatformId::ALL {
            assert_eq!(PlatformId::from_name(id.name()), Some(id));
        }
        assert_eq!("NX-OS".parse::<PlatformId>().unwrap(), PlatformId::NxOs);
        assert!("JunOS".parse::<PlatformId>().is_err());
    }
}
