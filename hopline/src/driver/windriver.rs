//! Wind River Linux shell of the 64-bit XR control plane.

use std::sync::Arc;

use super::{Driver, DriverCore, profile};
use crate::error::Result;
use crate::platform::PatternRegistry;

/// Host shell beneath the XR and admin VMs.
#[derive(Debug)]
pub struct Windriver {
    core: DriverCore,
}

impl Windriver {
    pub fn new(registry: Arc<PatternRegistry>) -> Result<Self> {
        Ok(Self {
            core: DriverCore::new(&profile::WINDRIVER, registry)?,
        })
    }
}

impl Driver for Windriver {
    fn core(&self) -> &DriverCore {
        &self.core
    }

    fn parse_os_type(&self, _version_text: &str) -> Option<String> {
        Some("Windriver".to_string())
    }
}
