//! Driver for devices of unknown platform.

use std::sync::Arc;

use super::{Driver, DriverCore, profile};
use crate::error::Result;
use crate::platform::PatternRegistry;

/// Fallback driver every target starts with until its prompt is classified.
#[derive(Debug)]
pub struct Generic {
    core: DriverCore,
}

impl Generic {
    pub fn new(registry: Arc<PatternRegistry>) -> Result<Self> {
        Ok(Self {
            core: DriverCore::new(&profile::GENERIC, registry)?,
        })
    }
}

impl Driver for Generic {
    fn core(&self) -> &DriverCore {
        &self.core
    }
}
