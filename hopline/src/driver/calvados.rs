//! Admin plane (Calvados) of 64-bit IOS XR.

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use regex::Regex;

use super::{COLLECT_TIMEOUT, Driver, DriverCore, profile};
use crate::chain::Link;
use crate::error::Result;
use crate::platform::{PatternRegistry, PlatformId};

/// Calvados admin shell.
///
/// A session landing here directly (e.g. on the admin console) is moved
/// to the XR plane when the admin session is local to the box.
#[derive(Debug)]
pub struct Calvados {
    core: DriverCore,
    connected_locally: Regex,
}

impl Calvados {
    pub fn new(registry: Arc<PatternRegistry>) -> Result<Self> {
        let connected_locally = registry.compile(PlatformId::Calvados.name(), "connected_locally")?;
        Ok(Self {
            core: DriverCore::new(&profile::CALVADOS, registry)?,
            connected_locally,
        })
    }
}

#[async_trait]
impl Driver for Calvados {
    fn core(&self) -> &DriverCore {
        &self.core
    }

    fn pin_platform(&self, detected: PlatformId) -> PlatformId {
        match detected {
            PlatformId::Xr => PlatformId::Exr,
            other => other,
        }
    }

    async fn after_connect(&self, link: &mut Link<'_>) -> Result<bool> {
        let users = link.send(self, "show users", COLLECT_TIMEOUT, None).await?;
        if self.connected_locally.is_match(&users) {
            debug!("{}: locally connected to Calvados, exiting", link.hostname());
            link.send(self, "exit", COLLECT_TIMEOUT, None).await?;
            return Ok(true);
        }
        Ok(false)
    }
}
