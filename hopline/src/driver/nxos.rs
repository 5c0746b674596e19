//! NX-OS driver.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::info;

use super::{Driver, DriverCore, ReloadOptions, profile};
use crate::chain::Link;
use crate::channel::Event;
use crate::error::{Error, Result};
use crate::platform::{PatternRegistry, PlatformId};

/// Nexus switches.
#[derive(Debug)]
pub struct NxOs {
    core: DriverCore,
}

impl NxOs {
    pub fn new(registry: Arc<PatternRegistry>) -> Result<Self> {
        Ok(Self {
            core: DriverCore::new(&profile::NXOS, registry)?,
        })
    }
}

#[async_trait]
impl Driver for NxOs {
    fn core(&self) -> &DriverCore {
        &self.core
    }

    // NX-OS prompts share the IOS grammar
    fn pin_platform(&self, detected: PlatformId) -> PlatformId {
        match detected {
            PlatformId::Ios => PlatformId::NxOs,
            other => other,
        }
    }

    async fn reload(&self, link: &mut Link<'_>, options: &ReloadOptions) -> Result<Option<Event>> {
        if options.save_config {
            info!("{}: saving configuration", link.hostname());
            link.send(self, "copy running-config startup-config", Duration::from_secs(120), None)
                .await?;
        }
        let confirm = Event::literal("This command will reboot the system")
            .map_err(|e| Error::from_pattern(e, link.hostname()))?;
        link.send(self, "reload", Duration::from_secs(10), Some(&confirm)).await?;
        link.ctrl
            .send_line("y")
            .await
            .map_err(|e| link.channel_error(e))?;
        link.state.connected = false;
        info!("{}: reloading", link.hostname());
        Ok(None)
    }
}
