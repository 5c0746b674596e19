//! Multi-hop connections.
//!
//! A [`Chain`] reaches its target through zero or more jump hosts over a
//! single terminal session. The first hop spawns a local client; each
//! following hop types its client command into the shell of the hop
//! before it.

mod builder;
mod controller;
mod device;
mod link;

pub use builder::ChainBuilder;
pub use controller::Controller;
pub use device::{Device, DeviceInfo, DeviceState, platform_for_os};
pub use link::Link;

use std::time::Duration;

use log::{debug, info};
use secrecy::SecretString;

use crate::channel::{Event, EventList};
use crate::driver::ReloadOptions;
use crate::error::{Error, Result};
use crate::fsm::Transition;
use crate::transport::make_protocol;

/// An ordered list of hops sharing one session. The last hop is the target.
#[derive(Debug)]
pub struct Chain {
    ctrl: Controller,
    devices: Vec<Device>,
}

impl Chain {
    /// Connect every hop in order and discover the target.
    ///
    /// Stops at the first hop that fails; later hops are never attempted.
    pub async fn connect(&mut self) -> Result<()> {
        let count = self.devices.len();
        for index in 0..count {
            let previous = self.previous_prompts(index)?;
            let device = &mut self.devices[index];
            let protocol = make_protocol(&device.protocol_name(index == 0), device.hostname())?;
            let command = protocol.spawn_command(&device.state.hop);

            debug!("{}: hop {} of {}", device.hostname(), index + 1, count);
            self.ctrl
                .spawn_session(&command)
                .await
                .map_err(|e| Error::from_channel(e, device.hostname()))?;

            if !device.connect(&mut self.ctrl, &previous, protocol).await? {
                return Err(Error::connection(device.hostname(), "Connection failed"));
            }
        }
        info!("{}: chain connected", self.target().hostname());
        Ok(())
    }

    /// Run `cmd` on the target and return its output.
    pub async fn send(&mut self, cmd: &str, timeout: Duration, wait_for: Option<&Event>) -> Result<String> {
        let (ctrl, previous, target) = self.split_target()?;
        target.send(ctrl, &previous, cmd, timeout, wait_for).await
    }

    /// Enter privileged mode on the target.
    pub async fn enable(&mut self, password: Option<&SecretString>) -> Result<()> {
        let (ctrl, previous, target) = self.split_target()?;
        target.enable(ctrl, &previous, password).await
    }

    /// Reboot the target.
    pub async fn reload(&mut self, options: &ReloadOptions) -> Result<()> {
        let (ctrl, previous, target) = self.split_target()?;
        target.reload(ctrl, &previous, options).await
    }

    /// Type `command` on the target and drive a custom state machine.
    pub async fn run_fsm(
        &mut self,
        name: &str,
        command: &str,
        events: EventList,
        transitions: Vec<Transition>,
        timeout: Duration,
        max_transitions: usize,
    ) -> Result<bool> {
        let (ctrl, previous, target) = self.split_target()?;
        target
            .run_fsm(
                ctrl,
                &previous,
                name,
                command,
                events,
                transitions,
                timeout,
                max_transitions,
            )
            .await
    }

    /// Leave the target and close the session.
    pub async fn disconnect(&mut self) {
        if let Some(target) = self.devices.last_mut()
            && target.state.connected
        {
            target.disconnect(&mut self.ctrl).await;
        }
        self.ctrl.disconnect().await;
        for device in &mut self.devices {
            device.state.connected = false;
        }
    }

    /// The last hop.
    pub fn target(&self) -> &Device {
        &self.devices[self.devices.len() - 1]
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Whether the target is logged in and the session is up.
    pub fn is_connected(&self) -> bool {
        self.target().state.connected && self.ctrl.has_session()
    }

    /// Whether discovery found the target's OS, version, family and UDI.
    pub fn is_discovered(&self) -> bool {
        let state = &self.target().state;
        state.os_type.is_some() && state.os_version.is_some() && state.family.is_some() && state.udi.is_some()
    }

    /// Summaries of all hops.
    pub fn info(&self) -> Vec<DeviceInfo> {
        self.devices.iter().map(Device::info).collect()
    }

    /// Patterns meaning the session fell back to an earlier hop: a never
    /// matching sentinel, then the prompts of the hops before `index`.
    fn previous_prompts(&self, index: usize) -> Result<Vec<Event>> {
        let sentinel = Event::never().map_err(|e| Error::from_pattern(e, self.devices[index].hostname()))?;
        let mut prompts = vec![sentinel];
        prompts.extend(self.devices[..index].iter().filter_map(|d| d.state.prompt_re.clone()));
        Ok(prompts)
    }

    /// The session, the previous prompts of the target and the target.
    fn split_target(&mut self) -> Result<(&mut Controller, Vec<Event>, &mut Device)> {
        let index = self.devices.len() - 1;
        let previous = self.previous_prompts(index)?;
        Ok((&mut self.ctrl, previous, &mut self.devices[index]))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::channel::{Script, ScriptedSpawner};
    use crate::error::ErrorKind;
    use crate::transport::HopInfo;

    fn chain(scripts: Vec<Script>, hops: Vec<HopInfo>) -> (Arc<ScriptedSpawner>, Chain) {
        let spawner = Arc::new(ScriptedSpawner::new(scripts));
        let chain = ChainBuilder::new().spawner(spawner.clone()).hops(hops).build().unwrap();
        (spawner, chain)
    }

    fn router() -> Script {
        Script::new()
            .emit("Escape character is '^]'.\r\n\r\nUsername: ")
            .reply("admin", "\r\nPassword: ")
            .echo(false)
            .reply("secret", "\r\nrouter#")
            .echo(true)
            .prompt("router#")
    }

    #[tokio::test]
    async fn test_connect_single_hop() {
        let (spawner, mut chain) = chain(
            vec![router()],
            vec![HopInfo::new("10.0.0.2").username("admin").password("secret")],
        );
        chain.connect().await.unwrap();
        assert!(chain.is_connected());
        assert_eq!(chain.target().state.prompt.as_deref(), Some("router#"));
        assert_eq!(spawner.log().spawned, vec!["telnet 10.0.0.2 23".to_string()]);

        chain.disconnect().await;
        assert!(!chain.is_connected());
        assert!(spawner.log().closed);
    }

    #[tokio::test]
    async fn test_send_before_connect() {
        let (_, mut chain) = chain(vec![], vec![HopInfo::new("router")]);
        let err = chain.send("show clock", Duration::from_secs(1), None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
    }

    #[tokio::test]
    async fn test_spawn_failure_names_hop() {
        let (_, mut chain) = chain(vec![], vec![HopInfo::new("router")]);
        let err = chain.connect().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert_eq!(err.host(), Some("router"));
    }
}
