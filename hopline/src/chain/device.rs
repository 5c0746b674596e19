//! One hop of a chain and its discovery.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use secrecy::SecretString;
use serde::Serialize;

use super::{Controller, Link};
use crate::channel::{Event, EventList};
use crate::driver::{self, ConfigMode, Driver, ReloadOptions, Udi};
use crate::error::{Error, ErrorKind, Result};
use crate::fsm::{Fsm, Transition};
use crate::platform::{PatternRegistry, PlatformId};
use crate::transport::{HopInfo, PromptDetectionConfig, Protocol, detect_prompt};

const TERMINAL_PREP_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything learned about a hop.
#[derive(Debug)]
pub struct DeviceState {
    /// How the hop is reached.
    pub hop: HopInfo,
    /// Hostname, the address until the device tells otherwise.
    pub hostname: String,
    /// Whether this is the last hop.
    pub is_target: bool,
    pub connected: bool,
    /// Prompt text as detected.
    pub prompt: Option<String>,
    /// Pattern matching the prompt and its mode variants.
    pub prompt_re: Option<Event>,
    pub mode: Option<ConfigMode>,
    pub os_type: Option<String>,
    pub os_version: Option<String>,
    pub family: Option<String>,
    pub platform: Option<String>,
    pub udi: Option<Udi>,
    /// Whether the session ends on a console port. `None` when unknown.
    pub is_console: Option<bool>,
    pub version_text: Option<String>,
    pub inventory_text: Option<String>,
    pub users_text: Option<String>,
    pub hostname_text: Option<String>,
    /// Prompt matched at the end of the last command.
    pub last_prompt: Option<String>,
    /// Output stored by a state machine in place of the text before the
    /// prompt.
    pub last_command_result: Option<String>,
    /// Pages collected while answering the pager.
    pub paged_output: String,
}

impl DeviceState {
    pub fn new(hop: HopInfo, is_target: bool) -> Self {
        let hostname = hop.host.clone();
        Self {
            hop,
            hostname,
            is_target,
            connected: false,
            prompt: None,
            prompt_re: None,
            mode: None,
            os_type: None,
            os_version: None,
            family: None,
            platform: None,
            udi: None,
            is_console: None,
            version_text: None,
            inventory_text: None,
            users_text: None,
            hostname_text: None,
            last_prompt: None,
            last_command_result: None,
            paged_output: String::new(),
        }
    }
}

/// Serializable summary of a hop.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub hostname: String,
    pub host: String,
    pub protocol: String,
    pub is_target: bool,
    pub connected: bool,
    pub driver: String,
    pub prompt: Option<String>,
    pub mode: Option<ConfigMode>,
    pub os_type: Option<String>,
    pub os_version: Option<String>,
    pub family: Option<String>,
    pub platform: Option<String>,
    pub udi: Option<Udi>,
    pub is_console: Option<bool>,
}

/// Driver for an operating system name found in version output.
pub fn platform_for_os(os_type: &str) -> Option<PlatformId> {
    let platform = match os_type {
        "IOS" => PlatformId::Ios,
        "XE" => PlatformId::Xe,
        "NX-OS" => PlatformId::NxOs,
        "XR" => PlatformId::Xr,
        "XRv" => PlatformId::XrV,
        "eXR" => PlatformId::Exr,
        "Calvados" => PlatformId::Calvados,
        "Windriver" => PlatformId::Windriver,
        _ => return None,
    };
    Some(platform)
}

/// A hop with its driver and login protocol.
pub struct Device {
    pub state: DeviceState,
    driver: Box<dyn Driver>,
    registry: Arc<PatternRegistry>,
    protocol: Option<Box<dyn Protocol>>,
    prompt_config: PromptDetectionConfig,
}

impl Device {
    /// Create a hop. Jump hosts start with the jump host driver, the
    /// target with the generic one until its prompt is known.
    pub fn new(
        hop: HopInfo,
        is_target: bool,
        registry: Arc<PatternRegistry>,
        prompt_config: PromptDetectionConfig,
    ) -> Result<Self> {
        let platform = if is_target {
            PlatformId::Generic
        } else {
            PlatformId::Jumphost
        };
        let driver = driver::make_driver(platform, registry.clone())?;
        Ok(Self {
            state: DeviceState::new(hop, is_target),
            driver,
            registry,
            protocol: None,
            prompt_config,
        })
    }

    pub fn hostname(&self) -> &str {
        &self.state.hostname
    }

    /// The current driver.
    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    /// Protocol name of this hop. The first hop of a chain reaches a
    /// console through a terminal server, so its protocol gets the
    /// `_console` flavour.
    pub fn protocol_name(&self, first: bool) -> String {
        if first && self.state.hop.console {
            format!("{}_console", self.state.hop.protocol)
        } else {
            self.state.hop.protocol.clone()
        }
    }

    /// Summary of what was discovered.
    pub fn info(&self) -> DeviceInfo {
        let state = &self.state;
        DeviceInfo {
            hostname: state.hostname.clone(),
            host: state.hop.host.clone(),
            protocol: state.hop.protocol.clone(),
            is_target: state.is_target,
            connected: state.connected,
            driver: self.driver.platform().to_string(),
            prompt: state.prompt.clone(),
            mode: state.mode,
            os_type: state.os_type.clone(),
            os_version: state.os_version.clone(),
            family: state.family.clone(),
            platform: state.platform.clone(),
            udi: state.udi.clone(),
            is_console: state.is_console,
        }
    }

    /// Log in over the already spawned client and discover the hop.
    ///
    /// Returns `false` when the protocol gave up without raising.
    pub async fn connect(
        &mut self,
        ctrl: &mut Controller,
        previous: &[Event],
        mut protocol: Box<dyn Protocol>,
    ) -> Result<bool> {
        info!("{}: connecting with {}", self.hostname(), protocol.name());
        {
            let mut link = Link::new(&mut *ctrl, &mut self.state, previous);
            if !protocol.connect(self.driver.as_ref(), &mut link).await? {
                warn!("{}: {} connect failed", link.hostname(), protocol.name());
                return Ok(false);
            }
            if !protocol.authenticate(self.driver.as_ref(), &mut link).await? {
                warn!("{}: {} authentication failed", link.hostname(), protocol.name());
                return Ok(false);
            }
        }
        self.protocol = Some(protocol);

        self.update_prompt(ctrl).await?;
        self.state.connected = true;
        info!("{}: connected, prompt '{}'", self.hostname(), self.state.prompt.as_deref().unwrap_or_default());

        if self.state.is_target {
            self.discover(ctrl, previous).await?;
        } else {
            self.describe_jumphost(ctrl, previous).await;
        }
        Ok(true)
    }

    /// Detect the prompt unless already known and derive its pattern.
    async fn update_prompt(&mut self, ctrl: &mut Controller) -> Result<()> {
        if self.state.prompt.is_none() {
            match detect_prompt(ctrl, &self.state.hostname, &self.prompt_config).await? {
                Some(prompt) => self.state.prompt = Some(prompt),
                None => return Err(Error::connection(self.hostname(), "Unable to detect the prompt")),
            }
        }
        self.bind_prompt()
    }

    fn bind_prompt(&mut self) -> Result<()> {
        if let Some(prompt) = &self.state.prompt {
            self.state.prompt_re = Some(self.driver.dynamic_prompt(prompt)?);
        }
        Ok(())
    }

    /// Replace the driver when `platform` differs from the current one.
    pub fn set_driver(&mut self, platform: PlatformId) -> Result<()> {
        if platform == self.driver.platform() {
            return Ok(());
        }
        info!("{}: driver {} -> {}", self.hostname(), self.driver.platform(), platform);
        self.driver = driver::make_driver(platform, self.registry.clone())?;
        self.bind_prompt()
    }

    async fn describe_jumphost(&mut self, ctrl: &mut Controller, previous: &[Event]) {
        let mut link = Link::new(ctrl, &mut self.state, previous);
        match self.driver.collect_version_text(&mut link).await {
            Ok(Some(text)) => {
                link.state.os_version = self.driver.parse_os_version(&text);
                link.state.version_text = Some(text);
            }
            Ok(None) => {}
            Err(e) => warn!("{}: unable to collect version: {}", link.hostname(), e),
        }
        match self.driver.collect_hostname_text(&mut link).await {
            Ok(text) => link.state.hostname_text = text,
            Err(e) => warn!("{}: unable to collect hostname: {}", link.hostname(), e),
        }
    }

    async fn discover(&mut self, ctrl: &mut Controller, previous: &[Event]) -> Result<()> {
        let prompt = self.state.prompt.clone().unwrap_or_default();
        let platform = self.driver.reclassify(&prompt);
        self.set_driver(platform)?;
        self.state.mode = Some(self.driver.config_mode(&prompt));
        self.state.hostname = self.driver.hostname_from_prompt(&prompt, &self.state.hostname);

        let prompt_changed = {
            let mut link = Link::new(&mut *ctrl, &mut self.state, previous);
            self.driver.after_connect(&mut link).await?
        };
        if prompt_changed {
            self.state.prompt = None;
            self.update_prompt(ctrl).await?;
            let prompt = self.state.prompt.clone().unwrap_or_default();
            let platform = self.driver.reclassify(&prompt);
            self.set_driver(platform)?;
            self.state.mode = Some(self.driver.config_mode(&prompt));
        }

        self.prepare_terminal(ctrl, previous).await?;

        let version_text = {
            let mut link = Link::new(&mut *ctrl, &mut self.state, previous);
            self.driver.collect_version_text(&mut link).await?
        };
        if let Some(text) = &version_text {
            self.state.os_type = self.driver.parse_os_type(text);
            self.state.os_version = self.driver.parse_os_version(text);
            self.state.family = self.driver.parse_hw_family(text);
        }
        self.state.version_text = version_text;

        if let Some(platform) = self.state.os_type.as_deref().and_then(platform_for_os) {
            let platform = self.driver.pin_platform(platform);
            if platform != self.driver.platform() {
                self.set_driver(platform)?;
                self.prepare_terminal(ctrl, previous).await?;
            }
        }

        let inventory_text = {
            let mut link = Link::new(&mut *ctrl, &mut self.state, previous);
            self.driver.collect_inventory_text(&mut link).await?
        };
        if let Some(text) = &inventory_text {
            let udi = Udi::parse(text);
            if !udi.is_empty() {
                if self.state.family.is_none() {
                    self.state.family = self.driver.profile().family_of(&udi.pid).map(str::to_string);
                }
                self.state.platform = self
                    .driver
                    .parse_hw_platform(&udi)
                    .or_else(|| Some(udi.base_pid().to_string()).filter(|pid| !pid.is_empty()));
                self.state.udi = Some(udi);
            }
        }
        self.state.inventory_text = inventory_text;

        let users_text = {
            let mut link = Link::new(&mut *ctrl, &mut self.state, previous);
            self.driver.collect_users_text(&mut link).await?
        };
        if let Some(text) = &users_text {
            self.state.is_console = self.driver.is_console_attached(text);
        }
        self.state.users_text = users_text;

        info!(
            "{}: {} {} on {} {}",
            self.hostname(),
            self.state.os_type.as_deref().unwrap_or("unknown OS"),
            self.state.os_version.as_deref().unwrap_or("unknown version"),
            self.state.family.as_deref().unwrap_or("unknown family"),
            self.state.platform.as_deref().unwrap_or("unknown platform"),
        );
        Ok(())
    }

    /// Run the driver's terminal preparation commands. Commands the device
    /// rejects are skipped.
    async fn prepare_terminal(&mut self, ctrl: &mut Controller, previous: &[Event]) -> Result<()> {
        let mut link = Link::new(ctrl, &mut self.state, previous);
        for cmd in self.driver.profile().terminal_prep {
            match link.send(self.driver.as_ref(), cmd, TERMINAL_PREP_TIMEOUT, None).await {
                Ok(_) => {}
                Err(e) if e.is_command() => debug!("{}: '{}' not supported: {}", link.hostname(), cmd, e),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Run `cmd` on the hop and return its output.
    pub async fn send(
        &mut self,
        ctrl: &mut Controller,
        previous: &[Event],
        cmd: &str,
        timeout: Duration,
        wait_for: Option<&Event>,
    ) -> Result<String> {
        let mut link = Link::new(ctrl, &mut self.state, previous);
        link.send(self.driver.as_ref(), cmd, timeout, wait_for).await
    }

    /// Enter privileged mode.
    pub async fn enable(
        &mut self,
        ctrl: &mut Controller,
        previous: &[Event],
        password: Option<&SecretString>,
    ) -> Result<()> {
        {
            let mut link = Link::new(&mut *ctrl, &mut self.state, previous);
            self.driver.enable(&mut link, password).await?;
        }
        if let Some(prompt) = &self.state.prompt {
            self.state.mode = Some(self.driver.config_mode(prompt));
        }
        self.bind_prompt()
    }

    /// Reboot the hop. A device that comes back at its login prompt on
    /// the same session is logged in again with the hop's protocol.
    pub async fn reload(&mut self, ctrl: &mut Controller, previous: &[Event], options: &ReloadOptions) -> Result<()> {
        let mut link = Link::new(ctrl, &mut self.state, previous);
        let Some(login) = self.driver.reload(&mut link, options).await? else {
            return Ok(());
        };
        let Some(protocol) = self.protocol.as_mut() else {
            return Ok(());
        };
        protocol.resume_at(login);
        if !protocol.authenticate(self.driver.as_ref(), &mut link).await? {
            return Err(Error::new(
                ErrorKind::ConnectionAuthentication,
                link.hostname(),
                "Unable to log in after reloading",
            ));
        }
        info!("{}: logged in after reload", link.hostname());
        Ok(())
    }

    /// Type `command` and run a caller defined state machine on the
    /// response. An empty command sends nothing.
    #[allow(clippy::too_many_arguments)]
    pub async fn run_fsm(
        &mut self,
        ctrl: &mut Controller,
        previous: &[Event],
        name: &str,
        command: &str,
        events: EventList,
        transitions: Vec<Transition>,
        timeout: Duration,
        max_transitions: usize,
    ) -> Result<bool> {
        let mut link = Link::new(ctrl, &mut self.state, previous);
        if !command.is_empty() {
            link.ctrl.send_command(command).await.map_err(|e| link.channel_error(e))?;
        }
        let fsm = Fsm::new(name, events, transitions, timeout).with_max_transitions(max_transitions);
        fsm.run(&mut link.context()).await
    }

    /// Leave the hop.
    pub async fn disconnect(&mut self, ctrl: &mut Controller) {
        if let Some(mut protocol) = self.protocol.take() {
            let mut link = Link::new(ctrl, &mut self.state, &[]);
            if let Err(e) = protocol.disconnect(&mut link).await {
                debug!("{}: {}", link.hostname(), e);
            }
        }
        self.state.connected = false;
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("hostname", &self.state.hostname)
            .field("driver", &self.driver.platform())
            .field("connected", &self.state.connected)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{Script, ScriptedSpawner, SessionConfig};
    use crate::transport::make_protocol;

    fn device(hop: HopInfo, is_target: bool) -> Device {
        Device::new(hop, is_target, PatternRegistry::builtin(), PromptDetectionConfig::default()).unwrap()
    }

    /// A logged in XRv hop over telnet.
    fn xrv() -> Device {
        let mut dev = device(HopInfo::new("10.0.0.5").username("admin").password("secret"), true);
        dev.state.prompt = Some("RP/0/0/CPU0:xrv#".to_string());
        dev.set_driver(PlatformId::XrV).unwrap();
        dev.protocol = Some(make_protocol("telnet", "10.0.0.5").unwrap());
        dev.state.connected = true;
        dev
    }

    /// Console output of an XRv reload up to the configuration phase.
    fn xrv_reload() -> Script {
        Script::new()
            .reply("admin reload location all", "\r\n[Done]\r\nProceed with reload? [confirm]")
            .reply(
                "",
                "\r\nios con0/RP0/CPU0 is now available\r\n\r\nPress RETURN to get started.\r\n",
            )
    }

    async fn session(script: Script) -> (Arc<ScriptedSpawner>, Controller) {
        let spawner = Arc::new(ScriptedSpawner::new([script]));
        let mut ctrl = Controller::new(spawner.clone(), SessionConfig::default());
        ctrl.spawn_session("telnet 10.0.0.5 23").await.unwrap();
        (spawner, ctrl)
    }

    #[tokio::test]
    async fn test_xrv_reload_logs_in_again() {
        let script = xrv_reload()
            .reply("", "SYSTEM CONFIGURATION IN PROCESS\r\nSYSTEM CONFIGURATION COMPLETED\r\n")
            .reply("", "\r\nUsername: ")
            .reply("admin", "\r\nPassword: ")
            .echo(false)
            .reply("secret", "\r\nRP/0/0/CPU0:xrv#");
        let (spawner, mut ctrl) = session(script).await;
        let mut dev = xrv();
        let previous = vec![Event::never().unwrap()];

        dev.reload(&mut ctrl, &previous, &ReloadOptions::default()).await.unwrap();
        assert!(dev.state.connected);
        assert!(spawner.log().sent.trim_end().ends_with("secret"));
    }

    #[tokio::test]
    async fn test_xrv_reload_stops_at_username_setup() {
        let script = xrv_reload().reply(
            "",
            "SYSTEM CONFIGURATION IN PROCESS\r\n\r\n--- Administrative User Dialog ---\r\n\r\n  \
             No root-system username is configured. Need to configure root-system username.\r\n",
        );
        let (spawner, mut ctrl) = session(script).await;
        let mut dev = xrv();
        let previous = vec![Event::never().unwrap()];

        dev.reload(&mut ctrl, &previous, &ReloadOptions::default()).await.unwrap();
        assert_eq!(spawner.log().sent.matches("admin").count(), 1);
    }

    #[test]
    fn test_initial_drivers() {
        assert_eq!(device(HopInfo::new("jump"), false).driver().platform(), PlatformId::Jumphost);
        assert_eq!(device(HopInfo::new("router"), true).driver().platform(), PlatformId::Generic);
    }

    #[test]
    fn test_protocol_name() {
        let dev = device(HopInfo::new("ts1").console(true), true);
        assert_eq!(dev.protocol_name(true), "telnet_console");
        assert_eq!(dev.protocol_name(false), "telnet");
        let dev = device(HopInfo::new("r1").protocol("ssh"), true);
        assert_eq!(dev.protocol_name(true), "ssh");
    }

    #[test]
    fn test_set_driver_rebinds_prompt() {
        let mut dev = device(HopInfo::new("10.0.0.1"), true);
        dev.state.prompt = Some("RP/0/RSP0/CPU0:PE1#".to_string());
        dev.set_driver(PlatformId::Xr).unwrap();
        let re = dev.state.prompt_re.as_ref().unwrap().as_regex().unwrap();
        assert!(re.is_match(b"RP/0/RSP0/CPU0:PE1(config)#"));
        assert_eq!(dev.info().driver, "XR");
    }

    #[test]
    fn test_platform_for_os() {
        assert_eq!(platform_for_os("eXR"), Some(PlatformId::Exr));
        assert_eq!(platform_for_os("NX-OS"), Some(PlatformId::NxOs));
        assert_eq!(platform_for_os("JUNOS"), None);
    }

    #[test]
    fn test_info_serializes() {
        let dev = device(HopInfo::new("10.0.0.1").protocol("ssh"), true);
        let json = serde_json::to_value(dev.info()).unwrap();
        assert_eq!(json["hostname"], "10.0.0.1");
        assert_eq!(json["protocol"], "ssh");
        assert_eq!(json["os_type"], serde_json::Value::Null);
    }
}
