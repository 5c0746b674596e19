//! Platform drivers.
//!
//! A [`Driver`] is the behaviour set of one platform: the commands used to
//! discover the device, the parsers that turn their output into fields, the
//! dynamic prompt grammar and the state machines for waiting on command
//! output, entering privileged mode and reloading.
//!
//! Every platform has a concrete type. [`make_driver`] maps a
//! [`PlatformId`] to a fresh instance bound to the pattern registry; a
//! device that changes platform replaces its driver instead of mutating it.

mod calvados;
mod generic;
mod ios;
mod jumphost;
mod nxos;
pub mod profile;
mod udi;
mod wait;
mod xr;
mod windriver;

pub use calvados::Calvados;
pub use generic::Generic;
pub use ios::{Ios, Xe};
pub use jumphost::Jumphost;
pub use nxos::NxOs;
pub use profile::Profile;
pub use udi::Udi;
pub use windriver::Windriver;
pub use xr::{Exr, Xr, XrV};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use secrecy::SecretString;
use serde::Serialize;

use crate::chain::Link;
use crate::channel::Event;
use crate::error::{PatternError, Result};
use crate::platform::vendors::PROMPT_PLACEHOLDER;
use crate::platform::{PatternRegistry, PlatformId};

/// Timeout of discovery commands.
pub const COLLECT_TIMEOUT: Duration = Duration::from_secs(120);

static OS_TYPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"XR|XE|NX-OS").unwrap());

/// CLI mode derived from the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigMode {
    /// Configuration mode.
    Config,
    /// Admin plane.
    Admin,
    /// Exec mode.
    Global,
}

impl ConfigMode {
    /// Mode for a prompt.
    pub fn from_prompt(prompt: &str) -> Self {
        if prompt.contains("config") {
            ConfigMode::Config
        } else if prompt.contains("admin") {
            ConfigMode::Admin
        } else {
            ConfigMode::Global
        }
    }
}

/// Reload parameters.
#[derive(Debug, Clone)]
pub struct ReloadOptions {
    /// Command typed at the ROM monitor.
    pub rommon_boot_command: String,
    /// How long the device may take to come back.
    pub reload_timeout: Duration,
    /// Save the running configuration first.
    pub save_config: bool,
}

impl Default for ReloadOptions {
    fn default() -> Self {
        Self {
            rommon_boot_command: "boot".to_string(),
            reload_timeout: Duration::from_secs(300),
            save_config: true,
        }
    }
}

impl ReloadOptions {
    /// Set the ROM monitor boot command.
    pub fn rommon_boot_command(mut self, command: impl Into<String>) -> Self {
        self.rommon_boot_command = command.into();
        self
    }

    /// Set the reload timeout.
    pub fn reload_timeout(mut self, timeout: Duration) -> Self {
        self.reload_timeout = timeout;
        self
    }

    /// Whether to save the configuration.
    pub fn save_config(mut self, save: bool) -> Self {
        self.save_config = save;
        self
    }
}

/// Patterns of a platform compiled once per driver.
#[derive(Debug, Clone)]
pub struct BoundPatterns {
    pub prompt: Event,
    pub syntax_error: Event,
    pub connection_closed: Event,
    pub press_return: Event,
    pub more: Event,
    pub rommon: Event,
    pub buffer_overflow: Event,
    pub username: Event,
    pub password: Event,
    pub unable_to_connect: Event,
    pub timeout: Event,
    pub standby: Event,
    /// Prompt grammar with a `hostname` group.
    pub hostname: Regex,
    pub pid2platform: Regex,
    pub platform: Regex,
    pub version: Regex,
    pub vty: Regex,
    pub console: Regex,
}

impl BoundPatterns {
    /// Compile the patterns of `platform`.
    pub fn bind(registry: &PatternRegistry, platform: PlatformId) -> std::result::Result<Self, PatternError> {
        let name = platform.name();
        let event = |key: &str| registry.compile_event(name, key);
        let regex = |key: &str| registry.compile(name, key);

        Ok(Self {
            prompt: event("prompt")?,
            syntax_error: event("syntax_error")?,
            connection_closed: event("connection_closed")?,
            press_return: event("press_return")?,
            more: event("more")?,
            rommon: event("rommon")?,
            buffer_overflow: event("buffer_overflow")?,
            username: event("username")?,
            password: event("password")?,
            unable_to_connect: event("unable_to_connect")?,
            timeout: event("timeout")?,
            standby: event("standby")?,
            hostname: regex("prompt")?,
            pid2platform: regex("pid2platform")?,
            platform: regex("platform")?,
            version: regex("version")?,
            vty: regex("vty")?,
            console: regex("console")?,
        })
    }
}

/// State shared by every driver: constants, registry and bound patterns.
pub struct DriverCore {
    profile: &'static Profile,
    registry: Arc<PatternRegistry>,
    patterns: BoundPatterns,
}

impl DriverCore {
    /// Bind `profile` to the registry.
    pub fn new(profile: &'static Profile, registry: Arc<PatternRegistry>) -> Result<Self> {
        let patterns = BoundPatterns::bind(&registry, profile.platform)?;
        Ok(Self {
            profile,
            registry,
            patterns,
        })
    }

    /// The pattern registry.
    pub fn registry(&self) -> &Arc<PatternRegistry> {
        &self.registry
    }

    /// Compile an extra platform key.
    pub fn event(&self, key: &str) -> Result<Event> {
        Ok(self.registry.compile_event(self.profile.platform.name(), key)?)
    }

    /// Join the prompt components and substitute the escaped prompt.
    pub fn compose_prompt(&self, escaped: &str) -> Result<Event> {
        let platform = self.profile.platform.name();
        let mut parts = Vec::with_capacity(self.profile.prompt_components.len());
        for key in self.profile.prompt_components {
            parts.push(self.registry.resolve(platform, key)?);
        }
        let pattern = parts.join("|").replace(PROMPT_PLACEHOLDER, escaped);
        debug!("[{}] dynamic prompt: '{}'", platform, pattern);
        Event::regex(&pattern).map_err(|e| PatternError::Regex(e).into())
    }
}

impl fmt::Debug for DriverCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverCore")
            .field("platform", &self.profile.platform)
            .finish_non_exhaustive()
    }
}

/// Behaviour of one platform.
///
/// Defaults implement the generic platform; variants override what differs.
/// Operations that talk to the device take a [`Link`] to the hop's live
/// session and discovery state.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Constants, registry and bound patterns.
    fn core(&self) -> &DriverCore;

    /// The platform this driver implements.
    fn platform(&self) -> PlatformId {
        self.core().profile.platform
    }

    /// Platform constants.
    fn profile(&self) -> &'static Profile {
        self.core().profile
    }

    /// Compiled patterns.
    fn patterns(&self) -> &BoundPatterns {
        &self.core().patterns
    }

    /// Output of the version command, `None` if the device rejects it.
    async fn collect_version_text(&self, link: &mut Link<'_>) -> Result<Option<String>> {
        let profile = self.profile();
        match link.send(self, profile.version_cmd, COLLECT_TIMEOUT, None).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.is_command() => match profile.version_fallback_cmd {
                Some(fallback) => {
                    debug!("{}: '{}' rejected, trying '{}'", link.hostname(), profile.version_cmd, fallback);
                    match link.send(self, fallback, COLLECT_TIMEOUT, None).await {
                        Ok(text) => Ok(Some(text)),
                        Err(e) if e.is_command() => {
                            debug!("{}: unable to collect version: {}", link.hostname(), e);
                            Ok(None)
                        }
                        Err(e) => Err(e),
                    }
                }
                None => {
                    debug!("{}: unable to collect version: {}", link.hostname(), e);
                    Ok(None)
                }
            },
            Err(e) => Err(e),
        }
    }

    /// Output of the inventory command.
    async fn collect_inventory_text(&self, link: &mut Link<'_>) -> Result<Option<String>> {
        let Some(cmd) = self.profile().inventory_cmd else {
            debug!("{}: no inventory command for {}", link.hostname(), self.platform());
            return Ok(None);
        };
        match link.send(self, cmd, COLLECT_TIMEOUT, None).await {
            Ok(text) => {
                debug!("{}: inventory collected", link.hostname());
                Ok(Some(text))
            }
            Err(e) if e.is_command() => {
                debug!("{}: unable to collect inventory: {}", link.hostname(), e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Output of the users command.
    async fn collect_users_text(&self, link: &mut Link<'_>) -> Result<Option<String>> {
        let Some(cmd) = self.profile().users_cmd else {
            debug!("{}: no users command for {}", link.hostname(), self.platform());
            return Ok(None);
        };
        match link.send(self, cmd, Duration::from_secs(60), None).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.is_command() => {
                debug!("{}: unable to collect connected users: {}", link.hostname(), e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Output of the hostname command. Its first line becomes the hop's
    /// hostname.
    async fn collect_hostname_text(&self, link: &mut Link<'_>) -> Result<Option<String>> {
        let Some(cmd) = self.profile().hostname_cmd else {
            return Ok(None);
        };
        match link.send(self, cmd, Duration::from_secs(10), None).await {
            Ok(text) => {
                if let Some(name) = text.lines().next().map(str::trim).filter(|l| !l.is_empty()) {
                    link.state.hostname = name.to_string();
                }
                Ok(Some(text))
            }
            Err(e) if e.is_command() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Operating system name from version output.
    fn parse_os_type(&self, version_text: &str) -> Option<String> {
        let os_type = OS_TYPE.find(version_text).map_or("IOS", |m| m.as_str());
        if os_type != "XR" {
            return Some(os_type.to_string());
        }
        let os_type = if version_text.contains("XR Admin Software") {
            "Calvados"
        } else if version_text.contains("Build Information") {
            "eXR"
        } else if version_text.contains("IOS XRv") {
            "XRv"
        } else {
            "XR"
        };
        Some(os_type.to_string())
    }

    /// Software version from version output.
    fn parse_os_version(&self, version_text: &str) -> Option<String> {
        self.patterns()
            .version
            .captures(version_text)
            .and_then(|caps| caps.name("version"))
            .map(|m| m.as_str().to_string())
    }

    /// Hardware family from version output, mapped through the family table.
    fn parse_hw_family(&self, version_text: &str) -> Option<String> {
        let Some(caps) = self.patterns().platform.captures(version_text) else {
            debug!("[{}] platform string not present", self.platform());
            return None;
        };
        let family = caps.name("family")?.as_str();
        Some(self.profile().family_of(family).unwrap_or(family).to_string())
    }

    /// Hardware platform from the chassis PID.
    fn parse_hw_platform(&self, udi: &Udi) -> Option<String> {
        self.patterns()
            .pid2platform
            .captures(&udi.pid)
            .and_then(|caps| caps.name("platform"))
            .map(|m| m.as_str().to_string())
    }

    /// Whether our own line in users output is a console line.
    fn is_console_attached(&self, users_text: &str) -> Option<bool> {
        let patterns = self.patterns();
        for line in users_text.lines().filter(|line| line.contains('*')) {
            if patterns.vty.is_match(line) {
                debug!("[{}] connected to vty", self.platform());
                return Some(false);
            }
            if patterns.console.is_match(line) {
                debug!("[{}] connected to console", self.platform());
                return Some(true);
            }
        }
        debug!("[{}] connection port unknown", self.platform());
        None
    }

    /// Pattern matching the detected prompt and its mode variants.
    fn dynamic_prompt(&self, prompt: &str) -> Result<Event> {
        let prompt = prompt.trim_end();
        let stem = prompt
            .char_indices()
            .last()
            .map_or(prompt, |(index, _)| &prompt[..index]);
        self.core().compose_prompt(&regex::escape(stem))
    }

    /// Platform for a newly seen prompt.
    fn reclassify(&self, prompt: &str) -> PlatformId {
        match self.core().registry.classify(prompt) {
            Ok(Some(name)) => match PlatformId::from_name(&name) {
                Some(detected) => {
                    let platform = self.pin_platform(detected);
                    debug!("[{}] '{}' -> {}", self.platform(), prompt, platform);
                    platform
                }
                None => {
                    warn!("[{}] no driver for detected platform {}", self.platform(), name);
                    self.platform()
                }
            },
            Ok(None) => {
                debug!("[{}] no update for '{}'", self.platform(), prompt);
                self.platform()
            }
            Err(e) => {
                warn!("[{}] prompt classification failed: {}", self.platform(), e);
                self.platform()
            }
        }
    }

    /// Resolve a prompt shared with a more specific platform.
    fn pin_platform(&self, detected: PlatformId) -> PlatformId {
        detected
    }

    /// CLI mode for a prompt.
    fn config_mode(&self, prompt: &str) -> ConfigMode {
        ConfigMode::from_prompt(prompt)
    }

    /// Hostname embedded in the prompt, or `current`.
    fn hostname_from_prompt(&self, prompt: &str, current: &str) -> String {
        match self.patterns().hostname.captures(prompt).and_then(|c| c.name("hostname")) {
            Some(m) => m.as_str().to_string(),
            None => {
                debug!("[{}] hostname not in prompt '{}'", self.platform(), prompt);
                current.to_string()
            }
        }
    }

    /// Wait for `expected` after a command, absorbing pagers and spotting
    /// errors and earlier hops' prompts.
    async fn wait_for_string(
        &self,
        link: &mut Link<'_>,
        expected: &Event,
        timeout: Duration,
    ) -> Result<bool> {
        wait::wait_for_string(self, link, expected, timeout).await
    }

    /// Enter privileged mode.
    async fn enable(&self, link: &mut Link<'_>, _password: Option<&SecretString>) -> Result<()> {
        info!("{}: privileged mode not supported on {}", link.hostname(), self.platform());
        Ok(())
    }

    /// Reboot the device.
    ///
    /// Returns the login prompt the device stopped at when it came back on
    /// this session, so the hop can authenticate again.
    async fn reload(&self, link: &mut Link<'_>, _options: &ReloadOptions) -> Result<Option<Event>> {
        info!("{}: reload not implemented on {}", link.hostname(), self.platform());
        Ok(None)
    }

    /// Hook run once the prompt is known. Returns `true` when the prompt
    /// changed and must be detected again.
    async fn after_connect(&self, _link: &mut Link<'_>) -> Result<bool> {
        Ok(false)
    }
}

impl fmt::Debug for dyn Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Driver({})", self.platform())
    }
}

/// Create the driver of `platform`.
pub fn make_driver(platform: PlatformId, registry: Arc<PatternRegistry>) -> Result<Box<dyn Driver>> {
    let driver: Box<dyn Driver> = match platform {
        PlatformId::Generic => Box::new(Generic::new(registry)?),
        PlatformId::Jumphost => Box::new(Jumphost::new(registry)?),
        PlatformId::Ios => Box::new(Ios::new(registry)?),
        PlatformId::Xe => Box::new(Xe::new(registry)?),
        PlatformId::NxOs => Box::new(NxOs::new(registry)?),
        PlatformId::Xr => Box::new(Xr::new(registry)?),
        PlatformId::XrV => Box::new(XrV::new(registry)?),
        PlatformId::Exr => Box::new(Exr::new(registry)?),
        PlatformId::Calvados => Box::new(Calvados::new(registry)?),
        PlatformId::Windriver => Box::new(Windriver::new(registry)?),
    };
    Ok(driver)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver(platform: PlatformId) -> Box<dyn Driver> {
        make_driver(platform, PatternRegistry::builtin()).unwrap()
    }

    fn matches(event: &Event, text: &str) -> bool {
        event.as_regex().unwrap().is_match(text.as_bytes())
    }

    #[test]
    fn test_every_platform_binds() {
        for platform in PlatformId::ALL {
            assert_eq!(driver(platform).platform(), platform);
        }
    }

    #[test]
    fn test_dynamic_prompt_round_trip() {
        let ios = driver(PlatformId::Ios);
        let prompt = ios.dynamic_prompt("router#").unwrap();
        assert!(matches(&prompt, "router#"));
        assert!(matches(&prompt, "router(config)#"));
        assert!(matches(&prompt, "router(config-if)#"));
        assert!(matches(&prompt, "router>"));
        assert!(matches(&prompt, "rommon 1 >"));
        assert!(!matches(&prompt, "jump-host:~$ "));
    }

    #[test]
    fn test_dynamic_prompt_escapes_prompt() {
        let xr = driver(PlatformId::Xr);
        let prompt = xr.dynamic_prompt("RP/0/RSP0/CPU0:PE.1#").unwrap();
        assert!(matches(&prompt, "RP/0/RSP0/CPU0:PE.1#"));
        assert!(matches(&prompt, "RP/0/RSP0/CPU0:PE.1(admin)#"));
        assert!(matches(&prompt, "RP/0/RSP0/CPU0:PE.1(config)#"));
        assert!(!matches(&prompt, "RP/0/RSP0/CPU0:PEX1#"));
    }

    #[test]
    fn test_parse_os_type() {
        let generic = driver(PlatformId::Generic);
        let os = |text: &str| generic.parse_os_type(text);
        assert_eq!(os("Cisco IOS Software, ASR900 Software").as_deref(), Some("IOS"));
        assert_eq!(os("Cisco IOS XE Software, Version 16.09.04").as_deref(), Some("XE"));
        assert_eq!(os("Cisco Nexus Operating System (NX-OS) Software").as_deref(), Some("NX-OS"));
        assert_eq!(os("Cisco IOS XR Software, Version 5.3.3").as_deref(), Some("XR"));
        assert_eq!(
            os("Cisco IOS XR Software, Version 6.1.2\nBuild Information:\n").as_deref(),
            Some("eXR")
        );
        assert_eq!(os("Cisco IOS XR Admin Software, Version 6.1.2").as_deref(), Some("Calvados"));
        assert_eq!(os("Cisco IOS XRv Series Software, Version 6.0.0").as_deref(), Some("XRv"));
    }

    #[test]
    fn test_parse_version_and_family() {
        let xr = driver(PlatformId::Xr);
        let text = "Cisco IOS XR Software, Version 5.3.3[Default]\n\
                    cisco ASR9K Series (Intel 686 F6M14S4) processor with 12582912K bytes of memory.\n";
        assert_eq!(xr.parse_os_version(text).as_deref(), Some("5.3.3"));
        assert_eq!(xr.parse_hw_family(text).as_deref(), Some("ASR9K"));
        assert_eq!(xr.parse_hw_family("no platform here"), None);
    }

    #[test]
    fn test_parse_hw_platform() {
        let ios = driver(PlatformId::Ios);
        let udi = Udi {
            pid: "ASR-903".to_string(),
            ..Udi::default()
        };
        assert_eq!(ios.parse_hw_platform(&udi).as_deref(), Some("ASR-903"));
    }

    #[test]
    fn test_console_attachment() {
        let ios = driver(PlatformId::Ios);
        let vty = "    Line       User       Host(s)              Idle       Location\n\
                   *  2 vty 0     admin      idle                 00:00:00 10.0.0.1\n";
        let con = "*  0 con 0                idle                 00:00:00\n";
        assert_eq!(ios.is_console_attached(vty), Some(false));
        assert_eq!(ios.is_console_attached(con), Some(true));
        assert_eq!(ios.is_console_attached("   1 vty 1  bob  idle\n"), None);
    }

    #[test]
    fn test_hostname_from_prompt() {
        let xr = driver(PlatformId::Xr);
        assert_eq!(xr.hostname_from_prompt("RP/0/RSP0/CPU0:PE-1#", "10.0.0.1"), "PE-1");
        assert_eq!(xr.hostname_from_prompt("garbage", "10.0.0.1"), "10.0.0.1");
    }

    #[test]
    fn test_config_mode() {
        assert_eq!(ConfigMode::from_prompt("router(config-if)#"), ConfigMode::Config);
        assert_eq!(ConfigMode::from_prompt("RP/0/RSP0/CPU0:r1(admin)#"), ConfigMode::Admin);
        assert_eq!(ConfigMode::from_prompt("router#"), ConfigMode::Global);
    }

    #[test]
    fn test_reclassify() {
        let generic = driver(PlatformId::Generic);
        assert_eq!(generic.reclassify("RP/0/RSP0/CPU0:ios#"), PlatformId::Xr);
        assert_eq!(generic.reclassify("router#"), PlatformId::Ios);
        assert_eq!(generic.reclassify(""), PlatformId::Generic);
    }
}
