//! IOS XR drivers: classic XR, XRv and 64-bit XR.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::info;

use super::wait::{AdminPlane, wait_for_string_exr};
use super::{Driver, DriverCore, ReloadOptions, profile};
use crate::chain::Link;
use crate::channel::{Event, EventList};
use crate::error::{Error, ErrorKind, Result};
use crate::fsm::actions::{ReloadNotAvailable, SendBoot, SendText};
use crate::fsm::{Action, Fsm, Transition};
use crate::platform::{PatternRegistry, PlatformId};

/// Classic 32-bit IOS XR.
#[derive(Debug)]
pub struct Xr {
    core: DriverCore,
}

impl Xr {
    pub fn new(registry: Arc<PatternRegistry>) -> Result<Self> {
        Ok(Self {
            core: DriverCore::new(&profile::XR, registry)?,
        })
    }
}

impl Driver for Xr {
    fn core(&self) -> &DriverCore {
        &self.core
    }
}

/// IOS XRv virtual router.
#[derive(Debug)]
pub struct XrV {
    core: DriverCore,
}

impl XrV {
    pub fn new(registry: Arc<PatternRegistry>) -> Result<Self> {
        Ok(Self {
            core: DriverCore::new(&profile::XRV, registry)?,
        })
    }
}

fn event(pattern: &str, host: &str) -> Result<Event> {
    Event::regex(pattern).map_err(|e| Error::from_pattern(e, host))
}

fn literal(text: &str, host: &str) -> Result<Event> {
    Event::literal(text).map_err(|e| Error::from_pattern(e, host))
}

#[async_trait]
impl Driver for XrV {
    fn core(&self) -> &DriverCore {
        &self.core
    }

    /// Reload from the console and follow the boot until the system
    /// configuration is applied.
    ///
    /// Returns the login prompt the console stopped at. When the device
    /// asks for a root-system username instead, returns `None` and leaves
    /// that dialog to the caller.
    async fn reload(&self, link: &mut Link<'_>, options: &ReloadOptions) -> Result<Option<Event>> {
        let host = link.hostname().to_string();
        let reload_na = literal("Reload to the ROM monitor disallowed from a telnet line", &host)?;
        let done = literal("[Done]", &host)?;
        let proceed = literal("Proceed with reload? [confirm]", &host)?;
        let in_process = literal("SYSTEM CONFIGURATION IN PROCESS", &host)?;
        let console = event(r"ios con[01]/RS?P[0-1]/CPU0 is now available", &host)?;
        let completed = literal("SYSTEM CONFIGURATION COMPLETED", &host)?;
        let reconfigure = event(r"[Nn][Oo] root-system username is configured", &host)?;
        let p = self.patterns();

        let events: EventList = [
            reload_na.clone(),
            done.clone(),
            proceed.clone(),
            in_process.clone(),
            p.rommon.clone(),
            p.press_return.clone(),
            console.clone(),
            completed.clone(),
            reconfigure.clone(),
            p.username.clone(),
            p.password.clone(),
            Event::Timeout,
            Event::Eof,
        ]
        .into_iter()
        .collect();

        let transitions = vec![
            Transition::new(&reload_na, &[0], -1, Action::invoke(ReloadNotAvailable)),
            Transition::new(&done, &[0], 1, Action::NoOp).with_timeout_secs(120),
            Transition::new(&proceed, &[1], 3, Action::invoke(SendText::new("\r")))
                .with_timeout(options.reload_timeout),
            Transition::new(
                &p.rommon,
                &[0, 3],
                4,
                Action::invoke(SendBoot(options.rommon_boot_command.clone())),
            )
            .with_timeout_secs(600),
            Transition::new(&console, &[3, 4], 5, Action::NoOp).with_timeout_secs(600),
            Transition::new(&p.press_return, &[5], 6, Action::invoke(SendText::new("\r")))
                .with_timeout_secs(300),
            // username reconfiguration is left to the caller
            Transition::new(&reconfigure, &[6, 7], -1, Action::NoOp),
            Transition::new(&in_process, &[6], 7, Action::NoOp).with_timeout_secs(180),
            Transition::new(&completed, &[7], 8, Action::invoke(SendText::new("\r")))
                .with_timeout_secs(60),
            Transition::new(&p.username, &[8], -1, Action::NoOp),
            Transition::new(&p.password, &[8], -1, Action::NoOp),
            Transition::new(
                &Event::Timeout,
                &[0, 1, 2],
                -1,
                Action::fail(ErrorKind::ConnectionAuthentication, "Unable to reload"),
            ),
            Transition::new(
                &Event::Eof,
                &[0, 1, 2, 3, 4, 5],
                -1,
                Action::fail(ErrorKind::Connection, "Device disconnected"),
            ),
            Transition::new(&Event::Timeout, &[6], 7, Action::invoke(SendText::new("\r\n")))
                .with_timeout_secs(180),
            Transition::new(
                &Event::Timeout,
                &[7, 8],
                -1,
                Action::fail(
                    ErrorKind::ConnectionAuthentication,
                    "Unable to reconnect after reloading",
                ),
            ),
        ];

        let reload_cmd = self.profile().reload_cmd.unwrap_or("reload");
        link.ctrl
            .send_command(reload_cmd)
            .await
            .map_err(|e| link.channel_error(e))?;
        let fsm = Fsm::new("RELOAD", events, transitions, Duration::from_secs(300));
        let mut ctx = link.context();
        if !fsm.run(&mut ctx).await? {
            let msg = match std::mem::take(&mut ctx.msg) {
                msg if msg.is_empty() => "Reload failed".to_string(),
                msg => msg,
            };
            return Err(Error::general(ctx.hostname(), msg));
        }
        if ctx.pattern.as_ref() == Some(&reconfigure) {
            info!("{}: reload completed, root-system username not configured", ctx.hostname());
            return Ok(None);
        }
        info!("{}: reload completed", ctx.hostname());
        Ok(ctx.pattern.take())
    }
}

/// 64-bit IOS XR.
///
/// Shares the XR prompt grammar, and its command wait follows the detour
/// into the admin plane that `admin` commands take.
#[derive(Debug)]
pub struct Exr {
    core: DriverCore,
    admin: AdminPlane,
}

impl Exr {
    pub fn new(registry: Arc<PatternRegistry>) -> Result<Self> {
        let core = DriverCore::new(&profile::EXR, registry)?;
        let admin = AdminPlane {
            prompt: core.event("calvados")?,
            connect: core.event("calvados_connect")?,
            term_length: core.event("calvados_term_length")?,
        };
        Ok(Self { core, admin })
    }
}

#[async_trait]
impl Driver for Exr {
    fn core(&self) -> &DriverCore {
        &self.core
    }

    fn pin_platform(&self, detected: PlatformId) -> PlatformId {
        match detected {
            PlatformId::Xr => PlatformId::Exr,
            other => other,
        }
    }

    async fn wait_for_string(
        &self,
        link: &mut Link<'_>,
        expected: &Event,
        timeout: Duration,
    ) -> Result<bool> {
        wait_for_string_exr(self, &self.admin, link, expected, timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{Controller, DeviceState};
    use crate::channel::{Script, ScriptedSpawner, SessionConfig};
    use crate::transport::HopInfo;

    #[tokio::test]
    async fn test_xrv_reload_refused_on_telnet_line() {
        let script = Script::new().reply(
            "admin reload location all",
            "\r\nReload to the ROM monitor disallowed from a telnet line.\r\nRP/0/0/CPU0:xrv#",
        );
        let mut ctrl = Controller::new(Arc::new(ScriptedSpawner::new([script])), SessionConfig::default());
        ctrl.spawn_session("telnet xrv 23").await.unwrap();
        let mut state = DeviceState::new(HopInfo::new("xrv"), true);
        let mut link = Link::new(&mut ctrl, &mut state, &[]);

        let driver = XrV::new(PatternRegistry::builtin()).unwrap();
        let err = driver
            .reload(&mut link, &ReloadOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::General);
        assert_eq!(err.host(), Some("xrv"));
        assert!(err.to_string().contains("disallowed from a telnet line"));
    }

    #[test]
    fn test_exr_pins_xr_prompt() {
        let exr = Exr::new(PatternRegistry::builtin()).unwrap();
        assert_eq!(exr.reclassify("RP/0/RP0/CPU0:ncs5k#"), PlatformId::Exr);
        assert_eq!(exr.reclassify("sysadmin-vm:0_RP0#"), PlatformId::Calvados);

        let xr = Xr::new(PatternRegistry::builtin()).unwrap();
        assert_eq!(xr.reclassify("RP/0/RP0/CPU0:ncs5k#"), PlatformId::Xr);
    }

    #[test]
    fn test_xr_prep_commands() {
        let xrv = XrV::new(PatternRegistry::builtin()).unwrap();
        assert_eq!(xrv.profile().terminal_prep[0], "terminal exec prompt no-timestamp");
        assert_eq!(xrv.profile().reload_cmd, Some("admin reload location all"));
    }
}
