//! Telnet client protocol, directly or through a console server.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;

use super::{HopInfo, Protocol, try_read_prompt};
use crate::chain::Link;
use crate::channel::{Event, EventList};
use crate::driver::Driver;
use crate::error::{Error, ErrorKind, Result};
use crate::fsm::actions::{
    AuthenticationError, SaveLastPattern, SendPassword, SendText, SendUsername, StandbyConsole,
    UnableToConnect,
};
use crate::fsm::{Action, Fsm, Transition};

const ESCAPE_CHAR: &str = "Escape character is|Open";
const PASSWORD_OK: &str = "[Pp]assword [Oo][Kk]";
const AUTH_FAILED: &str = "Authentication failed|not authorized|Login incorrect";

const TELNET_TIMEOUT: Duration = Duration::from_secs(60);

/// Login through the `telnet` command line client.
///
/// Console servers often stay silent after the connection opens, so the
/// console flavour presses return right after the escape character banner.
#[derive(Debug, Default)]
pub struct Telnet {
    console: bool,
    last_pattern: Option<Event>,
}

impl Telnet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Telnet to a console server line.
    pub fn console() -> Self {
        Self {
            console: true,
            last_pattern: None,
        }
    }
}

fn event(pattern: &str, host: &str) -> Result<Event> {
    Event::regex(pattern).map_err(|e| Error::from_pattern(e, host))
}

#[async_trait]
impl Protocol for Telnet {
    fn name(&self) -> &'static str {
        if self.console { "telnet_console" } else { "telnet" }
    }

    fn spawn_command(&self, hop: &HopInfo) -> String {
        format!("telnet {} {}", hop.host, hop.port_or_default())
    }

    async fn connect(&mut self, driver: &dyn Driver, link: &mut Link<'_>) -> Result<bool> {
        let p = driver.patterns();
        let prompt = link.prompt_event(driver);
        let escape = event(ESCAPE_CHAR, link.hostname())?;
        let password_ok = event(PASSWORD_OK, link.hostname())?;

        let events: EventList = [
            escape.clone(),
            p.press_return.clone(),
            p.standby.clone(),
            p.username.clone(),
            p.password.clone(),
            p.more.clone(),
            prompt.clone(),
            p.rommon.clone(),
            p.unable_to_connect.clone(),
            p.timeout.clone(),
            Event::Timeout,
            password_ok.clone(),
        ]
        .into_iter()
        .collect();

        let on_escape = if self.console {
            Action::invoke(SendText::new("\r\n"))
        } else {
            Action::NoOp
        };
        let transitions = vec![
            Transition::new(&escape, &[0], 1, on_escape).with_timeout_secs(20),
            Transition::new(&p.press_return, &[0, 1], 1, Action::invoke(SendText::new("\r\n"))).with_timeout_secs(10),
            Transition::new(&password_ok, &[0, 1], 1, Action::invoke(SendText::new("\r\n"))).with_timeout_secs(10),
            Transition::new(&p.standby, &[0, 1, 5], -1, Action::invoke(StandbyConsole)),
            Transition::new(&p.username, &[0, 1, 5, 6], -1, Action::invoke(SaveLastPattern)),
            Transition::new(&p.password, &[0, 1, 5], -1, Action::invoke(SaveLastPattern)),
            Transition::new(&p.more, &[0, 5], 7, Action::invoke(SendText::new("q"))).with_timeout_secs(10),
            // the pager banner is printed again when erased
            Transition::new(&p.more, &[7], 8, Action::NoOp).with_timeout_secs(10),
            Transition::new(&prompt, &[0, 1], 0, Action::NoOp).with_timeout_secs(10),
            Transition::new(&prompt, &[5, 6, 8], -1, Action::invoke(SaveLastPattern)),
            Transition::new(&p.rommon, &[0, 1, 5], -1, Action::invoke(SaveLastPattern)),
            Transition::new(&p.unable_to_connect, &[0, 1], -1, Action::invoke(UnableToConnect)),
            Transition::new(
                &p.timeout,
                &[0, 1],
                -1,
                Action::fail(ErrorKind::ConnectionTimeout, "Connection timeout"),
            ),
            Transition::new(&Event::Timeout, &[0, 1], 5, Action::invoke(SendText::new("\r\n"))).with_timeout_secs(10),
            Transition::new(
                &Event::Timeout,
                &[5],
                -1,
                Action::fail(ErrorKind::ConnectionTimeout, "Connection timeout"),
            ),
        ];

        debug!("{}: expected prompt: {}", link.hostname(), prompt);
        let name = if self.console { "TELNET-CONNECT-CONSOLE" } else { "TELNET-CONNECT" };
        let fsm = Fsm::new(name, events, transitions, TELNET_TIMEOUT).with_init_pattern(self.last_pattern.take());
        let mut ctx = link.context();
        let connected = fsm.run(&mut ctx).await?;
        self.last_pattern = ctx.last_pattern.take();
        Ok(connected)
    }

    async fn authenticate(&mut self, driver: &dyn Driver, link: &mut Link<'_>) -> Result<bool> {
        let p = driver.patterns();
        let prompt = link.prompt_event(driver);
        let auth_failed = event(AUTH_FAILED, link.hostname())?;

        let events: EventList = [
            p.username.clone(),
            p.password.clone(),
            prompt.clone(),
            p.rommon.clone(),
            p.unable_to_connect.clone(),
            auth_failed.clone(),
            Event::Timeout,
            Event::Eof,
        ]
        .into_iter()
        .collect();

        let transitions = vec![
            Transition::new(&p.username, &[0], 1, Action::invoke(SendUsername)).with_timeout_secs(10),
            Transition::new(&p.username, &[1], 1, Action::NoOp).with_timeout_secs(10),
            Transition::new(&p.password, &[0, 1], 2, Action::invoke(SendPassword::from_hop())).with_timeout_secs(20),
            Transition::new(&p.username, &[2], -1, Action::invoke(AuthenticationError)),
            Transition::new(&p.password, &[2], -1, Action::invoke(AuthenticationError)),
            Transition::new(&auth_failed, &[2], -1, Action::invoke(AuthenticationError)),
            Transition::new(&prompt, &[0, 1, 2], -1, Action::NoOp),
            Transition::new(&p.rommon, &[0], -1, Action::invoke(SendText::new("\r\n"))),
            Transition::new(&Event::Timeout, &[0], 1, Action::invoke(SendText::new("\r\n"))).with_timeout_secs(10),
            Transition::new(&Event::Timeout, &[2], -1, Action::NoOp),
            Transition::new(
                &Event::Timeout,
                &[1],
                -1,
                Action::fail(ErrorKind::ConnectionTimeout, "Connection timeout"),
            ),
            Transition::new(
                &Event::Eof,
                &[0, 1, 2],
                -1,
                Action::fail(ErrorKind::Connection, "Device disconnected"),
            ),
            Transition::new(&p.unable_to_connect, &[0, 1, 2], -1, Action::invoke(UnableToConnect)),
        ];

        debug!("{}: expected prompt: {}", link.hostname(), prompt);
        let fsm = Fsm::new("TELNET-AUTH", events, transitions, TELNET_TIMEOUT)
            .with_init_pattern(self.last_pattern.take());
        let host = link.hostname().to_string();
        try_read_prompt(&mut *link.ctrl, &host, 1.0).await?;
        fsm.run(&mut link.context()).await
    }

    fn resume_at(&mut self, pattern: Event) {
        self.last_pattern = Some(pattern);
    }

    async fn disconnect(&mut self, link: &mut Link<'_>) -> Result<()> {
        debug!("{}: leaving telnet session", link.hostname());
        link.ctrl.send("\x04").await.map_err(|e| link.channel_error(e))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::chain::{Controller, DeviceState};
    use crate::channel::{Script, ScriptedSpawner, SessionConfig};
    use crate::driver::Generic;
    use crate::platform::PatternRegistry;

    async fn run(telnet: &mut Telnet, script: Script, hop: HopInfo) -> (Arc<ScriptedSpawner>, Result<bool>) {
        let spawner = Arc::new(ScriptedSpawner::new([script]));
        let mut ctrl = Controller::new(spawner.clone(), SessionConfig::default());
        let driver = Generic::new(PatternRegistry::builtin()).unwrap();
        ctrl.spawn_session(&telnet.spawn_command(&hop)).await.unwrap();

        let mut state = DeviceState::new(hop, true);
        let mut link = Link::new(&mut ctrl, &mut state, &[]);
        let result = match telnet.connect(&driver, &mut link).await {
            Ok(true) => telnet.authenticate(&driver, &mut link).await,
            other => other,
        };
        (spawner, result)
    }

    fn login_script() -> Script {
        Script::new()
            .emit("Trying 10.0.0.2...\r\nConnected to 10.0.0.2.\r\nEscape character is '^]'.\r\n\r\n")
            .emit("User Access Verification\r\n\r\nUsername: ")
            .reply("admin", "\r\nPassword: ")
            .echo(false)
            .reply("secret", "\r\nrouter#")
            .echo(true)
            .prompt("router#")
    }

    fn hop() -> HopInfo {
        HopInfo::new("10.0.0.2").username("admin").password("secret")
    }

    #[tokio::test]
    async fn test_username_and_password() {
        let (spawner, result) = run(&mut Telnet::new(), login_script(), hop()).await;
        assert!(result.unwrap());
        let log = spawner.log();
        assert_eq!(log.spawned, vec!["telnet 10.0.0.2 23".to_string()]);
        assert_eq!(log.sent, "admin\nsecret\n");
    }

    #[tokio::test]
    async fn test_rejected_password() {
        let script = Script::new()
            .emit("Escape character is '^]'.\r\nUsername: ")
            .reply("admin", "\r\nPassword: ")
            .echo(false)
            .reply("secret", "\r\n% Login invalid\r\n\r\nUsername: ");
        let (_, result) = run(&mut Telnet::new(), script, hop()).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::ConnectionAuthentication);
    }

    #[tokio::test]
    async fn test_standby_console_fails() {
        let script = Script::new().emit("Escape character is '^]'.\r\n").emit("Standby console disabled\r\n");
        let (_, result) = run(&mut Telnet::console(), script, HopInfo::new("ts1").port(2005)).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::StandbyConsole);
    }

    #[tokio::test]
    async fn test_console_presses_return() {
        let script = Script::new()
            .emit("Escape character is '^]'.\r\n")
            .reply("", "\r\nUsername: ")
            .reply("admin", "\r\nPassword: ")
            .echo(false)
            .reply("secret", "\r\nrouter#");
        let (spawner, result) = run(&mut Telnet::console(), script, hop()).await;
        assert!(result.unwrap());
        assert!(spawner.log().sent.starts_with("\r\nadmin\n"));
    }

    #[tokio::test]
    async fn test_prompt_without_login() {
        let script = Script::new()
            .emit("Escape character is '^]'.\r\n")
            .prompt("router>");
        let (_, result) = run(&mut Telnet::new(), script, hop()).await;
        assert!(result.unwrap());
    }

    #[tokio::test]
    async fn test_unreachable() {
        let script = Script::new().emit("Trying 10.0.0.2...\r\ntelnet: Unable to connect to remote host: Connection refused\r\n");
        let (_, result) = run(&mut Telnet::new(), script, hop()).await;
        assert!(!result.unwrap());
    }
}
