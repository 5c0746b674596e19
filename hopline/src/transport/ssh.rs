//! OpenSSH client protocol.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;

use super::{HopInfo, Protocol, try_read_prompt};
use crate::chain::Link;
use crate::channel::{Event, EventList};
use crate::driver::Driver;
use crate::error::{Error, ErrorKind, Result};
use crate::fsm::actions::{
    AuthenticationError, Respawn, SaveLastPattern, SendLine, SendPassword, SendText, UnableToConnect,
};
use crate::fsm::{Action, Fsm, Transition};

const NEW_HOST_KEY: &str = "fingerprint is";
const KNOWN_HOSTS: &str = "added.*to the list of known hosts";
const HOST_KEY_FAILED: &str = "key verification failed";
const MODULUS_TOO_SMALL: &str = "modulus too small";
const PROTOCOL_DIFFER: &str = "Protocol major versions differ";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const AUTH_TIMEOUT: Duration = Duration::from_secs(30);

/// Login through the `ssh` command line client.
///
/// Host keys are accepted without recording them. Servers that only speak
/// protocol version 1 get the client respawned with `-1`.
#[derive(Debug, Default)]
pub struct Ssh {
    last_pattern: Option<Event>,
}

impl Ssh {
    pub fn new() -> Self {
        Self::default()
    }

    fn command(hop: &HopInfo, version: u8) -> String {
        let target = match &hop.username {
            Some(username) => format!("{}@{}", username, hop.host),
            None => hop.host.clone(),
        };
        format!(
            "ssh -o UserKnownHostsFile=/dev/null -o StrictHostKeyChecking=no -{} -p {} {}",
            version,
            hop.port_or_default(),
            target
        )
    }
}

fn event(pattern: &str, host: &str) -> Result<Event> {
    Event::regex(pattern).map_err(|e| Error::from_pattern(e, host))
}

#[async_trait]
impl Protocol for Ssh {
    fn name(&self) -> &'static str {
        "ssh"
    }

    fn spawn_command(&self, hop: &HopInfo) -> String {
        Self::command(hop, 2)
    }

    async fn connect(&mut self, driver: &dyn Driver, link: &mut Link<'_>) -> Result<bool> {
        let p = driver.patterns();
        let prompt = link.prompt_event(driver);
        let new_host_key = event(NEW_HOST_KEY, link.hostname())?;
        let known_hosts = event(KNOWN_HOSTS, link.hostname())?;
        let host_key_failed = event(HOST_KEY_FAILED, link.hostname())?;
        let modulus = event(MODULUS_TOO_SMALL, link.hostname())?;
        let protocol_differ = event(PROTOCOL_DIFFER, link.hostname())?;
        let legacy = Self::command(&link.state.hop, 1);

        let events: EventList = [
            p.password.clone(),
            prompt.clone(),
            p.unable_to_connect.clone(),
            new_host_key.clone(),
            known_hosts.clone(),
            host_key_failed.clone(),
            modulus.clone(),
            protocol_differ.clone(),
            p.timeout.clone(),
            Event::Timeout,
        ]
        .into_iter()
        .collect();

        let transitions = vec![
            Transition::new(&p.password, &[0, 1, 4, 5], -1, Action::invoke(SaveLastPattern)),
            Transition::new(&prompt, &[0], -1, Action::invoke(SaveLastPattern)),
            Transition::new(&p.unable_to_connect, &[0], -1, Action::invoke(UnableToConnect)),
            Transition::new(&new_host_key, &[0], 1, Action::invoke(SendLine::new("yes"))).with_timeout_secs(10),
            Transition::new(&known_hosts, &[0, 1], 0, Action::NoOp),
            Transition::new(
                &host_key_failed,
                &[0],
                -1,
                Action::fail(ErrorKind::Connection, "Host key failed"),
            ),
            Transition::new(&modulus, &[0], 0, Action::invoke(Respawn(legacy.clone()))),
            Transition::new(&protocol_differ, &[0], 4, Action::invoke(Respawn(legacy))),
            Transition::new(
                &protocol_differ,
                &[4],
                -1,
                Action::fail(ErrorKind::Connection, "Protocol version differs"),
            ),
            Transition::new(&Event::Timeout, &[0], 5, Action::invoke(SendText::new("\r\n"))).with_timeout_secs(10),
            Transition::new(
                &Event::Timeout,
                &[5],
                -1,
                Action::fail(ErrorKind::ConnectionTimeout, "Connection timeout"),
            ),
            Transition::new(
                &p.timeout,
                &[0],
                -1,
                Action::fail(ErrorKind::ConnectionTimeout, "Connection timeout"),
            ),
        ];

        debug!("{}: expected prompt: {}", link.hostname(), prompt);
        let fsm = Fsm::new("SSH-CONNECT", events, transitions, CONNECT_TIMEOUT);
        let mut ctx = link.context();
        let connected = fsm.run(&mut ctx).await?;
        self.last_pattern = ctx.last_pattern.take();
        Ok(connected)
    }

    async fn authenticate(&mut self, driver: &dyn Driver, link: &mut Link<'_>) -> Result<bool> {
        let p = driver.patterns();
        let prompt = link.prompt_event(driver);

        let events: EventList = [p.press_return.clone(), p.password.clone(), prompt.clone(), Event::Timeout]
            .into_iter()
            .collect();

        let on_silence = if link.state.is_target {
            Action::fail(ErrorKind::Connection, "Error getting device prompt")
        } else {
            Action::invoke(SendText::new("\r\n"))
        };
        let transitions = vec![
            Transition::new(&p.press_return, &[0, 1], 1, Action::invoke(SendText::new("\r\n"))).with_timeout_secs(10),
            Transition::new(&p.password, &[0], 1, Action::invoke(SendPassword::from_hop())).with_timeout_secs(20),
            Transition::new(&p.password, &[1], -1, Action::invoke(AuthenticationError)),
            Transition::new(&prompt, &[0, 1], -1, Action::NoOp),
            Transition::new(&Event::Timeout, &[1], -1, on_silence),
        ];

        let fsm = Fsm::new("SSH-AUTH", events, transitions, AUTH_TIMEOUT)
            .with_init_pattern(self.last_pattern.take());
        fsm.run(&mut link.context()).await?;

        let host = link.hostname().to_string();
        try_read_prompt(&mut *link.ctrl, &host, 1.0).await?;
        Ok(true)
    }

    fn resume_at(&mut self, pattern: Event) {
        self.last_pattern = Some(pattern);
    }

    async fn disconnect(&mut self, link: &mut Link<'_>) -> Result<()> {
        debug!("{}: leaving ssh session", link.hostname());
        link.ctrl
            .send_line("\x03")
            .await
            .map_err(|e| link.channel_error(e))
    }
}
