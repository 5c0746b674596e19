//! A hop's view of the shared session.

use std::time::Duration;

use log::{debug, error};

use super::{Controller, DeviceState};
use crate::channel::Event;
use crate::driver::Driver;
use crate::error::{ChannelError, Error, ErrorKind, Result};
use crate::fsm::FsmContext;

/// The chain's session, borrowed together with the state of the hop that
/// currently talks on it.
///
/// `previous_prompts` holds a never matching sentinel followed by the
/// prompts of the hops before this one.
pub struct Link<'a> {
    pub ctrl: &'a mut Controller,
    pub state: &'a mut DeviceState,
    pub previous_prompts: &'a [Event],
}

impl<'a> Link<'a> {
    pub fn new(ctrl: &'a mut Controller, state: &'a mut DeviceState, previous_prompts: &'a [Event]) -> Self {
        Self {
            ctrl,
            state,
            previous_prompts,
        }
    }

    /// Hostname of the hop.
    pub fn hostname(&self) -> &str {
        &self.state.hostname
    }

    /// Fresh FSM context over this link.
    pub fn context(&mut self) -> FsmContext<'_> {
        FsmContext::new(&mut *self.ctrl, &mut *self.state)
    }

    /// Bind a session error to this hop.
    pub fn channel_error(&self, err: ChannelError) -> Error {
        Error::from_channel(err, &self.state.hostname)
    }

    /// The hop's own prompt once detected, the platform prompt grammar
    /// before that.
    pub fn prompt_event(&self, driver: &(impl Driver + ?Sized)) -> Event {
        match &self.state.prompt_re {
            Some(prompt) => prompt.clone(),
            None => driver.patterns().prompt.clone(),
        }
    }

    /// Run `cmd` and return its output.
    ///
    /// Output ends at `wait_for` or, by default, at the hop's prompt. The
    /// echoed command line and carriage returns are removed. Every failure
    /// comes back as a typed error naming the hop.
    pub async fn send<D: Driver + ?Sized>(
        &mut self,
        driver: &D,
        cmd: &str,
        timeout: Duration,
        wait_for: Option<&Event>,
    ) -> Result<String> {
        if !self.state.connected {
            return Err(Error::connection(self.hostname(), "Device not connected"));
        }
        self.state.last_command_result = None;
        self.state.paged_output.clear();

        let expected = match wait_for.or(self.state.prompt_re.as_ref()) {
            Some(expected) => expected.clone(),
            None => return Err(Error::general(self.hostname(), "Prompt not detected")),
        };

        debug!("{}: sending '{}'", self.hostname(), cmd);
        let outcome = match self.ctrl.send_command(cmd).await {
            Ok(()) => driver.wait_for_string(self, &expected, timeout).await,
            Err(e) => Err(Error::Channel(e)),
        };

        match outcome {
            Ok(true) => {}
            Ok(false) => return Err(Error::connection(self.hostname(), "Unexpected session disconnect")),
            Err(e) => return Err(self.command_failure(e, cmd)),
        }

        let output = match self.state.last_command_result.take() {
            Some(result) => result,
            None => format!("{}{}", self.state.paged_output, self.ctrl.before()),
        };
        self.state.paged_output.clear();
        Ok(strip_echo(&output.replace('\r', ""), cmd))
    }

    fn command_failure(&self, err: Error, cmd: &str) -> Error {
        let host = self.hostname();
        match err {
            e @ (Error::Command { .. } | Error::CommandSyntax { .. }) => e.with_command(cmd),
            Error::CommandTimeout { .. } | Error::Channel(ChannelError::Timeout(_)) => {
                Error::new(ErrorKind::CommandTimeout, host, "Command timeout").with_command(cmd)
            }
            e @ (Error::Connection { .. }
            | Error::ConnectionTimeout { .. }
            | Error::ConnectionAuthentication { .. }
            | Error::StandbyConsole { .. }) => e,
            Error::Channel(ChannelError::Closed) => Error::connection(host, "Unexpected session disconnect"),
            other => {
                error!("{}: unexpected error while sending '{}': {}", host, cmd, other);
                Error::connection(host, "Unexpected error")
            }
        }
    }
}

/// Drop the echoed command line at the start of `output`.
fn strip_echo(output: &str, cmd: &str) -> String {
    match output.split_once('\n') {
        Some((first, rest)) if first.trim().is_empty() || first.contains(cmd) => rest.to_string(),
        _ => output.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::channel::{Script, ScriptedSpawner, SessionConfig};
    use crate::driver::Generic;
    use crate::platform::PatternRegistry;
    use crate::transport::HopInfo;

    async fn connected(script: Script) -> (Controller, DeviceState) {
        let spawner = Arc::new(ScriptedSpawner::new([script]));
        let mut ctrl = Controller::new(spawner, SessionConfig::default());
        ctrl.spawn_session("telnet router").await.unwrap();
        let mut state = DeviceState::new(HopInfo::new("router"), true);
        state.connected = true;
        state.prompt = Some("router#".to_string());
        state.prompt_re = Some(Event::regex(r"router#\s?").unwrap());
        (ctrl, state)
    }

    fn driver() -> Generic {
        Generic::new(PatternRegistry::builtin()).unwrap()
    }

    #[test]
    fn test_strip_echo() {
        assert_eq!(strip_echo("show clock\n12:00\n", "show clock"), "12:00\n");
        assert_eq!(strip_echo("\n12:00\n", "show clock"), "12:00\n");
        assert_eq!(strip_echo("12:00\n", "show clock"), "12:00\n");
    }

    #[tokio::test]
    async fn test_send_returns_output() {
        let script = Script::new()
            .prompt("router#")
            .reply("show clock", "*12:00:00.000 UTC Mon Jan 1 2024\r\nrouter#");
        let (mut ctrl, mut state) = connected(script).await;
        let mut link = Link::new(&mut ctrl, &mut state, &[]);
        let output = link.send(&driver(), "show clock", Duration::from_secs(10), None).await.unwrap();
        assert_eq!(output, "*12:00:00.000 UTC Mon Jan 1 2024\n");
    }

    #[tokio::test]
    async fn test_send_collects_pages() {
        let script = Script::new()
            .prompt("router#")
            .reply("show run", "line 1\r\n --More-- line 2\r\nrouter#");
        let (mut ctrl, mut state) = connected(script).await;
        let mut link = Link::new(&mut ctrl, &mut state, &[]);
        let output = link.send(&driver(), "show run", Duration::from_secs(10), None).await.unwrap();
        assert_eq!(output, "line 1\nline 2\n");
    }

    #[tokio::test]
    async fn test_silent_command_times_out() {
        let script = Script::new().reply("show tech", "building...");
        let (mut ctrl, mut state) = connected(script).await;
        let mut link = Link::new(&mut ctrl, &mut state, &[]);
        let err = link.send(&driver(), "show tech", Duration::from_secs(1), None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CommandTimeout);
        assert_eq!(err.command(), Some("show tech"));
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let (mut ctrl, mut state) = connected(Script::new()).await;
        state.connected = false;
        let mut link = Link::new(&mut ctrl, &mut state, &[]);
        let err = link.send(&driver(), "show clock", Duration::from_secs(1), None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
    }

    #[tokio::test]
    async fn test_syntax_error_names_command() {
        let script = Script::new()
            .prompt("router#")
            .reply("wrongcommand", "        ^\r\n% Invalid input detected at '^' marker.\r\n\r\nrouter#");
        let (mut ctrl, mut state) = connected(script).await;
        let mut link = Link::new(&mut ctrl, &mut state, &[]);
        let err = link.send(&driver(), "wrongcommand", Duration::from_secs(10), None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CommandSyntax);
        assert_eq!(err.command(), Some("wrongcommand"));
    }

    #[tokio::test]
    async fn test_previous_prompt_means_disconnect() {
        let script = Script::new()
            .prompt("router#")
            .reply("exit", "Connection closed by foreign host.\r\njump$ ");
        let (mut ctrl, mut state) = connected(script).await;
        let previous = [Event::never().unwrap(), Event::regex(r"jump\$\s?").unwrap()];
        let mut link = Link::new(&mut ctrl, &mut state, &previous);
        let err = link.send(&driver(), "exit", Duration::from_secs(10), None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert!(!state.connected);
    }
}
