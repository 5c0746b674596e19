//! Reusable FSM actions.

use async_trait::async_trait;
use log::{debug, info};
use secrecy::{ExposeSecret, SecretString};

use super::{FsmAction, FsmContext};
use crate::error::{Error, ErrorKind, Result};

/// Send raw text.
#[derive(Debug, Clone)]
pub struct SendText(pub String);

impl SendText {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }
}

#[async_trait]
impl FsmAction for SendText {
    async fn call(&self, ctx: &mut FsmContext<'_>) -> Result<bool> {
        if let Err(e) = ctx.ctrl.send(&self.0).await {
            return Err(ctx.channel_error(e));
        }
        Ok(true)
    }
}

/// Send a line of text.
#[derive(Debug, Clone)]
pub struct SendLine(pub String);

impl SendLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }
}

#[async_trait]
impl FsmAction for SendLine {
    async fn call(&self, ctx: &mut FsmContext<'_>) -> Result<bool> {
        if let Err(e) = ctx.ctrl.send_line(&self.0).await {
            return Err(ctx.channel_error(e));
        }
        Ok(true)
    }
}

/// Send the hop's username.
#[derive(Debug, Clone, Copy)]
pub struct SendUsername;

#[async_trait]
impl FsmAction for SendUsername {
    async fn call(&self, ctx: &mut FsmContext<'_>) -> Result<bool> {
        let Some(username) = ctx.device.hop.username.clone() else {
            return Err(Error::new(
                ErrorKind::ConnectionAuthentication,
                ctx.hostname(),
                "Username not provided",
            ));
        };
        if let Err(e) = ctx.ctrl.send_line(&username).await {
            return Err(ctx.channel_error(e));
        }
        Ok(true)
    }
}

/// Send a password with echo disabled.
///
/// Without an explicit password the hop's password is used.
#[derive(Debug, Default)]
pub struct SendPassword {
    password: Option<SecretString>,
}

impl SendPassword {
    /// Send the hop's password.
    pub fn from_hop() -> Self {
        Self::default()
    }

    /// Send a specific password, e.g. an enable secret.
    pub fn new(password: SecretString) -> Self {
        Self {
            password: Some(password),
        }
    }
}

#[async_trait]
impl FsmAction for SendPassword {
    async fn call(&self, ctx: &mut FsmContext<'_>) -> Result<bool> {
        let password = match self.password.as_ref().or(ctx.device.hop.password.as_ref()) {
            Some(password) => password.expose_secret().to_string(),
            None => {
                return Err(Error::new(
                    ErrorKind::ConnectionAuthentication,
                    ctx.hostname(),
                    "Password not provided",
                ));
            }
        };
        ctx.ctrl.set_echo(false);
        let sent = ctx.ctrl.send_line(&password).await;
        ctx.ctrl.set_echo(true);
        sent.map_err(|e| ctx.channel_error(e))?;
        Ok(true)
    }
}

/// Send the ROM monitor boot command.
#[derive(Debug, Clone)]
pub struct SendBoot(pub String);

impl Default for SendBoot {
    fn default() -> Self {
        Self("boot".to_string())
    }
}

#[async_trait]
impl FsmAction for SendBoot {
    async fn call(&self, ctx: &mut FsmContext<'_>) -> Result<bool> {
        info!("{}: booting from ROM monitor: {}", ctx.hostname(), self.0);
        if let Err(e) = ctx.ctrl.send_line(&self.0).await {
            return Err(ctx.channel_error(e));
        }
        Ok(true)
    }
}

/// Remember the matched event for the next machine.
#[derive(Debug, Clone, Copy)]
pub struct SaveLastPattern;

#[async_trait]
impl FsmAction for SaveLastPattern {
    async fn call(&self, ctx: &mut FsmContext<'_>) -> Result<bool> {
        ctx.last_pattern = ctx.pattern.clone();
        Ok(true)
    }
}

/// The expected prompt arrived.
#[derive(Debug, Clone, Copy)]
pub struct ExpectedPrompt;

#[async_trait]
impl FsmAction for ExpectedPrompt {
    async fn call(&self, ctx: &mut FsmContext<'_>) -> Result<bool> {
        ctx.device.last_prompt = Some(ctx.after().to_string());
        ctx.finished = true;
        Ok(true)
    }
}

/// A caller-supplied terminator arrived.
#[derive(Debug, Clone, Copy)]
pub struct ExpectedStringReceived;

#[async_trait]
impl FsmAction for ExpectedStringReceived {
    async fn call(&self, ctx: &mut FsmContext<'_>) -> Result<bool> {
        ctx.finished = true;
        Ok(true)
    }
}

/// A previous hop's prompt showed up: the hop dropped the session.
#[derive(Debug, Clone, Copy)]
pub struct UnexpectedPrompt;

#[async_trait]
impl FsmAction for UnexpectedPrompt {
    async fn call(&self, ctx: &mut FsmContext<'_>) -> Result<bool> {
        ctx.msg = format!("Received the jump host prompt: '{}'", ctx.after());
        ctx.device.connected = false;
        Ok(false)
    }
}

/// The remote end announced it closed the connection.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionClosed;

#[async_trait]
impl FsmAction for ConnectionClosed {
    async fn call(&self, ctx: &mut FsmContext<'_>) -> Result<bool> {
        ctx.msg = "Device disconnected".to_string();
        ctx.device.connected = false;
        // keep running to spot the jump host prompt
        Ok(true)
    }
}

/// A "press return" banner: the line is still up.
#[derive(Debug, Clone, Copy)]
pub struct StaysConnected;

#[async_trait]
impl FsmAction for StaysConnected {
    async fn call(&self, ctx: &mut FsmContext<'_>) -> Result<bool> {
        ctx.device.connected = true;
        Ok(true)
    }
}

/// The client could not reach the host.
#[derive(Debug, Clone, Copy)]
pub struct UnableToConnect;

#[async_trait]
impl FsmAction for UnableToConnect {
    async fn call(&self, ctx: &mut FsmContext<'_>) -> Result<bool> {
        ctx.msg = format!("{}{}", ctx.before(), ctx.after());
        Ok(false)
    }
}

/// Credentials were rejected.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticationError;

#[async_trait]
impl FsmAction for AuthenticationError {
    async fn call(&self, ctx: &mut FsmContext<'_>) -> Result<bool> {
        Err(Error::new(
            ErrorKind::ConnectionAuthentication,
            ctx.hostname(),
            "Authentication failed",
        ))
    }
}

/// Landed on the console of a standby route processor.
#[derive(Debug, Clone, Copy)]
pub struct StandbyConsole;

#[async_trait]
impl FsmAction for StandbyConsole {
    async fn call(&self, ctx: &mut FsmContext<'_>) -> Result<bool> {
        ctx.device.is_console = Some(true);
        Err(Error::new(ErrorKind::StandbyConsole, ctx.hostname(), "Standby console"))
    }
}

/// Store the text before the match as the command result, without the
/// echoed first line.
#[derive(Debug, Clone, Copy)]
pub struct StoreCmdResult;

#[async_trait]
impl FsmAction for StoreCmdResult {
    async fn call(&self, ctx: &mut FsmContext<'_>) -> Result<bool> {
        let before = ctx.before();
        let result = match before.find('\n') {
            Some(index) if index > 0 => &before[index + 1..],
            _ => before,
        };
        ctx.device.last_command_result = Some(result.replace('\r', ""));
        Ok(true)
    }
}

/// Pager banner: keep the page and ask for the next one.
#[derive(Debug, Clone, Copy)]
pub struct PageMore;

#[async_trait]
impl FsmAction for PageMore {
    async fn call(&self, ctx: &mut FsmContext<'_>) -> Result<bool> {
        let page = ctx.before().to_string();
        ctx.device.paged_output.push_str(&page);
        if let Err(e) = ctx.ctrl.send(" ").await {
            return Err(ctx.channel_error(e));
        }
        Ok(true)
    }
}

/// Start the client again with a different command line.
#[derive(Debug, Clone)]
pub struct Respawn(pub String);

#[async_trait]
impl FsmAction for Respawn {
    async fn call(&self, ctx: &mut FsmContext<'_>) -> Result<bool> {
        info!("{}: respawning: {}", ctx.hostname(), self.0);
        if let Err(e) = ctx.ctrl.spawn_session(&self.0).await {
            return Err(ctx.channel_error(e));
        }
        Ok(true)
    }
}

/// Reload to ROM monitor is refused on this line.
#[derive(Debug, Clone, Copy)]
pub struct ReloadNotAvailable;

#[async_trait]
impl FsmAction for ReloadNotAvailable {
    async fn call(&self, ctx: &mut FsmContext<'_>) -> Result<bool> {
        ctx.msg = "Reload to the ROM monitor disallowed from a telnet line. \
                   Set the configuration register boot bits to be non-zero."
            .to_string();
        Ok(false)
    }
}

/// The device went down on purpose (reload): drop the session.
#[derive(Debug, Clone, Copy)]
pub struct Disconnect;

#[async_trait]
impl FsmAction for Disconnect {
    async fn call(&self, ctx: &mut FsmContext<'_>) -> Result<bool> {
        ctx.msg = "Device is reloading".to_string();
        debug!("{}: {}", ctx.hostname(), ctx.msg);
        ctx.device.connected = false;
        ctx.ctrl.disconnect().await;
        ctx.finished = true;
        Ok(true)
    }
}
