//! The live terminal session of a chain.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use crate::channel::{Event, Session, SessionConfig, Spawner};
use crate::error::ChannelError;

/// Owns the single session of a chain and the spawner that created it.
///
/// The first hop spawns a local client; later hops pivot the same session
/// by typing their client command into the current shell.
pub struct Controller {
    spawner: Arc<dyn Spawner>,
    config: SessionConfig,
    session: Option<Session>,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("config", &self.config)
            .field("session", &self.session.is_some())
            .finish()
    }
}

impl Controller {
    /// Create a controller without a session.
    pub fn new(spawner: Arc<dyn Spawner>, config: SessionConfig) -> Self {
        Self {
            spawner,
            config,
            session: None,
        }
    }

    /// Session settings.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn session(&mut self) -> Result<&mut Session, ChannelError> {
        self.session.as_mut().ok_or(ChannelError::NotConnected)
    }

    /// Start `command`.
    ///
    /// With a live session the command is typed into it and its echo is
    /// confirmed before pressing return. Otherwise a new client process is
    /// spawned.
    pub async fn spawn_session(&mut self, command: &str) -> Result<(), ChannelError> {
        debug!("executing command: '{}'", command);
        if self.is_alive() {
            let timeout = self.config.echo_confirm_timeout;
            let echo = Event::literal(command)?;
            let session = self.session()?;
            session.send(command).await?;
            session.expect(std::slice::from_ref(&echo), timeout).await?;
            session.send_line("").await?;
        } else {
            let terminal = self.spawner.spawn(command, &self.config)?;
            self.session = Some(Session::new(terminal, &self.config));
        }
        Ok(())
    }

    /// Type a command with echo suppressed and press return once its echo
    /// arrived (or the echo timeout passed).
    pub async fn send_command(&mut self, command: &str) -> Result<(), ChannelError> {
        let timeout = self.config.command_echo_timeout;
        let events = [Event::literal(command)?, Event::Timeout];
        let session = self.session()?;
        session.set_echo(false);
        let result = async {
            session.send(command).await?;
            if session.expect(&events, timeout).await? == 1 {
                debug!("no echo of '{}' within {:?}", command, timeout);
            }
            session.send_line("").await
        }
        .await;
        session.set_echo(true);
        result
    }

    /// Leave every hop and terminate the client.
    pub async fn disconnect(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        if session.is_alive() {
            debug!("disconnecting the session");
            let goodbye = async {
                session.send_line("\x04").await?;
                session.send_line("\x03").await?;
                session.send_control(']').await?;
                session.send_line("quit").await
            }
            .await;
            if let Err(e) = goodbye {
                debug!("session gone while disconnecting: {}", e);
            }
        }
        if let Err(e) = session.close().await {
            warn!("failed to close the session: {}", e);
        }
        debug!("disconnected");
    }

    /// Whether a session exists and its client is running.
    pub fn is_alive(&mut self) -> bool {
        self.session.as_mut().is_some_and(Session::is_alive)
    }

    /// Whether a session exists.
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// See [`Session::expect`].
    pub async fn expect(&mut self, events: &[Event], timeout: Duration) -> Result<usize, ChannelError> {
        self.session()?.expect(events, timeout).await
    }

    /// See [`Session::send`].
    pub async fn send(&mut self, data: &str) -> Result<(), ChannelError> {
        self.session()?.send(data).await
    }

    /// See [`Session::send_line`].
    pub async fn send_line(&mut self, text: &str) -> Result<(), ChannelError> {
        self.session()?.send_line(text).await
    }

    /// See [`Session::send_control`].
    pub async fn send_control(&mut self, c: char) -> Result<(), ChannelError> {
        self.session()?.send_control(c).await
    }

    /// See [`Session::set_echo`].
    pub fn set_echo(&mut self, on: bool) {
        if let Some(session) = self.session.as_mut() {
            session.set_echo(on);
        }
    }

    /// See [`Session::read_nonblocking`].
    pub async fn read_nonblocking(&mut self, size: usize, timeout: Duration) -> Result<Vec<u8>, ChannelError> {
        self.session()?.read_nonblocking(size, timeout).await
    }

    /// Text preceding the last match.
    pub fn before(&self) -> &str {
        self.session.as_ref().map_or("", Session::before)
    }

    /// Text of the last match.
    pub fn after(&self) -> &str {
        self.session.as_ref().map_or("", Session::after)
    }
}
