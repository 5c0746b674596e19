//! Channel layer: the raw terminal session and expect-style matching.
//!
//! A [`Terminal`] is a byte stream to a spawned client process (ssh, telnet).
//! A [`Session`] wraps one with an [`ExpectBuffer`] and provides the
//! pattern-based blocking operations the FSMs are built on.

mod buffer;
mod config;
mod event;
mod pty;
mod scripted;
mod session;

pub use buffer::{ExpectBuffer, Found};
pub use config::SessionConfig;
pub use event::{Event, EventList};
pub use pty::{PtySpawner, PtyTerminal};
pub use scripted::{Script, ScriptLog, ScriptedSpawner, ScriptedTerminal};
pub use session::Session;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::ChannelError;

/// Outcome of a single read from a terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadChunk {
    /// Raw bytes from the client.
    Data(Bytes),
    /// Nothing arrived within the timeout.
    Timeout,
    /// The client closed its side.
    Eof,
}

/// Raw byte stream to a spawned client.
#[async_trait]
pub trait Terminal: Send {
    /// Write bytes to the client.
    async fn write(&mut self, data: &[u8]) -> Result<(), ChannelError>;

    /// Read whatever is available, waiting at most `timeout`.
    async fn read(&mut self, timeout: Duration) -> Result<ReadChunk, ChannelError>;

    /// Whether the client process is still running.
    fn is_alive(&mut self) -> bool;

    /// Toggle local echo on the terminal line.
    fn set_echo(&mut self, _on: bool) {}

    /// Terminate the client.
    async fn close(&mut self) -> Result<(), ChannelError>;
}

/// Starts client processes from a command line.
pub trait Spawner: Send + Sync {
    /// Spawn `command` and return its terminal.
    fn spawn(&self, command: &str, config: &SessionConfig)
    -> Result<Box<dyn Terminal>, ChannelError>;
}
