//! Local PTY terminal for spawned ssh/telnet clients.

use std::io::{Read, Write};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, warn};
use portable_pty::{Child, CommandBuilder, MasterPty, PtySize, native_pty_system};
use tokio::sync::mpsc;

use super::config::SessionConfig;
use super::{ReadChunk, Spawner, Terminal};
use crate::error::ChannelError;

/// Spawns client processes on a local pseudo-terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct PtySpawner;

fn spawn_error(command: &str, err: impl ToString) -> ChannelError {
    ChannelError::Spawn {
        command: command.to_string(),
        message: err.to_string(),
    }
}

impl Spawner for PtySpawner {
    fn spawn(
        &self,
        command: &str,
        config: &SessionConfig,
    ) -> Result<Box<dyn Terminal>, ChannelError> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| spawn_error(command, "empty command line"))?;

        let pair = native_pty_system()
            .openpty(PtySize {
                rows: config.terminal_height,
                cols: config.terminal_width,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| spawn_error(command, e))?;

        let mut builder = CommandBuilder::new(program);
        builder.args(parts);
        builder.env("TERM", &config.term);

        let child = pair
            .slave
            .spawn_command(builder)
            .map_err(|e| spawn_error(command, e))?;
        drop(pair.slave);

        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| spawn_error(command, e))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| spawn_error(command, e))?;

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::task::spawn_blocking(move || {
            let mut chunk = [0u8; 4096];
            loop {
                match reader.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(Bytes::copy_from_slice(&chunk[..n])).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!("pty reader stopped: {}", e);
                        break;
                    }
                }
            }
        });

        debug!("spawned '{}' on a {}x{} pty", command, config.terminal_width, config.terminal_height);
        Ok(Box::new(PtyTerminal {
            _master: pair.master,
            writer,
            child,
            rx,
        }))
    }
}

/// A client process attached to a local PTY.
pub struct PtyTerminal {
    _master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    child: Box<dyn Child + Send + Sync>,
    rx: mpsc::UnboundedReceiver<Bytes>,
}

#[async_trait]
impl Terminal for PtyTerminal {
    async fn write(&mut self, data: &[u8]) -> Result<(), ChannelError> {
        self.writer.write_all(data)?;
        self.writer.flush()?;
        Ok(())
    }

    async fn read(&mut self, timeout: Duration) -> Result<ReadChunk, ChannelError> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(data)) => Ok(ReadChunk::Data(data)),
            Ok(None) => Ok(ReadChunk::Eof),
            Err(_) => Ok(ReadChunk::Timeout),
        }
    }

    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    async fn close(&mut self) -> Result<(), ChannelError> {
        if self.is_alive() {
            if let Err(e) = self.child.kill() {
                warn!("failed to kill client process: {}", e);
            }
        }
        self.rx.close();
        Ok(())
    }
}
