//! Expect-style session over a raw terminal.

use std::time::Duration;

use log::trace;
use tokio::time::Instant;

use super::buffer::ExpectBuffer;
use super::config::SessionConfig;
use super::event::Event;
use super::{ReadChunk, Terminal};
use crate::error::ChannelError;

/// Interactive session with `expect`, `before`/`after` and paced reads.
pub struct Session {
    terminal: Box<dyn Terminal>,
    buffer: ExpectBuffer,
    before: String,
    after: String,
    echo: bool,
}

impl Session {
    /// Wrap a spawned terminal.
    pub fn new(terminal: Box<dyn Terminal>, config: &SessionConfig) -> Self {
        Self {
            terminal,
            buffer: ExpectBuffer::new(config.search_depth),
            before: String::new(),
            after: String::new(),
            echo: true,
        }
    }

    /// Send raw text.
    pub async fn send(&mut self, data: &str) -> Result<(), ChannelError> {
        if self.echo {
            trace!("send: {:?}", data);
        } else {
            trace!("send: <hidden>");
        }
        self.terminal.write(data.as_bytes()).await
    }

    /// Send text followed by a line feed.
    pub async fn send_line(&mut self, text: &str) -> Result<(), ChannelError> {
        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push('\n');
        self.send(&line).await
    }

    /// Send a control character, e.g. `'c'` for Ctrl-C or `']'` for the
    /// telnet escape.
    pub async fn send_control(&mut self, c: char) -> Result<(), ChannelError> {
        let code = (c.to_ascii_lowercase() as u8) & 0x1f;
        trace!("send control: ^{}", c.to_ascii_uppercase());
        self.terminal.write(&[code]).await
    }

    /// Toggle echo. While echo is off sent data is not logged.
    pub fn set_echo(&mut self, on: bool) {
        self.echo = on;
        self.terminal.set_echo(on);
    }

    /// Wait for the earliest of `events`.
    ///
    /// Returns the index of the matching event. When the timeout expires
    /// or the stream closes, the index of [`Event::Timeout`] or
    /// [`Event::Eof`] is returned if present in `events`, otherwise the
    /// condition is an error.
    pub async fn expect(&mut self, events: &[Event], timeout: Duration) -> Result<usize, ChannelError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(found) = self.buffer.find_earliest(events) {
                let (before, matched) = self.buffer.consume(found);
                self.before = String::from_utf8_lossy(&before).into_owned();
                self.after = String::from_utf8_lossy(&matched).into_owned();
                trace!("matched [{}] {:?}", found.index, self.after);
                return Ok(found.index);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.terminal.read(remaining).await? {
                ReadChunk::Data(data) => {
                    trace!("recv: {:?}", String::from_utf8_lossy(&data));
                    self.buffer.extend(&data);
                }
                ReadChunk::Timeout => {
                    self.before = self.buffer.as_str_lossy().into_owned();
                    self.after.clear();
                    return match events.iter().position(|e| *e == Event::Timeout) {
                        Some(index) => Ok(index),
                        None => Err(ChannelError::Timeout(timeout)),
                    };
                }
                ReadChunk::Eof => {
                    self.before = String::from_utf8_lossy(&self.buffer.take()).into_owned();
                    self.after.clear();
                    return match events.iter().position(|e| *e == Event::Eof) {
                        Some(index) => Ok(index),
                        None => Err(ChannelError::Closed),
                    };
                }
            }
        }
    }

    /// Text preceding the last match.
    pub fn before(&self) -> &str {
        &self.before
    }

    /// Text of the last match.
    pub fn after(&self) -> &str {
        &self.after
    }

    /// Read up to `size` bytes, waiting at most `timeout` for the first.
    pub async fn read_nonblocking(&mut self, size: usize, timeout: Duration) -> Result<Vec<u8>, ChannelError> {
        let deadline = Instant::now() + timeout;
        while self.buffer.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.terminal.read(remaining).await? {
                ReadChunk::Data(data) => {
                    self.buffer.extend(&data);
                }
                ReadChunk::Timeout => return Err(ChannelError::Timeout(timeout)),
                ReadChunk::Eof => return Err(ChannelError::Closed),
            }
        }
        Ok(self.buffer.pop_front(size))
    }

    /// Whether the client process is still running.
    pub fn is_alive(&mut self) -> bool {
        self.terminal.is_alive()
    }

    /// Terminate the client.
    pub async fn close(&mut self) -> Result<(), ChannelError> {
        self.buffer.clear();
        self.terminal.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{Script, ScriptedSpawner, Spawner};

    fn session(script: Script) -> Session {
        let spawner = ScriptedSpawner::new([script]);
        let config = SessionConfig::default();
        let terminal = spawner.spawn("telnet router", &config).unwrap();
        Session::new(terminal, &config)
    }

    #[tokio::test]
    async fn test_expect_sets_before_and_after() {
        let mut s = session(Script::new().emit("Escape character is '^]'.\r\nlogin: "));
        let events = vec![Event::regex(r"[Ll]ogin: ").unwrap(), Event::Timeout];
        let index = s.expect(&events, Duration::from_secs(1)).await.unwrap();
        assert_eq!(index, 0);
        assert_eq!(s.before(), "Escape character is '^]'.\r\n");
        assert_eq!(s.after(), "login: ");
    }

    #[tokio::test]
    async fn test_expect_timeout_index() {
        let mut s = session(Script::new().emit("banner"));
        let events = vec![Event::regex(r"#").unwrap(), Event::Timeout];
        assert_eq!(s.expect(&events, Duration::from_secs(1)).await.unwrap(), 1);
        assert_eq!(s.before(), "banner");
    }

    #[tokio::test]
    async fn test_expect_timeout_without_event_is_error() {
        let mut s = session(Script::new());
        let events = vec![Event::regex(r"#").unwrap()];
        let err = s.expect(&events, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, ChannelError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_expect_eof() {
        let mut s = session(Script::new().emit("Connection closed").close());
        let events = vec![Event::regex(r"#").unwrap(), Event::Eof];
        assert_eq!(s.expect(&events, Duration::from_secs(1)).await.unwrap(), 1);
        assert_eq!(s.before(), "Connection closed");

        let err = s.expect(&events[..1], Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, ChannelError::Closed));
    }

    #[tokio::test]
    async fn test_read_nonblocking_byte_at_a_time() {
        let mut s = session(Script::new().emit("r#"));
        assert_eq!(s.read_nonblocking(1, Duration::from_secs(1)).await.unwrap(), b"r");
        assert_eq!(s.read_nonblocking(1, Duration::from_secs(1)).await.unwrap(), b"#");
        let err = s.read_nonblocking(1, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, ChannelError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_send_control() {
        let spawner = ScriptedSpawner::new([Script::new()]);
        let config = SessionConfig::default();
        let mut s = Session::new(spawner.spawn("telnet router", &config).unwrap(), &config);
        s.send_control(']').await.unwrap();
        s.send_control('d').await.unwrap();
        assert_eq!(spawner.log().sent, "\x1d\x04");
    }
}
