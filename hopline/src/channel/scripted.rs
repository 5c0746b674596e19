//! Scripted terminal for replaying device conversations without a network.
//!
//! A [`Script`] is an ordered list of steps. Steps that need no input (banner
//! output, prompt and echo changes, closing the stream) run as soon as they
//! reach the front of the script. A reply step waits for a complete input
//! line containing its trigger text. Input lines that do not satisfy the
//! pending reply are answered with the current prompt, like an idle shell.
//!
//! Time is virtual: a read with nothing pending returns
//! [`ReadChunk::Timeout`] immediately, so timeout branches of a state
//! machine run without waiting.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use log::debug;

use super::config::SessionConfig;
use super::{ReadChunk, Spawner, Terminal};
use crate::error::ChannelError;

#[derive(Debug, Clone)]
enum Step {
    Emit(String),
    Reply { trigger: String, output: String },
    Prompt(Option<String>),
    Echo(bool),
    Close,
}

/// Ordered device behaviour for one spawned terminal.
#[derive(Debug, Clone, Default)]
pub struct Script {
    steps: Vec<Step>,
}

impl Script {
    /// Create an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Output text as soon as this step is reached.
    pub fn emit(mut self, text: impl Into<String>) -> Self {
        self.steps.push(Step::Emit(text.into()));
        self
    }

    /// Wait for an input line containing `trigger` and answer with `output`.
    /// An empty trigger accepts any line.
    pub fn reply(mut self, trigger: impl Into<String>, output: impl Into<String>) -> Self {
        self.steps.push(Step::Reply {
            trigger: trigger.into(),
            output: output.into(),
        });
        self
    }

    /// From here on, answer unclaimed input lines with `prompt`.
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.steps.push(Step::Prompt(Some(prompt.into())));
        self
    }

    /// Stop answering unclaimed input lines.
    pub fn no_prompt(mut self) -> Self {
        self.steps.push(Step::Prompt(None));
        self
    }

    /// Turn remote echo of typed input on or off.
    pub fn echo(mut self, on: bool) -> Self {
        self.steps.push(Step::Echo(on));
        self
    }

    /// Close the stream after pending output has been read.
    pub fn close(mut self) -> Self {
        self.steps.push(Step::Close);
        self
    }
}

/// Everything the scripted terminals observed.
#[derive(Debug, Clone, Default)]
pub struct ScriptLog {
    /// Command lines passed to the spawner, in order.
    pub spawned: Vec<String>,
    /// All input written to any terminal.
    pub sent: String,
    /// Whether a terminal was closed by its owner.
    pub closed: bool,
}

type SharedLog = Arc<Mutex<ScriptLog>>;

fn lock(log: &SharedLog) -> MutexGuard<'_, ScriptLog> {
    log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Spawner handing out one scripted terminal per script.
#[derive(Debug, Default)]
pub struct ScriptedSpawner {
    scripts: Mutex<VecDeque<Script>>,
    log: SharedLog,
}

impl ScriptedSpawner {
    /// Create a spawner that serves `scripts` to successive spawns.
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            log: SharedLog::default(),
        }
    }

    /// Snapshot of what was spawned and sent so far.
    pub fn log(&self) -> ScriptLog {
        lock(&self.log).clone()
    }
}

impl Spawner for ScriptedSpawner {
    fn spawn(
        &self,
        command: &str,
        _config: &SessionConfig,
    ) -> Result<Box<dyn Terminal>, ChannelError> {
        let script = self
            .scripts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .ok_or_else(|| ChannelError::Spawn {
                command: command.to_string(),
                message: "no script left".to_string(),
            })?;
        lock(&self.log).spawned.push(command.to_string());
        debug!("scripted spawn: {}", command);
        Ok(Box::new(ScriptedTerminal::new(script, self.log.clone())))
    }
}

/// Terminal driven by a [`Script`].
#[derive(Debug)]
pub struct ScriptedTerminal {
    steps: VecDeque<Step>,
    pending: Vec<u8>,
    line: String,
    last_was_cr: bool,
    prompt: Option<String>,
    remote_echo: bool,
    alive: bool,
    log: SharedLog,
}

impl ScriptedTerminal {
    fn new(script: Script, log: SharedLog) -> Self {
        let mut terminal = Self {
            steps: script.steps.into(),
            pending: Vec::new(),
            line: String::new(),
            last_was_cr: false,
            prompt: None,
            remote_echo: true,
            alive: true,
            log,
        };
        terminal.advance();
        terminal
    }

    /// Run every step that does not wait for input.
    fn advance(&mut self) {
        while let Some(step) = self.steps.front() {
            match step {
                Step::Reply { .. } => break,
                Step::Emit(text) => self.pending.extend_from_slice(text.as_bytes()),
                Step::Prompt(prompt) => self.prompt = prompt.clone(),
                Step::Echo(on) => self.remote_echo = *on,
                Step::Close => self.alive = false,
            }
            self.steps.pop_front();
        }
    }

    fn on_line(&mut self, line: &str) {
        let claimed = matches!(
            self.steps.front(),
            Some(Step::Reply { trigger, .. }) if line.contains(trigger.as_str())
        );
        if claimed {
            if let Some(Step::Reply { output, .. }) = self.steps.pop_front() {
                self.pending.extend_from_slice(output.as_bytes());
            }
            self.advance();
        } else if let Some(prompt) = &self.prompt {
            self.pending.extend_from_slice(prompt.as_bytes());
        }
    }
}

#[async_trait]
impl Terminal for ScriptedTerminal {
    async fn write(&mut self, data: &[u8]) -> Result<(), ChannelError> {
        let text = String::from_utf8_lossy(data).into_owned();
        lock(&self.log).sent.push_str(&text);
        if !self.alive {
            return Err(ChannelError::Closed);
        }

        for ch in text.chars() {
            match ch {
                '\r' | '\n' => {
                    let continues_crlf = ch == '\n' && self.last_was_cr;
                    self.last_was_cr = ch == '\r';
                    if continues_crlf {
                        continue;
                    }
                    if self.remote_echo {
                        self.pending.extend_from_slice(b"\r\n");
                    }
                    let line = std::mem::take(&mut self.line);
                    self.on_line(&line);
                }
                c if c.is_control() => self.last_was_cr = false,
                c => {
                    self.last_was_cr = false;
                    if self.remote_echo {
                        let mut utf8 = [0u8; 4];
                        self.pending.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
                    }
                    self.line.push(c);
                }
            }
        }
        Ok(())
    }

    async fn read(&mut self, _timeout: Duration) -> Result<ReadChunk, ChannelError> {
        if !self.pending.is_empty() {
            return Ok(ReadChunk::Data(Bytes::from(std::mem::take(&mut self.pending))));
        }
        if self.alive {
            Ok(ReadChunk::Timeout)
        } else {
            Ok(ReadChunk::Eof)
        }
    }

    fn is_alive(&mut self) -> bool {
        self.alive
    }

    async fn close(&mut self) -> Result<(), ChannelError> {
        self.alive = false;
        self.pending.clear();
        lock(&self.log).closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn drain(terminal: &mut Box<dyn Terminal>) -> String {
        match terminal.read(Duration::ZERO).await.unwrap() {
            ReadChunk::Data(data) => String::from_utf8_lossy(&data).into_owned(),
            _ => String::new(),
        }
    }

    #[tokio::test]
    async fn test_banner_and_reply() {
        let spawner = ScriptedSpawner::new([Script::new()
            .emit("login: ")
            .reply("admin", "Password: ")
            .echo(false)
            .reply("secret", "\r\nrouter#")
            .echo(true)
            .prompt("router#")]);
        let mut terminal = spawner.spawn("telnet router", &SessionConfig::default()).unwrap();

        assert_eq!(drain(&mut terminal).await, "login: ");
        terminal.write(b"admin\n").await.unwrap();
        assert_eq!(drain(&mut terminal).await, "admin\r\nPassword: ");
        terminal.write(b"secret\n").await.unwrap();
        assert_eq!(drain(&mut terminal).await, "\r\nrouter#");
        terminal.write(b"\r\n").await.unwrap();
        assert_eq!(drain(&mut terminal).await, "\r\nrouter#");
        assert_eq!(spawner.log().spawned, vec!["telnet router".to_string()]);
    }

    #[tokio::test]
    async fn test_close_after_output() {
        let spawner = ScriptedSpawner::new([Script::new().emit("bye").close()]);
        let mut terminal = spawner.spawn("ssh host", &SessionConfig::default()).unwrap();
        assert!(!terminal.is_alive());
        assert_eq!(drain(&mut terminal).await, "bye");
        assert_eq!(terminal.read(Duration::ZERO).await.unwrap(), ReadChunk::Eof);
    }

    #[test]
    fn test_spawn_without_script_fails() {
        let spawner = ScriptedSpawner::new([]);
        let err = spawner.spawn("ssh host", &SessionConfig::default()).err().unwrap();
        assert!(matches!(err, ChannelError::Spawn { .. }));
    }
}
