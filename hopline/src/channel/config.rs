//! Terminal session configuration.

use std::time::Duration;

/// Configuration for spawned terminal sessions.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Terminal width in columns.
    pub terminal_width: u16,

    /// Terminal height in rows.
    pub terminal_height: u16,

    /// Value of `TERM` for the spawned client.
    pub term: String,

    /// Only search the last N bytes of output for patterns.
    pub search_depth: Option<usize>,

    /// How long to wait for the echo of a pivot command typed into a jump
    /// host shell.
    pub echo_confirm_timeout: Duration,

    /// How long to wait for the echo of a device command.
    pub command_echo_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            terminal_width: 160,
            terminal_height: 1024,
            term: "VT100".to_string(),
            search_depth: None,
            echo_confirm_timeout: Duration::from_secs(20),
            command_echo_timeout: Duration::from_secs(15),
        }
    }
}

impl SessionConfig {
    /// Set the terminal size.
    pub fn with_terminal_size(mut self, width: u16, height: u16) -> Self {
        self.terminal_width = width;
        self.terminal_height = height;
        self
    }

    /// Set the `TERM` value.
    pub fn with_term(mut self, term: impl Into<String>) -> Self {
        self.term = term.into();
        self
    }

    /// Limit pattern search to the tail of the buffer.
    pub fn with_search_depth(mut self, depth: usize) -> Self {
        self.search_depth = Some(depth);
        self
    }

    /// Set the pivot echo timeout.
    pub fn with_echo_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.echo_confirm_timeout = timeout;
        self
    }

    /// Set the command echo timeout.
    pub fn with_command_echo_timeout(mut self, timeout: Duration) -> Self {
        self.command_echo_timeout = timeout;
        self
    }
}
