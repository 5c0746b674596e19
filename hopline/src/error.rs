//! Error types for hopline.
//!
//! Every failure that leaves the engine is one of the typed kinds below and
//! carries the hostname of the hop it came from. Command kinds also carry the
//! offending command once it is known.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Coarse classification of an [`Error`].
///
/// FSM transition tables store a kind rather than a built error, the
/// interpreter turns it into an [`Error`] bound to the current hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Generic session or link failure.
    Connection,
    /// The link did not answer in time.
    ConnectionTimeout,
    /// Bad credentials or failed privilege escalation.
    ConnectionAuthentication,
    /// Reached the standby side of a redundant console pair.
    StandbyConsole,
    /// Device rejected a command.
    Command,
    /// Device rejected a command as syntactically invalid.
    CommandSyntax,
    /// No prompt after a command within the timeout.
    CommandTimeout,
    /// Unsupported platform or invalid configuration.
    General,
}

/// Main error type for hopline operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Generic session or link failure.
    #[error("{host}: {message}")]
    Connection { host: String, message: String },

    /// The link did not answer in time.
    #[error("{host}: connection timeout: {message}")]
    ConnectionTimeout { host: String, message: String },

    /// Bad credentials or failed privilege escalation.
    #[error("{host}: authentication failed: {message}")]
    ConnectionAuthentication { host: String, message: String },

    /// The console port belongs to a standby route processor.
    #[error("{host}: standby console")]
    StandbyConsole { host: String },

    /// Device rejected a command.
    #[error("{host}: {message}{}", command_suffix(.command))]
    Command {
        host: String,
        message: String,
        command: Option<String>,
    },

    /// Device rejected a command as syntactically invalid.
    #[error("{host}: {message}{}", command_suffix(.command))]
    CommandSyntax {
        host: String,
        message: String,
        command: Option<String>,
    },

    /// No prompt after a command within the timeout.
    #[error("{host}: {message}{}", command_suffix(.command))]
    CommandTimeout {
        host: String,
        message: String,
        command: Option<String>,
    },

    /// Unsupported platform or invalid configuration.
    #[error("{host}: {message}")]
    General { host: String, message: String },

    /// Terminal session errors.
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Pattern registry errors.
    #[error("Pattern error: {0}")]
    Pattern(#[from] PatternError),
}

fn command_suffix(command: &Option<String>) -> String {
    match command {
        Some(command) => format!(": '{command}'"),
        None => String::new(),
    }
}

impl Error {
    /// Build an error of the given kind for a hop.
    pub fn new(kind: ErrorKind, host: impl Into<String>, message: impl Into<String>) -> Self {
        let host = host.into();
        let message = message.into();
        match kind {
            ErrorKind::Connection => Error::Connection { host, message },
            ErrorKind::ConnectionTimeout => Error::ConnectionTimeout { host, message },
            ErrorKind::ConnectionAuthentication => Error::ConnectionAuthentication { host, message },
            ErrorKind::StandbyConsole => Error::StandbyConsole { host },
            ErrorKind::Command => Error::Command {
                host,
                message,
                command: None,
            },
            ErrorKind::CommandSyntax => Error::CommandSyntax {
                host,
                message,
                command: None,
            },
            ErrorKind::CommandTimeout => Error::CommandTimeout {
                host,
                message,
                command: None,
            },
            ErrorKind::General => Error::General { host, message },
        }
    }

    /// Shorthand for a [`ErrorKind::Connection`] error.
    pub fn connection(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, host, message)
    }

    /// Shorthand for a [`ErrorKind::General`] error.
    pub fn general(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::General, host, message)
    }

    /// Convert a raw session error into a typed error for a hop.
    pub fn from_channel(err: ChannelError, host: &str) -> Self {
        match err {
            ChannelError::Timeout(after) => Self::new(
                ErrorKind::ConnectionTimeout,
                host,
                format!("no response after {after:?}"),
            ),
            ChannelError::Closed => Self::connection(host, "Session closed unexpectedly"),
            ChannelError::NotConnected => Self::connection(host, "No active session"),
            other => Self::connection(host, other.to_string()),
        }
    }

    /// Bind a pattern error to a hop.
    pub fn from_pattern(err: impl Into<PatternError>, host: &str) -> Self {
        Self::general(host, err.into().to_string())
    }

    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Connection { .. } => ErrorKind::Connection,
            Error::ConnectionTimeout { .. } => ErrorKind::ConnectionTimeout,
            Error::ConnectionAuthentication { .. } => ErrorKind::ConnectionAuthentication,
            Error::StandbyConsole { .. } => ErrorKind::StandbyConsole,
            Error::Command { .. } => ErrorKind::Command,
            Error::CommandSyntax { .. } => ErrorKind::CommandSyntax,
            Error::CommandTimeout { .. } => ErrorKind::CommandTimeout,
            Error::General { .. } => ErrorKind::General,
            Error::Channel(ChannelError::Timeout(_)) => ErrorKind::ConnectionTimeout,
            Error::Channel(_) => ErrorKind::Connection,
            Error::Pattern(_) => ErrorKind::General,
        }
    }

    /// Hostname of the hop that produced this error, when known.
    pub fn host(&self) -> Option<&str> {
        match self {
            Error::Connection { host, .. }
            | Error::ConnectionTimeout { host, .. }
            | Error::ConnectionAuthentication { host, .. }
            | Error::StandbyConsole { host }
            | Error::Command { host, .. }
            | Error::CommandSyntax { host, .. }
            | Error::CommandTimeout { host, .. }
            | Error::General { host, .. } => Some(host),
            Error::Channel(_) | Error::Pattern(_) => None,
        }
    }

    /// The command that triggered a command error.
    pub fn command(&self) -> Option<&str> {
        match self {
            Error::Command { command, .. }
            | Error::CommandSyntax { command, .. }
            | Error::CommandTimeout { command, .. } => command.as_deref(),
            _ => None,
        }
    }

    /// Whether the device rejected or did not finish a command.
    pub fn is_command(&self) -> bool {
        matches!(
            self,
            Error::Command { .. } | Error::CommandSyntax { .. } | Error::CommandTimeout { .. }
        )
    }

    /// Attach the offending command to a command error. Other kinds are
    /// returned unchanged.
    pub fn with_command(mut self, cmd: &str) -> Self {
        if let Error::Command { command, .. }
        | Error::CommandSyntax { command, .. }
        | Error::CommandTimeout { command, .. } = &mut self
        {
            *command = Some(cmd.to_string());
        }
        self
    }
}

/// Terminal session errors (spawn, raw I/O, raw timeouts).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// The client process could not be started.
    #[error("Failed to spawn '{command}': {message}")]
    Spawn { command: String, message: String },

    /// Nothing matched within the timeout.
    #[error("Pattern not found within {0:?}")]
    Timeout(Duration),

    /// The stream reached end of file.
    #[error("Session closed")]
    Closed,

    /// No session has been spawned yet.
    #[error("No active session")]
    NotConnected,

    /// Invalid pattern handed to the session.
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// I/O error on the terminal.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Pattern registry errors.
#[derive(Error, Debug)]
pub enum PatternError {
    /// Platform is not present in the registry.
    #[error("Unknown platform '{platform}'")]
    UnknownPlatform { platform: String },

    /// Key is missing on the platform and on the generic fallback.
    #[error("Pattern '{key}' not defined for platform '{platform}' nor for generic")]
    UnknownKey { platform: String, key: String },

    /// Resolution produced nothing.
    #[error("Pattern '{key}' for platform '{platform}' resolved to an empty pattern")]
    Empty { platform: String, key: String },

    /// Platform references form a loop.
    #[error("Pattern '{key}' for platform '{platform}' references itself")]
    Cycle { platform: String, key: String },

    /// A key that must be a platform list is something else.
    #[error("Pattern '{key}' for platform '{platform}' must be a list of platforms")]
    NotAList { platform: String, key: String },

    /// The pattern document does not define the generic platform.
    #[error("Pattern document has no 'generic' platform")]
    MissingGeneric,

    /// The pattern document could not be parsed.
    #[error("Invalid pattern document: {0}")]
    Document(#[from] serde_json::Error),

    /// A resolved pattern does not compile.
    #[error("Invalid regex pattern: {0}")]
    Regex(#[from] regex::Error),
}

/// Result type alias using hopline's Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_display_includes_command() {
        let err = Error::new(ErrorKind::CommandSyntax, "router", "Command unknown")
            .with_command("wrongcommand");
        assert_eq!(err.kind(), ErrorKind::CommandSyntax);
        assert_eq!(err.command(), Some("wrongcommand"));
        assert_eq!(err.host(), Some("router"));
        assert!(err.to_string().contains("wrongcommand"));
    }

    #[test]
    fn test_with_command_ignores_connection_errors() {
        let err = Error::connection("jump", "Session closed").with_command("show version");
        assert_eq!(err.command(), None);
        assert_eq!(err.kind(), ErrorKind::Connection);
    }

    #[test]
    fn test_from_channel_timeout() {
        let err = Error::from_channel(ChannelError::Timeout(Duration::from_secs(20)), "jump");
        assert_eq!(err.kind(), ErrorKind::ConnectionTimeout);
        assert_eq!(err.host(), Some("jump"));
    }

    #[test]
    fn test_from_pattern_names_host() {
        let err = Error::from_pattern(regex::Regex::new("(").unwrap_err(), "jump");
        assert_eq!(err.kind(), ErrorKind::General);
        assert_eq!(err.host(), Some("jump"));
    }

    #[test]
    fn test_channel_kind_mapping() {
        assert_eq!(Error::Channel(ChannelError::Closed).kind(), ErrorKind::Connection);
        assert_eq!(
            Error::Channel(ChannelError::Timeout(Duration::from_secs(1))).kind(),
            ErrorKind::ConnectionTimeout
        );
        assert_eq!(Error::Pattern(PatternError::MissingGeneric).kind(), ErrorKind::General);
    }
}
