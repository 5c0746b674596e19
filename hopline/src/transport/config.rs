//! Hop endpoint configuration.

use std::fmt;

use secrecy::SecretString;

/// One hop of a chain: how to reach it and how to log in.
///
/// # Example
///
/// ```rust
/// use hopline::transport::HopInfo;
///
/// let hop = HopInfo::new("10.0.0.1")
///     .protocol("ssh")
///     .port(2222)
///     .username("admin")
///     .password("secret");
/// assert_eq!(hop.port_or_default(), 2222);
/// ```
#[derive(Debug)]
pub struct HopInfo {
    /// Protocol name (`ssh`, `telnet`).
    pub protocol: String,

    /// Hostname or IP address.
    pub host: String,

    /// Port; the protocol default when unset.
    pub port: Option<u16>,

    /// Login username.
    pub username: Option<String>,

    /// Login password.
    pub password: Option<SecretString>,

    /// Whether the hop is reached through a console server.
    pub console: bool,
}

impl HopInfo {
    /// A telnet hop to `host`.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            protocol: "telnet".to_string(),
            host: host.into(),
            port: None,
            username: None,
            password: None,
            console: false,
        }
    }

    /// Set the protocol name.
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the login username.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the login password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::from(password.into()));
        self
    }

    /// Mark the hop as reached through a console server.
    pub fn console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }

    /// Port, or the default of the hop's protocol.
    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(match self.protocol.as_str() {
            "ssh" | "ssh_console" => 22,
            _ => 23,
        })
    }
}

impl fmt::Display for HopInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://", self.protocol)?;
        if let Some(username) = &self.username {
            write!(f, "{username}@")?;
        }
        write!(f, "{}:{}", self.host, self.port_or_default())
    }
}
