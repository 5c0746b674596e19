//! Login protocols.
//!
//! A protocol knows the client command that reaches a hop and the state
//! machines that get from that command to an authenticated shell. Both run
//! on the chain's single session, so a hop behind a jump host is reached by
//! typing its command into the jump host's shell.

pub mod config;
mod prompt;
mod ssh;
mod telnet;

pub use config::HopInfo;
pub use prompt::{PromptDetectionConfig, detect_prompt, levenshtein, try_read_prompt};
pub use ssh::Ssh;
pub use telnet::Telnet;

use async_trait::async_trait;

use crate::chain::Link;
use crate::channel::Event;
use crate::driver::Driver;
use crate::error::{Error, Result};

/// Connect and login procedure of one client program.
#[async_trait]
pub trait Protocol: Send + Sync {
    /// Name used in log lines.
    fn name(&self) -> &'static str;

    /// Command line starting the client for `hop`.
    fn spawn_command(&self, hop: &HopInfo) -> String;

    /// Drive the client until the hop asks for credentials or shows a
    /// prompt.
    async fn connect(&mut self, driver: &dyn Driver, link: &mut Link<'_>) -> Result<bool>;

    /// Log in, continuing from whatever `connect` stopped at.
    async fn authenticate(&mut self, driver: &dyn Driver, link: &mut Link<'_>) -> Result<bool>;

    /// Start the next `authenticate` at a login prompt already matched on
    /// the session.
    fn resume_at(&mut self, pattern: Event);

    /// Leave the hop.
    async fn disconnect(&mut self, link: &mut Link<'_>) -> Result<()>;
}

/// Create the protocol registered under `name`.
///
/// `ssh_console` behaves like `ssh`; `telnet_console` is telnet to a
/// console server, which needs a nudge before showing anything.
pub fn make_protocol(name: &str, host: &str) -> Result<Box<dyn Protocol>> {
    match name {
        "ssh" | "ssh_console" => Ok(Box::new(Ssh::new())),
        "telnet" => Ok(Box::new(Telnet::new())),
        "telnet_console" => Ok(Box::new(Telnet::console())),
        other => Err(Error::general(host, format!("Unknown protocol: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_make_protocol() {
        assert_eq!(make_protocol("ssh", "r1").unwrap().name(), "ssh");
        assert_eq!(make_protocol("ssh_console", "r1").unwrap().name(), "ssh");
        assert_eq!(make_protocol("telnet", "r1").unwrap().name(), "telnet");
        assert_eq!(make_protocol("telnet_console", "r1").unwrap().name(), "telnet_console");

        let Err(err) = make_protocol("rlogin", "r1") else {
            panic!("rlogin is not a protocol");
        };
        assert_eq!(err.kind(), ErrorKind::General);
        assert_eq!(err.host(), Some("r1"));
    }

    #[test]
    fn test_spawn_commands() {
        let hop = HopInfo::new("10.0.0.1").protocol("ssh").username("admin");
        assert_eq!(
            Ssh::new().spawn_command(&hop),
            "ssh -o UserKnownHostsFile=/dev/null -o StrictHostKeyChecking=no -2 -p 22 admin@10.0.0.1"
        );

        let hop = HopInfo::new("10.0.0.1").protocol("ssh").port(2222);
        assert_eq!(
            Ssh::new().spawn_command(&hop),
            "ssh -o UserKnownHostsFile=/dev/null -o StrictHostKeyChecking=no -2 -p 2222 10.0.0.1"
        );

        let hop = HopInfo::new("ts1").port(2005);
        assert_eq!(Telnet::console().spawn_command(&hop), "telnet ts1 2005");
        assert_eq!(Telnet::new().spawn_command(&HopInfo::new("r1")), "telnet r1 23");
    }
}
