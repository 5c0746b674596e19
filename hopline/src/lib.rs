//! # Hopline
//!
//! Async expect-style session automation for network device CLIs.
//!
//! Hopline drives the command line `ssh` and `telnet` clients on a local
//! pseudo-terminal, walks through any number of jump hosts on the same
//! session and discovers the target device: prompt, OS, version, hardware
//! family and inventory.
//!
//! ## Features
//!
//! - Multi-hop chains over a single terminal session
//! - Telnet, telnet through console servers and SSH logins
//! - Table driven state machines for login, command output and reload
//! - Prompt autodetection
//! - Cisco IOS, IOS XE, IOS XR (classic, XRv, 64-bit, admin plane) and NX-OS
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use hopline::{ChainBuilder, HopInfo};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), hopline::Error> {
//!     let mut chain = ChainBuilder::new()
//!         .hop(HopInfo::new("jump.example.net").protocol("ssh").username("admin").password("secret"))
//!         .hop(HopInfo::new("10.0.0.1").username("cisco").password("cisco"))
//!         .build()?;
//!
//!     chain.connect().await?;
//!
//!     let output = chain.send("show clock", Duration::from_secs(60), None).await?;
//!     println!("{}", output);
//!
//!     chain.disconnect().await;
//!     Ok(())
//! }
//! ```

pub mod chain;
pub mod channel;
pub mod driver;
pub mod error;
pub mod fsm;
pub mod platform;
pub mod transport;

// Re-export main types for convenience
pub use chain::{Chain, ChainBuilder, Controller, Device, DeviceInfo};
pub use channel::{Event, EventList};
pub use driver::{Driver, ReloadOptions};
pub use error::{Error, ErrorKind, Result};
pub use fsm::{Action, Fsm, Transition};
pub use platform::{PatternRegistry, PlatformId};
pub use transport::HopInfo;
