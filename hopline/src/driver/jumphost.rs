//! Driver for Unix shells used as intermediate hops.

use std::sync::Arc;

use super::{Driver, DriverCore, profile};
use crate::channel::Event;
use crate::error::Result;
use crate::platform::PatternRegistry;

/// Linux or BSD shell on a jump host.
///
/// Shell prompts carry no reliable hostname, so the hostname comes from the
/// `hostname` command instead, and the dynamic prompt is the whole prompt
/// text.
#[derive(Debug)]
pub struct Jumphost {
    core: DriverCore,
}

impl Jumphost {
    pub fn new(registry: Arc<PatternRegistry>) -> Result<Self> {
        Ok(Self {
            core: DriverCore::new(&profile::JUMPHOST, registry)?,
        })
    }
}

impl Driver for Jumphost {
    fn core(&self) -> &DriverCore {
        &self.core
    }

    fn hostname_from_prompt(&self, _prompt: &str, current: &str) -> String {
        current.to_string()
    }

    fn dynamic_prompt(&self, prompt: &str) -> Result<Event> {
        self.core.compose_prompt(&regex::escape(prompt.trim_end()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dynamic_prompt_uses_whole_prompt() {
        let driver = Jumphost::new(PatternRegistry::builtin()).unwrap();
        let prompt = driver.dynamic_prompt("admin@jump-a:~$ ").unwrap();
        let re = prompt.as_regex().unwrap();
        assert!(re.is_match(b"admin@jump-a:~$ "));
        assert!(!re.is_match(b"admin@jump-a:~# "));
        assert!(!re.is_match(b"admin@jump-b:~$ "));
    }

    #[test]
    fn test_hostname_not_taken_from_prompt() {
        let driver = Jumphost::new(PatternRegistry::builtin()).unwrap();
        assert_eq!(driver.hostname_from_prompt("admin@jump-a:~$", "10.0.0.1"), "10.0.0.1");
    }
}
