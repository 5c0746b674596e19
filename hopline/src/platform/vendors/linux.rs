//! Linux/Unix shell patterns, used for jump hosts.
//!
//! Supports the usual `$` (user) and `#` (root) shell prompts as well as
//! `%` and `>` shells.

use crate::platform::{PatternRegistry, PlatformPatterns};

/// Register the `jumphost` platform.
pub fn register(registry: &mut PatternRegistry) {
    let patterns = PlatformPatterns::new()
        .with_described(
            "prompt",
            r"[\w\-\.@:~\[\]/ ]*[\$#%>]\s?$",
            "Unix shell prompt",
        )
        .with("prompt_dynamic", r"{prompt}\s?")
        .with("version", r"(?P<version>\d+\.\d+[\w\.\-]*)");

    registry.insert("jumphost", patterns);
}
