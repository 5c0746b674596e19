//! Built-in pattern tables.
//!
//! Each module registers the platforms of one family. Stream patterns are
//! written without inline flags since they are compiled as byte events;
//! patterns only used to parse captured text may use `(?m)`.
//!
//! `prompt_dynamic` entries contain a `{prompt}` placeholder that drivers
//! replace with the escaped prompt of the device.

pub mod generic;
pub mod ios;
pub mod ios_xr;
pub mod linux;
pub mod nxos;

/// Placeholder replaced by the escaped device prompt.
pub const PROMPT_PLACEHOLDER: &str = "{prompt}";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{GENERIC, PatternRegistry};

    #[test]
    fn test_every_builtin_pattern_compiles() {
        let registry = PatternRegistry::builtin();
        let keys = [
            "prompt",
            "prompt_dynamic",
            "prompt_default",
            "rommon",
            "xml",
            "syntax_error",
            "connection_closed",
            "press_return",
            "more",
            "buffer_overflow",
            "username",
            "password",
            "unable_to_connect",
            "timeout",
            "standby",
            "pid2platform",
            "platform",
            "version",
            "vty",
            "console",
        ];
        for platform in registry.platforms() {
            for key in keys {
                let pattern = registry.resolve(platform, key).unwrap();
                let pattern = pattern.replace(PROMPT_PLACEHOLDER, "router");
                assert!(
                    regex::Regex::new(&pattern).is_ok(),
                    "{platform}/{key} does not compile: {pattern}"
                );
            }
        }
        assert!(registry.contains(GENERIC));
    }

    #[test]
    fn test_classify_builtin_prompts() {
        let registry = PatternRegistry::builtin();
        let cases = [
            ("RP/0/RSP0/CPU0:ios#", Some("XR")),
            ("RP/0/RP0/CPU0:pe1(config)#", Some("XR")),
            ("router#", Some("IOS")),
            ("switch>", Some("IOS")),
            ("sysadmin-vm:0_RP0#", Some("Calvados")),
            ("[sysadmin-vm:0_RP0:~]$", Some("Windriver")),
            ("user@jump:~$", Some("jumphost")),
            ("", None),
        ];
        for (prompt, expected) in cases {
            assert_eq!(
                registry.classify(prompt).unwrap().as_deref(),
                expected,
                "prompt {prompt:?}"
            );
        }
    }
}
