//! NX-OS patterns.

use crate::platform::{PatternRegistry, PlatformPatterns};

/// Register the `NX-OS` platform.
pub fn register(registry: &mut PatternRegistry) {
    let patterns = PlatformPatterns::new()
        .with_union("prompt", &["IOS"])
        .with(
            "version",
            r"(?m)(?:NXOS|system): +version (?P<version>[\w\.\(\)]+)",
        );

    registry.insert("NX-OS", patterns);
}

#[cfg(test)]
mod tests {
    use crate::platform::PatternRegistry;

    #[test]
    fn test_nxos_version_skips_bios() {
        let re = PatternRegistry::builtin().compile("NX-OS", "version").unwrap();
        let text = "Software\n  BIOS: version 07.34\n  NXOS: version 7.0(3)I4(2)\n";
        assert_eq!(&re.captures(text).unwrap()["version"], "7.0(3)I4(2)");
    }
}
