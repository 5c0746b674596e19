//! IOS and IOS XE patterns.

use crate::platform::{PatternRegistry, PlatformPatterns};

/// Register the `IOS` and `XE` platforms.
pub fn register(registry: &mut PatternRegistry) {
    registry.insert(
        "IOS",
        PlatformPatterns::new().with_described(
            "prompt",
            r"(?P<hostname>[\w\-\.]+)(?:\((?:config|cfg)[^\)]*\))?[>#]\s?$",
            "IOS exec or config prompt",
        ),
    );

    // XE shares the IOS prompt grammar
    registry.insert("XE", PlatformPatterns::new().with_union("prompt", &["IOS"]));
}

#[cfg(test)]
mod tests {
    use crate::platform::PatternRegistry;

    #[test]
    fn test_ios_prompts() {
        let re = PatternRegistry::builtin().compile("IOS", "prompt").unwrap();
        assert_eq!(&re.captures("router#").unwrap()["hostname"], "router");
        assert_eq!(&re.captures("CSM_DUT(config-if)#").unwrap()["hostname"], "CSM_DUT");
        assert!(re.is_match("router>"));
        assert!(!re.is_match("router$"));
    }

    #[test]
    fn test_xe_reuses_ios_prompt() {
        let registry = PatternRegistry::builtin();
        assert_eq!(
            registry.resolve("XE", "prompt").unwrap(),
            registry.resolve("IOS", "prompt").unwrap()
        );
    }
}
