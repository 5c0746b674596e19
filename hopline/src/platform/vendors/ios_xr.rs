//! IOS XR patterns: classic XR, XRv, 64-bit XR with its Calvados admin plane
//! and the Wind River Linux shells underneath.

use crate::platform::{PatternRegistry, PlatformPatterns};

const XR_PROMPT: &str = r"(?:[A-Z]+/\d+/[\w\-]+/CPU\d+:)(?P<hostname>[\w\-\.]+)(?:\(admin\))?(?:\((?:admin-)?config[^\)]*\))?#\s?$";
const CALVADOS_PROMPT: &str = r"sysadmin-vm:\d+_RS?P\d+#\s?";
const WINDRIVER_PROMPT: &str = r"\[(?:sysadmin|xr)-vm[\w:\-]*:~\]\$\s?";

/// Register the XR family platforms.
pub fn register(registry: &mut PatternRegistry) {
    registry.insert(
        "XR",
        PlatformPatterns::new()
            .with_described("prompt", XR_PROMPT, "IOS XR prompt with node id")
            .with(
                "prompt_dynamic",
                r"{prompt}(?:\(admin\))?(?:\((?:admin-)?config[^\)]*\))?#\s?",
            ),
    );

    registry.insert("XRv", PlatformPatterns::new().with_union("prompt", &["XR"]));

    registry.insert(
        "eXR",
        PlatformPatterns::new()
            .with_union("prompt", &["XR"])
            .with_union("prompt_dynamic", &["XR"])
            .with_described("calvados", CALVADOS_PROMPT, "Admin plane prompt")
            .with("calvados_connect", r"connected from \S+ using \w+ on")
            .with("calvados_term_length", r"terminal length 0|term len 0"),
    );

    registry.insert(
        "Calvados",
        PlatformPatterns::new()
            .with("prompt", &format!("{CALVADOS_PROMPT}$"))
            .with("prompt_dynamic", r"{prompt}(?:\(config[^\)]*\))?#\s?")
            .with(
                "exr",
                r"[A-Z]+/\d+/[\w\-]+/CPU\d+:[\w\-\.]+#\s?",
            )
            .with("windriver", WINDRIVER_PROMPT)
            .with(
                "connected_locally",
                r"(?m)^.*\*.*(?:localhost|127\.0\.0\.1|192\.0\.\d+\.\d+)",
            )
            .with("version", r"(?m)Version\s*:\s*(?P<version>[\w\.]+)"),
    );

    registry.insert(
        "Windriver",
        PlatformPatterns::new()
            .with_described(
                "prompt",
                &format!("{WINDRIVER_PROMPT}$"),
                "Wind River Linux shell of an XR VM",
            )
            .with("prompt_dynamic", r"{prompt}\$\s?")
            .with("calvados", CALVADOS_PROMPT)
            .with("lc", r"\[(?:xr|sysadmin)-vm_node\d+_\d+_CPU\d+:~\]\$\s?")
            .with(
                "version",
                r"(?m)Wind River Linux (?P<version>\d+\.\d+\.\d+\.\d+)",
            ),
    );
}

#[cfg(test)]
mod tests {
    use crate::platform::PatternRegistry;

    #[test]
    fn test_xr_prompt_hostname() {
        let re = PatternRegistry::builtin().compile("XR", "prompt").unwrap();
        let caps = re.captures("RP/0/RSP0/CPU0:PE-1(admin-config)#").unwrap();
        assert_eq!(&caps["hostname"], "PE-1");
        assert!(!re.is_match("router#"));
    }

    #[test]
    fn test_exr_shares_xr_prompt() {
        let registry = PatternRegistry::builtin();
        assert_eq!(
            registry.resolve("eXR", "prompt").unwrap(),
            registry.resolve("XR", "prompt").unwrap()
        );
        assert_eq!(
            registry.resolve("XRv", "prompt").unwrap(),
            registry.resolve("XR", "prompt").unwrap()
        );
    }

    #[test]
    fn test_calvados_version() {
        let re = PatternRegistry::builtin().compile("Calvados", "version").unwrap();
        let text = "Cisco IOS XR Admin Software, Version : 6.1.2\n";
        assert_eq!(&re.captures(text).unwrap()["version"], "6.1.2");
    }

    #[test]
    fn test_windriver_version() {
        let re = PatternRegistry::builtin().compile("Windriver", "version").unwrap();
        let text = "Wind River Linux 7.0.0.2 \\n \\l\n";
        assert_eq!(&re.captures(text).unwrap()["version"], "7.0.0.2");
    }

    #[test]
    fn test_calvados_connected_locally() {
        let re = PatternRegistry::builtin()
            .compile("Calvados", "connected_locally")
            .unwrap();
        let users = "Session       Line   User   Location\n*  1          cisco  admin  192.0.0.4\n";
        assert!(re.is_match(users));
        assert!(!re.is_match("   1  vty0  admin  10.1.1.1\n"));
    }
}
