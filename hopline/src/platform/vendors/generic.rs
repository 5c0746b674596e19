//! Generic fallback patterns shared by every platform.

use crate::platform::{GENERIC, PROMPT_DETECTION, PatternRegistry, PlatformPatterns};

/// Register the `generic` platform.
pub fn register(registry: &mut PatternRegistry) {
    let patterns = PlatformPatterns::new()
        // more specific prompt grammars first
        .with_union(
            PROMPT_DETECTION,
            &["Windriver", "Calvados", "XR", "IOS", "jumphost"],
        )
        .with_described(
            "prompt",
            r"(?P<hostname>[\w\-\.:/]+?)(?:\((?:admin-)?config[^\)]*\))?[>#]\s?$",
            "Any CLI prompt ending with > or #",
        )
        .with(
            "prompt_dynamic",
            r"{prompt}(?:\(admin\))?(?:\((?:admin-)?config[^\)]*\))?[>#]\s?",
        )
        .with_described(
            "prompt_default",
            r"(?:Router|Switch|switch|ios)(?:\((?:admin-)?config[^\)]*\))?[>#]\s?",
            "Factory default prompt",
        )
        .with_described("rommon", r"rommon ?\d* ?>\s?", "ROM monitor prompt")
        .with_described("xml", r"XML> ?", "XML agent prompt")
        .with(
            "syntax_error",
            r"% Invalid input detected|% Incomplete command|% Ambiguous command|% Unknown command|% Bad IP address or host name|Syntax error while parsing",
        )
        .with(
            "connection_closed",
            r"Connection closed by foreign host|Connection to \S+ closed|closed by remote host",
        )
        .with(
            "press_return",
            r"Press RETURN to get started|Press any key to continue|[Pp]ress [Ee]nter to continue",
        )
        .with_described(
            "more",
            r" ?--More-- ?|<--- More --->|-- More --",
            "Pager banner",
        )
        .with("buffer_overflow", r"Command too long")
        .with("username", r"(?:[Uu]sername|[Ll]ogin): ?")
        .with("password", r"[Pp]assword: ?")
        .with(
            "unable_to_connect",
            r"[Cc]onnection refused|[Nn]o route to host|[Cc]ould not resolve hostname|[Nn]ame or service not known|[Hh]ost is unreachable|[Uu]nknown host",
        )
        .with(
            "timeout",
            r"[Cc]onnection timed out|[Oo]peration timed out",
        )
        .with_described(
            "standby",
            r"[Ss]tandby console disabled|This \(D\)RP Node is not ready or active for login",
            "Console of a standby route processor",
        )
        .with("pid2platform", r"^(?P<platform>\w+-\w+)")
        .with(
            "platform",
            r"(?m)^\s*[Cc]isco (?P<family>\S+)(?: \S+)*? (?:[Cc]hassis|[Pp]rocessor|[Ss]eries)",
        )
        .with("version", r"(?m)Version (?P<version>[\w\.\(\)\-]+)")
        .with("vty", r"\bvty")
        .with("console", r"\bcon\s?\d");

    registry.insert(GENERIC, patterns);
}
