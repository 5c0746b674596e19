//! Static per-platform driver constants.

use crate::platform::PlatformId;

/// Commands, prompt components and tables that make up a platform driver.
#[derive(Debug, Clone, Copy)]
pub struct Profile {
    /// Platform the constants belong to.
    pub platform: PlatformId,

    /// Command printing the software version.
    pub version_cmd: &'static str,

    /// Tried when [`version_cmd`](Self::version_cmd) is rejected.
    pub version_fallback_cmd: Option<&'static str>,

    /// Command printing the chassis inventory.
    pub inventory_cmd: Option<&'static str>,

    /// Command listing logged in users.
    pub users_cmd: Option<&'static str>,

    /// Command printing the hostname.
    pub hostname_cmd: Option<&'static str>,

    /// Command entering privileged mode.
    pub enable_cmd: Option<&'static str>,

    /// Command rebooting the device.
    pub reload_cmd: Option<&'static str>,

    /// Pattern keys joined into the dynamic prompt.
    pub prompt_components: &'static [&'static str],

    /// Commands run once after login to disable paging and wrapping.
    pub terminal_prep: &'static [&'static str],

    /// PID or platform string prefix to hardware family.
    pub families: &'static [(&'static str, &'static str)],
}

impl Profile {
    /// Hardware family for a platform string or PID, by prefix.
    pub fn family_of(&self, name: &str) -> Option<&'static str> {
        self.families
            .iter()
            .find(|(prefix, _)| name.starts_with(prefix))
            .map(|(_, family)| *family)
    }
}

const IOS_PROMPT: &[&str] = &["prompt_dynamic", "prompt_default", "rommon"];
const XR_PROMPT: &[&str] = &["prompt_dynamic", "prompt_default", "rommon", "xml"];

const XR64_FAMILIES: &[(&str, &str)] = &[
    ("ASR9K", "ASR9K"),
    ("ASR-9", "ASR9K"),
    ("ASR9", "ASR9K"),
    ("NCS-6", "NCS6K"),
    ("NCS-4", "NCS4K"),
    ("NCS-50", "NCS5K"),
    ("NCS-55", "NCS5500"),
    ("NCS1", "NCS1K"),
    ("NCS-1", "NCS1K"),
];

const XR_PREP: &[&str] = &[
    "terminal exec prompt no-timestamp",
    "terminal len 0",
    "terminal width 0",
];

pub const GENERIC: Profile = Profile {
    platform: PlatformId::Generic,
    version_cmd: "show version brief",
    version_fallback_cmd: Some("show version"),
    inventory_cmd: None,
    users_cmd: None,
    hostname_cmd: None,
    enable_cmd: None,
    reload_cmd: None,
    prompt_components: &["prompt_dynamic"],
    terminal_prep: &["terminal len 0"],
    families: &[],
};

pub const JUMPHOST: Profile = Profile {
    platform: PlatformId::Jumphost,
    version_cmd: "uname -sr",
    version_fallback_cmd: None,
    hostname_cmd: Some("hostname"),
    terminal_prep: &[],
    ..GENERIC
};

pub const IOS: Profile = Profile {
    platform: PlatformId::Ios,
    version_cmd: "show version",
    version_fallback_cmd: None,
    inventory_cmd: Some("show inventory"),
    users_cmd: Some("show users"),
    enable_cmd: Some("enable"),
    reload_cmd: Some("reload"),
    prompt_components: IOS_PROMPT,
    terminal_prep: &["terminal len 0", "terminal width 0"],
    families: &[("A9", "ASR900")],
    ..GENERIC
};

pub const XE: Profile = Profile {
    platform: PlatformId::Xe,
    families: &[("ASR-9", "ASR900")],
    ..IOS
};

pub const NXOS: Profile = Profile {
    platform: PlatformId::NxOs,
    version_cmd: "show version",
    version_fallback_cmd: None,
    inventory_cmd: Some("show inventory chassis"),
    users_cmd: Some("show users"),
    prompt_components: IOS_PROMPT,
    terminal_prep: &["terminal len 0", "terminal width 511"],
    families: &[("Nexus9", "N9K"), ("N9K-C9", "N9K")],
    ..GENERIC
};

pub const XR: Profile = Profile {
    platform: PlatformId::Xr,
    inventory_cmd: Some("admin show inventory chassis"),
    users_cmd: Some("show users"),
    prompt_components: XR_PROMPT,
    terminal_prep: XR_PREP,
    families: &[("ASR9K", "ASR9K"), ("ASR-9", "ASR9K"), ("CRS", "CRS")],
    ..GENERIC
};

pub const XRV: Profile = Profile {
    platform: PlatformId::XrV,
    reload_cmd: Some("admin reload location all"),
    families: &[("XRv", "IOS-XRv")],
    ..XR
};

pub const EXR: Profile = Profile {
    platform: PlatformId::Exr,
    version_cmd: "show version",
    version_fallback_cmd: None,
    families: XR64_FAMILIES,
    ..XR
};

pub const CALVADOS: Profile = Profile {
    platform: PlatformId::Calvados,
    version_cmd: "show version",
    version_fallback_cmd: None,
    inventory_cmd: Some("show inventory chassis"),
    prompt_components: &["prompt_dynamic", "prompt_default", "exr", "windriver"],
    terminal_prep: &["terminal len 0", "terminal width 0"],
    families: XR64_FAMILIES,
    ..GENERIC
};

pub const WINDRIVER: Profile = Profile {
    platform: PlatformId::Windriver,
    version_cmd: "cat /etc/issue",
    version_fallback_cmd: None,
    prompt_components: &["prompt_dynamic", "prompt_default", "calvados", "lc"],
    terminal_prep: &[],
    families: XR64_FAMILIES,
    ..GENERIC
};
