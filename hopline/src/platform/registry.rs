//! Pattern registry: per-platform regular expressions with generic fallback.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::definition::{PatternEntry, PlatformPatterns};
use super::vendors;
use crate::channel::Event;
use crate::error::PatternError;

/// Name of the fallback platform.
pub const GENERIC: &str = "generic";

/// Generic key holding the ordered platform list used by classification.
pub const PROMPT_DETECTION: &str = "prompt_detection";

/// Built-in registry shared by every chain.
static BUILTIN: Lazy<Arc<PatternRegistry>> = Lazy::new(|| Arc::new(PatternRegistry::with_builtin()));

/// Registry of pattern tables keyed by platform name.
///
/// Read-only once built; share it between chains with an [`Arc`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternRegistry {
    platforms: IndexMap<String, PlatformPatterns>,
}

impl PatternRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in registry.
    pub fn builtin() -> Arc<PatternRegistry> {
        BUILTIN.clone()
    }

    /// Build a registry holding the built-in platforms.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        vendors::generic::register(&mut registry);
        vendors::linux::register(&mut registry);
        vendors::ios::register(&mut registry);
        vendors::nxos::register(&mut registry);
        vendors::ios_xr::register(&mut registry);
        registry
    }

    /// Load a pattern document.
    pub fn from_json(document: &str) -> Result<Self, PatternError> {
        let registry: PatternRegistry = serde_json::from_str(document)?;
        if !registry.contains(GENERIC) {
            return Err(PatternError::MissingGeneric);
        }
        Ok(registry)
    }

    /// Overlay another registry. Its entries replace ours key by key.
    pub fn merge(&mut self, other: PatternRegistry) {
        for (platform, patterns) in other.platforms {
            let table = self.platforms.entry(platform).or_default();
            for (key, entry) in patterns.iter() {
                table.insert(key, entry.clone());
            }
        }
    }

    /// Register (or replace) a platform table.
    pub fn insert(&mut self, platform: impl Into<String>, patterns: PlatformPatterns) {
        self.platforms.insert(platform.into(), patterns);
    }

    /// Whether a platform is registered.
    pub fn contains(&self, platform: &str) -> bool {
        self.platforms.contains_key(platform)
    }

    /// Registered platform names.
    pub fn platforms(&self) -> impl Iterator<Item = &str> {
        self.platforms.keys().map(String::as_str)
    }

    /// Resolve the pattern text for `key` on `platform`.
    ///
    /// Falls back to the generic platform, unwraps described entries, and
    /// unions list entries across the referenced platforms.
    pub fn resolve(&self, platform: &str, key: &str) -> Result<String, PatternError> {
        let mut visiting = Vec::new();
        self.resolve_inner(platform, key, &mut visiting)
    }

    /// Description of a described entry.
    pub fn description(&self, platform: &str, key: &str) -> Option<&str> {
        self.entry(platform, key).ok().and_then(PatternEntry::description)
    }

    /// Resolve and compile a text pattern.
    pub fn compile(&self, platform: &str, key: &str) -> Result<Regex, PatternError> {
        Ok(Regex::new(&self.resolve(platform, key)?)?)
    }

    /// Resolve and compile a stream event.
    pub fn compile_event(&self, platform: &str, key: &str) -> Result<Event, PatternError> {
        Ok(Event::regex(&self.resolve(platform, key)?)?)
    }

    /// Ordered platform list used by [`classify`](Self::classify).
    pub fn detection_order(&self) -> Result<&[String], PatternError> {
        match self.entry(GENERIC, PROMPT_DETECTION)? {
            PatternEntry::UnionOf(platforms) => Ok(platforms),
            _ => Err(PatternError::NotAList {
                platform: GENERIC.to_string(),
                key: PROMPT_DETECTION.to_string(),
            }),
        }
    }

    /// Classify a prompt: the first platform in the detection order whose
    /// `prompt` pattern matches.
    pub fn classify(&self, prompt: &str) -> Result<Option<String>, PatternError> {
        for platform in self.detection_order()? {
            let re = self.compile(platform, "prompt")?;
            if re.is_match(prompt) {
                debug!("prompt '{}' classified as {}", prompt, platform);
                return Ok(Some(platform.clone()));
            }
        }
        debug!("prompt '{}' not classified", prompt);
        Ok(None)
    }

    fn entry(&self, platform: &str, key: &str) -> Result<&PatternEntry, PatternError> {
        let patterns = self
            .platforms
            .get(platform)
            .ok_or_else(|| PatternError::UnknownPlatform {
                platform: platform.to_string(),
            })?;
        patterns
            .get(key)
            .or_else(|| self.platforms.get(GENERIC).and_then(|g| g.get(key)))
            .ok_or_else(|| PatternError::UnknownKey {
                platform: platform.to_string(),
                key: key.to_string(),
            })
    }

    fn resolve_inner<'a>(
        &'a self,
        platform: &'a str,
        key: &str,
        visiting: &mut Vec<&'a str>,
    ) -> Result<String, PatternError> {
        if visiting.contains(&platform) {
            return Err(PatternError::Cycle {
                platform: platform.to_string(),
                key: key.to_string(),
            });
        }

        let pattern = match self.entry(platform, key)? {
            PatternEntry::Literal(pattern) => pattern.clone(),
            PatternEntry::Described { pattern, .. } => pattern.clone(),
            PatternEntry::UnionOf(platforms) => {
                visiting.push(platform);
                let mut alternatives = IndexSet::new();
                for referenced in platforms {
                    match self.resolve_inner(referenced, key, visiting) {
                        Ok(pattern) => {
                            for alternative in split_alternation(&pattern) {
                                alternatives.insert(alternative.to_string());
                            }
                        }
                        Err(PatternError::UnknownPlatform { .. } | PatternError::UnknownKey { .. }) => {
                            debug!("'{}' on {} skips {}", key, platform, referenced);
                        }
                        Err(e) => return Err(e),
                    }
                }
                visiting.pop();
                alternatives.into_iter().collect::<Vec<_>>().join("|")
            }
        };

        if pattern.is_empty() {
            return Err(PatternError::Empty {
                platform: platform.to_string(),
                key: key.to_string(),
            });
        }
        Ok(pattern)
    }
}

/// Split a regular expression on its top-level alternation.
///
/// Bars inside groups, character classes or escapes are kept, so each part
/// is itself a valid expression. Empty alternatives are dropped.
pub fn split_alternation(pattern: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_class = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, b) in pattern.bytes().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' => escaped = true,
            b'[' if !in_class => in_class = true,
            b']' if in_class => in_class = false,
            b'(' if !in_class => depth += 1,
            b')' if !in_class => depth = depth.saturating_sub(1),
            b'|' if !in_class && depth == 0 => {
                parts.push(&pattern[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&pattern[start..]);
    parts.retain(|p| !p.is_empty());
    parts
}
