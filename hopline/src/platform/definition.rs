//! Pattern entries and per-platform pattern tables.
//!
//! The shapes here are the schema of the pattern document: a platform maps
//! pattern keys to entries, and an entry is a raw regex, a described regex,
//! or a list of platforms whose entries for the same key are unioned.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One pattern definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternEntry {
    /// A raw regular expression.
    Literal(String),

    /// A regular expression with a human readable description.
    Described { pattern: String, description: String },

    /// Union of the same key on the listed platforms.
    UnionOf(Vec<String>),
}

impl PatternEntry {
    /// Description, for described entries.
    pub fn description(&self) -> Option<&str> {
        match self {
            PatternEntry::Described { description, .. } => Some(description),
            _ => None,
        }
    }
}

/// Pattern table of a single platform, in definition order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlatformPatterns {
    entries: IndexMap<String, PatternEntry>,
}

impl PlatformPatterns {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a raw pattern.
    pub fn with(mut self, key: &str, pattern: &str) -> Self {
        self.entries
            .insert(key.to_string(), PatternEntry::Literal(pattern.to_string()));
        self
    }

    /// Add a described pattern.
    pub fn with_described(mut self, key: &str, pattern: &str, description: &str) -> Self {
        self.entries.insert(
            key.to_string(),
            PatternEntry::Described {
                pattern: pattern.to_string(),
                description: description.to_string(),
            },
        );
        self
    }

    /// Add a reference to the same key on other platforms.
    pub fn with_union(mut self, key: &str, platforms: &[&str]) -> Self {
        self.entries.insert(
            key.to_string(),
            PatternEntry::UnionOf(platforms.iter().map(|p| p.to_string()).collect()),
        );
        self
    }

    /// Look up an entry.
    pub fn get(&self, key: &str) -> Option<&PatternEntry> {
        self.entries.get(key)
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, key: impl Into<String>, entry: PatternEntry) {
        self.entries.insert(key.into(), entry);
    }

    /// Iterate entries in definition order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PatternEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_shapes_deserialize() {
        let json = r#"{
            "prompt": "router#",
            "password": {"pattern": "[Pp]assword: ", "description": "Password prompt"},
            "more": ["IOS", "XR"]
        }"#;
        let table: PlatformPatterns = serde_json::from_str(json).unwrap();
        assert_eq!(table.get("prompt"), Some(&PatternEntry::Literal("router#".into())));
        assert_eq!(table.get("password").unwrap().description(), Some("Password prompt"));
        assert_eq!(
            table.get("more"),
            Some(&PatternEntry::UnionOf(vec!["IOS".into(), "XR".into()]))
        );
        let keys: Vec<&str> = table.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["prompt", "password", "more"]);
    }
}
