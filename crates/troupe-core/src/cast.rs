//! Cast descriptors and history line formatting.

use serde::{Deserialize, Serialize};

use crate::constants::LINE_SEPARATOR;

/// One participant parsed from the scenario's cast section.
///
/// The human entry and simulated entries share this shape; which is which is
/// decided when the cast is materialized.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastEntry {
    /// Display name, unique within a cast.
    pub name: String,
    /// Free-text persona (personality, background).
    pub persona: String,
}

impl CastEntry {
    /// Create a cast entry.
    pub fn new(name: impl Into<String>, persona: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            persona: persona.into(),
        }
    }

    /// Whether this entry stands for the human participant.
    ///
    /// Matches when the configured human identifier appears anywhere in the
    /// name, so decorated names such as `"我（主角）"` still resolve.
    pub fn is_human(&self, human_name: &str) -> bool {
        self.name.contains(human_name)
    }
}

/// Format a history line as `"{speaker}：{text}"`.
pub fn format_line(speaker: &str, text: &str) -> String {
    format!("{speaker}{LINE_SEPARATOR}{text}")
}

/// Drop a leading `"{speaker}："` from generated text, if present.
///
/// Models are asked to answer in line format already; this lets callers
/// re-format uniformly without doubling the prefix.
pub fn strip_speaker_prefix<'a>(speaker: &str, text: &'a str) -> &'a str {
    text.strip_prefix(speaker)
        .and_then(|rest| rest.strip_prefix(LINE_SEPARATOR).or_else(|| rest.strip_prefix(':')))
        .map_or(text, str::trim_start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_line_uses_full_width_colon() {
        assert_eq!(format_line("我", "你好"), "我：你好");
        assert_eq!(format_line("Bob", "hi"), "Bob：hi");
    }

    #[test]
    fn is_human_matches_substring() {
        assert!(CastEntry::new("我", "the user").is_human("我"));
        assert!(CastEntry::new("我（主角）", "the user").is_human("我"));
        assert!(!CastEntry::new("Bob", "barista").is_human("我"));
    }

    #[test]
    fn strip_prefix_full_width() {
        assert_eq!(strip_speaker_prefix("Bob", "Bob：来杯咖啡"), "来杯咖啡");
    }

    #[test]
    fn strip_prefix_ascii_colon() {
        assert_eq!(strip_speaker_prefix("Bob", "Bob: coffee?"), "coffee?");
    }

    #[test]
    fn strip_prefix_absent_returns_input() {
        assert_eq!(strip_speaker_prefix("Bob", "coffee?"), "coffee?");
        assert_eq!(strip_speaker_prefix("Bob", "Bobby：hi"), "Bobby：hi");
    }

    #[test]
    fn cast_entry_serde_camel_case() {
        let entry = CastEntry::new("Bob", "cheerful");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["name"], "Bob");
        assert_eq!(json["persona"], "cheerful");
    }
}
