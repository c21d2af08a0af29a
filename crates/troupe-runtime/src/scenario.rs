//! # Scenario Parsing
//!
//! The scenario builder answers in free text with three labeled sections:
//!
//! ```text
//! 【场景设定】
//! ...
//! 【主要角色】
//! 我|用户扮演的主角|...
//! Bob|cheerful|a barista
//! 【剧情大纲】
//! ...
//! ```
//!
//! Each section runs from the line after its marker up to the next `【` or
//! the end of the text. Parsing never fails: a missing section yields an
//! empty string or an empty cast.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::warn;
use troupe_core::CastEntry;

/// Scene section marker.
pub const SCENE_MARKER: &str = "【场景设定】";
/// Cast section marker.
pub const CAST_MARKER: &str = "【主要角色】";
/// Plot section marker.
pub const PLOT_MARKER: &str = "【剧情大纲】";

const SECTION_OPEN: char = '【';
const CAST_FIELD_SEPARATOR: char = '|';

static SCENE_SECTION: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| section_pattern(SCENE_MARKER));
static CAST_SECTION: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| section_pattern(CAST_MARKER));
static PLOT_SECTION: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| section_pattern(PLOT_MARKER));

fn section_pattern(marker: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"(?s){}\s*\n(.*)", regex::escape(marker)))
}

/// Parsed scenario builder reply.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioDraft {
    /// The builder's reply, unmodified.
    pub full_text: String,
    /// Scene section.
    pub scene_setting: String,
    /// Cast lines in order of appearance, human entry included.
    pub cast: Vec<CastEntry>,
    /// Plot section.
    pub plot_summary: String,
}

/// Parse a scenario builder reply.
pub fn parse_scenario(text: &str) -> ScenarioDraft {
    let cast_text = section(&CAST_SECTION, text);
    ScenarioDraft {
        full_text: text.to_owned(),
        scene_setting: section(&SCENE_SECTION, text),
        cast: parse_cast(&cast_text),
        plot_summary: section(&PLOT_SECTION, text),
    }
}

fn section(pattern: &LazyLock<Result<Regex, regex::Error>>, text: &str) -> String {
    let Some(body) = pattern
        .as_ref()
        .ok()
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
    else {
        return String::new();
    };
    let end = body.find(SECTION_OPEN).unwrap_or(body.len());
    body[..end].trim().to_owned()
}

/// Parse `name|persona...` lines. Lines without a separator are skipped,
/// as are blank and repeated names.
fn parse_cast(text: &str) -> Vec<CastEntry> {
    let mut seen = HashSet::new();
    let mut cast = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let Some((name, persona)) = line.split_once(CAST_FIELD_SEPARATOR) else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            warn!(line, "skipping cast line with blank name");
            continue;
        }
        if !seen.insert(name.to_owned()) {
            warn!(name, "skipping repeated cast name");
            continue;
        }
        cast.push(CastEntry::new(name, persona.trim()));
    }
    cast
}
