//! Script and prompt settings.

use serde::{Deserialize, Serialize};
use troupe_core::constants::{DEFAULT_HISTORY_WINDOW, DEFAULT_HUMAN_NAME};

/// Placeholders every character template must contain.
pub const CHARACTER_TEMPLATE_PLACEHOLDERS: [&str; 4] = [
    "{character_name}",
    "{character_info}",
    "{scene_setting}",
    "{plot_summary}",
];

/// Conversation shape: who the human is and how much history agents see.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScriptSettings {
    /// Identifier of the human participant in the cast.
    pub human_name: String,
    /// Number of recent lines included in prompts (K).
    pub history_window: usize,
    /// Rounds run by the bulk driver when none are requested.
    pub default_rounds: u32,
    /// Upper bound on requested rounds.
    pub max_rounds: u32,
}

impl ScriptSettings {
    /// Clamp a requested round count to `1..=max_rounds`, defaulting when absent.
    pub fn clamp_rounds(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_rounds)
            .clamp(1, self.max_rounds.max(1))
    }
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            human_name: DEFAULT_HUMAN_NAME.to_string(),
            history_window: DEFAULT_HISTORY_WINDOW,
            default_rounds: 5,
            max_rounds: 50,
        }
    }
}

/// Natural-language prompt templates.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PromptSettings {
    /// System prompt for scenario building and turn-order decisions.
    pub scheduler_system: String,
    /// Per-character system prompt with `{character_name}`, `{character_info}`,
    /// `{scene_setting}` and `{plot_summary}` placeholders.
    pub character_template: String,
}

impl PromptSettings {
    /// Placeholders missing from the character template.
    pub fn missing_placeholders(&self) -> Vec<&'static str> {
        CHARACTER_TEMPLATE_PLACEHOLDERS
            .into_iter()
            .filter(|p| !self.character_template.contains(p))
            .collect()
    }
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            scheduler_system: include_str!("../../prompts/scheduler-system.md")
                .trim_end()
                .to_string(),
            character_template: include_str!("../../prompts/character-template.md")
                .trim_end()
                .to_string(),
        }
    }
}
