//! Runtime configuration distilled from [`TroupeSettings`].

use troupe_llm::GenerationParams;
use troupe_settings::TroupeSettings;

/// Static inputs the coordinator and agents consume.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Identifier of the human participant.
    pub human_name: String,
    /// Number of recent history lines rendered into prompts (K).
    pub history_window: usize,
    /// Parameters for scenario building and dialogue lines.
    pub generation: GenerationParams,
    /// Token limit for turn-order decisions.
    pub scheduling_max_tokens: u32,
    /// System prompt for scenario building and scheduling.
    pub scheduler_system: String,
    /// Per-agent system prompt template.
    pub character_template: String,
}

impl RuntimeConfig {
    /// Parameters for a scheduling call.
    pub fn scheduling_params(&self) -> GenerationParams {
        self.generation.with_max_tokens(self.scheduling_max_tokens)
    }
}

impl From<&TroupeSettings> for RuntimeConfig {
    fn from(settings: &TroupeSettings) -> Self {
        Self {
            human_name: settings.script.human_name.clone(),
            history_window: settings.script.history_window,
            generation: GenerationParams {
                temperature: settings.generation.temperature,
                max_tokens: settings.generation.max_tokens,
            },
            scheduling_max_tokens: settings.generation.scheduling_max_tokens,
            scheduler_system: settings.prompts.scheduler_system.clone(),
            character_template: settings.prompts.character_template.clone(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from(&TroupeSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_settings() {
        let config = RuntimeConfig::default();
        assert_eq!(config.human_name, "我");
        assert_eq!(config.history_window, 10);
        assert_eq!(config.generation.max_tokens, 2048);
        assert_eq!(config.scheduling_params().max_tokens, 512);
        assert!(config.character_template.contains("{character_name}"));
    }

    #[test]
    fn custom_settings_flow_through() {
        let mut settings = TroupeSettings::default();
        settings.script.human_name = "Me".into();
        settings.generation.temperature = 0.2;
        let config = RuntimeConfig::from(&settings);
        assert_eq!(config.human_name, "Me");
        assert!((config.generation.temperature - 0.2).abs() < f64::EPSILON);
    }
}
