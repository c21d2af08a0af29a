//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and implement
//! [`Default`] with production values. Every struct is `#[serde(default)]`
//! so partial JSON files only need to name what they change.

mod api;
mod script;
mod server;

pub use api::*;
pub use script::*;
pub use server::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// Loaded from `~/.troupe/settings.json` with defaults applied for missing
/// fields. Environment variables can override specific values.
///
/// ```json
/// {
///   "api": { "credentials": ["sk-..."] },
///   "script": { "historyWindow": 20 }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TroupeSettings {
    /// Settings schema version.
    pub version: String,
    /// Provider endpoint, model and credential pool.
    pub api: ApiSettings,
    /// Sampling parameters.
    pub generation: GenerationSettings,
    /// Human identifier, history window and round limits.
    pub script: ScriptSettings,
    /// Prompt templates.
    pub prompts: PromptSettings,
    /// HTTP bridge settings.
    pub server: ServerSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for TroupeSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            api: ApiSettings::default(),
            generation: GenerationSettings::default(),
            script: ScriptSettings::default(),
            prompts: PromptSettings::default(),
            server: ServerSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl TroupeSettings {
    /// Check the invariants the runtime relies on.
    ///
    /// The credential pool must be non-empty, the human needs a name, the
    /// history window must show at least one line, and the character
    /// template must carry every placeholder.
    pub fn validate(&self) -> Result<()> {
        if self.api.credentials.iter().all(|c| c.trim().is_empty()) {
            return Err(SettingsError::InvalidValue(
                "api.credentials must contain at least one key".into(),
            ));
        }
        if self.script.human_name.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "script.humanName must not be blank".into(),
            ));
        }
        if self.script.history_window == 0 {
            return Err(SettingsError::InvalidValue(
                "script.historyWindow must be at least 1".into(),
            ));
        }
        let missing = self.prompts.missing_placeholders();
        if !missing.is_empty() {
            return Err(SettingsError::InvalidValue(format!(
                "prompts.characterTemplate is missing {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }
}
