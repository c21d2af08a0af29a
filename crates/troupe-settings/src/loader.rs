//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`TroupeSettings::default()`]
//! 2. If the settings file exists, deep-merge user values over defaults
//! 3. Apply `TROUPE_*` environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::TroupeSettings;

/// Resolve the default settings path (`~/.troupe/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".troupe").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<TroupeSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<TroupeSettings> {
    let mut settings = read_settings_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Defaults merged with the file at `path`, without env overrides.
pub fn read_settings_file(path: &Path) -> Result<TroupeSettings> {
    let defaults = serde_json::to_value(TroupeSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning and the file/default value kept.
pub fn apply_env_overrides(settings: &mut TroupeSettings) {
    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = read_env_string("TROUPE_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_env_u16("TROUPE_PORT", 1, 65535) {
        settings.server.port = v;
    }

    // ── API ─────────────────────────────────────────────────────────
    if let Some(v) = read_env_string("TROUPE_BASE_URL") {
        settings.api.base_url = v;
    }
    if let Some(v) = read_env_string("TROUPE_MODEL") {
        settings.api.model = v;
    }
    if let Some(v) = read_env_string("TROUPE_API_KEYS") {
        let keys = parse_key_list(&v);
        if keys.is_empty() {
            tracing::warn!(key = "TROUPE_API_KEYS", "no usable keys in env var, ignoring");
        } else {
            settings.api.credentials = keys;
        }
    }

    // ── Script ──────────────────────────────────────────────────────
    if let Some(v) = read_env_string("TROUPE_HUMAN_NAME") {
        settings.script.human_name = v;
    }
    if let Some(v) = read_env_usize("TROUPE_HISTORY_WINDOW", 1, 1000) {
        settings.script.history_window = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read_env_string("TROUPE_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Split a comma-separated key list, dropping blanks.
pub fn parse_key_list(val: &str) -> Vec<String> {
    val.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers ─────────────────────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_u16(name: &str, min: u16, max: u16) -> Option<u16> {
    let val = std::env::var(name).ok()?;
    let result = parse_u16_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
    }
    result
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    let val = std::env::var(name).ok()?;
    let result = parse_usize_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"port": 8900, "host": "localhost"}});
        let source = serde_json::json!({"server": {"port": 9090}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9090);
        assert_eq!(merged["server"]["host"], "localhost");
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"credentials": ["a", "b", "c"]});
        let source = serde_json::json!({"credentials": ["d"]});
        let merged = deep_merge(target, source);
        assert_eq!(merged["credentials"], serde_json::json!(["d"]));
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_new_keys_added() {
        let merged = deep_merge(serde_json::json!({"a": 1}), serde_json::json!({"b": 2}));
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    // ── read_settings_file ──────────────────────────────────────────

    #[test]
    fn missing_file_returns_defaults() {
        let settings = read_settings_file(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings.server.port, 8900);
        assert_eq!(settings.script.human_name, "我");
    }

    #[test]
    fn partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"api": {"credentials": ["k1", "k2"]}, "script": {"historyWindow": 4}}"#,
        )
        .unwrap();

        let settings = read_settings_file(&path).unwrap();
        assert_eq!(settings.api.credentials, vec!["k1", "k2"]);
        assert_eq!(settings.script.history_window, 4);
        assert_eq!(settings.script.human_name, "我");
        assert_eq!(settings.api.model, "deepseek-chat");
    }

    #[test]
    fn custom_prompt_replaces_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"prompts": {"schedulerSystem": "调度"}}"#).unwrap();

        let settings = read_settings_file(&path).unwrap();
        assert_eq!(settings.prompts.scheduler_system, "调度");
        assert!(settings.prompts.missing_placeholders().is_empty());
    }

    #[test]
    fn invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = read_settings_file(&path);
        assert!(matches!(result.unwrap_err(), SettingsError::Json(_)));
    }

    // ── parsing ─────────────────────────────────────────────────────

    #[test]
    fn key_list_trims_and_drops_blanks() {
        assert_eq!(parse_key_list(" k1, ,k2 ,"), vec!["k1", "k2"]);
        assert!(parse_key_list(" , ").is_empty());
    }

    #[test]
    fn parse_u16_bounds() {
        assert_eq!(parse_u16_range("8900", 1, 65535), Some(8900));
        assert_eq!(parse_u16_range("0", 1, 65535), None);
        assert_eq!(parse_u16_range("99999", 1, 65535), None);
        assert_eq!(parse_u16_range("port", 1, 65535), None);
    }

    #[test]
    fn parse_usize_bounds() {
        assert_eq!(parse_usize_range("10", 1, 1000), Some(10));
        assert_eq!(parse_usize_range("0", 1, 1000), None);
    }
}
