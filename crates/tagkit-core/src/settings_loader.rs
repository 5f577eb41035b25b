//! Loading [`Settings`] from configuration files and the environment.
//!
//! Values are layered in this order, later layers winning:
//!
//! 1. [`Settings::default`]
//! 2. a TOML or JSON document, deep-merged over the defaults
//! 3. `TAGKIT_*` environment variables
//!
//! | Env Var | Setting |
//! |---|---|
//! | `TAGKIT_DEBUG` | `debug` |
//! | `TAGKIT_STATIC_URL` | `static_url` |
//! | `TAGKIT_MEDIA_URL` | `media_url` |
//! | `TAGKIT_SITE_DOMAIN` | `site_domain` (empty unsets it) |
//! | `TAGKIT_LANGUAGE_CODE` | `language_code` |
//! | `TAGKIT_LANGUAGES` | `languages` (comma-separated) |
//! | `TAGKIT_LOG_LEVEL` | `log_level` |
//!
//! ```rust,no_run
//! use tagkit_core::settings_loader;
//!
//! let settings = settings_loader::from_path_with_env("config/tagkit.toml").unwrap();
//! ```

use std::path::Path;

use crate::error::{TagkitError, TagkitResult};
use crate::settings::Settings;

const ENV_PREFIX: &str = "TAGKIT_";

/// Loads settings from a TOML string, keeping defaults for missing keys.
pub fn from_toml_str(toml_str: &str) -> TagkitResult<Settings> {
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| TagkitError::ConfigurationError(format!("Failed to parse TOML: {e}")))?;
    merge_over_defaults(toml_to_json(toml_value), "TOML")
}

/// Loads settings from a JSON string, keeping defaults for missing keys.
pub fn from_json_str(json_str: &str) -> TagkitResult<Settings> {
    let json_value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| TagkitError::ConfigurationError(format!("Failed to parse JSON: {e}")))?;
    merge_over_defaults(json_value, "JSON")
}

/// Loads settings from a file, picking the format from its extension.
///
/// `.json` files are read as JSON; anything else is read as TOML.
pub fn from_path(path: impl AsRef<Path>) -> TagkitResult<Settings> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        TagkitError::ConfigurationError(format!(
            "Failed to read settings file '{}': {e}",
            path.display()
        ))
    })?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        from_json_str(&content)
    } else {
        from_toml_str(&content)
    }
}

/// Loads settings from a file and then applies `TAGKIT_*` overrides.
pub fn from_path_with_env(path: impl AsRef<Path>) -> TagkitResult<Settings> {
    let mut settings = from_path(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Builds settings from the defaults plus `TAGKIT_*` overrides.
pub fn from_env() -> Settings {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings);
    settings
}

/// Applies `TAGKIT_*` variables from the process environment.
pub fn apply_env_overrides(settings: &mut Settings) {
    apply_overrides_with(settings, |name| std::env::var(name).ok());
}

/// Applies overrides read through `lookup`, which receives the full
/// variable name (e.g. `TAGKIT_DEBUG`).
pub fn apply_overrides_with<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let var = |suffix: &str| lookup(&format!("{ENV_PREFIX}{suffix}"));

    if let Some(val) = var("DEBUG") {
        settings.debug = matches!(val.to_lowercase().as_str(), "true" | "1" | "yes");
    }
    if let Some(val) = var("STATIC_URL") {
        settings.static_url = val;
    }
    if let Some(val) = var("MEDIA_URL") {
        settings.media_url = val;
    }
    if let Some(val) = var("SITE_DOMAIN") {
        let val = val.trim().to_string();
        settings.site_domain = if val.is_empty() { None } else { Some(val) };
    }
    if let Some(val) = var("LANGUAGE_CODE") {
        settings.language_code = val;
    }
    if let Some(val) = var("LANGUAGES") {
        settings.languages = val
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Some(val) = var("LOG_LEVEL") {
        settings.log_level = val;
    }
}

// ============================================================
// Helpers
// ============================================================

fn merge_over_defaults(value: serde_json::Value, format: &str) -> TagkitResult<Settings> {
    let defaults = serde_json::to_value(Settings::default()).map_err(|e| {
        TagkitError::ConfigurationError(format!("Failed to serialize default settings: {e}"))
    })?;
    serde_json::from_value(merge_json(defaults, value)).map_err(|e| {
        TagkitError::ConfigurationError(format!("Failed to deserialize settings from {format}: {e}"))
    })
}

fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => serde_json::Value::Object(
            table.into_iter().map(|(k, v)| (k, toml_to_json(v))).collect(),
        ),
    }
}

/// Deep-merges `overlay` into `base`. Objects merge key by key; anything
/// else is replaced.
fn merge_json(base: serde_json::Value, overlay: serde_json::Value) -> serde_json::Value {
    match (base, overlay) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => value,
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // ── TOML loading ────────────────────────────────────────────────

    #[test]
    fn test_from_toml_str_basic() {
        let toml = r#"
            debug = false
            static_url = "/assets/"
            site_domain = "www.mysite.com"
            languages = ["en", "it", "de"]
        "#;

        let settings = from_toml_str(toml).unwrap();
        assert!(!settings.debug);
        assert_eq!(settings.static_url, "/assets/");
        assert_eq!(settings.site_domain.as_deref(), Some("www.mysite.com"));
        assert_eq!(settings.languages, vec!["en", "it", "de"]);
        assert_eq!(settings.media_url, "/media/");
    }

    #[test]
    fn test_from_toml_str_extra_table() {
        let toml = r#"
            [extra]
            brand = "acme"
            page_size = 20
        "#;

        let settings = from_toml_str(toml).unwrap();
        assert_eq!(settings.extra["brand"], "acme");
        assert_eq!(settings.extra["page_size"], 20);
    }

    #[test]
    fn test_from_toml_str_empty() {
        let settings = from_toml_str("").unwrap();
        assert!(settings.debug);
        assert_eq!(settings.language_code, "en");
    }

    #[test]
    fn test_from_toml_str_invalid() {
        let err = from_toml_str("[[invalid toml content").unwrap_err();
        assert!(matches!(err, TagkitError::ConfigurationError(_)));
    }

    #[test]
    fn test_from_toml_str_wrong_type() {
        let result = from_toml_str("debug = \"maybe\"");
        assert!(result.is_err());
    }

    // ── JSON loading ────────────────────────────────────────────────

    #[test]
    fn test_from_json_str_basic() {
        let json = r#"{
            "log_level": "tagkit=debug",
            "prefix_default_language": false
        }"#;

        let settings = from_json_str(json).unwrap();
        assert_eq!(settings.log_level, "tagkit=debug");
        assert!(!settings.prefix_default_language);
        assert_eq!(settings.static_url, "/static/");
    }

    #[test]
    fn test_from_json_str_invalid() {
        assert!(from_json_str("{invalid json").is_err());
    }

    // ── File loading ────────────────────────────────────────────────

    #[test]
    fn test_from_path_toml_and_json() {
        let dir = std::env::temp_dir().join("tagkit_test_settings_files");
        std::fs::create_dir_all(&dir).unwrap();

        let toml_path = dir.join("tagkit.toml");
        std::fs::write(&toml_path, "static_url = \"/s/\"\n").unwrap();
        let json_path = dir.join("tagkit.json");
        std::fs::write(&json_path, r#"{"media_url": "/m/"}"#).unwrap();

        assert_eq!(from_path(&toml_path).unwrap().static_url, "/s/");
        assert_eq!(from_path(&json_path).unwrap().media_url, "/m/");

        std::fs::remove_file(&toml_path).ok();
        std::fs::remove_file(&json_path).ok();
        std::fs::remove_dir(&dir).ok();
    }

    #[test]
    fn test_from_path_missing() {
        let err = from_path("/nonexistent/path/tagkit.toml").unwrap_err();
        assert!(err.to_string().contains("tagkit.toml"));
    }

    // ── Environment overrides ───────────────────────────────────────

    #[test]
    fn test_overrides_debug_values() {
        for (raw, expected) in [("true", true), ("1", true), ("YES", true), ("false", false)] {
            let mut settings = Settings {
                debug: !expected,
                ..Settings::default()
            };
            apply_overrides_with(&mut settings, env(&[("TAGKIT_DEBUG", raw)]));
            assert_eq!(settings.debug, expected, "TAGKIT_DEBUG={raw}");
        }
    }

    #[test]
    fn test_overrides_languages_list() {
        let mut settings = Settings::default();
        apply_overrides_with(&mut settings, env(&[("TAGKIT_LANGUAGES", "en, it ,,de")]));
        assert_eq!(settings.languages, vec!["en", "it", "de"]);
    }

    #[test]
    fn test_overrides_site_domain_empty_unsets() {
        let mut settings = Settings {
            site_domain: Some("old.example.com".to_string()),
            ..Settings::default()
        };
        apply_overrides_with(&mut settings, env(&[("TAGKIT_SITE_DOMAIN", "  ")]));
        assert!(settings.site_domain.is_none());

        apply_overrides_with(&mut settings, env(&[("TAGKIT_SITE_DOMAIN", "cdn.example.com")]));
        assert_eq!(settings.site_domain.as_deref(), Some("cdn.example.com"));
    }

    #[test]
    fn test_overrides_ignore_unprefixed() {
        let mut settings = Settings::default();
        apply_overrides_with(&mut settings, env(&[("STATIC_URL", "/nope/")]));
        assert_eq!(settings.static_url, "/static/");
    }

    #[test]
    fn test_from_env_reads_process_environment() {
        std::env::set_var("TAGKIT_LANGUAGE_CODE", "it");
        let settings = from_env();
        assert_eq!(settings.language_code, "it");
        std::env::remove_var("TAGKIT_LANGUAGE_CODE");
    }

    // ── Helpers ─────────────────────────────────────────────────────

    #[test]
    fn test_merge_json_nested() {
        let base = serde_json::json!({"outer": {"a": 1, "b": 2}, "list": [1, 2]});
        let over = serde_json::json!({"outer": {"b": 3}, "list": [9]});
        let merged = merge_json(base, over);
        assert_eq!(merged["outer"]["a"], 1);
        assert_eq!(merged["outer"]["b"], 3);
        assert_eq!(merged["list"], serde_json::json!([9]));
    }

    #[test]
    fn test_toml_to_json() {
        let toml_val: toml::Value = toml::from_str(
            r#"
            name = "test"
            items = [1, 2]
            [nested]
            key = "value"
        "#,
        )
        .unwrap();

        let json = toml_to_json(toml_val);
        assert_eq!(json["name"], "test");
        assert_eq!(json["items"], serde_json::json!([1, 2]));
        assert_eq!(json["nested"]["key"], "value");
    }
}
