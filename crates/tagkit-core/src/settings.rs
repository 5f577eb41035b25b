//! Settings consumed by the template engine and the toolkit tags.
//!
//! [`Settings`] carries defaults for every field, so hosts only override what
//! they need. [`LazySettings`] is an optional configure-once slot; the engine
//! itself always receives its settings explicitly.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::{TagkitError, TagkitResult};

/// The complete set of tagkit settings.
///
/// # Examples
///
/// ```
/// use tagkit_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert!(settings.debug);
/// assert_eq!(settings.static_url, "/static/");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // ── Core ─────────────────────────────────────────────────────────

    /// Whether debug mode is enabled.
    pub debug: bool,

    // ── URLs ─────────────────────────────────────────────────────────

    /// URL prefix for static files. Relative paths given to
    /// `build_absolute_uri` resolve under it.
    pub static_url: String,
    /// URL prefix for user-uploaded media files.
    pub media_url: String,
    /// Public domain used for absolute URIs instead of the request host.
    pub site_domain: Option<String>,

    // ── Internationalization ─────────────────────────────────────────

    /// The default language code.
    pub language_code: String,
    /// Every language that may appear as a URL prefix.
    pub languages: Vec<String>,
    /// Whether URLs in the default language carry a prefix too.
    pub prefix_default_language: bool,

    // ── Templates ────────────────────────────────────────────────────

    /// Directories searched by the filesystem loader, in order.
    pub template_dirs: Vec<PathBuf>,
    /// Whether variable output is HTML-escaped by default.
    pub auto_escape: bool,

    // ── Logging ──────────────────────────────────────────────────────

    /// The log level or env-filter directive (e.g. "info", "tagkit=debug").
    pub log_level: String,

    // ── Escape hatch ─────────────────────────────────────────────────

    /// Custom settings that don't fit into the above categories.
    pub extra: HashMap<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: true,

            static_url: "/static/".to_string(),
            media_url: "/media/".to_string(),
            site_domain: None,

            language_code: "en".to_string(),
            languages: vec!["en".to_string()],
            prefix_default_language: true,

            template_dirs: Vec::new(),
            auto_escape: true,

            log_level: "info".to_string(),

            extra: HashMap::new(),
        }
    }
}

/// A lazily-initialized, globally-accessible settings container.
///
/// Call [`configure`](LazySettings::configure) once at startup, then use
/// [`get`](LazySettings::get) to read the settings back.
pub struct LazySettings {
    inner: OnceLock<Settings>,
}

impl Default for LazySettings {
    fn default() -> Self {
        Self::new()
    }
}

impl LazySettings {
    /// Creates a new, unconfigured `LazySettings`.
    pub const fn new() -> Self {
        Self {
            inner: OnceLock::new(),
        }
    }

    /// Stores the settings. Fails if they were already configured.
    pub fn configure(&self, settings: Settings) -> TagkitResult<()> {
        self.inner.set(settings).map_err(|_| {
            TagkitError::ConfigurationError("Settings have already been configured".to_string())
        })
    }

    /// Returns the configured settings.
    pub fn get(&self) -> TagkitResult<&Settings> {
        self.inner.get().ok_or_else(|| {
            TagkitError::ConfigurationError(
                "Settings have not been configured. Call SETTINGS.configure() first.".to_string(),
            )
        })
    }

    /// Returns `true` if settings have been configured.
    pub fn is_configured(&self) -> bool {
        self.inner.get().is_some()
    }
}

/// The global settings instance.
pub static SETTINGS: LazySettings = LazySettings::new();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let s = Settings::default();
        assert!(s.debug);
        assert_eq!(s.static_url, "/static/");
        assert_eq!(s.media_url, "/media/");
        assert!(s.site_domain.is_none());
        assert_eq!(s.language_code, "en");
        assert_eq!(s.languages, vec!["en".to_string()]);
        assert!(s.prefix_default_language);
        assert!(s.template_dirs.is_empty());
        assert!(s.auto_escape);
        assert_eq!(s.log_level, "info");
    }

    #[test]
    fn test_partial_deserialize_fills_defaults() {
        let s: Settings = serde_json::from_str(r#"{"static_url": "/assets/"}"#).unwrap();
        assert_eq!(s.static_url, "/assets/");
        assert_eq!(s.media_url, "/media/");
        assert!(s.debug);
    }

    #[test]
    fn test_lazy_settings_configure_and_get() {
        let lazy = LazySettings::new();
        assert!(!lazy.is_configured());

        let settings = Settings {
            debug: false,
            site_domain: Some("www.example.com".to_string()),
            ..Settings::default()
        };

        lazy.configure(settings).unwrap();
        assert!(lazy.is_configured());
        let s = lazy.get().unwrap();
        assert!(!s.debug);
        assert_eq!(s.site_domain.as_deref(), Some("www.example.com"));
    }

    #[test]
    fn test_lazy_settings_double_configure_fails() {
        let lazy = LazySettings::new();
        lazy.configure(Settings::default()).unwrap();
        let err = lazy.configure(Settings::default()).unwrap_err();
        assert!(err.to_string().contains("already been configured"));
    }

    #[test]
    fn test_lazy_settings_get_before_configure_fails() {
        let lazy = LazySettings::new();
        let err = lazy.get().unwrap_err();
        assert!(matches!(err, TagkitError::ConfigurationError(_)));
    }
}
