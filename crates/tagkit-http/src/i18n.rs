//! Locale-prefixed URLs.
//!
//! Sites that serve each language under its own path prefix (`/it/blog/`,
//! `/de/blog/`) need to map the current URL to its equivalent in another
//! language. [`translate_url`] does that by swapping the leading language
//! segment.

use tagkit_core::Settings;

/// Which languages may appear as URL prefixes, and how the default
/// language is treated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleConfig {
    /// The language served when a path carries no prefix.
    pub default_language: String,
    /// Every supported language code.
    pub languages: Vec<String>,
    /// Whether default-language URLs carry a `/<code>/` prefix.
    pub prefix_default_language: bool,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            default_language: "en".to_string(),
            languages: vec!["en".to_string()],
            prefix_default_language: true,
        }
    }
}

impl LocaleConfig {
    /// Builds a config from settings. The default language is always
    /// treated as supported.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut languages = settings.languages.clone();
        if !languages
            .iter()
            .any(|l| l.eq_ignore_ascii_case(&settings.language_code))
        {
            languages.insert(0, settings.language_code.clone());
        }
        Self {
            default_language: settings.language_code.clone(),
            languages,
            prefix_default_language: settings.prefix_default_language,
        }
    }

    /// Returns the configured spelling of `code`, matched case-insensitively.
    pub fn supported(&self, code: &str) -> Option<&str> {
        self.languages
            .iter()
            .find(|l| l.eq_ignore_ascii_case(code))
            .map(String::as_str)
    }
}

/// Returns the language named by the first path segment, if it is a
/// supported language.
///
/// ```
/// use tagkit_http::{language_from_path, LocaleConfig};
///
/// let config = LocaleConfig {
///     languages: vec!["en".into(), "it".into()],
///     ..LocaleConfig::default()
/// };
/// assert_eq!(language_from_path("/it/blog/", &config), Some("it"));
/// assert_eq!(language_from_path("/blog/", &config), None);
/// ```
pub fn language_from_path<'a>(path: &str, config: &'a LocaleConfig) -> Option<&'a str> {
    let first = path.trim_start_matches('/').split('/').next()?;
    if first.is_empty() {
        return None;
    }
    config.supported(first)
}

/// Translates `path` to the equivalent URL under `lang`.
///
/// An existing language prefix is replaced; an unprefixed path gains one.
/// When `lang` is the default language and `prefix_default_language` is
/// off, the prefix is dropped instead. Unsupported languages leave the path
/// unchanged. Any query string or fragment is carried over.
pub fn translate_url(path: &str, lang: &str, config: &LocaleConfig) -> String {
    let Some(target) = config.supported(lang) else {
        tracing::debug!(lang, path, "translate_url: unsupported language");
        return path.to_string();
    };

    let split_at = path.find(['?', '#']).unwrap_or(path.len());
    let (route, suffix) = path.split_at(split_at);

    let rest = match language_from_path(route, config) {
        Some(_) => {
            let trimmed = route.trim_start_matches('/');
            trimmed
                .find('/')
                .map_or("/", |i| &trimmed[i..])
        }
        None if route.is_empty() => "/",
        None => route,
    };
    let rest = if rest.starts_with('/') {
        rest.to_string()
    } else {
        format!("/{rest}")
    };

    let unprefixed =
        target.eq_ignore_ascii_case(&config.default_language) && !config.prefix_default_language;
    if unprefixed {
        format!("{rest}{suffix}")
    } else {
        format!("/{target}{rest}{suffix}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LocaleConfig {
        LocaleConfig {
            default_language: "en".to_string(),
            languages: vec!["en".to_string(), "it".to_string(), "pt-br".to_string()],
            prefix_default_language: true,
        }
    }

    #[test]
    fn test_from_settings_adds_default_language() {
        let settings = Settings {
            language_code: "it".to_string(),
            languages: vec!["en".to_string()],
            prefix_default_language: false,
            ..Settings::default()
        };
        let config = LocaleConfig::from_settings(&settings);
        assert_eq!(config.default_language, "it");
        assert_eq!(config.languages, vec!["it", "en"]);
        assert!(!config.prefix_default_language);
    }

    #[test]
    fn test_language_from_path() {
        let config = config();
        assert_eq!(language_from_path("/en/", &config), Some("en"));
        assert_eq!(language_from_path("/PT-BR/page", &config), Some("pt-br"));
        assert_eq!(language_from_path("/", &config), None);
        assert_eq!(language_from_path("/english/", &config), None);
    }

    #[test]
    fn test_translate_swaps_prefix() {
        let config = config();
        assert_eq!(translate_url("/en/blog/post/", "it", &config), "/it/blog/post/");
        assert_eq!(translate_url("/it/", "en", &config), "/en/");
        assert_eq!(translate_url("/it", "en", &config), "/en/");
    }

    #[test]
    fn test_translate_adds_prefix() {
        let config = config();
        assert_eq!(translate_url("/blog/", "it", &config), "/it/blog/");
        assert_eq!(translate_url("", "it", &config), "/it/");
    }

    #[test]
    fn test_translate_default_without_prefix() {
        let config = LocaleConfig {
            prefix_default_language: false,
            ..config()
        };
        assert_eq!(translate_url("/it/blog/", "en", &config), "/blog/");
        assert_eq!(translate_url("/blog/", "it", &config), "/it/blog/");
    }

    #[test]
    fn test_translate_keeps_query_and_fragment() {
        let config = config();
        assert_eq!(
            translate_url("/en/search/?q=x#top", "it", &config),
            "/it/search/?q=x#top"
        );
    }

    #[test]
    fn test_translate_unknown_language_unchanged() {
        let config = config();
        assert_eq!(translate_url("/en/blog/", "fr", &config), "/en/blog/");
    }
}
