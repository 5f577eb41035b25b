//! Built-in template filters.
//!
//! Every filter implements [`Filter`] and is looked up by name when a
//! template is compiled. Libraries loaded with `{% load %}` add filters on
//! top of the built-ins and may shadow them.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use tagkit_core::{TagkitError, TagkitResult};

use crate::context::{conditional_escape, ContextValue};

/// How many arguments a filter accepts. Checked when the template is
/// compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterArity {
    /// `{{ value|name }}` only.
    None,
    /// Either form.
    Optional,
    /// `{{ value|name:arg }}` only.
    Required,
}

/// A template filter.
///
/// Takes a value and optional arguments, and returns a transformed value.
pub trait Filter: Send + Sync {
    /// Returns the filter name.
    fn name(&self) -> &'static str;

    /// Returns how many arguments the filter accepts.
    fn arity(&self) -> FilterArity {
        FilterArity::Optional
    }

    /// Returns `true` if the filter never introduces unsafe markup, so a
    /// safe input stays safe.
    fn is_safe(&self) -> bool {
        false
    }

    /// Applies the filter to a value with the given arguments.
    fn apply(&self, value: &ContextValue, args: &[ContextValue]) -> TagkitResult<ContextValue>;
}

/// A name-to-filter map.
#[derive(Clone, Default)]
pub struct FilterRegistry {
    filters: HashMap<String, Arc<dyn Filter>>,
}

impl FilterRegistry {
    /// Creates a new empty filter registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a filter under its own name, replacing any previous one.
    pub fn register(&mut self, filter: impl Filter + 'static) {
        self.filters.insert(filter.name().to_string(), Arc::new(filter));
    }

    /// Returns the filter called `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Filter>> {
        self.filters.get(name).cloned()
    }

    /// Returns `true` if a filter called `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Returns the registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.filters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Iterates over `(name, filter)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Filter>)> {
        self.filters.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Applies a named filter to a value.
    pub fn apply(
        &self,
        name: &str,
        value: &ContextValue,
        args: &[ContextValue],
    ) -> TagkitResult<ContextValue> {
        let filter = self
            .filters
            .get(name)
            .ok_or_else(|| TagkitError::TemplateSyntaxError(format!("Invalid filter: '{name}'")))?;
        filter.apply(value, args)
    }
}

impl std::fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Returns the registry of built-in filters.
pub fn builtins() -> &'static FilterRegistry {
    static REGISTRY: OnceLock<FilterRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut r = FilterRegistry::new();
        r.register(LowerFilter);
        r.register(UpperFilter);
        r.register(StriptagsFilter);
        r.register(EscapeFilter);
        r.register(SafeFilter);
        r.register(UrlencodeFilter);
        r.register(LengthFilter);
        r.register(FirstFilter);
        r.register(LastFilter);
        r.register(JoinFilter);
        r.register(DefaultFilter);
        r
    })
}

// ============================================================
// String filters
// ============================================================

struct LowerFilter;
impl Filter for LowerFilter {
    fn name(&self) -> &'static str {
        "lower"
    }
    fn arity(&self) -> FilterArity {
        FilterArity::None
    }
    fn is_safe(&self) -> bool {
        true
    }
    fn apply(&self, value: &ContextValue, _args: &[ContextValue]) -> TagkitResult<ContextValue> {
        Ok(ContextValue::String(value.to_display_string().to_lowercase()))
    }
}

struct UpperFilter;
impl Filter for UpperFilter {
    fn name(&self) -> &'static str {
        "upper"
    }
    fn arity(&self) -> FilterArity {
        FilterArity::None
    }
    fn is_safe(&self) -> bool {
        true
    }
    fn apply(&self, value: &ContextValue, _args: &[ContextValue]) -> TagkitResult<ContextValue> {
        Ok(ContextValue::String(value.to_display_string().to_uppercase()))
    }
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid tag regex"))
}

/// Removes anything that looks like an HTML tag.
pub fn strip_tags(s: &str) -> String {
    tag_regex().replace_all(s, "").into_owned()
}

struct StriptagsFilter;
impl Filter for StriptagsFilter {
    fn name(&self) -> &'static str {
        "striptags"
    }
    fn arity(&self) -> FilterArity {
        FilterArity::None
    }
    fn is_safe(&self) -> bool {
        true
    }
    fn apply(&self, value: &ContextValue, _args: &[ContextValue]) -> TagkitResult<ContextValue> {
        Ok(ContextValue::String(strip_tags(&value.to_display_string())))
    }
}

struct EscapeFilter;
impl Filter for EscapeFilter {
    fn name(&self) -> &'static str {
        "escape"
    }
    fn arity(&self) -> FilterArity {
        FilterArity::None
    }
    fn apply(&self, value: &ContextValue, _args: &[ContextValue]) -> TagkitResult<ContextValue> {
        Ok(conditional_escape(value))
    }
}

struct SafeFilter;
impl Filter for SafeFilter {
    fn name(&self) -> &'static str {
        "safe"
    }
    fn arity(&self) -> FilterArity {
        FilterArity::None
    }
    fn apply(&self, value: &ContextValue, _args: &[ContextValue]) -> TagkitResult<ContextValue> {
        Ok(ContextValue::SafeString(value.to_display_string()))
    }
}

/// Characters `urlencode` escapes when no safe set is given: everything
/// but unreserved characters and `/`.
const URLENCODE_DEFAULT: &AsciiSet = &URLENCODE_STRICT.remove(b'/');

const URLENCODE_STRICT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

struct UrlencodeFilter;
impl Filter for UrlencodeFilter {
    fn name(&self) -> &'static str {
        "urlencode"
    }
    fn is_safe(&self) -> bool {
        true
    }
    fn apply(&self, value: &ContextValue, args: &[ContextValue]) -> TagkitResult<ContextValue> {
        let s = value.to_display_string();
        let encoded = match args.first() {
            Some(safe) => {
                let safe = safe.to_display_string();
                let mut out = String::with_capacity(s.len());
                let mut buf = [0u8; 4];
                for ch in s.chars() {
                    if ch.is_ascii() && safe.contains(ch) {
                        out.push(ch);
                    } else {
                        out.extend(utf8_percent_encode(ch.encode_utf8(&mut buf), URLENCODE_STRICT));
                    }
                }
                out
            }
            None => utf8_percent_encode(&s, URLENCODE_DEFAULT).to_string(),
        };
        Ok(ContextValue::String(encoded))
    }
}

// ============================================================
// List filters
// ============================================================

struct LengthFilter;
impl Filter for LengthFilter {
    fn name(&self) -> &'static str {
        "length"
    }
    fn arity(&self) -> FilterArity {
        FilterArity::None
    }
    fn apply(&self, value: &ContextValue, _args: &[ContextValue]) -> TagkitResult<ContextValue> {
        Ok(ContextValue::from(value.len().unwrap_or(0)))
    }
}

fn sequence(value: &ContextValue) -> TagkitResult<Vec<ContextValue>> {
    match value {
        ContextValue::List(_)
        | ContextValue::QuerySet(_)
        | ContextValue::String(_)
        | ContextValue::SafeString(_) => value.iter_values(),
        _ => Ok(Vec::new()),
    }
}

struct FirstFilter;
impl Filter for FirstFilter {
    fn name(&self) -> &'static str {
        "first"
    }
    fn arity(&self) -> FilterArity {
        FilterArity::None
    }
    fn apply(&self, value: &ContextValue, _args: &[ContextValue]) -> TagkitResult<ContextValue> {
        Ok(sequence(value)?.into_iter().next().unwrap_or(ContextValue::None))
    }
}

struct LastFilter;
impl Filter for LastFilter {
    fn name(&self) -> &'static str {
        "last"
    }
    fn arity(&self) -> FilterArity {
        FilterArity::None
    }
    fn apply(&self, value: &ContextValue, _args: &[ContextValue]) -> TagkitResult<ContextValue> {
        Ok(sequence(value)?.pop().unwrap_or(ContextValue::None))
    }
}

struct JoinFilter;
impl Filter for JoinFilter {
    fn name(&self) -> &'static str {
        "join"
    }
    fn arity(&self) -> FilterArity {
        FilterArity::Required
    }
    fn apply(&self, value: &ContextValue, args: &[ContextValue]) -> TagkitResult<ContextValue> {
        let separator = args.first().cloned().unwrap_or(ContextValue::None);
        match value {
            ContextValue::List(_) | ContextValue::QuerySet(_) => {
                let items = value.iter_values()?;
                let all_safe = separator.is_safe() && items.iter().all(ContextValue::is_safe);
                let joined = items
                    .iter()
                    .map(ContextValue::to_display_string)
                    .collect::<Vec<_>>()
                    .join(&separator.to_display_string());
                Ok(if all_safe {
                    ContextValue::SafeString(joined)
                } else {
                    ContextValue::String(joined)
                })
            }
            _ => Ok(value.clone()),
        }
    }
}

// ============================================================
// Logic filters
// ============================================================

struct DefaultFilter;
impl Filter for DefaultFilter {
    fn name(&self) -> &'static str {
        "default"
    }
    fn arity(&self) -> FilterArity {
        FilterArity::Required
    }
    fn apply(&self, value: &ContextValue, args: &[ContextValue]) -> TagkitResult<ContextValue> {
        if value.is_truthy() {
            Ok(value.clone())
        } else {
            Ok(args.first().cloned().unwrap_or(ContextValue::None))
        }
    }
}
