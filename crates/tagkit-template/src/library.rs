//! Custom template tags and filters library system.
//!
//! A [`Library`] groups filters and tag compile functions under a name that
//! templates pull in with `{% load name %}`. Libraries live in a
//! [`LibraryRegistry`] handed to the engine; there is no global registry.
//!
//! ## Examples
//!
//! ```
//! use tagkit_core::TagkitResult;
//! use tagkit_template::context::{Context, ContextValue};
//! use tagkit_template::engine::{Engine, TemplateRenderer};
//! use tagkit_template::filters::Filter;
//! use tagkit_template::lexer::BlockToken;
//! use tagkit_template::library::{Library, LibraryRegistry};
//! use tagkit_template::parser::{Parser, TagNode};
//!
//! struct Double;
//! impl Filter for Double {
//!     fn name(&self) -> &'static str {
//!         "double"
//!     }
//!     fn apply(&self, value: &ContextValue, _args: &[ContextValue]) -> TagkitResult<ContextValue> {
//!         Ok(format!("{value}{value}").into())
//!     }
//! }
//!
//! #[derive(Debug)]
//! struct Hello;
//! impl TagNode for Hello {
//!     fn render(&self, _: &mut Context, _: &dyn TemplateRenderer) -> TagkitResult<String> {
//!         Ok("hello".to_string())
//!     }
//! }
//!
//! fn hello(_: &mut Parser<'_>, _: &BlockToken) -> TagkitResult<Box<dyn TagNode>> {
//!     Ok(Box::new(Hello))
//! }
//!
//! let mut lib = Library::new("demo");
//! lib.register_filter(Double);
//! lib.register_tag("hello", hello);
//!
//! let mut libraries = LibraryRegistry::new();
//! libraries.register(lib);
//!
//! let engine = Engine::default().with_libraries(libraries);
//! let out = engine
//!     .render_string("{% load demo %}{% hello %} {{ 'ab'|double }}", &mut Context::new())
//!     .unwrap();
//! assert_eq!(out, "hello abab");
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tagkit_core::TagkitResult;

use crate::filters::{Filter, FilterRegistry};
use crate::lexer::BlockToken;
use crate::parser::{Parser, TagNode};

/// Compiles a `{% tag ... %}` occurrence into a node.
///
/// Runs at parse time: argument errors belong here so they surface before
/// any render. Block tags call [`Parser::parse_until`] for their body.
pub type TagCompileFn = fn(&mut Parser<'_>, &BlockToken) -> TagkitResult<Box<dyn TagNode>>;

/// A named collection of filters and tags.
pub struct Library {
    name: String,
    filters: FilterRegistry,
    tags: HashMap<String, TagCompileFn>,
}

impl Library {
    /// Creates a new empty library with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filters: FilterRegistry::new(),
            tags: HashMap::new(),
        }
    }

    /// Returns the library name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers a filter under its own name.
    pub fn register_filter(&mut self, filter: impl Filter + 'static) -> &mut Self {
        self.filters.register(filter);
        self
    }

    /// Registers a tag compile function.
    pub fn register_tag(&mut self, name: impl Into<String>, compile: TagCompileFn) -> &mut Self {
        self.tags.insert(name.into(), compile);
        self
    }

    /// Returns the filter called `name`.
    pub fn filter(&self, name: &str) -> Option<Arc<dyn Filter>> {
        self.filters.get(name)
    }

    /// Returns the tag compile function called `name`.
    pub fn tag(&self, name: &str) -> Option<TagCompileFn> {
        self.tags.get(name).copied()
    }

    /// Iterates over the library's filters.
    pub fn filters(&self) -> impl Iterator<Item = (&str, &Arc<dyn Filter>)> {
        self.filters.iter()
    }

    /// Iterates over the library's tags.
    pub fn tags(&self) -> impl Iterator<Item = (&str, TagCompileFn)> {
        self.tags.iter().map(|(name, compile)| (name.as_str(), *compile))
    }

    /// Returns all filter names, sorted.
    pub fn filter_names(&self) -> Vec<&str> {
        self.filters.names()
    }

    /// Returns all tag names, sorted.
    pub fn tag_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tags.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Library")
            .field("name", &self.name)
            .field("filters", &self.filter_names())
            .field("tags", &self.tag_names())
            .finish()
    }
}

/// The libraries a template may `{% load %}`.
#[derive(Debug, Default)]
pub struct LibraryRegistry {
    libraries: HashMap<String, Library>,
}

impl LibraryRegistry {
    /// Creates a new empty library registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a library, replacing any library of the same name.
    pub fn register(&mut self, library: Library) -> &mut Self {
        tracing::debug!(library = %library.name, "registered template library");
        self.libraries.insert(library.name.clone(), library);
        self
    }

    /// Looks up a library by name.
    pub fn get(&self, name: &str) -> Option<&Library> {
        self.libraries.get(name)
    }

    /// Returns all registered library names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.libraries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of registered libraries.
    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    /// Returns true if no libraries are registered.
    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use tagkit_core::TagkitError;

    use super::*;
    use crate::context::{Context, ContextValue};
    use crate::engine::{Engine, TemplateRenderer};

    struct Shout;
    impl Filter for Shout {
        fn name(&self) -> &'static str {
            "shout"
        }
        fn apply(&self, value: &ContextValue, _args: &[ContextValue]) -> TagkitResult<ContextValue> {
            Ok(ContextValue::String(format!("{}!", value.to_display_string().to_uppercase())))
        }
    }

    /// `{% lower %}...{% endlower %}` lowercases its rendered body.
    #[derive(Debug)]
    struct LowerNode(crate::parser::NodeList);

    impl TagNode for LowerNode {
        fn render(&self, context: &mut Context, renderer: &dyn TemplateRenderer) -> TagkitResult<String> {
            Ok(self.0.render(context, renderer)?.to_lowercase())
        }
    }

    fn compile_lower(parser: &mut Parser<'_>, _token: &BlockToken) -> TagkitResult<Box<dyn TagNode>> {
        let body = parser.parse_until(&["endlower"])?;
        parser.next_block();
        Ok(Box::new(LowerNode(body)))
    }

    fn registry() -> LibraryRegistry {
        let mut lib = Library::new("text");
        lib.register_filter(Shout).register_tag("lower", compile_lower);
        let mut registry = LibraryRegistry::new();
        registry.register(lib);
        registry
    }

    #[test]
    fn test_library_contents() {
        let registry = registry();
        let lib = registry.get("text").unwrap();
        assert_eq!(lib.name(), "text");
        assert_eq!(lib.filter_names(), vec!["shout"]);
        assert_eq!(lib.tag_names(), vec!["lower"]);
        assert!(lib.filter("nope").is_none());
        assert!(registry.get("other").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_tags_require_load() {
        let engine = Engine::default().with_libraries(registry());
        let err = engine.from_string("{% lower %}A{% endlower %}").unwrap_err();
        assert!(matches!(err, TagkitError::TemplateSyntaxError(_)));
        assert!(engine.from_string("{{ 'a'|shout }}").is_err());
    }

    #[test]
    fn test_block_tag_and_filter_after_load() {
        let engine = Engine::default().with_libraries(registry());
        let mut ctx = Context::new();
        ctx.set("name", "World".into());
        let out = engine
            .render_string("{% load text %}{% lower %}Hi {{ name|shout }}{% endlower %}", &mut ctx)
            .unwrap();
        assert_eq!(out, "hi world!");
    }

    #[test]
    fn test_selective_load() {
        let engine = Engine::default().with_libraries(registry());
        let out = engine
            .render_string("{% load shout from text %}{{ 'a'|shout }}", &mut Context::new())
            .unwrap();
        assert_eq!(out, "A!");
        assert!(engine.from_string("{% load shout from text %}{% lower %}{% endlower %}").is_err());
        assert!(engine.from_string("{% load nope from text %}").is_err());
    }

    #[test]
    fn test_missing_end_tag() {
        let engine = Engine::default().with_libraries(registry());
        let err = engine.from_string("{% load text %}{% lower %}abc").unwrap_err();
        assert!(err.to_string().contains("endlower"));
    }
}
