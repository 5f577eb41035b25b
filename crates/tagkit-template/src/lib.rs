//! # tagkit-template
//!
//! A Django-flavoured template engine. Templates are tokenized, compiled
//! into a node tree with every filter bound up front, and rendered against
//! a scoped [`Context`].
//!
//! Besides the built-in tags (`if`, `for`, `with`, `include`, `autoescape`,
//! `comment`, `load`) the parser knows nothing: extra tags and filters come
//! from named [`Library`] values that a template pulls in with
//! `{% load name %}`.
//!
//! ## Modules
//!
//! - [`context`] - Template values and the scoped context stack
//! - [`lexer`] - Tokenizer for `{{ }}`, `{% %}`, and `{# #}`
//! - [`parser`] - Compiles tokens into a renderable node tree
//! - [`filters`] - The [`Filter`] trait and built-in filters
//! - [`library`] - Named tag and filter libraries
//! - [`loaders`] - Template source loaders
//! - [`engine`] - Ties loaders, libraries, and models together

pub mod context;
pub mod engine;
pub mod filters;
pub mod lexer;
pub mod library;
pub mod loaders;
pub mod parser;

pub use context::{conditional_escape, escape_html, Context, ContextValue};
pub use engine::{Engine, TemplateRenderer};
pub use filters::{Filter, FilterArity, FilterRegistry};
pub use lexer::BlockToken;
pub use library::{Library, LibraryRegistry, TagCompileFn};
pub use loaders::{FileSystemLoader, StringLoader, TemplateLoader};
pub use parser::{FilterExpression, NodeList, Parser, TagNode, Template};
