//! # tagkit-templatetags
//!
//! Two loadable template libraries:
//!
//! - `toolkit_filters` ([`filters`]): `autolink`, `keeptags`, `get_range`,
//!   `subtract`, `jsonify`, `escape`, `split`, `filename`
//! - `toolkit_tags` ([`tags`]): `annotate_form_field`, `build_absolute_uri`,
//!   `append_to_get`, `change_language`, `show_elements_list`, `get_list`,
//!   `get_dict`, `setvar`, `removebreak`
//!
//! ```
//! use tagkit_template::{Context, Engine, LibraryRegistry};
//!
//! let mut libraries = LibraryRegistry::new();
//! tagkit_templatetags::register(&mut libraries);
//! let engine = Engine::default().with_libraries(libraries);
//!
//! let mut ctx = Context::new();
//! let out = engine
//!     .render_string("{% load toolkit_filters %}{{ 10|subtract:3 }}", &mut ctx)
//!     .unwrap();
//! assert_eq!(out, "7");
//! ```

pub mod args;
pub mod filters;
pub mod tags;

use tagkit_template::LibraryRegistry;

/// Adds `toolkit_filters` and `toolkit_tags` to a registry.
pub fn register(registry: &mut LibraryRegistry) -> &mut LibraryRegistry {
    registry.register(filters::library()).register(tags::library())
}

/// Returns a registry holding only this crate's libraries.
pub fn libraries() -> LibraryRegistry {
    let mut registry = LibraryRegistry::new();
    register(&mut registry);
    registry
}
