//! The `toolkit_tags` library.
//!
//! | Tag | Module |
//! |---|---|
//! | `annotate_form_field` | [`forms`] |
//! | `build_absolute_uri`, `append_to_get`, `change_language` | [`urls`] |
//! | `show_elements_list` | [`listing`] |
//! | `get_list`, `get_dict`, `setvar`, `removebreak` | [`binding`] |
//!
//! Every compile function validates its arguments up front, so authoring
//! mistakes fail when the template is parsed rather than when it renders.

pub mod binding;
pub mod forms;
pub mod listing;
pub mod urls;

use std::sync::Arc;

use tagkit_core::{TagkitError, TagkitResult};
use tagkit_http::HttpRequest;
use tagkit_template::{Context, Library};

/// The name templates load this library by.
pub const LIBRARY_NAME: &str = "toolkit_tags";

/// Builds the `toolkit_tags` library.
pub fn library() -> Library {
    let mut lib = Library::new(LIBRARY_NAME);
    lib.register_tag("annotate_form_field", forms::compile_annotate_form_field)
        .register_tag("build_absolute_uri", urls::compile_build_absolute_uri)
        .register_tag("append_to_get", urls::compile_append_to_get)
        .register_tag("change_language", urls::compile_change_language)
        .register_tag("show_elements_list", listing::compile_show_elements_list)
        .register_tag("get_list", binding::compile_get_list)
        .register_tag("get_dict", binding::compile_get_dict)
        .register_tag("setvar", binding::compile_setvar)
        .register_tag("removebreak", binding::compile_removebreak);
    lib
}

/// Returns the `request` from the context, or `RequestRequired` naming the
/// tag that needed it.
pub(crate) fn require_request(context: &Context, tag: &str) -> TagkitResult<Arc<HttpRequest>> {
    context.request().ok_or_else(|| {
        TagkitError::RequestRequired(format!(
            "'{tag}' requires 'request' in the template context"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_contents() {
        assert_eq!(
            library().tag_names(),
            vec![
                "annotate_form_field",
                "append_to_get",
                "build_absolute_uri",
                "change_language",
                "get_dict",
                "get_list",
                "removebreak",
                "setvar",
                "show_elements_list",
            ]
        );
        assert!(library().filter_names().is_empty());
    }

    #[test]
    fn test_require_request() {
        let err = require_request(&Context::new(), "append_to_get").unwrap_err();
        assert!(matches!(err, TagkitError::RequestRequired(ref m) if m.contains("append_to_get")));
    }
}
