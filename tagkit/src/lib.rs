//! # tagkit
//!
//! Template helper tags and filters for a Django-style template engine.
//!
//! This is the meta-crate that re-exports the sub-crates and builds an
//! engine with the `toolkit_filters` and `toolkit_tags` libraries already
//! registered.
//!
//! ```
//! use tagkit::core::Settings;
//! use tagkit::db::ModelRegistry;
//! use tagkit::http::HttpRequest;
//! use tagkit::template::Context;
//!
//! let engine = tagkit::engine(Settings::default(), ModelRegistry::new());
//! let mut ctx = Context::new();
//! ctx.set("request", HttpRequest::builder().path("/").header("host", "example.com").build().into());
//!
//! let out = engine
//!     .render_string("{% load toolkit_tags %}{% build_absolute_uri 'logo.png' %}", &mut ctx)
//!     .unwrap();
//! assert_eq!(out, "http://example.com/static/logo.png");
//! ```

/// Error type, settings, and logging setup.
pub use tagkit_core as core;

/// Requests, query dictionaries, and locale URL translation.
pub use tagkit_http as http;

/// Records, query sets, managers, and the model registry.
pub use tagkit_db as db;

/// Widgets and bound fields.
#[cfg(feature = "forms")]
pub use tagkit_forms as forms;

/// The template engine.
pub use tagkit_template as template;

/// The `toolkit_filters` and `toolkit_tags` libraries.
pub use tagkit_templatetags as templatetags;

pub use serde_json;
pub use tracing;

use tagkit_core::Settings;
use tagkit_db::ModelRegistry;
use tagkit_template::Engine;

/// Builds an engine with both toolkit libraries registered.
pub fn engine(settings: Settings, models: ModelRegistry) -> Engine {
    tracing::debug!(
        models = models.len(),
        static_url = %settings.static_url,
        "building tagkit engine"
    );
    Engine::new(settings)
        .with_libraries(templatetags::libraries())
        .with_models(models)
}

/// Commonly used types.
pub mod prelude {
    pub use tagkit_core::{Settings, TagkitError, TagkitResult};
    pub use tagkit_db::{Filter, Manager, MemoryTable, Model, ModelMeta, ModelRegistry, OrderBy, Record, Value};
    pub use tagkit_http::{HttpRequest, QueryDict};
    pub use tagkit_template::{Context, ContextValue, Engine};

    #[cfg(feature = "forms")]
    pub use tagkit_forms::{BoundField, FieldDef, Widget, WidgetType};
}
