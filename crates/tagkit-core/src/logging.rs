//! Logging integration.
//!
//! tagkit logs through [`tracing`]. Hosts that do not install their own
//! subscriber can call [`setup_logging`].

use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

use crate::settings::Settings;

/// Builds the env filter for `settings.log_level`, falling back to `info`
/// when the directive does not parse.
pub fn env_filter(settings: &Settings) -> EnvFilter {
    EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global tracing subscriber.
///
/// Debug mode uses the pretty human-readable format; otherwise events are
/// written as JSON. Does nothing if a global subscriber is already set.
pub fn setup_logging(settings: &Settings) {
    let filter = env_filter(settings);

    if settings.debug {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .pretty()
            .try_init()
            .ok();
    } else {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .try_init()
            .ok();
    }
}

/// Creates the span that wraps one template render.
///
/// ```
/// use tagkit_core::logging::render_span;
///
/// let span = render_span("blog/list.html");
/// let _guard = span.enter();
/// tracing::debug!("rendering");
/// ```
pub fn render_span(template_name: &str) -> tracing::Span {
    tracing::debug_span!("render", template = template_name)
}
