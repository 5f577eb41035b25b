//! Error types shared by every tagkit crate.
//!
//! [`TagkitError`] separates template-authoring failures, which are raised
//! while a template is compiled, from runtime failures raised while it is
//! rendered.

use thiserror::Error;

/// The primary error type for tagkit.
#[derive(Error, Debug)]
pub enum TagkitError {
    // ── Templates ────────────────────────────────────────────────────

    /// A template contains invalid syntax.
    #[error("Template syntax error: {0}")]
    TemplateSyntaxError(String),

    /// A tag was used without one of its required arguments.
    #[error("Argument required: {0}")]
    ArgumentRequired(String),

    /// The requested template was not found by any loader.
    #[error("Template does not exist: {0}")]
    TemplateDoesNotExist(String),

    // ── Rendering ────────────────────────────────────────────────────

    /// A request-dependent tag found no `request` in the context.
    #[error("Request required: {0}")]
    RequestRequired(String),

    /// A model label or manager name could not be resolved.
    #[error("Lookup error: {0}")]
    LookupError(String),

    /// A value could not be coerced or was otherwise unusable.
    #[error("Value error: {0}")]
    ValueError(String),

    // ── Serialization ────────────────────────────────────────────────

    /// An error occurred during serialization or deserialization.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    // ── Security ─────────────────────────────────────────────────────

    /// An operation that is not allowed on this value was attempted.
    #[error("Suspicious operation: {0}")]
    SuspiciousOperation(String),

    // ── IO ───────────────────────────────────────────────────────────

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl TagkitError {
    /// Returns true for errors raised while compiling a template.
    pub const fn is_syntax_error(&self) -> bool {
        matches!(
            self,
            Self::TemplateSyntaxError(_) | Self::ArgumentRequired(_)
        )
    }
}

/// A convenience type alias for `Result<T, TagkitError>`.
pub type TagkitResult<T> = Result<T, TagkitError>;
