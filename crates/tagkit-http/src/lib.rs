//! # tagkit-http
//!
//! The slice of an HTTP framework that template tags read from: the
//! current [`HttpRequest`], its GET parameters as a [`QueryDict`], and
//! locale-prefixed URL translation.
//!
//! ## Modules
//!
//! - [`request`] - [`HttpRequest`] and its builder
//! - [`querydict`] - Insertion-ordered multi-value query parameters
//! - [`i18n`] - Locale prefix detection and URL translation

pub mod i18n;
pub mod querydict;
pub mod request;

pub use i18n::{language_from_path, translate_url, LocaleConfig};
pub use querydict::QueryDict;
pub use request::{HttpRequest, HttpRequestBuilder};
