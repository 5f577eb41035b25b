//! # tagkit-core
//!
//! Foundation types shared by every tagkit crate.
//!
//! ## Modules
//!
//! - [`error`] - Error type and result alias
//! - [`settings`] - Settings consumed by the template engine and its tags
//! - [`settings_loader`] - Loading settings from TOML/JSON and the environment
//! - [`logging`] - Tracing-based logging integration

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;

pub use error::{TagkitError, TagkitResult};
pub use settings::{Settings, SETTINGS};
