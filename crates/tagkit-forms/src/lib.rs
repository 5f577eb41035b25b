//! # tagkit-forms
//!
//! Form fields as templates see them. A [`BoundField`] pairs a
//! [`FieldDef`] with submitted data and errors and converts into a context
//! mapping, including the widget's class name under
//! `field.widget.class_name`.
//!
//! ## Modules
//!
//! - [`widgets`] - Widget types and HTML rendering
//! - [`bound_field`] - Field definitions and bound fields

pub mod bound_field;
pub mod widgets;

pub use bound_field::{BoundField, FieldDef};
pub use widgets::{Widget, WidgetType};
