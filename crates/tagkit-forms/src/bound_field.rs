//! Bound fields: a field definition paired with submitted data and errors.
//!
//! Templates receive a bound field as a mapping, so `{{ field.label }}`,
//! `{{ field.errors }}` and `{{ field.field.widget.class_name }}` all
//! resolve through the ordinary dot lookup.

use indexmap::IndexMap;
use serde::Serialize;
use tagkit_template::ContextValue;

use crate::widgets::{Widget, WidgetType};

/// A form field definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDef {
    /// The field name.
    pub name: String,
    /// Human-readable label. Defaults to the name with underscores as
    /// spaces and the first letter capitalised.
    pub label: String,
    /// Help text.
    pub help_text: String,
    /// Whether the field is required.
    pub required: bool,
    /// Whether the field is disabled.
    pub disabled: bool,
    /// The widget used to draw the field.
    pub widget: Widget,
}

impl FieldDef {
    /// Creates a required field drawn with `widget_type`.
    pub fn new(name: impl Into<String>, widget_type: WidgetType) -> Self {
        let name = name.into();
        Self {
            label: pretty_name(&name),
            name,
            help_text: String::new(),
            required: true,
            disabled: false,
            widget: Widget::new(widget_type),
        }
    }

    /// Sets the label.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the help text.
    #[must_use]
    pub fn help_text(mut self, help_text: impl Into<String>) -> Self {
        self.help_text = help_text.into();
        self
    }

    /// Sets whether the field is required.
    #[must_use]
    pub const fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Sets whether the field is disabled.
    #[must_use]
    pub const fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Replaces the widget.
    #[must_use]
    pub fn widget(mut self, widget: Widget) -> Self {
        self.widget = widget;
        self
    }
}

fn pretty_name(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let mut chars = spaced.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// A form field bound to data and validation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundField {
    /// The field's HTML name attribute.
    pub name: String,
    /// The field definition.
    pub field: FieldDef,
    /// The raw data value submitted for this field.
    pub data: Option<String>,
    /// Validation error messages for this field.
    pub errors: Vec<String>,
}

impl BoundField {
    /// Binds `field` to its submitted data. A `prefix` is joined to the
    /// HTML name with a dash.
    pub fn new(field: FieldDef, data: Option<String>, errors: Vec<String>, prefix: Option<&str>) -> Self {
        let name = match prefix {
            Some(p) => format!("{p}-{}", field.name),
            None => field.name.clone(),
        };
        Self {
            name,
            field,
            data,
            errors,
        }
    }

    /// Returns the auto-generated HTML `id` for this field.
    pub fn auto_id(&self) -> String {
        format!("id_{}", self.name)
    }

    /// Returns `true` if this field has any errors.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns the widget type.
    pub const fn widget_type(&self) -> WidgetType {
        self.field.widget.widget_type()
    }

    /// Renders the widget HTML for this bound field.
    pub fn render(&self) -> String {
        let id = self.auto_id();
        let mut extra = vec![("id", id.as_str())];
        if self.field.required && !self.widget_type().is_hidden() {
            extra.push(("required", "required"));
        }
        if self.field.disabled {
            extra.push(("disabled", "disabled"));
        }
        self.field.widget.render(&self.name, self.data.as_deref(), &extra)
    }

    /// Renders the error list as an HTML `<ul>` element.
    pub fn errors_as_ul(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        let items: String = self
            .errors
            .iter()
            .map(|e| format!("<li>{}</li>", tagkit_template::escape_html(e)))
            .collect();
        format!(r#"<ul class="errorlist">{items}</ul>"#)
    }
}

impl From<&BoundField> for ContextValue {
    fn from(bound: &BoundField) -> Self {
        let widget_type = bound.widget_type();
        let mut widget = IndexMap::new();
        widget.insert("class_name".to_string(), Self::from(widget_type.class_name()));
        widget.insert("input_type".to_string(), widget_type.input_type().into());
        widget.insert("is_hidden".to_string(), Self::Bool(widget_type.is_hidden()));

        let mut field = IndexMap::new();
        field.insert("label".to_string(), Self::from(bound.field.label.as_str()));
        field.insert("help_text".to_string(), Self::from(bound.field.help_text.as_str()));
        field.insert("required".to_string(), Self::Bool(bound.field.required));
        field.insert("disabled".to_string(), Self::Bool(bound.field.disabled));
        field.insert("widget".to_string(), Self::Dict(widget));

        let mut map = IndexMap::new();
        map.insert("name".to_string(), Self::from(bound.name.as_str()));
        map.insert("html_name".to_string(), Self::from(bound.name.as_str()));
        map.insert("label".to_string(), Self::from(bound.field.label.as_str()));
        map.insert("help_text".to_string(), Self::from(bound.field.help_text.as_str()));
        map.insert("id_for_label".to_string(), Self::from(bound.auto_id()));
        map.insert("value".to_string(), bound.data.clone().into());
        map.insert("errors".to_string(), bound.errors.clone().into());
        map.insert("is_hidden".to_string(), Self::Bool(widget_type.is_hidden()));
        map.insert("field".to_string(), Self::Dict(field));
        map.insert("html".to_string(), Self::SafeString(bound.render()));
        map.insert("errors_html".to_string(), Self::SafeString(bound.errors_as_ul()));
        Self::Dict(map)
    }
}

impl From<BoundField> for ContextValue {
    fn from(bound: BoundField) -> Self {
        Self::from(&bound)
    }
}
