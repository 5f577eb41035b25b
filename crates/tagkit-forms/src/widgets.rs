//! Form widgets.
//!
//! A widget decides how a field is drawn as HTML. Templates mostly care
//! about its class name (`CheckboxInput`, `Select`, ...) so they can pick a
//! partial per widget kind; [`Widget::render`] covers the plain case.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;
use tagkit_template::escape_html;

/// Enumerates all built-in widget types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WidgetType {
    /// `<input type="text">`.
    TextInput,
    /// `<input type="number">`.
    NumberInput,
    /// `<input type="email">`.
    EmailInput,
    /// `<input type="url">`.
    UrlInput,
    /// `<input type="password">`.
    PasswordInput,
    /// `<input type="hidden">`.
    HiddenInput,
    /// `<textarea>`.
    Textarea,
    /// `<input type="checkbox">`.
    CheckboxInput,
    /// `<select>`.
    Select,
    /// `<select multiple>`.
    SelectMultiple,
    /// A set of `<input type="radio">` elements.
    RadioSelect,
    /// A set of `<input type="checkbox">` elements.
    CheckboxSelectMultiple,
    /// `<input type="date">`.
    DateInput,
    /// `<input type="datetime-local">`.
    DateTimeInput,
    /// `<input type="file">`.
    FileInput,
}

impl WidgetType {
    /// The widget's class name, as a template sees it.
    pub const fn class_name(self) -> &'static str {
        match self {
            Self::TextInput => "TextInput",
            Self::NumberInput => "NumberInput",
            Self::EmailInput => "EmailInput",
            Self::UrlInput => "URLInput",
            Self::PasswordInput => "PasswordInput",
            Self::HiddenInput => "HiddenInput",
            Self::Textarea => "Textarea",
            Self::CheckboxInput => "CheckboxInput",
            Self::Select => "Select",
            Self::SelectMultiple => "SelectMultiple",
            Self::RadioSelect => "RadioSelect",
            Self::CheckboxSelectMultiple => "CheckboxSelectMultiple",
            Self::DateInput => "DateInput",
            Self::DateTimeInput => "DateTimeInput",
            Self::FileInput => "FileInput",
        }
    }

    /// The `type` attribute of the underlying `<input>`, if there is one.
    pub const fn input_type(self) -> Option<&'static str> {
        match self {
            Self::TextInput => Some("text"),
            Self::NumberInput => Some("number"),
            Self::EmailInput => Some("email"),
            Self::UrlInput => Some("url"),
            Self::PasswordInput => Some("password"),
            Self::HiddenInput => Some("hidden"),
            Self::CheckboxInput | Self::CheckboxSelectMultiple => Some("checkbox"),
            Self::RadioSelect => Some("radio"),
            Self::DateInput => Some("date"),
            Self::DateTimeInput => Some("datetime-local"),
            Self::FileInput => Some("file"),
            Self::Textarea | Self::Select | Self::SelectMultiple => None,
        }
    }

    /// Returns `true` for widgets that render no visible control.
    pub const fn is_hidden(self) -> bool {
        matches!(self, Self::HiddenInput)
    }
}

impl fmt::Display for WidgetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}

/// A widget with its HTML attributes and, for choice widgets, its choices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Widget {
    widget_type: WidgetType,
    attrs: IndexMap<String, String>,
    choices: Vec<(String, String)>,
}

impl Widget {
    /// Creates a widget of the given type with no attributes.
    pub fn new(widget_type: WidgetType) -> Self {
        Self {
            widget_type,
            attrs: IndexMap::new(),
            choices: Vec::new(),
        }
    }

    /// Adds an HTML attribute.
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Sets the `(value, label)` choices for select and radio widgets.
    #[must_use]
    pub fn choices<I, V, L>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = (V, L)>,
        V: Into<String>,
        L: Into<String>,
    {
        self.choices = choices
            .into_iter()
            .map(|(v, l)| (v.into(), l.into()))
            .collect();
        self
    }

    /// Returns the widget type.
    pub const fn widget_type(&self) -> WidgetType {
        self.widget_type
    }

    /// Returns the HTML attributes, in insertion order.
    pub const fn attrs(&self) -> &IndexMap<String, String> {
        &self.attrs
    }

    /// Renders the widget as HTML. `extra` attributes go after the
    /// widget's own; values are escaped.
    pub fn render(&self, name: &str, value: Option<&str>, extra: &[(&str, &str)]) -> String {
        let attrs = self.render_attrs(extra);
        let name = escape_html(name);
        let val = value.map(escape_html).unwrap_or_default();
        match self.widget_type {
            WidgetType::Textarea => format!(r#"<textarea name="{name}"{attrs}>{val}</textarea>"#),
            WidgetType::CheckboxInput => {
                let checked = if value.is_some_and(is_checked) { " checked" } else { "" };
                format!(r#"<input type="checkbox" name="{name}"{attrs}{checked} />"#)
            }
            WidgetType::Select | WidgetType::SelectMultiple => {
                let multiple = if self.widget_type == WidgetType::SelectMultiple {
                    " multiple"
                } else {
                    ""
                };
                let options: String = self
                    .choices
                    .iter()
                    .map(|(v, l)| {
                        let selected = if value == Some(v.as_str()) { " selected" } else { "" };
                        format!(
                            r#"<option value="{}"{selected}>{}</option>"#,
                            escape_html(v),
                            escape_html(l)
                        )
                    })
                    .collect();
                format!(r#"<select name="{name}"{attrs}{multiple}>{options}</select>"#)
            }
            WidgetType::RadioSelect | WidgetType::CheckboxSelectMultiple => {
                let input_type = self.widget_type.input_type().unwrap_or("radio");
                let items: String = self
                    .choices
                    .iter()
                    .map(|(v, l)| {
                        let checked = if value == Some(v.as_str()) { " checked" } else { "" };
                        format!(
                            r#"<li><label><input type="{input_type}" name="{name}" value="{}"{checked} /> {}</label></li>"#,
                            escape_html(v),
                            escape_html(l)
                        )
                    })
                    .collect();
                format!("<ul{attrs}>{items}</ul>")
            }
            other => {
                let input_type = other.input_type().unwrap_or("text");
                let value_attr = if matches!(other, WidgetType::PasswordInput | WidgetType::FileInput) {
                    String::new()
                } else {
                    format!(r#" value="{val}""#)
                };
                format!(r#"<input type="{input_type}" name="{name}"{value_attr}{attrs} />"#)
            }
        }
    }

    fn render_attrs(&self, extra: &[(&str, &str)]) -> String {
        self.attrs
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .chain(extra.iter().copied())
            .map(|(k, v)| format!(r#" {k}="{}""#, escape_html(v)))
            .collect()
    }
}

fn is_checked(value: &str) -> bool {
    !matches!(value, "" | "false" | "False" | "0" | "off")
}
