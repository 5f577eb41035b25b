//! `{% annotate_form_field field %}`.
//!
//! Copies the class name of a bound field's widget onto the field as
//! `widget_type`, so a template can branch on it:
//!
//! ```text
//! {% annotate_form_field my_field %}
//! {% if my_field.widget_type == 'CheckboxInput' %}
//!     {% include 'partials/form_field_checkbox.html' with field=my_field %}
//! {% else %}
//!     {% include 'partials/form_field.html' with field=my_field %}
//! {% endif %}
//! ```

use tagkit_core::{TagkitError, TagkitResult};
use tagkit_template::{BlockToken, Context, ContextValue, Parser, TagNode, TemplateRenderer};

#[derive(Debug)]
struct AnnotateFormFieldNode {
    field: String,
}

impl TagNode for AnnotateFormFieldNode {
    fn render(&self, context: &mut Context, _renderer: &dyn TemplateRenderer) -> TagkitResult<String> {
        let Some(ContextValue::Dict(field)) = context.get_mut(&self.field) else {
            return Ok(String::new());
        };
        let class_name = field
            .get("field")
            .and_then(|f| f.resolve_attr("widget"))
            .and_then(|widget| widget.resolve_attr("class_name").map(|c| c.into_owned()));
        if let Some(class_name) = class_name {
            tracing::debug!(field = %self.field, widget = %class_name, "annotated form field");
            field.insert("widget_type".to_string(), class_name);
        }
        Ok(String::new())
    }
}

/// Compiles `{% annotate_form_field <field> %}`.
pub fn compile_annotate_form_field(parser: &mut Parser<'_>, token: &BlockToken) -> TagkitResult<Box<dyn TagNode>> {
    let Some(field) = token.args.first() else {
        return Err(TagkitError::TemplateSyntaxError(
            "annotate_form_field tag requires a form field to be passed".to_string(),
        ));
    };
    let expr = parser.compile_filter(field)?;
    let field = expr.var_name().ok_or_else(|| {
        TagkitError::TemplateSyntaxError(format!(
            "annotate_form_field expects a variable, got '{field}'"
        ))
    })?;
    Ok(Box::new(AnnotateFormFieldNode {
        field: field.to_string(),
    }))
}
