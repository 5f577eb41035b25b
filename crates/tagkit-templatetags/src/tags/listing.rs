//! `{% show_elements_list %}`: a query-driven listing widget.
//!
//! ```text
//! {% show_elements_list 'blog.Article' with_manager 'published_objects' filter_by 'category=news'
//!     limit 5 order_by '-created,title' using 'blog/article_list.html' %}
//! {% show_elements_list article as related %}
//! ```
//!
//! The model is a record or an `"app_label.ModelName"` label. When it
//! cannot be resolved the failure is logged and the tag renders nothing;
//! every other problem aborts the render.

use tagkit_core::{TagkitError, TagkitResult};
use tagkit_db::{Filter, OrderBy, DEFAULT_MANAGER};
use tagkit_template::parser::strip_quotes;
use tagkit_template::{
    BlockToken, Context, ContextValue, FilterExpression, Parser, TagNode, TemplateRenderer,
};

use crate::args::TagArguments;

const KEYWORDS: &[&str] = &["with_manager", "filter_by", "limit", "order_by", "using", "as"];

/// Where the result goes.
#[derive(Debug)]
enum Output {
    /// Render this template with `object_list` and `request`.
    Template(String),
    /// Bind the query set to this name.
    Variable(String),
}

#[derive(Debug)]
struct ShowElementsListNode {
    model: FilterExpression,
    manager: String,
    filter: Option<Filter>,
    limit: Option<usize>,
    ordering: Option<Vec<OrderBy>>,
    output: Output,
}

impl ShowElementsListNode {
    fn model_label(value: &ContextValue) -> Option<String> {
        match value {
            ContextValue::Record(record) => Some(record.meta().label()),
            ContextValue::String(s) | ContextValue::SafeString(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl TagNode for ShowElementsListNode {
    fn render(&self, context: &mut Context, renderer: &dyn TemplateRenderer) -> TagkitResult<String> {
        let model = self.model.resolve(context)?;
        let entry = Self::model_label(&model)
            .ok_or_else(|| {
                TagkitError::LookupError(format!("'{}' is not a model", model.to_display_string()))
            })
            .and_then(|label| renderer.models().get_model(&label));
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::error!(
                    model = %model.to_display_string(),
                    error = %e,
                    "Model '{}' not found with using template tag show_elements_list",
                    model.to_display_string()
                );
                return Ok(String::new());
            }
        };

        let mut queryset = entry.manager(&self.manager)?;
        if let Some(filter) = &self.filter {
            queryset = queryset.filter(filter.clone());
        }
        if let Some(ordering) = &self.ordering {
            queryset = queryset.order_by(ordering.clone());
        }
        if let Some(limit) = self.limit {
            queryset = queryset.limit(limit);
        }
        tracing::debug!(model = %queryset.label(), manager = %self.manager, "show_elements_list");

        match &self.output {
            Output::Variable(name) => {
                context.set(name.as_str(), ContextValue::QuerySet(queryset));
                Ok(String::new())
            }
            Output::Template(template) => {
                let mut tag_context = Context::new();
                tag_context.set_auto_escape(context.auto_escape());
                tag_context.set("object_list", ContextValue::QuerySet(queryset));
                if let Some(request) = context.request() {
                    tag_context.set("request", ContextValue::Request(request));
                }
                renderer.render_template(template, &mut tag_context)
            }
        }
    }
}

/// Compiles `{% show_elements_list <model> [with_manager m] [filter_by 'f=v']
/// [limit n] [order_by 'a,-b'] [using 'tpl'] [as var] %}`.
///
/// Exactly one of `using` and `as` must be given.
pub fn compile_show_elements_list(parser: &mut Parser<'_>, token: &BlockToken) -> TagkitResult<Box<dyn TagNode>> {
    let args = TagArguments::parse(token, KEYWORDS)?;
    args.at_most(1)?;
    let model = args.positional().first().ok_or_else(|| {
        TagkitError::ArgumentRequired("show_elements_list requires a model".to_string())
    })?;

    let output = match (args.keyword("using"), args.keyword("as")) {
        (Some(template), None) => Output::Template(strip_quotes(template).to_string()),
        (None, Some(var)) => Output::Variable(var.to_string()),
        _ => {
            return Err(TagkitError::ArgumentRequired(
                "show_elements_list requires exactly one attribute between template and varname to work properly"
                    .to_string(),
            ))
        }
    };

    let filter = args
        .keyword("filter_by")
        .map(|clause| Filter::parse(strip_quotes(clause)))
        .transpose()
        .map_err(|e| TagkitError::TemplateSyntaxError(format!("show_elements_list: {e}")))?;
    let limit = args
        .keyword("limit")
        .map(|raw| {
            strip_quotes(raw).parse::<usize>().map_err(|_| {
                TagkitError::TemplateSyntaxError(format!(
                    "show_elements_list limit must be a non-negative integer, got {raw}"
                ))
            })
        })
        .transpose()?;
    let ordering = args
        .keyword("order_by")
        .map(|raw| OrderBy::parse_list(strip_quotes(raw)));
    let manager = args
        .keyword("with_manager")
        .map_or(DEFAULT_MANAGER, strip_quotes)
        .to_string();

    Ok(Box::new(ShowElementsListNode {
        model: parser.compile_filter(model)?,
        manager,
        filter,
        limit,
        ordering,
        output,
    }))
}
