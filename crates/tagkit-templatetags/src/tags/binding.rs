//! Tags that bind literal values, plus `removebreak`.
//!
//! ```text
//! {% get_list '1, x ,fuffa' as my_list %}
//! {% get_dict 'x=1 , y=2, z=3' as my_dict %}
//! {% setvar "Hello" as greeting %}
//! {% removebreak %}...{% endremovebreak %}
//! ```

use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;
use tagkit_core::{TagkitError, TagkitResult};
use tagkit_template::parser::strip_quotes;
use tagkit_template::{BlockToken, Context, ContextValue, NodeList, Parser, TagNode, TemplateRenderer};

/// Binds a precomputed value and renders nothing.
#[derive(Debug)]
struct BindNode {
    var_name: String,
    value: ContextValue,
}

impl TagNode for BindNode {
    fn render(&self, context: &mut Context, _renderer: &dyn TemplateRenderer) -> TagkitResult<String> {
        context.set(self.var_name.as_str(), self.value.clone());
        Ok(String::new())
    }
}

/// Splits `<literal> as <var>`, the shape shared by `get_list` and
/// `get_dict`.
fn literal_as_var<'t>(token: &'t BlockToken) -> TagkitResult<(&'t str, &'t str)> {
    match token.args.as_slice() {
        [values, as_kw, var] if as_kw == "as" => Ok((strip_quotes(values), var.as_str())),
        [] | [_] | [_, _] => Err(TagkitError::ArgumentRequired(format!(
            "'{}' requires a value and 'as <variable>'",
            token.name
        ))),
        _ => Err(TagkitError::TemplateSyntaxError(format!(
            "'{}' expects '{} <values> as <variable>': {}",
            token.name, token.name, token.contents
        ))),
    }
}

/// `{% get_list 'a, b' as items %}` binds `["a", "b"]`.
pub fn compile_get_list(_parser: &mut Parser<'_>, token: &BlockToken) -> TagkitResult<Box<dyn TagNode>> {
    let (values, var) = literal_as_var(token)?;
    let items = values.split(',').map(|item| ContextValue::from(item.trim())).collect();
    Ok(Box::new(BindNode {
        var_name: var.to_string(),
        value: ContextValue::List(items),
    }))
}

/// `{% get_dict 'x=1, y=2' as options %}` binds an ordered mapping.
pub fn compile_get_dict(_parser: &mut Parser<'_>, token: &BlockToken) -> TagkitResult<Box<dyn TagNode>> {
    let (values, var) = literal_as_var(token)?;
    let mut map = IndexMap::new();
    for pair in values.split(',').map(str::trim) {
        let parts: Vec<&str> = pair.split('=').collect();
        let [key, value] = parts.as_slice() else {
            return Err(TagkitError::TemplateSyntaxError(format!(
                "'{}' expects 'key=value' pairs, got '{pair}'",
                token.name
            )));
        };
        map.insert((*key).to_string(), ContextValue::from(*value));
    }
    Ok(Box::new(BindNode {
        var_name: var.to_string(),
        value: ContextValue::Dict(map),
    }))
}

fn setvar_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(.*?) as (\w+)").expect("valid setvar regex"))
}

/// `{% setvar "literal" as name %}`. The value must be quoted.
pub fn compile_setvar(_parser: &mut Parser<'_>, token: &BlockToken) -> TagkitResult<Box<dyn TagNode>> {
    let arg = token.arg_text();
    if arg.is_empty() {
        return Err(TagkitError::TemplateSyntaxError(format!(
            "'{}' tag requires arguments",
            token.name
        )));
    }
    let caps = setvar_regex().captures(arg).ok_or_else(|| {
        TagkitError::TemplateSyntaxError(format!("'{}' tag had invalid arguments", token.name))
    })?;
    let (value, var) = (&caps[1], &caps[2]);
    if !tagkit_template::parser::is_quoted(value) {
        return Err(TagkitError::TemplateSyntaxError(format!(
            "'{}' tag's argument should be in quotes",
            token.name
        )));
    }
    Ok(Box::new(BindNode {
        var_name: var.to_string(),
        value: ContextValue::from(&value[1..value.len() - 1]),
    }))
}

fn whitespace_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace regex"))
}

#[derive(Debug)]
struct RemoveBreakNode {
    body: NodeList,
}

impl TagNode for RemoveBreakNode {
    fn render(&self, context: &mut Context, renderer: &dyn TemplateRenderer) -> TagkitResult<String> {
        let output = self.body.render(context, renderer)?.replace('\n', " ");
        Ok(whitespace_regex().replace_all(&output, " ").into_owned())
    }
}

/// `{% removebreak %}...{% endremovebreak %}` collapses the rendered body's
/// line breaks and whitespace runs to single spaces.
pub fn compile_removebreak(parser: &mut Parser<'_>, token: &BlockToken) -> TagkitResult<Box<dyn TagNode>> {
    if !token.args.is_empty() {
        return Err(TagkitError::TemplateSyntaxError(format!(
            "'{}' takes no arguments",
            token.name
        )));
    }
    let body = parser.parse_until(&["endremovebreak"])?;
    parser.next_block();
    Ok(Box::new(RemoveBreakNode { body }))
}

#[cfg(test)]
mod tests {
    use crate::testing::{engine, render};

    use super::*;

    #[test]
    fn test_get_list_trims_items() {
        let out = render(
            "{% get_list '1, x ,fuffa' as my_list %}{% for item in my_list %}{{ forloop.counter }}.{{ item }};{% endfor %}",
            &mut Context::new(),
        );
        assert_eq!(out, "1.1;2.x;3.fuffa;");
    }

    #[test]
    fn test_get_list_binds_in_context() {
        let mut ctx = Context::new();
        render("{% get_list '1, x ,fuffa' as my_list %}", &mut ctx);
        assert_eq!(
            ctx.get("my_list").unwrap().into_owned(),
            ContextValue::from(vec!["1", "x", "fuffa"])
        );
    }

    #[test]
    fn test_get_dict_keeps_order() {
        let mut ctx = Context::new();
        let out = render(
            "{% get_dict 'x=1 , y=2, z=3' as my_dict %}{% for k, v in my_dict.items %}{{ k }}={{ v }};{% endfor %}",
            &mut ctx,
        );
        assert_eq!(out, "x=1;y=2;z=3;");

        render("{% get_dict 'x=1,y=2' as d %}", &mut ctx);
        let ContextValue::Dict(map) = ctx.get("d").unwrap().into_owned() else {
            panic!("expected a dict");
        };
        assert_eq!(map.keys().collect::<Vec<_>>(), ["x", "y"]);
        assert_eq!(map["x"], ContextValue::from("1"));
    }

    #[test]
    fn test_get_dict_malformed_pair_is_compile_error() {
        let engine = engine();
        for source in [
            "{% load toolkit_tags %}{% get_dict 'x=1,y' as d %}",
            "{% load toolkit_tags %}{% get_dict 'x=1=2' as d %}",
        ] {
            assert!(engine.from_string(source).unwrap_err().is_syntax_error(), "{source}");
        }
    }

    #[test]
    fn test_binding_tags_require_as_var() {
        let engine = engine();
        let err = engine.from_string("{% load toolkit_tags %}{% get_list 'a,b' %}").unwrap_err();
        assert!(matches!(err, TagkitError::ArgumentRequired(_)));
        let err = engine.from_string("{% load toolkit_tags %}{% get_dict 'a=b' into d %}").unwrap_err();
        assert!(err.is_syntax_error());
    }

    #[test]
    fn test_setvar() {
        let mut ctx = Context::new();
        let out = render("{% setvar \"Hello world\" as greeting %}[{{ greeting }}]", &mut ctx);
        assert_eq!(out, "[Hello world]");
        render("{% setvar '<b>' as tag %}", &mut ctx);
        assert_eq!(render("{{ tag }}", &mut ctx), "&lt;b&gt;");
    }

    #[test]
    fn test_setvar_errors() {
        let engine = engine();
        for source in [
            "{% load toolkit_tags %}{% setvar %}",
            "{% load toolkit_tags %}{% setvar \"x\" %}",
            "{% load toolkit_tags %}{% setvar unquoted as x %}",
            "{% load toolkit_tags %}{% setvar \"mismatched' as x %}",
        ] {
            assert!(engine.from_string(source).unwrap_err().is_syntax_error(), "{source}");
        }
    }

    #[test]
    fn test_removebreak() {
        let mut ctx = Context::new();
        ctx.set("body", "a\nb\n\nc".into());
        assert_eq!(render("{% removebreak %}{{ body }}{% endremovebreak %}", &mut ctx), "a b c");
        assert_eq!(
            render("{% removebreak %}\n  <p>\n\t{{ body }}</p>\n{% endremovebreak %}", &mut ctx),
            " <p> a b c</p> "
        );
    }

    #[test]
    fn test_removebreak_requires_end_tag() {
        let err = engine()
            .from_string("{% load toolkit_tags %}{% removebreak %}a")
            .unwrap_err();
        assert!(err.to_string().contains("endremovebreak"));
    }
}
