//! Tags that build URLs from the current request.
//!
//! ```text
//! {% build_absolute_uri path 'img/fb.png' as og_image %}
//! <a href="{% append_to_get page=page_num,sort='date' %}">next</a>
//! <a href="{% change_language 'it' %}">Italiano</a>
//! ```
//!
//! All three need a `request` in the context and fail with
//! `RequestRequired` without one.

use tagkit_core::{Settings, TagkitError, TagkitResult};
use tagkit_http::querydict::encode_component;
use tagkit_http::request::is_absolute_url;
use tagkit_http::{translate_url, HttpRequest, LocaleConfig};
use tagkit_template::parser::render_value;
use tagkit_template::{
    BlockToken, Context, ContextValue, FilterExpression, Parser, TagNode, TemplateRenderer,
};

use super::require_request;
use crate::args::TagArguments;

/// Builds an absolute URI for `location`.
///
/// Absolute URLs pass through and protocol-relative ones (`//host/path`)
/// take the request's scheme. Paths starting with `/` sit on the request's
/// origin; anything else is taken to be a static asset under
/// `settings.static_url`. `settings.site_domain` replaces the request host
/// when set.
pub fn absolute_uri(request: &HttpRequest, settings: &Settings, location: &str) -> String {
    if is_absolute_url(location) {
        return location.to_string();
    }
    if location.starts_with("//") {
        return format!("{}:{location}", request.scheme());
    }
    let path = if location.starts_with('/') {
        location.to_string()
    } else {
        let static_url = settings.static_url.trim_end_matches('/');
        format!("{static_url}/{location}")
    };
    match &settings.site_domain {
        Some(domain) => format!("{}://{domain}{path}", request.scheme()),
        None => request.build_absolute_uri(Some(&path)),
    }
}

#[derive(Debug)]
struct BuildAbsoluteUriNode {
    path: FilterExpression,
    as_var: Option<String>,
}

impl TagNode for BuildAbsoluteUriNode {
    fn render(&self, context: &mut Context, renderer: &dyn TemplateRenderer) -> TagkitResult<String> {
        let request = require_request(context, "build_absolute_uri")?;
        let location = self.path.resolve(context)?.to_display_string();
        let uri = absolute_uri(&request, renderer.settings(), &location);
        tracing::debug!(location = %location, uri = %uri, "build_absolute_uri");
        if let Some(var) = &self.as_var {
            context.set(var.as_str(), ContextValue::from(uri.as_str()));
        }
        Ok(render_value(&ContextValue::String(uri), context))
    }
}

/// `{% build_absolute_uri [path] <path> [as <var>] %}`.
pub fn compile_build_absolute_uri(parser: &mut Parser<'_>, token: &BlockToken) -> TagkitResult<Box<dyn TagNode>> {
    let args = TagArguments::parse(token, &["path", "as"])?;
    args.at_most(1)?;
    let path = match (args.positional().first(), args.keyword("path")) {
        (Some(path), None) => path.as_str(),
        (None, Some(path)) => path,
        (Some(_), Some(_)) => {
            return Err(TagkitError::TemplateSyntaxError(
                "'build_absolute_uri' received the path twice".to_string(),
            ))
        }
        (None, None) => {
            return Err(TagkitError::ArgumentRequired(
                "'build_absolute_uri' requires a path".to_string(),
            ))
        }
    };
    Ok(Box::new(BuildAbsoluteUriNode {
        path: parser.compile_filter(path)?,
        as_var: args.keyword("as").map(str::to_string),
    }))
}

#[derive(Debug)]
struct AppendToGetNode {
    pairs: Vec<(String, FilterExpression)>,
}

impl TagNode for AppendToGetNode {
    fn render(&self, context: &mut Context, _renderer: &dyn TemplateRenderer) -> TagkitResult<String> {
        let request = require_request(context, "append_to_get")?;
        let mut get = request.get().copy();
        tracing::debug!(query = %get.urlencode(), "append_to_get: before");
        for (key, expr) in &self.pairs {
            let value = expr.resolve(context)?;
            let value = if matches!(value, ContextValue::None) {
                String::new()
            } else {
                value.to_display_string()
            };
            get.set(key, &value)?;
        }

        let mut path = request
            .meta()
            .get("PATH_INFO")
            .cloned()
            .unwrap_or_else(|| request.path_info().to_string());
        let query = get
            .items()
            .filter(|(_, value)| !value.is_empty())
            .map(|(key, value)| format!("{}={}", encode_component(key), encode_component(value)))
            .collect::<Vec<_>>()
            .join("&");
        tracing::debug!(path = %path, query = %query, "append_to_get: after");
        if !query.is_empty() {
            path.push('?');
            path.push_str(&query);
        }
        Ok(render_value(&ContextValue::String(path), context))
    }
}

/// `{% append_to_get key=value,other=expr %}`. Values are template
/// expressions; keys that end up empty are dropped from the query string.
pub fn compile_append_to_get(parser: &mut Parser<'_>, token: &BlockToken) -> TagkitResult<Box<dyn TagNode>> {
    let [pairs] = token.args.as_slice() else {
        return Err(TagkitError::TemplateSyntaxError(format!(
            "Bad arguments for tag \"{}\"",
            token.name
        )));
    };
    let pairs = pairs
        .split(',')
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                Ok((key.to_string(), parser.compile_filter(value)?))
            }
            _ => Err(TagkitError::TemplateSyntaxError(format!(
                "'{}' expects 'key=value' pairs, got '{pair}'",
                token.name
            ))),
        })
        .collect::<TagkitResult<Vec<_>>>()?;
    Ok(Box::new(AppendToGetNode { pairs }))
}

#[derive(Debug)]
struct ChangeLanguageNode {
    lang: Option<FilterExpression>,
}

impl TagNode for ChangeLanguageNode {
    fn render(&self, context: &mut Context, renderer: &dyn TemplateRenderer) -> TagkitResult<String> {
        let request = require_request(context, "change_language")?;
        let path = match &self.lang {
            Some(lang) => {
                let lang = lang.resolve(context)?.to_display_string();
                let config = LocaleConfig::from_settings(renderer.settings());
                translate_url(request.path(), &lang, &config)
            }
            None => request.path().to_string(),
        };
        Ok(render_value(&ContextValue::String(path), context))
    }
}

/// `{% change_language 'it' %}` renders the current path under another
/// language prefix. Without a language the path is returned unchanged.
pub fn compile_change_language(parser: &mut Parser<'_>, token: &BlockToken) -> TagkitResult<Box<dyn TagNode>> {
    let lang = match token.args.as_slice() {
        [] => None,
        [lang] => Some(parser.compile_filter(lang)?),
        _ => {
            return Err(TagkitError::TemplateSyntaxError(format!(
                "'{}' takes at most one argument",
                token.name
            )))
        }
    };
    Ok(Box::new(ChangeLanguageNode { lang }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{engine, engine_with, render, render_with};

    fn request(path: &str, query: &str) -> HttpRequest {
        HttpRequest::builder()
            .path(path)
            .query_string(query)
            .header("host", "www.mysite.com")
            .build()
    }

    fn context_with(request: HttpRequest) -> Context {
        let mut ctx = Context::new();
        ctx.set("request", request.into());
        ctx
    }

    #[test]
    fn test_build_absolute_uri_static_path_and_binding() {
        let mut ctx = context_with(request("/", ""));
        let out = render("{% build_absolute_uri path 'fb.png' as image_path %}", &mut ctx);
        assert_eq!(out, "http://www.mysite.com/static/fb.png");
        assert_eq!(
            ctx.get("image_path").unwrap().to_display_string(),
            "http://www.mysite.com/static/fb.png"
        );
    }

    #[test]
    fn test_build_absolute_uri_forms() {
        let mut ctx = context_with(request("/blog/", ""));
        ctx.set("img", "covers/a.jpg".into());
        assert_eq!(render("{% build_absolute_uri '/about/' %}", &mut ctx), "http://www.mysite.com/about/");
        assert_eq!(render("{% build_absolute_uri img %}", &mut ctx), "http://www.mysite.com/static/covers/a.jpg");
        assert_eq!(render("{% build_absolute_uri 'https://cdn.io/x' %}", &mut ctx), "https://cdn.io/x");
        assert_eq!(render("{% build_absolute_uri '//cdn.io/x.png' %}", &mut ctx), "http://cdn.io/x.png");
    }

    #[test]
    fn test_build_absolute_uri_site_domain() {
        let settings = Settings {
            site_domain: Some("cdn.mysite.com".into()),
            static_url: "/assets".into(),
            ..Settings::default()
        };
        let mut ctx = context_with(request("/", ""));
        let engine = engine_with(settings);
        let out = render_with(&engine, "{% build_absolute_uri 'fb.png' %}", &mut ctx);
        assert_eq!(out, "http://cdn.mysite.com/assets/fb.png");
        let out = render_with(&engine, "{% build_absolute_uri '//media.io/a.jpg' %}", &mut ctx);
        assert_eq!(out, "http://media.io/a.jpg");
    }

    #[test]
    fn test_build_absolute_uri_argument_errors() {
        let engine = engine();
        let missing = engine
            .from_string("{% load toolkit_tags %}{% build_absolute_uri as x %}")
            .unwrap_err();
        assert!(matches!(missing, TagkitError::ArgumentRequired(_)));
        let twice = engine
            .from_string("{% load toolkit_tags %}{% build_absolute_uri 'a' path 'b' %}")
            .unwrap_err();
        assert!(twice.is_syntax_error());
    }

    #[test]
    fn test_build_absolute_uri_requires_request() {
        let engine = engine();
        let tpl = engine
            .from_string("{% load toolkit_tags %}{% build_absolute_uri 'x.png' %}")
            .unwrap();
        let err = tpl.render(&mut Context::new(), &engine).unwrap_err();
        assert!(matches!(err, TagkitError::RequestRequired(_)));
    }

    #[test]
    fn test_append_to_get_merges_query() {
        let mut ctx = context_with(request("/list/", "a=1"));
        let out = render("{% append_to_get b=2 %}", &mut ctx);
        assert!(out.starts_with("/list/?"));
        assert!(out.contains("a=1"));
        assert!(out.contains("b=2"));
    }

    #[test]
    fn test_append_to_get_overrides_and_drops_empty() {
        let mut ctx = context_with(request("/list/", "page=1&q=shoes"));
        ctx.set("next", 2.into());
        assert_eq!(
            render("{% autoescape off %}{% append_to_get page=next,q='' %}{% endautoescape %}", &mut ctx),
            "/list/?page=2"
        );
        assert_eq!(render("{% append_to_get page=missing,q='' %}", &mut ctx), "/list/");
    }

    #[test]
    fn test_append_to_get_prefers_path_info_meta() {
        let request = HttpRequest::builder()
            .path("/prefix/list/")
            .meta("PATH_INFO", "/list/")
            .build();
        let mut ctx = context_with(request);
        assert_eq!(render("{% append_to_get p=3 %}", &mut ctx), "/list/?p=3");
    }

    #[test]
    fn test_append_to_get_escapes_output() {
        let mut ctx = context_with(request("/s/", "a=1"));
        assert_eq!(render("{% append_to_get b='x y' %}", &mut ctx), "/s/?a=1&amp;b=x%20y");
    }

    #[test]
    fn test_append_to_get_bad_arguments() {
        let engine = engine();
        for source in [
            "{% load toolkit_tags %}{% append_to_get %}",
            "{% load toolkit_tags %}{% append_to_get a=1 b=2 %}",
            "{% load toolkit_tags %}{% append_to_get a %}",
        ] {
            assert!(engine.from_string(source).unwrap_err().is_syntax_error(), "{source}");
        }
    }

    #[test]
    fn test_change_language() {
        let settings = Settings {
            language_code: "en".into(),
            languages: vec!["en".into(), "it".into()],
            ..Settings::default()
        };
        let engine = engine_with(settings);
        let mut ctx = context_with(request("/en/blog/post/", ""));
        assert_eq!(render_with(&engine, "{% change_language 'it' %}", &mut ctx), "/it/blog/post/");
        assert_eq!(render_with(&engine, "{% change_language 'de' %}", &mut ctx), "/en/blog/post/");
        assert_eq!(render_with(&engine, "{% change_language %}", &mut ctx), "/en/blog/post/");
        assert!(engine
            .from_string("{% load toolkit_tags %}{% change_language 'it' 'en' %}")
            .is_err());
    }
}
