//! The `toolkit_filters` library.
//!
//! ```text
//! {% load toolkit_filters %}
//! {{ post.body|autolink }}        {{ comment|keeptags:"b i a" }}
//! {% for i in 3|get_range %}      {{ total|subtract:shown }}
//! {{ articles|jsonify }}          {{ csv|split:"," }}
//! {{ attachment|filename }}
//! ```

use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use tagkit_core::{TagkitError, TagkitResult};
use tagkit_db::serializers;
use tagkit_template::{escape_html, ContextValue, Filter, FilterArity, Library};

/// The name templates load this library by.
pub const LIBRARY_NAME: &str = "toolkit_filters";

/// Builds the `toolkit_filters` library.
pub fn library() -> Library {
    let mut lib = Library::new(LIBRARY_NAME);
    lib.register_filter(Autolink)
        .register_filter(Keeptags)
        .register_filter(GetRange)
        .register_filter(Subtract)
        .register_filter(Jsonify)
        .register_filter(Escape)
        .register_filter(Split)
        .register_filter(Filename);
    lib
}

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?i)\b((?:[a-z][\w-]+:(?:/{1,3}|[a-z0-9%])|www\d{0,3}[.]|([a-z0-9.\-]+[.][a-z]{2,4}/))(?:[^\s()<>]+|\(([^\s()<>]+|(\([^\s()<>]+\)))*\))+(?:\(([^\s()<>]+|(\([^\s()<>]+\)))*\)|[^\s`!()\[\]{};:'".,<>?«»“”‘’]))"#,
        )
        .expect("valid url regex")
    })
}

fn markup_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"</?[A-Za-z][^>]*>").expect("valid markup regex"))
}

fn linkify(text: &str) -> String {
    url_regex()
        .replace_all(text, r#"<a href="$0" target="_blank">$0</a>"#)
        .into_owned()
}

/// Wraps bare URLs in `<a href="URL" target="_blank">URL</a>`.
///
/// Text inside tags and inside an existing `<a>` element is left alone, so
/// running the filter twice does not nest links.
struct Autolink;

impl Filter for Autolink {
    fn name(&self) -> &'static str {
        "autolink"
    }
    fn arity(&self) -> FilterArity {
        FilterArity::None
    }
    fn is_safe(&self) -> bool {
        true
    }
    fn apply(&self, value: &ContextValue, _args: &[ContextValue]) -> TagkitResult<ContextValue> {
        let text = value.to_display_string();
        let mut out = String::with_capacity(text.len());
        let mut anchor_depth = 0usize;
        let mut last = 0;
        for tag in markup_regex().find_iter(&text) {
            let between = &text[last..tag.start()];
            if anchor_depth == 0 {
                out.push_str(&linkify(between));
            } else {
                out.push_str(between);
            }
            let lower = tag.as_str().to_ascii_lowercase();
            if lower.starts_with("<a ") || lower == "<a>" {
                anchor_depth += 1;
            } else if lower.starts_with("</a") {
                anchor_depth = anchor_depth.saturating_sub(1);
            }
            out.push_str(tag.as_str());
            last = tag.end();
        }
        let tail = &text[last..];
        if anchor_depth == 0 {
            out.push_str(&linkify(tail));
        } else {
            out.push_str(tail);
        }
        Ok(ContextValue::String(out))
    }
}

/// Keeps the space-separated allow-listed tags and escapes all other
/// markup: `{{ html|keeptags:"strong em" }}`.
struct Keeptags;

const PLACEHOLDER_OPEN: &str = "##~~~";
const PLACEHOLDER_CLOSE: &str = "~~~##";

impl Filter for Keeptags {
    fn name(&self) -> &'static str {
        "keeptags"
    }
    fn arity(&self) -> FilterArity {
        FilterArity::Required
    }
    fn apply(&self, value: &ContextValue, args: &[ContextValue]) -> TagkitResult<ContextValue> {
        let text = value.to_display_string();
        let allowed: Vec<String> = args
            .first()
            .map(ContextValue::to_display_string)
            .unwrap_or_default()
            .split_whitespace()
            .map(regex::escape)
            .collect();
        if allowed.is_empty() {
            return Ok(ContextValue::SafeString(escape_html(&text)));
        }

        let tags = format!("({})", allowed.join("|"));
        let build = |pattern: String| {
            Regex::new(&pattern).map_err(|e| TagkitError::ValueError(format!("keeptags: {e}")))
        };
        let single = build(format!(r"<({tags}\s*/?)>"))?;
        let start = build(format!(r"<({tags})(\s+[^>]+)>"))?;
        let end = build(format!(r"<(/{tags})>"))?;
        let placeholder = |inner: &str| format!("{PLACEHOLDER_OPEN}{inner}{PLACEHOLDER_CLOSE}");

        let text = single.replace_all(&text, |caps: &regex::Captures<'_>| placeholder(&caps[1]));
        let text = start.replace_all(&text, |caps: &regex::Captures<'_>| {
            placeholder(&format!("{}{}", &caps[1], &caps[3]))
        });
        let text = end.replace_all(&text, |caps: &regex::Captures<'_>| placeholder(&caps[1]));
        let escaped = escape_html(&text);

        let recreate = build(format!(
            "{}([^~]+){}",
            regex::escape(PLACEHOLDER_OPEN),
            regex::escape(PLACEHOLDER_CLOSE)
        ))?;
        Ok(ContextValue::SafeString(
            recreate.replace_all(&escaped, "<$1>").into_owned(),
        ))
    }
}

/// The largest `N` `get_range` accepts.
pub const MAX_RANGE: i64 = 100_000;

/// `{% for i in 3|get_range %}` iterates 0, 1, 2.
///
/// `N` above [`MAX_RANGE`] is a `ValueError`.
struct GetRange;

impl Filter for GetRange {
    fn name(&self) -> &'static str {
        "get_range"
    }
    fn arity(&self) -> FilterArity {
        FilterArity::None
    }
    fn apply(&self, value: &ContextValue, _args: &[ContextValue]) -> TagkitResult<ContextValue> {
        let ContextValue::Integer(n) = value else {
            return Err(TagkitError::ValueError(format!(
                "'{}' object cannot be interpreted as an integer",
                value.type_name()
            )));
        };
        if *n > MAX_RANGE {
            return Err(TagkitError::ValueError(format!(
                "get_range: {n} exceeds the maximum of {MAX_RANGE}"
            )));
        }
        Ok(ContextValue::List((0..*n).map(ContextValue::Integer).collect()))
    }
}

/// Converts a value to an integer the way `int()` would.
fn to_int(value: &ContextValue) -> TagkitResult<i64> {
    let invalid = || {
        TagkitError::ValueError(format!(
            "invalid literal for int() with base 10: '{}'",
            value.to_display_string()
        ))
    };
    match value {
        ContextValue::Integer(i) => Ok(*i),
        ContextValue::Bool(b) => Ok(i64::from(*b)),
        ContextValue::Float(f) => f.trunc().to_i64().ok_or_else(invalid),
        ContextValue::Decimal(d) => d.trunc().to_i64().ok_or_else(invalid),
        ContextValue::String(s) | ContextValue::SafeString(s) => {
            s.trim().parse().map_err(|_| invalid())
        }
        _ => Err(TagkitError::ValueError(format!(
            "int() argument must be a string or a number, not '{}'",
            value.type_name()
        ))),
    }
}

/// `{{ a|subtract:b }}` is `int(a) - int(b)`.
struct Subtract;

impl Filter for Subtract {
    fn name(&self) -> &'static str {
        "subtract"
    }
    fn arity(&self) -> FilterArity {
        FilterArity::Required
    }
    fn apply(&self, value: &ContextValue, args: &[ContextValue]) -> TagkitResult<ContextValue> {
        let lhs = to_int(value)?;
        let rhs = to_int(args.first().unwrap_or(&ContextValue::None))?;
        lhs.checked_sub(rhs)
            .map(ContextValue::Integer)
            .ok_or_else(|| TagkitError::ValueError(format!("{lhs} - {rhs} overflows")))
    }
}

/// Encodes a value as JSON and marks it safe. Query sets use the model
/// serializer format.
struct Jsonify;

impl Filter for Jsonify {
    fn name(&self) -> &'static str {
        "jsonify"
    }
    fn arity(&self) -> FilterArity {
        FilterArity::None
    }
    fn apply(&self, value: &ContextValue, _args: &[ContextValue]) -> TagkitResult<ContextValue> {
        let json = match value {
            ContextValue::QuerySet(qs) => serializers::serialize_json(&qs.fetch()?)?,
            other => serde_json::to_string(other)
                .map_err(|e| TagkitError::SerializationError(e.to_string()))?,
        };
        Ok(ContextValue::SafeString(json))
    }
}

/// Escapes HTML unconditionally, even in values already marked safe.
struct Escape;

impl Filter for Escape {
    fn name(&self) -> &'static str {
        "escape"
    }
    fn arity(&self) -> FilterArity {
        FilterArity::None
    }
    fn apply(&self, value: &ContextValue, _args: &[ContextValue]) -> TagkitResult<ContextValue> {
        Ok(ContextValue::SafeString(escape_html(&value.to_display_string())))
    }
}

/// `{{ "a,b"|split:"," }}` gives `['a', 'b']`.
struct Split;

impl Filter for Split {
    fn name(&self) -> &'static str {
        "split"
    }
    fn arity(&self) -> FilterArity {
        FilterArity::Required
    }
    fn apply(&self, value: &ContextValue, args: &[ContextValue]) -> TagkitResult<ContextValue> {
        let text = value.as_str().ok_or_else(|| {
            TagkitError::ValueError(format!(
                "'{}' object has no attribute 'split'",
                value.type_name()
            ))
        })?;
        let sep = args.first().map(ContextValue::to_display_string).unwrap_or_default();
        if sep.is_empty() {
            return Err(TagkitError::ValueError("empty separator".to_string()));
        }
        Ok(ContextValue::List(
            text.split(sep.as_str()).map(ContextValue::from).collect(),
        ))
    }
}

/// The base name of `value.file`, or `""` when there is no file.
///
/// `file` may be a path string or a mapping with a `name` entry.
struct Filename;

impl Filter for Filename {
    fn name(&self) -> &'static str {
        "filename"
    }
    fn arity(&self) -> FilterArity {
        FilterArity::None
    }
    fn apply(&self, value: &ContextValue, _args: &[ContextValue]) -> TagkitResult<ContextValue> {
        let name = value
            .resolve_attr("file")
            .filter(|file| file.is_truthy())
            .and_then(|file| match file.as_ref() {
                ContextValue::Dict(_) => file.resolve_attr("name").map(|n| n.to_display_string()),
                other => Some(other.to_display_string()),
            })
            .unwrap_or_default();
        let base = name.rsplit('/').next().unwrap_or_default();
        Ok(ContextValue::from(base))
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;
    use rust_decimal::Decimal;

    use super::*;

    fn apply(name: &str, value: ContextValue, args: &[ContextValue]) -> TagkitResult<ContextValue> {
        library().filter(name).unwrap().apply(&value, args)
    }

    fn text(value: TagkitResult<ContextValue>) -> String {
        value.unwrap().to_display_string()
    }

    #[test]
    fn test_library_contents() {
        assert_eq!(
            library().filter_names(),
            vec!["autolink", "escape", "filename", "get_range", "jsonify", "keeptags", "split", "subtract"]
        );
    }

    #[test]
    fn test_autolink_wraps_urls() {
        assert_eq!(
            text(apply("autolink", "see http://example.com/a?b=1 now".into(), &[])),
            r#"see <a href="http://example.com/a?b=1" target="_blank">http://example.com/a?b=1</a> now"#
        );
        assert_eq!(
            text(apply("autolink", "www.example.com.".into(), &[])),
            r#"<a href="www.example.com" target="_blank">www.example.com</a>."#
        );
    }

    #[test]
    fn test_autolink_does_not_double_wrap() {
        let once = text(apply("autolink", "go to https://tagkit.dev".into(), &[]));
        let twice = text(apply("autolink", once.clone().into(), &[]));
        assert_eq!(once, twice);

        let linked = r#"<a href="https://x.io/">https://x.io/</a> and https://y.io/"#;
        assert_eq!(
            text(apply("autolink", linked.into(), &[])),
            r#"<a href="https://x.io/">https://x.io/</a> and <a href="https://y.io/" target="_blank">https://y.io/</a>"#
        );
    }

    #[test]
    fn test_autolink_plain_text_unchanged() {
        assert_eq!(text(apply("autolink", "no links here".into(), &[])), "no links here");
    }

    #[test]
    fn test_autolink_ignores_stray_angle_brackets() {
        assert_eq!(
            text(apply("autolink", "1 < 2, see http://example.com > done".into(), &[])),
            r#"1 < 2, see <a href="http://example.com" target="_blank">http://example.com</a> > done"#
        );
    }

    #[test]
    fn test_keeptags() {
        let out = apply("keeptags", "<b>x</b><i>y</i>".into(), &["b".into()]).unwrap();
        assert!(out.is_safe());
        assert_eq!(out.to_display_string(), "<b>x</b>&lt;i&gt;y&lt;/i&gt;");
    }

    #[test]
    fn test_keeptags_exact_names_and_attributes() {
        assert_eq!(
            text(apply("keeptags", r#"<b class="x">1</b><br/><bold>2</bold>"#.into(), &["b br".into()])),
            r#"<b class=&quot;x&quot;>1</b><br/>&lt;bold&gt;2&lt;/bold&gt;"#
        );
        assert_eq!(text(apply("keeptags", "<b>x</b>".into(), &["".into()])), "&lt;b&gt;x&lt;/b&gt;");
    }

    #[test]
    fn test_get_range() {
        assert_eq!(
            apply("get_range", 3.into(), &[]).unwrap(),
            ContextValue::List(vec![0.into(), 1.into(), 2.into()])
        );
        assert_eq!(apply("get_range", (-2).into(), &[]).unwrap(), ContextValue::List(vec![]));
        assert!(apply("get_range", "3".into(), &[]).is_err());
    }

    #[test]
    fn test_get_range_rejects_huge_n() {
        assert_eq!(
            apply("get_range", MAX_RANGE.into(), &[]).unwrap().len(),
            Some(usize::try_from(MAX_RANGE).unwrap())
        );
        for n in [MAX_RANGE + 1, i64::MAX] {
            assert!(matches!(
                apply("get_range", n.into(), &[]),
                Err(TagkitError::ValueError(_))
            ));
        }
    }

    #[test]
    fn test_subtract() {
        assert_eq!(apply("subtract", 10.into(), &[3.into()]).unwrap(), ContextValue::Integer(7));
        assert_eq!(apply("subtract", " 10 ".into(), &["4".into()]).unwrap(), ContextValue::Integer(6));
        assert_eq!(apply("subtract", 7.9.into(), &[Decimal::new(25, 1).into()]).unwrap(), ContextValue::Integer(5));
        let err = apply("subtract", "ten".into(), &[3.into()]).unwrap_err();
        assert!(matches!(err, TagkitError::ValueError(_)));
        assert!(apply("subtract", 1.into(), &[ContextValue::None]).is_err());
        assert!(apply("subtract", i64::MIN.into(), &[1.into()]).is_err());
    }

    #[test]
    fn test_jsonify_scalars() {
        let mut map = IndexMap::new();
        map.insert("b".to_string(), ContextValue::from(1));
        map.insert("a".to_string(), ContextValue::from(Decimal::new(150, 2)));
        let out = apply("jsonify", ContextValue::Dict(map), &[]).unwrap();
        assert!(out.is_safe());
        assert_eq!(out.to_display_string(), r#"{"b":1,"a":"1.50"}"#);
        assert_eq!(text(apply("jsonify", "say \"hi\"".into(), &[])), r#""say \"hi\"""#);
        assert_eq!(text(apply("jsonify", ContextValue::None, &[])), "null");
    }

    #[test]
    fn test_jsonify_dates() {
        let day = chrono::NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let value = ContextValue::List(vec![
            day.into(),
            day.and_hms_opt(8, 30, 0).unwrap().into(),
        ]);
        assert_eq!(
            text(apply("jsonify", value, &[])),
            r#"["2024-03-09","2024-03-09T08:30:00"]"#
        );
    }

    #[test]
    fn test_escape_overrides_safe() {
        let out = apply("escape", ContextValue::SafeString("<b>".into()), &[]).unwrap();
        assert_eq!(out, ContextValue::SafeString("&lt;b&gt;".into()));
    }

    #[test]
    fn test_split() {
        assert_eq!(
            apply("split", "a,b,,c".into(), &[",".into()]).unwrap(),
            ContextValue::from(vec!["a", "b", "", "c"])
        );
        assert!(matches!(
            apply("split", "abc".into(), &["".into()]),
            Err(TagkitError::ValueError(_))
        ));
        assert!(apply("split", 5.into(), &[",".into()]).is_err());
    }

    #[test]
    fn test_filename() {
        let mut file = IndexMap::new();
        file.insert("name".to_string(), ContextValue::from("uploads/2024/report.pdf"));
        let mut holder = IndexMap::new();
        holder.insert("file".to_string(), ContextValue::Dict(file));
        assert_eq!(text(apply("filename", ContextValue::Dict(holder), &[])), "report.pdf");

        let mut plain = IndexMap::new();
        plain.insert("file".to_string(), ContextValue::from("docs/a.txt"));
        assert_eq!(text(apply("filename", ContextValue::Dict(plain), &[])), "a.txt");

        let mut empty = IndexMap::new();
        empty.insert("file".to_string(), ContextValue::None);
        assert_eq!(text(apply("filename", ContextValue::Dict(empty), &[])), "");
        assert_eq!(text(apply("filename", ContextValue::None, &[])), "");
    }
}
