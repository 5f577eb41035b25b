//! Keyword-style tag arguments.
//!
//! Several tags take a few leading positional arguments followed by
//! optional `keyword value` pairs, e.g.
//! `{% show_elements_list 'blog.Article' limit 5 as articles %}`.
//! [`TagArguments`] splits a block token along those lines at compile time.

use indexmap::IndexMap;
use tagkit_core::{TagkitError, TagkitResult};
use tagkit_template::BlockToken;

/// Positional arguments and keyword values of one tag occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagArguments {
    tag: String,
    positional: Vec<String>,
    keywords: IndexMap<String, String>,
}

impl TagArguments {
    /// Splits `token`'s arguments. Words listed in `keywords` take the
    /// following argument as their value and may appear in any order.
    /// Positional arguments must come before the first keyword.
    pub fn parse(token: &BlockToken, keywords: &[&str]) -> TagkitResult<Self> {
        let mut parsed = Self {
            tag: token.name.clone(),
            ..Self::default()
        };
        let mut args = token.args.iter();
        while let Some(arg) = args.next() {
            if keywords.contains(&arg.as_str()) {
                let value = args.next().ok_or_else(|| {
                    TagkitError::ArgumentRequired(format!(
                        "'{}' expects a value after '{arg}'",
                        token.name
                    ))
                })?;
                if parsed.keywords.insert(arg.clone(), value.clone()).is_some() {
                    return Err(TagkitError::TemplateSyntaxError(format!(
                        "'{}' received '{arg}' more than once",
                        token.name
                    )));
                }
            } else if parsed.keywords.is_empty() {
                parsed.positional.push(arg.clone());
            } else {
                return Err(TagkitError::TemplateSyntaxError(format!(
                    "'{}' received an unexpected argument '{arg}'",
                    token.name
                )));
            }
        }
        Ok(parsed)
    }

    /// Returns the positional arguments.
    pub fn positional(&self) -> &[String] {
        &self.positional
    }

    /// Returns the value given after `keyword`.
    pub fn keyword(&self, keyword: &str) -> Option<&str> {
        self.keywords.get(keyword).map(String::as_str)
    }

    /// Fails unless there are at most `max` positional arguments.
    pub fn at_most(&self, max: usize) -> TagkitResult<()> {
        if self.positional.len() > max {
            return Err(TagkitError::TemplateSyntaxError(format!(
                "'{}' received too many positional arguments",
                self.tag
            )));
        }
        Ok(())
    }
}
