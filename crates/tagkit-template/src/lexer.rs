//! Template lexer (tokenizer).
//!
//! Converts raw template source text into a stream of [`Token`]s representing
//! text literals, variable references (`{{ }}`), block tags (`{% %}`), and
//! comments (`{# #}`).

use tagkit_core::{TagkitError, TagkitResult};

/// The contents of a `{% ... %}` tag.
///
/// `contents` is the trimmed raw text between the delimiters; `name` and
/// `args` are its quote-aware split, so `{% setvar "a b" as x %}` yields
/// the name `setvar` and the args `"a b"`, `as`, `x`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockToken {
    /// The tag name.
    pub name: String,
    /// The arguments after the tag name.
    pub args: Vec<String>,
    /// The raw tag contents.
    pub contents: String,
}

impl BlockToken {
    /// Splits raw tag contents into a block token.
    pub fn new(contents: &str) -> Self {
        let contents = contents.trim();
        let mut parts = split_contents(contents).into_iter();
        let name = parts.next().unwrap_or_default();
        Self {
            name,
            args: parts.collect(),
            contents: contents.to_string(),
        }
    }

    /// Returns the raw contents after the tag name.
    pub fn arg_text(&self) -> &str {
        self.contents[self.name.len()..].trim_start()
    }
}

/// A token produced by the template lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A literal text segment.
    Text(String),
    /// A variable expression: `{{ expression }}`.
    Variable(String),
    /// A block tag: `{% tag arg1 arg2 %}`.
    Block(BlockToken),
    /// A comment: `{# comment text #}`.
    Comment(String),
}

#[derive(Debug, Clone, Copy)]
enum TagKind {
    Variable,
    Block,
    Comment,
}

impl TagKind {
    const fn from_marker(marker: u8) -> Option<Self> {
        match marker {
            b'{' => Some(Self::Variable),
            b'%' => Some(Self::Block),
            b'#' => Some(Self::Comment),
            _ => None,
        }
    }

    const fn closer(self) -> &'static str {
        match self {
            Self::Variable => "}}",
            Self::Block => "%}",
            Self::Comment => "#}",
        }
    }
}

/// Tokenizes a template source string.
///
/// # Errors
///
/// Returns a `TemplateSyntaxError` if a tag is opened but never closed.
pub fn tokenize(source: &str) -> TagkitResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut remaining = source;

    while let Some((pos, kind)) = find_next_open(remaining) {
        if pos > 0 {
            tokens.push(Token::Text(remaining[..pos].to_string()));
        }
        let after_open = &remaining[pos + 2..];
        let end = after_open.find(kind.closer()).ok_or_else(|| {
            TagkitError::TemplateSyntaxError(format!(
                "Unclosed tag: expected '{}'",
                kind.closer()
            ))
        })?;
        let content = after_open[..end].trim();
        tokens.push(match kind {
            TagKind::Variable => Token::Variable(content.to_string()),
            TagKind::Block => Token::Block(BlockToken::new(content)),
            TagKind::Comment => Token::Comment(content.to_string()),
        });
        remaining = &after_open[end + 2..];
    }

    if !remaining.is_empty() {
        tokens.push(Token::Text(remaining.to_string()));
    }
    Ok(tokens)
}

fn find_next_open(s: &str) -> Option<(usize, TagKind)> {
    let bytes = s.as_bytes();
    bytes
        .windows(2)
        .enumerate()
        .find_map(|(i, pair)| match pair {
            [b'{', marker] => TagKind::from_marker(*marker).map(|kind| (i, kind)),
            _ => None,
        })
}

/// Splits tag contents on whitespace, keeping quoted strings together.
///
/// Quotes stay in the output, so callers can tell literals from variables.
pub fn split_contents(content: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in content.chars() {
        match (quote, ch) {
            (None, '"' | '\'') => {
                quote = Some(ch);
                current.push(ch);
            }
            (Some(q), _) if ch == q => {
                quote = None;
                current.push(ch);
            }
            (None, c) if c.is_whitespace() => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(ch),
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(contents: &str) -> Token {
        Token::Block(BlockToken::new(contents))
    }

    #[test]
    fn test_plain_text() {
        let tokens = tokenize("Hello world").unwrap();
        assert_eq!(tokens, vec![Token::Text("Hello world".to_string())]);
    }

    #[test]
    fn test_variable_with_filter() {
        let tokens = tokenize("{{ name|lower }}").unwrap();
        assert_eq!(tokens, vec![Token::Variable("name|lower".to_string())]);
    }

    #[test]
    fn test_block_token_parts() {
        let token = BlockToken::new("  setvar \"hello world\" as greeting ");
        assert_eq!(token.name, "setvar");
        assert_eq!(token.args, vec!["\"hello world\"", "as", "greeting"]);
        assert_eq!(token.contents, "setvar \"hello world\" as greeting");
        assert_eq!(token.arg_text(), "\"hello world\" as greeting");
    }

    #[test]
    fn test_mixed_content() {
        let tokens = tokenize("Hi {{ name }}!{# note #}{% if show %}x{% endif %}").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Text("Hi ".to_string()),
                Token::Variable("name".to_string()),
                Token::Text("!".to_string()),
                Token::Comment("note".to_string()),
                block("if show"),
                Token::Text("x".to_string()),
                block("endif"),
            ]
        );
    }

    #[test]
    fn test_lone_brace_is_text() {
        let tokens = tokenize("a { b } {").unwrap();
        assert_eq!(tokens, vec![Token::Text("a { b } {".to_string())]);
    }

    #[test]
    fn test_unclosed_tags() {
        assert!(tokenize("{{ name").is_err());
        assert!(tokenize("{% if x").is_err());
        assert!(tokenize("{# note").is_err());
    }

    #[test]
    fn test_split_contents_quotes() {
        assert_eq!(
            split_contents("a 'b c' \"d 'e'\"  f"),
            vec!["a", "'b c'", "\"d 'e'\"", "f"]
        );
        assert!(split_contents("   ").is_empty());
    }

    #[test]
    fn test_multibyte_text() {
        let tokens = tokenize("città {{ x }} è").unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[2], Token::Text(" è".to_string()));
    }
}
