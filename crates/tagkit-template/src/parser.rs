//! Template parser.
//!
//! Converts a stream of lexer [`Token`]s into a tree of [`Node`]s that can be
//! rendered by the engine. Filters are bound when a template is compiled, so
//! an unknown filter, tag, or library is a syntax error before anything is
//! rendered. Tags from loaded libraries receive the [`Parser`] and may parse
//! their own bodies with [`Parser::parse_until`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tagkit_core::logging::render_span;
use tagkit_core::{TagkitError, TagkitResult};

use crate::context::{escape_html, Context, ContextValue};
use crate::engine::TemplateRenderer;
use crate::filters::{self, Filter, FilterArity};
use crate::lexer::{self, BlockToken, Token};
use crate::library::{Library, LibraryRegistry, TagCompileFn};

/// A variable reference or a literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A variable reference, possibly dot-separated (e.g., `user.name`).
    Variable(String),
    /// A quoted string literal. Literals are safe.
    StringLiteral(String),
    /// An integer literal.
    IntegerLiteral(i64),
    /// A float literal.
    FloatLiteral(f64),
}

impl Expression {
    /// Parses a single variable name or literal.
    pub fn parse(s: &str) -> TagkitResult<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TagkitError::TemplateSyntaxError("Empty expression".to_string()));
        }
        if is_quoted(s) {
            return Ok(Self::StringLiteral(s[1..s.len() - 1].to_string()));
        }
        if s.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '-' | '+' | '.')) {
            if let Ok(i) = s.parse::<i64>() {
                return Ok(Self::IntegerLiteral(i));
            }
            if let Ok(f) = s.parse::<f64>() {
                return Ok(Self::FloatLiteral(f));
            }
        }
        let valid = s
            .split('.')
            .all(|part| !part.is_empty() && !part.starts_with('_') && part.chars().all(|c| c.is_alphanumeric() || c == '_'));
        if !valid {
            return Err(TagkitError::TemplateSyntaxError(format!(
                "Could not parse the remainder: '{s}'"
            )));
        }
        Ok(Self::Variable(s.to_string()))
    }

    /// Resolves this expression against a context. Missing variables
    /// resolve to `None`.
    pub fn resolve(&self, context: &Context) -> ContextValue {
        match self {
            Self::Variable(name) => context
                .get(name)
                .map_or(ContextValue::None, std::borrow::Cow::into_owned),
            Self::StringLiteral(s) => ContextValue::SafeString(s.clone()),
            Self::IntegerLiteral(i) => ContextValue::Integer(*i),
            Self::FloatLiteral(f) => ContextValue::Float(*f),
        }
    }
}

/// A filter bound at compile time, with its optional argument.
#[derive(Clone)]
pub struct FilterCall {
    name: String,
    filter: Arc<dyn Filter>,
    arg: Option<Expression>,
}

impl FilterCall {
    /// Returns the name the filter was invoked by.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, value: ContextValue, context: &Context) -> TagkitResult<ContextValue> {
        let args: Vec<ContextValue> = self.arg.iter().map(|a| a.resolve(context)).collect();
        let result = self.filter.apply(&value, &args)?;
        if self.filter.is_safe() && value.is_safe() {
            Ok(result.mark_safe())
        } else {
            Ok(result)
        }
    }
}

impl fmt::Debug for FilterCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterCall")
            .field("name", &self.name)
            .field("arg", &self.arg)
            .finish_non_exhaustive()
    }
}

/// An expression followed by a filter chain: `name|lower|default:"x"`.
#[derive(Debug, Clone)]
pub struct FilterExpression {
    expression: Expression,
    filters: Vec<FilterCall>,
}

impl FilterExpression {
    /// Returns the base expression.
    pub const fn expression(&self) -> &Expression {
        &self.expression
    }

    /// Returns the filter chain.
    pub fn filters(&self) -> &[FilterCall] {
        &self.filters
    }

    /// Returns the variable path if this is a bare, unfiltered variable.
    pub fn var_name(&self) -> Option<&str> {
        match &self.expression {
            Expression::Variable(name) if self.filters.is_empty() => Some(name),
            _ => None,
        }
    }

    /// Resolves the expression and applies each filter in turn.
    pub fn resolve(&self, context: &Context) -> TagkitResult<ContextValue> {
        self.filters
            .iter()
            .try_fold(self.expression.resolve(context), |value, call| call.apply(value, context))
    }
}

/// A compiled custom tag.
///
/// Tag libraries return one of these from their compile function; the
/// engine calls [`TagNode::render`] once per render of the template.
pub trait TagNode: Send + Sync + fmt::Debug {
    /// Renders the tag. Binding tags mutate `context` and return an empty
    /// string.
    fn render(&self, context: &mut Context, renderer: &dyn TemplateRenderer)
        -> TagkitResult<String>;
}

/// A node in the parsed template tree.
#[derive(Debug)]
pub enum Node {
    /// A literal text segment.
    Text(String),
    /// `{{ expression|filters }}`.
    Variable(FilterExpression),
    /// `{% if %}` with its `elif` and `else` branches.
    If {
        /// Conditions and their bodies, in order.
        branches: Vec<(IfCondition, NodeList)>,
    },
    /// `{% for x in items %}...{% empty %}...{% endfor %}`.
    For {
        /// The loop variable name(s).
        loop_vars: Vec<String>,
        /// The iterable expression.
        iterable: FilterExpression,
        /// Whether to iterate in reverse.
        reversed: bool,
        /// Body nodes.
        body: NodeList,
        /// Rendered instead of the body when the iterable is empty.
        empty: NodeList,
    },
    /// `{% with a=b %}...{% endwith %}`.
    With {
        /// Variable assignments.
        assignments: Vec<(String, FilterExpression)>,
        /// Body nodes.
        body: NodeList,
    },
    /// `{% include "name" [with a=b] [only] %}`.
    Include {
        /// Template name expression.
        template: FilterExpression,
        /// Extra context assignments.
        extra: Vec<(String, FilterExpression)>,
        /// If true, only the extra context is available.
        only: bool,
    },
    /// `{% autoescape on|off %}...{% endautoescape %}`.
    Autoescape {
        /// Whether auto-escaping is enabled inside the block.
        enabled: bool,
        /// Body nodes.
        body: NodeList,
    },
    /// A tag from a loaded library.
    Custom(Box<dyn TagNode>),
}

impl Node {
    fn render(&self, context: &mut Context, renderer: &dyn TemplateRenderer) -> TagkitResult<String> {
        match self {
            Self::Text(text) => Ok(text.clone()),
            Self::Variable(expr) => Ok(render_value(&expr.resolve(context)?, context)),
            Self::If { branches } => {
                for (condition, body) in branches {
                    if condition.evaluate(context)? {
                        return body.render(context, renderer);
                    }
                }
                Ok(String::new())
            }
            Self::For {
                loop_vars,
                iterable,
                reversed,
                body,
                empty,
            } => render_for(loop_vars, iterable, *reversed, body, empty, context, renderer),
            Self::With { assignments, body } => {
                let values = resolve_assignments(assignments, context)?;
                context.push();
                for (key, value) in values {
                    context.set(key, value);
                }
                let result = body.render(context, renderer);
                context.pop();
                result
            }
            Self::Include {
                template,
                extra,
                only,
            } => {
                let name = template.resolve(context)?.to_display_string();
                let values = resolve_assignments(extra, context)?;
                if *only {
                    let mut isolated = Context::new();
                    isolated.set_auto_escape(context.auto_escape());
                    for (key, value) in values {
                        isolated.set(key, value);
                    }
                    renderer.render_template(&name, &mut isolated)
                } else {
                    context.push();
                    for (key, value) in values {
                        context.set(key, value);
                    }
                    let result = renderer.render_template(&name, context);
                    context.pop();
                    result
                }
            }
            Self::Autoescape { enabled, body } => {
                let saved = context.auto_escape();
                context.set_auto_escape(*enabled);
                let result = body.render(context, renderer);
                context.set_auto_escape(saved);
                result
            }
            Self::Custom(tag) => tag.render(context, renderer),
        }
    }
}

fn resolve_assignments(
    assignments: &[(String, FilterExpression)],
    context: &Context,
) -> TagkitResult<Vec<(String, ContextValue)>> {
    assignments
        .iter()
        .map(|(key, expr)| Ok((key.clone(), expr.resolve(context)?)))
        .collect()
}

/// Converts a value to output text, escaping it when autoescaping is on
/// and the value is not safe.
pub fn render_value(value: &ContextValue, context: &Context) -> String {
    if context.auto_escape() && !value.is_safe() {
        escape_html(&value.to_display_string())
    } else {
        value.to_display_string()
    }
}

fn render_for(
    loop_vars: &[String],
    iterable: &FilterExpression,
    reversed: bool,
    body: &NodeList,
    empty: &NodeList,
    context: &mut Context,
    renderer: &dyn TemplateRenderer,
) -> TagkitResult<String> {
    let source = iterable.resolve(context)?;
    // A single loop variable over a stored list writes its changes back to
    // that list.
    let write_back = match (iterable.var_name(), loop_vars, &source) {
        (Some(path), [var], ContextValue::List(_)) => Some((path, var.as_str())),
        _ => None,
    };
    let mut items = source.iter_values()?;
    if items.is_empty() {
        return empty.render(context, renderer);
    }
    if reversed {
        items.reverse();
    }

    let total = items.len();
    let parent_loop = context.get("forloop").map(std::borrow::Cow::into_owned);
    let mut output = String::new();

    for (idx, item) in items.into_iter().enumerate() {
        context.push();
        let result = bind_loop_vars(loop_vars, item, context).and_then(|()| {
            let mut forloop = IndexMap::new();
            forloop.insert("counter".to_string(), ContextValue::from(idx + 1));
            forloop.insert("counter0".to_string(), ContextValue::from(idx));
            forloop.insert("revcounter".to_string(), ContextValue::from(total - idx));
            forloop.insert("revcounter0".to_string(), ContextValue::from(total - idx - 1));
            forloop.insert("first".to_string(), ContextValue::Bool(idx == 0));
            forloop.insert("last".to_string(), ContextValue::Bool(idx == total - 1));
            if let Some(parent) = &parent_loop {
                forloop.insert("parentloop".to_string(), parent.clone());
            }
            context.set("forloop", ContextValue::Dict(forloop));
            body.render(context, renderer)
        });
        let updated = write_back.and_then(|(_, var)| context.get(var).map(std::borrow::Cow::into_owned));
        context.pop();
        output.push_str(&result?);

        if let (Some((path, _)), Some(updated)) = (write_back, updated) {
            let index = if reversed { total - 1 - idx } else { idx };
            if let Some(ContextValue::List(stored)) = context.get_mut(path) {
                if let Some(slot) = stored.get_mut(index) {
                    *slot = updated;
                }
            }
        }
    }

    Ok(output)
}

fn bind_loop_vars(loop_vars: &[String], item: ContextValue, context: &mut Context) -> TagkitResult<()> {
    if let [var] = loop_vars {
        context.set(var.as_str(), item);
        return Ok(());
    }
    match item {
        ContextValue::List(values) if values.len() == loop_vars.len() => {
            for (var, value) in loop_vars.iter().zip(values) {
                context.set(var.as_str(), value);
            }
            Ok(())
        }
        other => Err(TagkitError::ValueError(format!(
            "Need {} values to unpack in for loop; got {}.",
            loop_vars.len(),
            other.len().unwrap_or(1)
        ))),
    }
}

/// A sequence of nodes rendered in order.
#[derive(Debug, Default)]
pub struct NodeList(Vec<Node>);

impl NodeList {
    /// Renders every node and concatenates the output.
    pub fn render(&self, context: &mut Context, renderer: &dyn TemplateRenderer) -> TagkitResult<String> {
        let mut output = String::new();
        for node in &self.0 {
            output.push_str(&node.render(context, renderer)?);
        }
        Ok(output)
    }

    /// Returns the nodes.
    pub fn nodes(&self) -> &[Node] {
        &self.0
    }

    /// Returns the number of nodes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no nodes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A condition in an `{% if %}` branch.
#[derive(Debug, Clone)]
pub enum IfCondition {
    /// A truthiness test.
    Expr(FilterExpression),
    /// Negation of a condition.
    Not(Box<IfCondition>),
    /// Logical AND of two conditions.
    And(Box<IfCondition>, Box<IfCondition>),
    /// Logical OR of two conditions.
    Or(Box<IfCondition>, Box<IfCondition>),
    /// Comparison: `==`, `!=`, `<`, `>`, `<=`, `>=`.
    Compare(FilterExpression, String, FilterExpression),
    /// `in` operator.
    In(FilterExpression, FilterExpression),
    /// `not in` operator.
    NotIn(FilterExpression, FilterExpression),
    /// The `else` clause (always true).
    Else,
}

impl IfCondition {
    /// Evaluates this condition against a context.
    pub fn evaluate(&self, context: &Context) -> TagkitResult<bool> {
        Ok(match self {
            Self::Expr(expr) => expr.resolve(context)?.is_truthy(),
            Self::Not(inner) => !inner.evaluate(context)?,
            Self::And(left, right) => left.evaluate(context)? && right.evaluate(context)?,
            Self::Or(left, right) => left.evaluate(context)? || right.evaluate(context)?,
            Self::Compare(left, op, right) => {
                compare_values(&left.resolve(context)?, op, &right.resolve(context)?)
            }
            Self::In(needle, haystack) => {
                value_in(&needle.resolve(context)?, &haystack.resolve(context)?)
            }
            Self::NotIn(needle, haystack) => {
                !value_in(&needle.resolve(context)?, &haystack.resolve(context)?)
            }
            Self::Else => true,
        })
    }
}

fn value_in(needle: &ContextValue, haystack: &ContextValue) -> bool {
    match haystack {
        ContextValue::List(items) => items.contains(needle),
        ContextValue::QuerySet(_) => haystack
            .iter_values()
            .is_ok_and(|items| items.contains(needle)),
        ContextValue::String(s) | ContextValue::SafeString(s) => {
            needle.as_str().is_some_and(|n| s.contains(n))
        }
        ContextValue::Dict(map) => needle.as_str().is_some_and(|key| map.contains_key(key)),
        _ => false,
    }
}

fn compare_values(left: &ContextValue, op: &str, right: &ContextValue) -> bool {
    match op {
        "==" => left == right,
        "!=" => left != right,
        _ => {
            let ordering = match (left.as_float(), right.as_float()) {
                (Some(l), Some(r)) => l.partial_cmp(&r),
                _ => Some(left.to_display_string().cmp(&right.to_display_string())),
            };
            ordering.is_some_and(|o| match op {
                "<" => o.is_lt(),
                ">" => o.is_gt(),
                "<=" => o.is_le(),
                ">=" => o.is_ge(),
                _ => false,
            })
        }
    }
}

/// A parsed template.
#[derive(Debug)]
pub struct Template {
    name: String,
    nodes: NodeList,
}

impl Template {
    /// Returns the template name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the top-level nodes.
    pub const fn nodes(&self) -> &NodeList {
        &self.nodes
    }

    /// Renders the template inside a `render` tracing span.
    pub fn render(&self, context: &mut Context, renderer: &dyn TemplateRenderer) -> TagkitResult<String> {
        let _span = render_span(&self.name).entered();
        self.nodes.render(context, renderer)
    }
}

/// Tokenizes and parses `source`. Libraries named in `{% load %}` are
/// looked up in `libraries`.
///
/// # Errors
///
/// Returns `TemplateSyntaxError` (or `ArgumentRequired` from a library tag)
/// for malformed templates.
pub fn parse(name: &str, source: &str, libraries: &LibraryRegistry) -> TagkitResult<Template> {
    let tokens = lexer::tokenize(source)?;
    let mut parser = Parser::new(tokens, libraries);
    let nodes = parser.parse_until(&[])?;
    Ok(Template {
        name: name.to_string(),
        nodes,
    })
}

/// Compiles tokens into nodes.
///
/// Starts with the built-in filters and tags; `{% load %}` adds the filters
/// and tags of a library for the rest of the template.
pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    libraries: &'a LibraryRegistry,
    filters: HashMap<String, Arc<dyn Filter>>,
    tags: HashMap<String, TagCompileFn>,
}

impl<'a> Parser<'a> {
    /// Creates a parser over `tokens`.
    pub fn new(tokens: Vec<Token>, libraries: &'a LibraryRegistry) -> Self {
        let filters = filters::builtins()
            .iter()
            .map(|(name, filter)| (name.to_string(), Arc::clone(filter)))
            .collect();
        Self {
            tokens,
            pos: 0,
            libraries,
            filters,
            tags: HashMap::new(),
        }
    }

    /// Parses nodes until a block tag named in `end_tags` is reached. The
    /// end tag is left in place; consume it with [`Parser::next_block`].
    ///
    /// With an empty `end_tags`, parses to the end of input.
    pub fn parse_until(&mut self, end_tags: &[&str]) -> TagkitResult<NodeList> {
        let mut nodes = Vec::new();

        while let Some(token) = self.tokens.get(self.pos) {
            match token {
                Token::Text(text) => nodes.push(Node::Text(text.clone())),
                Token::Comment(_) => {}
                Token::Variable(expr) => nodes.push(Node::Variable(self.compile_filter(expr)?)),
                Token::Block(block) => {
                    if end_tags.contains(&block.name.as_str()) {
                        return Ok(NodeList(nodes));
                    }
                    let block = block.clone();
                    self.pos += 1;
                    if let Some(node) = self.parse_block(&block)? {
                        nodes.push(node);
                    }
                    continue;
                }
            }
            self.pos += 1;
        }

        if end_tags.is_empty() {
            Ok(NodeList(nodes))
        } else {
            Err(TagkitError::TemplateSyntaxError(format!(
                "Unclosed tag. Looking for one of: {}.",
                end_tags.join(", ")
            )))
        }
    }

    /// Consumes the next token if it is a block tag.
    pub fn next_block(&mut self) -> Option<BlockToken> {
        match self.tokens.get(self.pos) {
            Some(Token::Block(block)) => {
                self.pos += 1;
                Some(block.clone())
            }
            _ => None,
        }
    }

    /// Compiles a filter expression such as `items|join:", "`.
    pub fn compile_filter(&self, source: &str) -> TagkitResult<FilterExpression> {
        let mut parts = split_on_pipes(source).into_iter();
        let base = parts
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| TagkitError::TemplateSyntaxError("Empty variable tag".to_string()))?;
        let expression = Expression::parse(base)?;
        let filters = parts
            .map(|part| self.compile_filter_call(part.trim()))
            .collect::<TagkitResult<Vec<_>>>()?;
        Ok(FilterExpression { expression, filters })
    }

    /// Returns `true` if a filter of this name is visible at this point.
    pub fn has_filter(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    fn compile_filter_call(&self, source: &str) -> TagkitResult<FilterCall> {
        let (name, arg) = match find_filter_colon(source) {
            Some(colon) => (
                source[..colon].trim(),
                Some(Expression::parse(&source[colon + 1..])?),
            ),
            None => (source, None),
        };
        let filter = self
            .filters
            .get(name)
            .cloned()
            .ok_or_else(|| TagkitError::TemplateSyntaxError(format!("Invalid filter: '{name}'")))?;
        match (filter.arity(), &arg) {
            (FilterArity::Required, None) => {
                return Err(TagkitError::TemplateSyntaxError(format!(
                    "{name} requires 2 arguments, 1 provided"
                )))
            }
            (FilterArity::None, Some(_)) => {
                return Err(TagkitError::TemplateSyntaxError(format!(
                    "{name} requires 1 arguments, 2 provided"
                )))
            }
            _ => {}
        }
        Ok(FilterCall {
            name: name.to_string(),
            filter,
            arg,
        })
    }

    fn parse_block(&mut self, token: &BlockToken) -> TagkitResult<Option<Node>> {
        match token.name.as_str() {
            "if" => self.parse_if(token).map(Some),
            "for" => self.parse_for(token).map(Some),
            "with" => self.parse_with(token).map(Some),
            "include" => self.parse_include(token).map(Some),
            "autoescape" => self.parse_autoescape(token).map(Some),
            "comment" => {
                self.skip_past("endcomment")?;
                Ok(None)
            }
            "load" => {
                self.load(token)?;
                Ok(None)
            }
            "" => Err(TagkitError::TemplateSyntaxError("Empty block tag".to_string())),
            name => match self.tags.get(name).copied() {
                Some(compile) => compile(self, token).map(|tag| Some(Node::Custom(tag))),
                None => Err(TagkitError::TemplateSyntaxError(format!(
                    "Invalid block tag: '{name}'. Did you forget to register or load this tag?"
                ))),
            },
        }
    }

    fn parse_if(&mut self, token: &BlockToken) -> TagkitResult<Node> {
        let condition = self.parse_condition(&token.args)?;
        let body = self.parse_until(&["elif", "else", "endif"])?;
        let mut branches = vec![(condition, body)];

        while let Some(next) = self.next_block() {
            match next.name.as_str() {
                "elif" => {
                    let condition = self.parse_condition(&next.args)?;
                    let body = self.parse_until(&["elif", "else", "endif"])?;
                    branches.push((condition, body));
                }
                "else" => {
                    let body = self.parse_until(&["endif"])?;
                    self.next_block();
                    branches.push((IfCondition::Else, body));
                    break;
                }
                _ => break,
            }
        }

        Ok(Node::If { branches })
    }

    fn parse_for(&mut self, token: &BlockToken) -> TagkitResult<Node> {
        let args = &token.args;
        let in_pos = args.iter().position(|a| a == "in").ok_or_else(|| {
            TagkitError::TemplateSyntaxError(format!(
                "'for' statements should use the format 'for x in y': {}",
                token.contents
            ))
        })?;

        let loop_vars: Vec<String> = args[..in_pos]
            .join(" ")
            .split(',')
            .map(|v| v.trim().to_string())
            .collect();
        if loop_vars.iter().any(|v| v.is_empty() || v.contains(char::is_whitespace)) {
            return Err(TagkitError::TemplateSyntaxError(format!(
                "'for' tag received an invalid argument: {}",
                token.contents
            )));
        }

        let mut rest = &args[in_pos + 1..];
        let reversed = rest.last().is_some_and(|a| a == "reversed");
        if reversed {
            rest = &rest[..rest.len() - 1];
        }
        if rest.len() != 1 {
            return Err(TagkitError::TemplateSyntaxError(format!(
                "'for' statements should use the format 'for x in y': {}",
                token.contents
            )));
        }
        let iterable = self.compile_filter(&rest[0])?;

        let body = self.parse_until(&["empty", "endfor"])?;
        let empty = match self.next_block() {
            Some(next) if next.name == "empty" => {
                let empty = self.parse_until(&["endfor"])?;
                self.next_block();
                empty
            }
            _ => NodeList::default(),
        };

        Ok(Node::For {
            loop_vars,
            iterable,
            reversed,
            body,
            empty,
        })
    }

    fn parse_with(&mut self, token: &BlockToken) -> TagkitResult<Node> {
        let assignments = match token.args.as_slice() {
            [value, as_kw, name] if as_kw == "as" => vec![(name.clone(), self.compile_filter(value)?)],
            args => self.parse_assignments(args)?,
        };
        if assignments.is_empty() {
            return Err(TagkitError::TemplateSyntaxError(
                "'with' expected at least one variable assignment".to_string(),
            ));
        }
        let body = self.parse_until(&["endwith"])?;
        self.next_block();
        Ok(Node::With { assignments, body })
    }

    fn parse_assignments(&self, args: &[String]) -> TagkitResult<Vec<(String, FilterExpression)>> {
        args.iter()
            .map(|arg| match arg.split_once('=') {
                Some((key, value)) if !key.is_empty() => {
                    Ok((key.to_string(), self.compile_filter(value)?))
                }
                _ => Err(TagkitError::TemplateSyntaxError(format!(
                    "Invalid assignment: '{arg}'"
                ))),
            })
            .collect()
    }

    fn parse_include(&self, token: &BlockToken) -> TagkitResult<Node> {
        let (first, rest) = token.args.split_first().ok_or_else(|| {
            TagkitError::TemplateSyntaxError(
                "'include' tag takes at least one argument: the name of the template to be included."
                    .to_string(),
            )
        })?;
        let template = self.compile_filter(first)?;

        let mut extra = Vec::new();
        let mut only = false;
        let mut remaining = rest;
        while let Some((option, tail)) = remaining.split_first() {
            match option.as_str() {
                "only" => {
                    only = true;
                    remaining = tail;
                }
                "with" => {
                    let end = tail.iter().position(|a| a == "only").unwrap_or(tail.len());
                    extra = self.parse_assignments(&tail[..end])?;
                    remaining = &tail[end..];
                }
                other => {
                    return Err(TagkitError::TemplateSyntaxError(format!(
                        "Unknown argument for 'include' tag: '{other}'."
                    )))
                }
            }
        }

        Ok(Node::Include {
            template,
            extra,
            only,
        })
    }

    fn parse_autoescape(&mut self, token: &BlockToken) -> TagkitResult<Node> {
        let enabled = match token.args.as_slice() {
            [arg] if arg == "on" => true,
            [arg] if arg == "off" => false,
            _ => {
                return Err(TagkitError::TemplateSyntaxError(
                    "'autoescape' argument should be 'on' or 'off'".to_string(),
                ))
            }
        };
        let body = self.parse_until(&["endautoescape"])?;
        self.next_block();
        Ok(Node::Autoescape { enabled, body })
    }

    /// Skips raw tokens up to and including the block tag `end`.
    fn skip_past(&mut self, end: &str) -> TagkitResult<()> {
        while let Some(token) = self.tokens.get(self.pos) {
            self.pos += 1;
            if matches!(token, Token::Block(block) if block.name == end) {
                return Ok(());
            }
        }
        Err(TagkitError::TemplateSyntaxError(format!(
            "Unclosed tag. Looking for one of: {end}."
        )))
    }

    fn library(&self, name: &str) -> TagkitResult<&'a Library> {
        let libraries: &'a LibraryRegistry = self.libraries;
        libraries.get(name).ok_or_else(|| {
            TagkitError::TemplateSyntaxError(format!(
                "'{name}' is not a registered tag library. Must be one of:\n{}",
                libraries.names().join("\n")
            ))
        })
    }

    /// `{% load lib1 lib2 %}` or `{% load name1 name2 from lib %}`.
    fn load(&mut self, token: &BlockToken) -> TagkitResult<()> {
        match token.args.as_slice() {
            [] => Err(TagkitError::TemplateSyntaxError(
                "'load' tag requires at least one library name".to_string(),
            )),
            [names @ .., from, lib_name] if from == "from" && !names.is_empty() => {
                let lib = self.library(lib_name)?;
                for name in names {
                    let filter = lib.filter(name);
                    let tag = lib.tag(name);
                    if filter.is_none() && tag.is_none() {
                        return Err(TagkitError::TemplateSyntaxError(format!(
                            "'{name}' is not a valid tag or filter in tag library '{lib_name}'"
                        )));
                    }
                    if let Some(filter) = filter {
                        self.filters.insert(name.clone(), filter);
                    }
                    if let Some(tag) = tag {
                        self.tags.insert(name.clone(), tag);
                    }
                }
                Ok(())
            }
            names => {
                for name in names {
                    let lib = self.library(name)?;
                    self.filters
                        .extend(lib.filters().map(|(n, f)| (n.to_string(), Arc::clone(f))));
                    self.tags.extend(lib.tags().map(|(n, t)| (n.to_string(), t)));
                    tracing::debug!(library = %name, "loaded template library");
                }
                Ok(())
            }
        }
    }

    fn parse_condition(&self, args: &[String]) -> TagkitResult<IfCondition> {
        if args.is_empty() {
            return Err(TagkitError::TemplateSyntaxError(
                "'if' statement requires at least one argument".to_string(),
            ));
        }
        let mut pos = 0;
        let condition = self.parse_or(args, &mut pos)?;
        match args.get(pos) {
            None => Ok(condition),
            Some(extra) => Err(TagkitError::TemplateSyntaxError(format!(
                "Unused '{extra}' at end of if expression."
            ))),
        }
    }

    fn parse_or(&self, args: &[String], pos: &mut usize) -> TagkitResult<IfCondition> {
        let left = self.parse_and(args, pos)?;
        if args.get(*pos).is_some_and(|a| a == "or") {
            *pos += 1;
            let right = self.parse_or(args, pos)?;
            Ok(IfCondition::Or(Box::new(left), Box::new(right)))
        } else {
            Ok(left)
        }
    }

    fn parse_and(&self, args: &[String], pos: &mut usize) -> TagkitResult<IfCondition> {
        let left = self.parse_not(args, pos)?;
        if args.get(*pos).is_some_and(|a| a == "and") {
            *pos += 1;
            let right = self.parse_and(args, pos)?;
            Ok(IfCondition::And(Box::new(left), Box::new(right)))
        } else {
            Ok(left)
        }
    }

    fn parse_not(&self, args: &[String], pos: &mut usize) -> TagkitResult<IfCondition> {
        if args.get(*pos).is_some_and(|a| a == "not") {
            *pos += 1;
            let inner = self.parse_not(args, pos)?;
            Ok(IfCondition::Not(Box::new(inner)))
        } else {
            self.parse_comparison(args, pos)
        }
    }

    fn parse_comparison(&self, args: &[String], pos: &mut usize) -> TagkitResult<IfCondition> {
        let left = self.operand(args, pos)?;
        let Some(op) = args.get(*pos) else {
            return Ok(IfCondition::Expr(left));
        };
        match op.as_str() {
            "==" | "!=" | "<" | ">" | "<=" | ">=" => {
                *pos += 1;
                let right = self.operand(args, pos)?;
                Ok(IfCondition::Compare(left, op.clone(), right))
            }
            "in" => {
                *pos += 1;
                Ok(IfCondition::In(left, self.operand(args, pos)?))
            }
            "not" if args.get(*pos + 1).is_some_and(|a| a == "in") => {
                *pos += 2;
                Ok(IfCondition::NotIn(left, self.operand(args, pos)?))
            }
            _ => Ok(IfCondition::Expr(left)),
        }
    }

    fn operand(&self, args: &[String], pos: &mut usize) -> TagkitResult<FilterExpression> {
        let arg = args.get(*pos).ok_or_else(|| {
            TagkitError::TemplateSyntaxError("Unexpected end of expression in if tag.".to_string())
        })?;
        *pos += 1;
        self.compile_filter(arg)
    }
}

/// Returns `true` if `s` is wrapped in matching single or double quotes.
pub fn is_quoted(s: &str) -> bool {
    s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
}

/// Strips surrounding quotes from a string.
pub fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    if is_quoted(s) {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

/// Splits on `|` outside quotes.
fn split_on_pipes(s: &str) -> Vec<&str> {
    let mut result = Vec::new();
    let mut start = 0;
    let mut quote: Option<char> = None;

    for (i, ch) in s.char_indices() {
        match (quote, ch) {
            (None, '\'' | '"') => quote = Some(ch),
            (Some(q), _) if q == ch => quote = None,
            (None, '|') => {
                result.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    result.push(&s[start..]);
    result
}

/// Finds the first colon that is not inside quotes.
fn find_filter_colon(s: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, ch) in s.char_indices() {
        match (quote, ch) {
            (None, '\'' | '"') => quote = Some(ch),
            (Some(q), _) if q == ch => quote = None,
            (None, ':') => return Some(i),
            _ => {}
        }
    }
    None
}
