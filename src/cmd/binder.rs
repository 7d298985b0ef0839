/*!
Argument binder.

Binds the tokens that follow a command name against the command's ordered
argument schema:

  mkgroup /groups/staff "Staff accounts"
  ls folder=folder path=/home
  adduser /groups/staff [alice bob]
  adduser users=[alice bob] group=/groups/staff

Binding walks `(argument index, token index)` recursively and stops at the
first error; a partial result is never returned. A named token re-targets the
walk to the argument it names, and positional binding resumes at the argument
after it. An empty placeholder or `-` skips an optional argument, positionally
or as a named value.
*/

use std::collections::BTreeMap;

use thiserror::Error;

use super::definition::{ArgumentDefinition, CommandDefinition, ValueKind};
use super::path::full_path;
use crate::lexer::{self, Token};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    #[error("unterminated quoted string: {0}")]
    UnterminatedQuote(String),
    #[error("{command} takes only {max} arguments.")]
    TooManyArguments { command: String, max: usize },
    #[error("missing required argument {0}")]
    MissingRequiredArgument(String),
    #[error("unknown argument {0}")]
    UnknownArgument(String),
    #[error("argument {0} is given more than once")]
    DuplicateArgument(String),
    #[error("invalid boolean for {argument}: {text}")]
    InvalidBoolean { argument: String, text: String },
    #[error("invalid number for {argument}: {text}")]
    InvalidInteger { argument: String, text: String },
    #[error("unrecognized argument: {text}")]
    InvalidLiteral { argument: String, text: String },
    #[error("invalid key:value pair for {argument}: {text}")]
    InvalidPair { argument: String, text: String },
    #[error("unexpected '{text}' for argument {argument}")]
    UnexpectedToken { argument: String, text: String },
}

/// A converted argument value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundValue {
    Str(String),
    Bool(bool),
    Int(i64),
    Pair { key: String, value: String },
    List(Vec<BoundValue>),
}

impl BoundValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            BoundValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Argument name to value. Unset optional arguments are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundArgs(BTreeMap<String, BoundValue>);

impl BoundArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: BoundValue) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&BoundValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(BoundValue::as_str)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.get(name) {
            Some(BoundValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// True when a literal or boolean argument is present and set.
    pub fn flag(&self, name: &str) -> bool {
        self.bool(name).unwrap_or(false)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.get(name) {
            Some(BoundValue::Int(n)) => Some(*n),
            _ => None,
        }
    }

    /// String items of a list argument; empty when unset.
    pub fn strings(&self, name: &str) -> Vec<String> {
        match self.get(name) {
            Some(BoundValue::List(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(BoundValue::Str(s)) => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    /// `key:value` items of a list argument; empty when unset.
    pub fn pairs(&self, name: &str) -> Vec<(String, String)> {
        let items = match self.get(name) {
            Some(BoundValue::List(items)) => items.as_slice(),
            Some(single) => std::slice::from_ref(single),
            None => &[],
        };
        items
            .iter()
            .filter_map(|v| match v {
                BoundValue::Pair { key, value } => Some((key.clone(), value.clone())),
                _ => None,
            })
            .collect()
    }
}

/* ---- Binding ---- */

/// Binds `tokens` (the noise-filtered tokens after the command name) to the
/// arguments of `def`. `cwd` is used to normalize `FILE` arguments.
pub fn bind(def: &CommandDefinition, tokens: &[Token], cwd: &str) -> Result<BoundArgs, ParseError> {
    if let Some(bad) = tokens.iter().find(|t| t.is_unterminated()) {
        return Err(ParseError::UnterminatedQuote(bad.text()));
    }
    let mut binder = Binder {
        def,
        tokens,
        cwd,
        bound: BoundArgs::new(),
    };
    binder.step(0, 0)?;
    Ok(binder.bound)
}

struct Binder<'a> {
    def: &'a CommandDefinition,
    tokens: &'a [Token],
    cwd: &'a str,
    bound: BoundArgs,
}

impl Binder<'_> {
    fn step(&mut self, arg: usize, tok: usize) -> Result<(), ParseError> {
        let (def, tokens) = (self.def, self.tokens);
        let Some(token) = tokens.get(tok) else {
            return self.finish();
        };

        if let Token::Named { name, value } = token {
            let idx = def
                .arg_index(name)
                .ok_or_else(|| ParseError::UnknownArgument(name.clone()))?;
            if self.bound.contains(name) {
                return Err(ParseError::DuplicateArgument(name.clone()));
            }
            // `name=` whose hint was never answered
            if value.is_placeholder() {
                return self.step(idx + 1, tok + 1);
            }
            let next = self.bind_value(&def.args[idx], value, tok)?;
            return self.step(idx + 1, next);
        }

        let Some(arg_def) = def.args.get(arg) else {
            return Err(ParseError::TooManyArguments {
                command: def.name.clone(),
                max: def.args.len(),
            });
        };

        if arg_def.is_keyword_only() || self.bound.contains(&arg_def.name) {
            return self.step(arg + 1, tok);
        }

        if token.is_placeholder() {
            if !arg_def.is_optional() {
                return Err(ParseError::MissingRequiredArgument(arg_def.name.clone()));
            }
            return self.step(arg + 1, tok + 1);
        }

        let next = self.bind_value(arg_def, token, tok)?;
        self.step(arg + 1, next)
    }

    /// Every required argument must have been bound, positionally or by name.
    fn finish(&self) -> Result<(), ParseError> {
        match self
            .def
            .args
            .iter()
            .find(|a| !a.is_optional() && !self.bound.contains(&a.name))
        {
            Some(missing) => Err(ParseError::MissingRequiredArgument(missing.name.clone())),
            None => Ok(()),
        }
    }

    /// Binds `value` (the token at `tok`, or a named token's value) to
    /// `arg_def` and returns the index of the next unconsumed token.
    fn bind_value(
        &mut self,
        arg_def: &ArgumentDefinition,
        value: &Token,
        tok: usize,
    ) -> Result<usize, ParseError> {
        if !value.is_punct('[') {
            let converted = self.convert(arg_def, value)?;
            let stored = if arg_def.is_list() {
                BoundValue::List(vec![converted])
            } else {
                converted
            };
            self.bound.insert(arg_def.name.clone(), stored);
            return Ok(tok + 1);
        }

        if !arg_def.is_list() {
            return Err(unexpected(arg_def, value));
        }

        let tokens = self.tokens;
        let mut items = Vec::new();
        let mut i = tok + 1;
        // end of input closes an open list
        while let Some(item) = tokens.get(i) {
            i += 1;
            if item.is_punct(']') {
                break;
            }
            if item.is_placeholder() {
                continue;
            }
            if matches!(item, Token::Named { .. }) {
                return Err(unexpected(arg_def, item));
            }
            items.push(self.convert(arg_def, item)?);
        }
        self.bound.insert(arg_def.name.clone(), BoundValue::List(items));
        Ok(i)
    }

    fn convert(&self, arg_def: &ArgumentDefinition, token: &Token) -> Result<BoundValue, ParseError> {
        if matches!(token, Token::Punct(_) | Token::Named { .. }) {
            return Err(unexpected(arg_def, token));
        }
        let text = token.text();
        match arg_def.kind {
            ValueKind::String if arg_def.is_file() => Ok(BoundValue::Str(full_path(self.cwd, &text))),
            ValueKind::String => Ok(BoundValue::Str(text)),
            ValueKind::Boolean => parse_bool(&text)
                .map(BoundValue::Bool)
                .ok_or_else(|| ParseError::InvalidBoolean {
                    argument: arg_def.name.clone(),
                    text,
                }),
            ValueKind::Integer => match text.parse::<i64>() {
                Ok(n) => Ok(BoundValue::Int(n)),
                Err(_) => Err(ParseError::InvalidInteger {
                    argument: arg_def.name.clone(),
                    text,
                }),
            },
            ValueKind::Literal => {
                if literal_matches(self.def, arg_def, &text) {
                    Ok(BoundValue::Bool(true))
                } else {
                    Err(ParseError::InvalidLiteral {
                        argument: arg_def.name.clone(),
                        text,
                    })
                }
            }
            ValueKind::Pair => parse_pair(&text).ok_or_else(|| ParseError::InvalidPair {
                argument: arg_def.name.clone(),
                text,
            }),
        }
    }
}

fn unexpected(arg_def: &ArgumentDefinition, token: &Token) -> ParseError {
    ParseError::UnexpectedToken {
        argument: arg_def.name.clone(),
        text: token.to_string(),
    }
}

pub fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "on" | "enable" | "1" => Some(true),
        "false" | "no" | "n" | "off" | "disable" | "0" => Some(false),
        _ => None,
    }
}

fn parse_pair(text: &str) -> Option<BoundValue> {
    let mut parts = text.split(':');
    let (key, value) = (parts.next()?.trim(), parts.next()?.trim());
    if parts.next().is_some() || key.is_empty() {
        return None;
    }
    Some(BoundValue::Pair {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// The argument's own name, or a prefix of it that no other literal
/// argument of the same command also starts with.
fn literal_matches(def: &CommandDefinition, arg_def: &ArgumentDefinition, text: &str) -> bool {
    if text == arg_def.name {
        return true;
    }
    !text.is_empty()
        && arg_def.name.starts_with(text)
        && !def
            .args
            .iter()
            .any(|a| a.name != arg_def.name && a.kind == ValueKind::Literal && a.name.starts_with(text))
}

/* ---- Introspection ---- */

/// Index of the argument the next token would bind to, given the tokens
/// already typed after the command name. Follows the binder's rules: a named
/// token moves the position past the argument it names, a bracketed span
/// counts as one value, and keyword-only arguments are never positional.
///
/// Inside an unclosed `[`, the position is the list argument itself.
pub fn argument_position(def: &CommandDefinition, tokens: &[Token]) -> usize {
    let skip_keyword_only = |mut pos: usize| {
        while def.args.get(pos).is_some_and(ArgumentDefinition::is_keyword_only) {
            pos += 1;
        }
        pos
    };

    let mut pos = skip_keyword_only(0);
    let mut i = 0;
    while i < tokens.len() {
        let (target, opens_list) = match &tokens[i] {
            Token::Named { name, value } => match def.arg_index(name) {
                Some(idx) => (idx, value.is_punct('[')),
                None => {
                    i += 1;
                    continue;
                }
            },
            tok => (pos, tok.is_punct('[')),
        };
        i += 1;
        if opens_list {
            match tokens[i..].iter().position(|t| t.is_punct(']')) {
                Some(close) => i += close + 1,
                None => return target,
            }
        }
        pos = skip_keyword_only(target + 1);
    }
    pos
}

/* ---- Rendering ---- */

/// Renders bound arguments back into line tokens, one `name=value` per
/// argument in schema order; lists render as `name=[ ... ]`.
pub fn render(def: &CommandDefinition, args: &BoundArgs) -> Vec<Token> {
    let mut out = Vec::new();
    for arg_def in &def.args {
        let Some(value) = args.get(&arg_def.name) else {
            continue;
        };
        match value {
            BoundValue::List(items) => {
                out.push(Token::named(arg_def.name.clone(), Token::Punct('[')));
                out.extend(items.iter().map(|v| render_value(arg_def, v)));
                out.push(Token::Punct(']'));
            }
            v => out.push(Token::named(arg_def.name.clone(), render_value(arg_def, v))),
        }
    }
    out
}

fn render_value(arg_def: &ArgumentDefinition, value: &BoundValue) -> Token {
    match value {
        BoundValue::Str(s) => lexer::word_or_quoted(s),
        BoundValue::Bool(_) if arg_def.kind == ValueKind::Literal => Token::word(arg_def.name.clone()),
        BoundValue::Bool(b) => Token::word(b.to_string()),
        BoundValue::Int(n) => Token::word(n.to_string()),
        BoundValue::Pair { key, value } => lexer::word_or_quoted(&format!("{key}:{value}")),
        BoundValue::List(items) => {
            let inner: Vec<String> = items.iter().map(|v| render_value(arg_def, v).to_string()).collect();
            lexer::word_or_quoted(&inner.join(" "))
        }
    }
}
