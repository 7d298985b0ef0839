/*!
Line lexer for the command language.

A submitted line is scanned left to right into a flat list of [`Token`]s:

  ls /home/alice folder
  mkuser bob "s3cret pw" group=/groups/staff
  adduser /groups/staff [alice bob 'carol d']

Rules (tried at each scan position, whitespace between tokens is skipped):
  - a maximal run of characters other than whitespace, quotes and the
    reserved set `= ) ( [ ] { }`                        -> `Word`
  - a `'` or `"` quoted run with backslash escapes       -> `Quoted`
  - one reserved character                               -> `Punct`
  - a `Word` immediately followed by `=` absorbs the next token as its
    value                                                -> `Named`

When `name=` ends the line (or only whitespace follows), the raw remainder
becomes the value verbatim and scanning stops. This is what a half-typed
`name=` looks like while the user is asking for completion. When another
reserved character follows, as in `path=(file path)` after completion
inserted a hint, the value is an empty placeholder and scanning goes on, so
the noise filter can fold the hint's answer into it.

[`scan`] also reports where each token came from, for completion.

Bracket lists are single level only; `[` and `]` are plain `Punct` tokens and
the binder gives them meaning.
*/

pub mod noise;

pub use noise::filter_noise;

use std::fmt;
use std::ops::Range;

/// Characters that always form a token of their own.
pub const RESERVED: &[char] = &['=', ')', '(', '[', ']', '{', '}'];

/// Word text that stands for "this slot was skipped".
pub const SKIP_MARKER: &str = "-";

/// A quoted run of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotedString {
    /// Content with escapes resolved.
    pub text: String,
    /// The opening quote character (`'` or `"`).
    pub quote: char,
    /// Input ended (or a newline was hit) before the closing quote.
    pub unterminated: bool,
}

impl QuotedString {
    pub fn new(text: impl Into<String>, quote: char) -> Self {
        Self {
            text: text.into(),
            quote,
            unterminated: false,
        }
    }
}

/// One lexical unit of a command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Word(String),
    Quoted(QuotedString),
    /// `name=value`; the value is a `Word`, a `Quoted`, or `Punct('[')`.
    Named { name: String, value: Box<Token> },
    Punct(char),
}

impl Token {
    pub fn word(text: impl Into<String>) -> Self {
        Token::Word(text.into())
    }

    pub fn quoted(text: impl Into<String>, quote: char) -> Self {
        Token::Quoted(QuotedString::new(text, quote))
    }

    pub fn named(name: impl Into<String>, value: Token) -> Self {
        Token::Named {
            name: name.into(),
            value: Box::new(value),
        }
    }

    /// Empty placeholder produced by the noise filter.
    pub fn placeholder() -> Self {
        Token::Word(String::new())
    }

    /// True for an empty word or the explicit skip marker `-`.
    /// Quoted strings are never placeholders, so `""` binds an empty value.
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Token::Word(w) if w.is_empty() || w == SKIP_MARKER)
    }

    pub fn is_punct(&self, c: char) -> bool {
        matches!(self, Token::Punct(p) if *p == c)
    }

    /// The textual value a converter sees.
    pub fn text(&self) -> String {
        match self {
            Token::Word(w) => w.clone(),
            Token::Quoted(q) => q.text.clone(),
            Token::Named { value, .. } => value.text(),
            Token::Punct(c) => c.to_string(),
        }
    }

    /// Whether this token (or a named token's value) is an unterminated quote.
    pub fn is_unterminated(&self) -> bool {
        match self {
            Token::Quoted(q) => q.unterminated,
            Token::Named { value, .. } => value.is_unterminated(),
            _ => false,
        }
    }
}

impl fmt::Display for Token {
    /// Renders the token back into line syntax.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(w) => f.write_str(w),
            Token::Quoted(q) => f.write_str(&quote(&q.text, q.quote)),
            Token::Named { name, value } => write!(f, "{name}={value}"),
            Token::Punct(c) => write!(f, "{c}"),
        }
    }
}

/* ---- Scanning ---- */

fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && c != '\'' && c != '"' && !RESERVED.contains(&c)
}

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
    }

    fn word(&mut self) -> String {
        let rest = self.rest();
        let end = rest.find(|c: char| !is_word_char(c)).unwrap_or(rest.len());
        self.pos += end;
        rest[..end].to_string()
    }

    /// Consumes a quoted run starting at the current quote character.
    fn quoted(&mut self, quote: char) -> QuotedString {
        let mut text = String::new();
        let mut chars = self.rest().char_indices();
        chars.next();
        let mut escaped = false;
        let mut consumed = self.rest().len();
        let mut terminated = false;

        for (i, c) in chars {
            if escaped {
                escaped = false;
                match c {
                    'b' => text.push('\u{8}'),
                    'f' => text.push('\u{c}'),
                    'n' => text.push('\n'),
                    't' => text.push('\t'),
                    '\\' | '\'' | '"' => text.push(c),
                    '\n' | '\r' => {
                        text.push('\\');
                        consumed = i;
                        break;
                    }
                    other => {
                        text.push('\\');
                        text.push(other);
                    }
                }
                continue;
            }
            match c {
                '\\' => escaped = true,
                '\n' | '\r' => {
                    // newline is left for the whitespace skipper
                    consumed = i;
                    break;
                }
                c if c == quote => {
                    consumed = i + c.len_utf8();
                    terminated = true;
                    break;
                }
                c => text.push(c),
            }
        }
        if escaped && !terminated && consumed == self.rest().len() {
            text.push('\\');
        }

        self.pos += consumed;
        QuotedString {
            text,
            quote,
            unterminated: !terminated,
        }
    }

    fn punct(&mut self) -> char {
        let c = self.peek().unwrap_or(' ');
        self.pos += c.len_utf8();
        c
    }
}

/// A token and the byte range of the line it was scanned from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    pub token: Token,
    pub span: Range<usize>,
}

/// Splits a raw line into tokens. Never fails; lexical problems such as an
/// unterminated quote are carried on the tokens themselves.
pub fn tokenize(line: &str) -> Vec<Token> {
    scan(line).into_iter().map(|s| s.token).collect()
}

/// [`tokenize`], keeping each token's span. A raw-remainder value is not
/// part of its span, which ends right after the `=`.
pub fn scan(line: &str) -> Vec<Spanned> {
    let mut scan = Scanner { src: line, pos: 0 };
    let mut tokens = Vec::new();

    loop {
        scan.skip_ws();
        let start = scan.pos;
        let Some(c) = scan.peek() else { break };

        let token = if c == '\'' || c == '"' {
            Token::Quoted(scan.quoted(c))
        } else if RESERVED.contains(&c) {
            Token::Punct(scan.punct())
        } else {
            let word = scan.word();
            if scan.peek() != Some('=') {
                Token::Word(word)
            } else {
                // name=value
                scan.pos += 1;
                match scan.peek() {
                    Some(q @ ('\'' | '"')) => Token::named(word, Token::Quoted(scan.quoted(q))),
                    Some('[') => {
                        scan.pos += 1;
                        Token::named(word, Token::Punct('['))
                    }
                    Some(v) if is_word_char(v) => Token::named(word, Token::Word(scan.word())),
                    _ if scan.rest().trim().is_empty() => {
                        let raw = scan.rest().to_string();
                        tokens.push(Spanned {
                            token: Token::named(word, Token::quoted(raw, '"')),
                            span: start..scan.pos,
                        });
                        break;
                    }
                    _ => Token::named(word, Token::placeholder()),
                }
            }
        };
        tokens.push(Spanned {
            token,
            span: start..scan.pos,
        });
    }

    tokens
}

/* ---- Rendering ---- */

/// Quotes `text` with `quote`, escaping what the scanner unescapes.
pub fn quote(text: &str, quote: char) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push(quote);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\r' => out.push('\r'),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Renders `text` as a bare word when it would scan back as one word,
/// otherwise as a double-quoted string.
pub fn word_or_quoted(text: &str) -> Token {
    if !text.is_empty() && text != SKIP_MARKER && text.chars().all(is_word_char) {
        Token::word(text)
    } else {
        Token::quoted(text, '"')
    }
}

/// Detokenizes a token list into one line.
pub fn render(tokens: &[Token]) -> String {
    let mut out = String::new();
    for (i, tok) in tokens.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&tok.to_string());
    }
    out
}
