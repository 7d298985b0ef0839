//! Noise filter: drops parenthesized hint spans inserted by completion.
//!
//! Completion prompts for the next argument by inserting `(hint) ` at the
//! cursor. A hint the user typed past is replaced by the value that follows
//! it. A hint followed by another hint, or by the end of the line, was never
//! answered and leaves an empty placeholder so positional counting still
//! sees the skipped slot.
//!
//! A hint right after an empty `name=` belongs to that named slot: its answer
//! becomes the named value, and an unanswered one leaves the value empty.

use super::Token;

/// The argument slot a hint span stands for.
#[derive(Clone, Copy)]
enum Slot {
    Positional,
    /// Index in the output of the `name=` token waiting for a value.
    Named(usize),
}

pub fn filter_noise(tokens: Vec<Token>) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    let mut depth = 0usize;
    let mut span = Slot::Positional;
    let mut closed: Option<Slot> = None;
    let mut named_open = false;

    for tok in tokens {
        if depth > 0 {
            if tok.is_punct('(') {
                depth += 1;
            } else if tok.is_punct(')') {
                depth -= 1;
                if depth == 0 {
                    closed = Some(span);
                }
            }
            continue;
        }

        if tok.is_punct('(') {
            if let Some(prev) = closed.take() {
                unanswered(&mut out, prev);
            }
            span = if named_open {
                Slot::Named(out.len() - 1)
            } else {
                Slot::Positional
            };
            named_open = false;
            depth = 1;
            continue;
        }

        if let Some(Slot::Named(at)) = closed.take()
            && !matches!(tok, Token::Named { .. } | Token::Punct(_))
            && let Some(Token::Named { value, .. }) = out.get_mut(at)
        {
            **value = tok;
            continue;
        }
        named_open = matches!(&tok, Token::Named { value, .. } if value.is_placeholder());
        out.push(tok);
    }

    if depth > 0 {
        unanswered(&mut out, span);
    } else if let Some(prev) = closed {
        unanswered(&mut out, prev);
    }
    out
}

/// A named slot already holds its empty value; a positional one needs a
/// placeholder.
fn unanswered(out: &mut Vec<Token>, slot: Slot) {
    if let Slot::Positional = slot {
        out.push(Token::placeholder());
    }
}
