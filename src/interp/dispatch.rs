//! From a submitted line to a running handler.
//!
//! `parse_line` does everything that can fail locally (tokenize, drop noise,
//! look up, bind); `dispatch` runs the handler's synchronous part and hands
//! back whatever it left to finish later.

use std::future::Future;

use futures::future::{FutureExt, LocalBoxFuture};
use tracing::debug;

use super::context::InvocationContext;
use crate::cmd::binder::{self, BoundArgs, ParseError, bind};
use crate::cmd::definition::CommandDefinition;
use crate::cmd::registry::CommandRegistry;
use crate::lexer::{self, filter_noise, tokenize};

/// Work a handler left running, such as a remote call and the output that
/// follows its reply.
pub type Continuation = LocalBoxFuture<'static, ()>;

pub trait Handler {
    fn execute(&self, cx: InvocationContext) -> Option<Continuation>;
}

impl<F> Handler for F
where
    F: Fn(InvocationContext) -> Option<Continuation>,
{
    fn execute(&self, cx: InvocationContext) -> Option<Continuation> {
        self(cx)
    }
}

/// Wraps a handler's asynchronous tail.
pub fn deferred(fut: impl Future<Output = ()> + 'static) -> Option<Continuation> {
    Some(fut.boxed_local())
}

/// A line resolved to its command and bound arguments.
#[derive(Debug)]
pub struct ParsedLine {
    pub def: CommandDefinition,
    pub args: BoundArgs,
}

/// `Ok(None)` for a line with no tokens.
pub fn parse_line(registry: &CommandRegistry, line: &str, cwd: &str) -> Result<Option<ParsedLine>, ParseError> {
    let tokens = filter_noise(tokenize(line));
    let Some((head, rest)) = tokens.split_first() else {
        return Ok(None);
    };
    if head.is_unterminated() {
        return Err(ParseError::UnterminatedQuote(head.text()));
    }
    let name = head.text();
    if name.is_empty() {
        return Ok(None);
    }
    let def = registry
        .lookup(&name)
        .ok_or_else(|| ParseError::UnknownCommand(name.clone()))?;
    let args = bind(def, rest, cwd)?;
    Ok(Some(ParsedLine {
        def: def.clone(),
        args,
    }))
}

pub fn dispatch(def: &CommandDefinition, cx: InvocationContext) -> Option<Continuation> {
    debug!(
        command = %def.name,
        args = %lexer::render(&binder::render(def, &cx.args)),
        "dispatch"
    );
    def.handler.execute(cx)
}
