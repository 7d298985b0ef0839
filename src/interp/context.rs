//! Session state and the per-line invocation context handed to handlers.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;
use tracing::debug;

use super::console::Console;
use crate::cmd::binder::BoundArgs;
use crate::cmd::path::full_path;
use crate::cmd::registry::CommandRegistry;
use crate::remote::{Api, RemoteService, Reply, UNKNOWN_ERROR};

/// Mutable state that outlives a line: working directory, directory stack,
/// exit request. Only the directory commands write `cwd` and `dirstack`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub cwd: String,
    pub dirstack: Vec<String>,
    pub home: String,
    pub exit_requested: bool,
}

impl Session {
    pub fn new(home: &str) -> Self {
        let home = full_path("/", home);
        Self {
            cwd: home.clone(),
            dirstack: Vec::new(),
            home,
            exit_requested: false,
        }
    }
}

/// Everything a handler may touch. Built fresh for each dispatched line;
/// clones share the session, console and service.
#[derive(Clone)]
pub struct InvocationContext {
    pub command: String,
    pub args: BoundArgs,
    pub session: Rc<RefCell<Session>>,
    pub console: Console,
    pub remote: Rc<dyn RemoteService>,
    pub registry: Rc<CommandRegistry>,
}

impl InvocationContext {
    pub fn echo(&self, line: impl Into<String>) {
        self.console.echo(line);
    }

    pub fn error(&self, line: impl Into<String>) {
        self.console.error(line);
    }

    pub fn page(&self, lines: Vec<String>) {
        self.console.page(lines);
    }

    pub fn cwd(&self) -> String {
        self.session.borrow().cwd.clone()
    }

    /// `Error: <msg>` for a failed remote operation.
    pub fn show_error(&self, msg: &str) {
        let msg = if msg.is_empty() { UNKNOWN_ERROR } else { msg };
        self.error(format!("Error: {msg}"));
    }

    /// Issues a remote call. A transport failure is reported here and
    /// yields `None`.
    pub async fn call_value(&self, api: Api, op: &str, params: Value) -> Option<Value> {
        debug!(command = %self.command, %api, op, "remote call issued");
        match self.remote.call(api, op, params).await {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(op, error = %err, "remote call failed");
                self.show_error(&err.synthetic());
                None
            }
        }
    }

    /// [`call_value`](Self::call_value) with the reply classified.
    pub async fn call(&self, api: Api, op: &str, params: Value) -> Option<Reply> {
        let reply = Reply::classify(self.call_value(api, op, params).await?);
        debug!(op, ok = !matches!(reply, Reply::Failure(_)), "remote call answered");
        Some(reply)
    }

    /// Like [`call`](Self::call), but also reports a negative status and
    /// yields only replies that did not fail.
    pub async fn request(&self, api: Api, op: &str, params: Value) -> Option<Reply> {
        match self.call(api, op, params).await? {
            Reply::Failure(msg) => {
                self.show_error(&msg);
                None
            }
            reply => Some(reply),
        }
    }
}
