/*!
The interpreter: submitted lines in, console output and pending work out.

A submitted line goes to whichever input mode owns it:

  pager active   -> keystroke for the pager
  reader active  -> answer for the current prompt
  otherwise      -> tokenize, bind and dispatch a command

Handlers return immediately. Whatever they leave running (remote calls and
the output after them) joins the pending set, which the host polls between
lines, so several commands may be waiting on the service at once.

Key items:
  Interpreter          - line routing, pending set, completion entry point
  Console / OutputLine - output queue, pager, multi-step reader
  InvocationContext    - what a handler gets
  Handler              - single-method handler seam
*/

pub mod console;
pub mod context;
pub mod dispatch;
pub mod pager;
pub mod reader;

pub use console::{Console, OutputLine};
pub use context::{InvocationContext, Session};
pub use dispatch::{Continuation, Handler, deferred};
pub use pager::Pager;
pub use reader::{ReadError, Step};

use std::cell::RefCell;
use std::rc::Rc;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::sync::oneshot;
use tracing::debug;

use crate::cmd::binder::ParseError;
use crate::cmd::format::StyleOptions;
use crate::cmd::registry::CommandRegistry;
use crate::complete::{self, Completion, CompletionEngine};
use crate::config::Settings;
use crate::remote::RemoteService;

pub struct Interpreter {
    registry: Rc<CommandRegistry>,
    session: Rc<RefCell<Session>>,
    console: Console,
    remote: Rc<dyn RemoteService>,
    completion: Rc<RefCell<CompletionEngine>>,
    pending: FuturesUnordered<Continuation>,
}

impl Interpreter {
    pub fn new(
        registry: CommandRegistry,
        settings: &Settings,
        remote: Rc<dyn RemoteService>,
        style: StyleOptions,
    ) -> Self {
        let pager = Pager::new(settings.page_rows, settings.pager);
        Self {
            registry: Rc::new(registry),
            session: Rc::new(RefCell::new(Session::new(&settings.home))),
            console: Console::new(&settings.prompt, pager, style),
            remote,
            completion: Rc::new(RefCell::new(CompletionEngine::default())),
            pending: FuturesUnordered::new(),
        }
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    #[cfg(test)]
    pub fn session(&self) -> Session {
        self.session.borrow().clone()
    }

    pub fn prompt(&self) -> String {
        self.console.prompt()
    }

    pub fn exit_requested(&self) -> bool {
        self.session.borrow().exit_requested
    }

    pub fn submit(&mut self, line: &str) {
        if self.console.pager_active() {
            self.console.pager_key(line);
            return;
        }
        if self.console.reader_active() {
            self.console.answer(line);
            return;
        }
        self.run_command(line);
    }

    fn run_command(&mut self, line: &str) {
        debug!(line, "line submitted");
        let cwd = self.session.borrow().cwd.clone();
        let parsed = match dispatch::parse_line(&self.registry, line, &cwd) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => return,
            Err(err) => {
                debug!(error = %err, "line rejected");
                match err {
                    ParseError::UnknownCommand(_) => self.console.error("Unknown command"),
                    other => self.console.error(other.to_string()),
                }
                return;
            }
        };
        let cx = InvocationContext {
            command: parsed.def.name.clone(),
            args: parsed.args,
            session: self.session.clone(),
            console: self.console.clone(),
            remote: self.remote.clone(),
            registry: self.registry.clone(),
        };
        if let Some(rest) = dispatch::dispatch(&parsed.def, cx) {
            self.pending.push(rest);
        }
    }

    /// Ctrl-C: cancels the pager or a pending read, and any completion in
    /// flight.
    pub fn interrupt(&mut self) {
        self.completion.borrow_mut().reset();
        if self.console.interrupt() {
            debug!("input mode interrupted");
        }
    }

    /// Starts a completion. The answer is sent on `respond`, possibly after
    /// a remote round trip driven by the pending set.
    pub fn complete(&mut self, line: String, pos: usize, respond: oneshot::Sender<Completion>) {
        if self.console.pager_active() || self.console.reader_active() {
            let _ = respond.send(Completion::Nothing);
            return;
        }
        let cwd = self.session.borrow().cwd.clone();
        let fut = complete::complete(
            self.completion.clone(),
            self.registry.clone(),
            self.remote.clone(),
            line,
            pos,
            cwd,
        );
        self.pending.push(Box::pin(async move {
            let _ = respond.send(fut.await);
        }));
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Drives the pending set until one item finishes.
    pub async fn next_pending(&mut self) -> Option<()> {
        self.pending.next().await
    }

    /// Drives pending work until none is left, or until a prompt chain is
    /// waiting for input that only the next line can supply.
    pub async fn settle(&mut self) {
        while self.has_pending() && !self.console.reader_active() {
            self.next_pending().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::builtin;
    use crate::remote::TransportError;
    use crate::remote::scripted::ScriptedRemote;
    use serde_json::json;

    fn settings(rows: usize) -> Settings {
        Settings {
            page_rows: rows,
            home: "/home/alice".into(),
            ..Settings::default()
        }
    }

    fn interp(remote: Rc<ScriptedRemote>) -> Interpreter {
        Interpreter::new(builtin::registry().unwrap(), &settings(24), remote, StyleOptions::plain())
    }

    fn text(interp: &Interpreter) -> Vec<String> {
        interp.console().drain().iter().map(|l| l.text().to_string()).collect()
    }

    #[tokio::test]
    async fn unknown_command_and_bind_error_make_no_call() {
        let remote = ScriptedRemote::new();
        let mut it = interp(remote.clone());
        it.submit("frobnicate x");
        it.submit("lookup");
        it.submit("punshare abc");
        it.settle().await;
        assert_eq!(
            text(&it),
            vec![
                "Unknown command",
                "missing required argument path",
                "invalid number for id: abc",
            ]
        );
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn remote_output_follows_sync_output() {
        let remote = ScriptedRemote::new();
        remote.reply("mkdir", json!({"status": 1}));
        let mut it = interp(remote.clone());
        it.submit("mkdir docs");
        it.submit("pwd");
        it.settle().await;
        assert_eq!(text(&it), vec!["/home/alice", "Completed"]);
        assert_eq!(remote.last().unwrap().params, json!({"path": "/home/alice/docs"}));
    }

    #[tokio::test]
    async fn transport_failure_reports_and_loop_continues() {
        let remote = ScriptedRemote::new();
        remote.fail(
            "rm",
            TransportError::Status {
                code: 502,
                body: "Bad Gateway".into(),
            },
        );
        let mut it = interp(remote.clone());
        it.submit("rm old");
        it.settle().await;
        it.submit("pwd");
        assert_eq!(text(&it), vec!["Error: status 502: Bad Gateway", "/home/alice"]);
    }

    #[tokio::test]
    async fn hanging_call_never_emits() {
        let remote = ScriptedRemote::new();
        remote.hang("rm");
        let mut it = interp(remote.clone());
        it.submit("rm old");
        assert!(it.has_pending());
        it.submit("pwd");
        assert_eq!(text(&it), vec!["/home/alice"]);
        assert!(it.has_pending());
    }

    #[tokio::test]
    async fn pager_takes_over_input() {
        let remote = ScriptedRemote::new();
        let entries: Vec<_> = (0..100)
            .map(|i| json!({"name": format!("f{i:03}"), "size": i, "mimetype": "text/plain"}))
            .collect();
        remote.reply("list", json!(entries));
        let mut it = Interpreter::new(builtin::registry().unwrap(), &settings(30), remote.clone(), StyleOptions::plain());
        it.submit("ls");
        it.settle().await;
        assert_eq!(text(&it).len(), 30);
        assert_eq!(it.prompt(), pager::MORE_PROMPT);

        it.submit("");
        it.submit("pwd");
        assert_eq!(text(&it).len(), 60, "a command line is just a keystroke while paging");
        assert!(it.console().pager_active());
        it.submit("q");
        assert_eq!(it.prompt(), "fsterm> ");
        it.submit("pwd");
        assert_eq!(text(&it), vec!["/home/alice"]);
    }

    #[tokio::test]
    async fn completion_resolves_through_pending_set() {
        let remote = ScriptedRemote::new();
        remote.reply("fcmp", json!({"status": 1, "matches": ["docs"]}));
        let mut it = interp(remote.clone());
        let (tx, mut rx) = oneshot::channel();
        it.complete("ls d".into(), 4, tx);
        it.settle().await;
        assert_eq!(
            rx.try_recv().unwrap(),
            Completion::Candidates {
                start: 3,
                items: vec!["docs".into()]
            }
        );
    }

    #[tokio::test]
    async fn named_hint_from_completion_is_not_bound() {
        let remote = ScriptedRemote::new();
        remote.reply("list", json!([]));
        remote.reply("list", json!([]));
        let mut it = interp(remote.clone());
        let (tx, mut rx) = oneshot::channel();
        it.complete("ls path=".into(), 8, tx);
        it.settle().await;
        let Completion::Insert(hint) = rx.try_recv().unwrap() else {
            panic!("expected a hint");
        };
        assert_eq!(hint, "(file path) ");

        it.submit(&format!("ls path={hint}"));
        it.settle().await;
        assert_eq!(remote.last().unwrap().params, json!({"path": "/home/alice"}));

        it.submit(&format!("ls path={hint}/tmp"));
        it.settle().await;
        assert_eq!(remote.last().unwrap().params, json!({"path": "/tmp"}));
        assert!(text(&it).iter().all(|l| !l.starts_with("Error")));
    }

    #[tokio::test]
    async fn interrupt_cancels_mail_composition() {
        let remote = ScriptedRemote::new();
        let mut it = interp(remote.clone());
        it.submit("mail");
        assert_eq!(it.prompt(), "To: ");
        it.submit("bob@example.org");
        it.interrupt();
        it.settle().await;
        assert_eq!(it.prompt(), "fsterm> ");
        assert!(!it.has_pending());
        assert!(remote.calls().is_empty());
    }
}
