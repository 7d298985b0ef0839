//! The interpreter's output sink and input modes.
//!
//! Handlers write through a [`Console`]; the host drains the queued lines
//! after every step. The console also owns the two modes that take over the
//! input line: the pager and the multi-step reader.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use tracing::trace;

use super::pager::{MORE_PROMPT, Pager};
use super::reader::{ReadError, ReadResult, Reader, Step};
use crate::cmd::format::{Role, StyleOptions, paint};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    Echo(String),
    Error(String),
}

impl OutputLine {
    #[cfg(test)]
    pub fn text(&self) -> &str {
        match self {
            OutputLine::Echo(s) | OutputLine::Error(s) => s,
        }
    }

    /// The line as printed, errors colored when the style allows.
    pub fn styled(&self, style: &StyleOptions) -> String {
        match self {
            OutputLine::Echo(s) => s.clone(),
            OutputLine::Error(s) => paint(Role::Error, s, style),
        }
    }
}

struct Terminal {
    queue: Vec<OutputLine>,
    pager: Pager,
    reader: Reader,
    prompt: String,
    style: StyleOptions,
}

impl Terminal {
    fn push_echo(&mut self, lines: Vec<String>) {
        self.queue.extend(lines.into_iter().map(OutputLine::Echo));
    }
}

/// Shared handle; clones refer to the same terminal.
#[derive(Clone)]
pub struct Console(Rc<RefCell<Terminal>>);

impl Console {
    pub fn new(prompt: &str, pager: Pager, style: StyleOptions) -> Self {
        Console(Rc::new(RefCell::new(Terminal {
            queue: Vec::new(),
            pager,
            reader: Reader::default(),
            prompt: prompt.to_string(),
            style,
        })))
    }

    pub fn echo(&self, line: impl Into<String>) {
        self.0.borrow_mut().queue.push(OutputLine::Echo(line.into()));
    }

    pub fn error(&self, line: impl Into<String>) {
        let line = line.into();
        trace!(%line, "error output");
        self.0.borrow_mut().queue.push(OutputLine::Error(line));
    }

    /// Routes `lines` through the pager.
    pub fn page(&self, lines: Vec<String>) {
        let mut term = self.0.borrow_mut();
        let shown = term.pager.page(lines);
        term.push_echo(shown);
    }

    pub fn drain(&self) -> Vec<OutputLine> {
        std::mem::take(&mut self.0.borrow_mut().queue)
    }

    pub fn style(&self) -> StyleOptions {
        self.0.borrow().style.clone()
    }

    /// The prompt for the next line, which depends on the input mode.
    pub fn prompt(&self) -> String {
        let term = self.0.borrow();
        if term.pager.is_active() {
            return MORE_PROMPT.to_string();
        }
        match term.reader.prompt() {
            Some(p) => p.to_string(),
            None => term.prompt.clone(),
        }
    }

    /* ---- pager ---- */

    pub fn pager_active(&self) -> bool {
        self.0.borrow().pager.is_active()
    }

    pub fn pager_key(&self, key: &str) {
        let mut term = self.0.borrow_mut();
        let shown = term.pager.key(key);
        term.push_echo(shown);
    }

    pub fn paging(&self) -> bool {
        self.0.borrow().pager.enabled()
    }

    pub fn set_paging(&self, enabled: bool) {
        self.0.borrow_mut().pager.set_enabled(enabled);
    }

    /* ---- multi-step reader ---- */

    pub fn reader_active(&self) -> bool {
        self.0.borrow().reader.is_active()
    }

    /// Starts a prompt chain right away; the returned future resolves with
    /// the answers once the last step is answered.
    pub fn read(&self, steps: Vec<Step>) -> impl Future<Output = ReadResult> + 'static {
        let started = {
            let mut term = self.0.borrow_mut();
            term.reader.start(steps).map(|(echo, rx)| {
                term.push_echo(echo);
                rx
            })
        };
        async move { started?.await.unwrap_or(Err(ReadError::Cancelled)) }
    }

    pub fn answer(&self, line: &str) {
        let mut term = self.0.borrow_mut();
        let shown = term.reader.answer(line);
        term.push_echo(shown);
    }

    /// Cancels the pager if active, otherwise a pending read. Returns whether
    /// anything was cancelled.
    pub fn interrupt(&self) -> bool {
        let mut term = self.0.borrow_mut();
        if term.pager.is_active() {
            term.pager.cancel();
            return true;
        }
        if term.reader.is_active() {
            term.reader.cancel();
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    fn console(rows: usize) -> Console {
        Console::new("fsterm> ", Pager::new(rows, true), StyleOptions::plain())
    }

    #[test]
    fn prompt_follows_input_mode() {
        let con = console(2);
        assert_eq!(con.prompt(), "fsterm> ");

        con.page(vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(con.prompt(), MORE_PROMPT);
        con.pager_key("");
        assert_eq!(con.prompt(), "fsterm> ");

        let _answers = con.read(vec![Step::line("To: ")]);
        assert_eq!(con.prompt(), "To: ");
    }

    #[test]
    fn read_resolves_after_last_answer() {
        let con = console(24);
        let mut answers = Box::pin(con.read(vec![Step::line("To: "), Step::line("CC: ")]));
        con.answer("a@x");
        assert!((&mut answers).now_or_never().is_none());
        con.answer("");
        assert_eq!(
            answers.now_or_never(),
            Some(Ok(vec!["a@x".to_string(), String::new()]))
        );
    }

    #[test]
    fn interrupt_prefers_pager_then_reader() {
        let con = console(1);
        let answers = con.read(vec![Step::line("To: ")]);
        con.page(vec!["a".into(), "b".into()]);
        assert!(con.interrupt());
        assert!(con.reader_active());
        assert!(con.interrupt());
        assert_eq!(answers.now_or_never(), Some(Err(ReadError::Cancelled)));
        assert!(!con.interrupt());
    }

    #[test]
    fn errors_and_echoes_keep_order() {
        let con = console(24);
        con.echo("one");
        con.error("two");
        con.page(vec!["three".into()]);
        assert_eq!(
            con.drain(),
            vec![
                OutputLine::Echo("one".into()),
                OutputLine::Error("two".into()),
                OutputLine::Echo("three".into()),
            ]
        );
        assert!(con.drain().is_empty());
    }
}
