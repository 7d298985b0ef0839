/*!
Terminal host: connects a line editor to the interpreter.

The editor blocks, so it runs on its own thread and talks to the
interpreter loop through events:

  editor thread                     interpreter loop
  -------------                     ----------------
  readline ok      -- Line -->      submit, print output, ack next prompt
  Ctrl-C           -- Interrupt --> interrupt, ack next prompt
  Tab              -- Complete -->  start completion (answered later)
  Ctrl-D           -- Eof -->       leave

Output produced by pending work while the editor is waiting for input goes
through the editor's external printer so it does not trample the line
being typed.

Batch mode (`-c`) skips the editor: each command is submitted and its work
driven to completion before the next.
*/

use anyhow::Result;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Config, Context, Editor, ExternalPrinter, Helper};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::cmd::format::StyleOptions;
use crate::complete::Completion;
use crate::interp::{Interpreter, OutputLine};

/// What the editor thread waits for after handing over a line.
#[derive(Debug)]
enum Turn {
    Prompt(String),
    Exit,
}

enum HostEvent {
    Line {
        text: String,
        ack: oneshot::Sender<Turn>,
    },
    Complete {
        line: String,
        pos: usize,
        reply: oneshot::Sender<Completion>,
    },
    Interrupt {
        ack: oneshot::Sender<Turn>,
    },
    Eof,
}

type BoxedPrinter = Box<dyn ExternalPrinter + Send>;

/* ---- Line editor helper ---- */

struct FsHelper {
    events: mpsc::UnboundedSender<HostEvent>,
}

impl Helper for FsHelper {}

impl Highlighter for FsHelper {}

impl Validator for FsHelper {}

impl Hinter for FsHelper {
    type Hint = String;
    fn hint(&self, _line: &str, _pos: usize, _ctx: &Context<'_>) -> Option<String> {
        None
    }
}

impl Completer for FsHelper {
    type Candidate = Pair;

    /// Asks the interpreter loop and waits for its answer, which may take a
    /// remote round trip.
    fn complete(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> rustyline::Result<(usize, Vec<Pair>)> {
        let (reply, answer) = oneshot::channel();
        let event = HostEvent::Complete {
            line: line.to_string(),
            pos,
            reply,
        };
        if self.events.send(event).is_err() {
            return Ok((pos, Vec::new()));
        }
        Ok(match answer.blocking_recv().unwrap_or(Completion::Nothing) {
            Completion::Nothing => (pos, Vec::new()),
            Completion::Insert(text) => (pos, vec![pair(text)]),
            Completion::Candidates { start, items } => (start, items.into_iter().map(pair).collect()),
        })
    }
}

fn pair(text: String) -> Pair {
    Pair {
        display: text.clone(),
        replacement: text,
    }
}

fn build_editor(events: mpsc::UnboundedSender<HostEvent>) -> rustyline::Result<Editor<FsHelper, DefaultHistory>> {
    let config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .build();
    let mut editor = Editor::with_config(config)?;
    editor.set_helper(Some(FsHelper { events }));
    Ok(editor)
}

fn editor_loop(
    events: mpsc::UnboundedSender<HostEvent>,
    printers: std::sync::mpsc::Sender<Option<BoxedPrinter>>,
    mut prompt: String,
) {
    let mut editor = match build_editor(events.clone()) {
        Ok(editor) => editor,
        Err(err) => {
            warn!(error = %err, "line editor unavailable");
            let _ = printers.send(None);
            let _ = events.send(HostEvent::Eof);
            return;
        }
    };
    let printer = editor
        .create_external_printer()
        .map(|p| Box::new(p) as BoxedPrinter)
        .ok();
    let _ = printers.send(printer);

    loop {
        let (ack, turn) = oneshot::channel();
        let event = match editor.readline(&prompt) {
            Ok(text) => HostEvent::Line { text, ack },
            Err(ReadlineError::Interrupted) => HostEvent::Interrupt { ack },
            Err(ReadlineError::Eof) => {
                let _ = events.send(HostEvent::Eof);
                return;
            }
            Err(err) => {
                warn!(error = %err, "line editor failed");
                let _ = events.send(HostEvent::Eof);
                return;
            }
        };
        if events.send(event).is_err() {
            return;
        }
        match turn.blocking_recv() {
            Ok(Turn::Prompt(next)) => prompt = next,
            Ok(Turn::Exit) | Err(_) => return,
        }
    }
}

/* ---- Output ---- */

struct Sink {
    style: StyleOptions,
    printer: Option<BoxedPrinter>,
}

impl Sink {
    /// Prints while the editor is not reading.
    fn direct(&self, lines: Vec<OutputLine>) {
        for line in lines {
            println!("{}", line.styled(&self.style));
        }
    }

    /// Prints while the editor may be reading.
    fn external(&mut self, lines: Vec<OutputLine>) {
        if lines.is_empty() {
            return;
        }
        let Some(printer) = self.printer.as_mut() else {
            return self.direct(lines);
        };
        let text: Vec<String> = lines.iter().map(|l| l.styled(&self.style)).collect();
        if let Err(err) = printer.print(text.join("\n")) {
            debug!(error = %err, "external printer failed");
            self.printer = None;
            self.direct(lines);
        }
    }
}

fn next_turn(interp: &Interpreter) -> Turn {
    if interp.exit_requested() {
        Turn::Exit
    } else {
        Turn::Prompt(interp.prompt())
    }
}

/* ---- Entry points ---- */

/// Runs the interactive terminal until `exit` or end of input.
pub async fn run_interactive(mut interp: Interpreter) -> Result<()> {
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let (printers_tx, printers) = std::sync::mpsc::channel();
    let first_prompt = interp.prompt();
    let editor = std::thread::Builder::new()
        .name("fsterm-editor".into())
        .spawn(move || editor_loop(events_tx, printers_tx, first_prompt))?;

    let mut sink = Sink {
        style: interp.console().style(),
        printer: printers.recv().ok().flatten(),
    };

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(HostEvent::Line { text, ack }) => {
                    interp.submit(&text);
                    sink.direct(interp.console().drain());
                    let turn = next_turn(&interp);
                    let leaving = matches!(turn, Turn::Exit);
                    let _ = ack.send(turn);
                    if leaving {
                        break;
                    }
                }
                Some(HostEvent::Interrupt { ack }) => {
                    interp.interrupt();
                    sink.direct(interp.console().drain());
                    let _ = ack.send(next_turn(&interp));
                }
                Some(HostEvent::Complete { line, pos, reply }) => interp.complete(line, pos, reply),
                Some(HostEvent::Eof) | None => break,
            },
            Some(()) = interp.next_pending(), if interp.has_pending() => {
                sink.external(interp.console().drain());
            }
        }
    }

    debug!("leaving interactive loop");
    drop(events);
    if editor.join().is_err() {
        warn!("line editor thread panicked");
    }
    Ok(())
}

/// Runs each command in turn, waiting for its remote work before the next.
/// Lines that answer a prompt chain (for `mail`) are fed to it in order.
pub async fn run_batch(mut interp: Interpreter, commands: &[String]) -> Result<()> {
    interp.console().set_paging(false);
    let style = interp.console().style();
    let print = |lines: Vec<OutputLine>| {
        for line in lines {
            println!("{}", line.styled(&style));
        }
    };
    for command in commands {
        debug!(command, "batch command");
        interp.submit(command);
        interp.settle().await;
        print(interp.console().drain());
        if interp.exit_requested() {
            break;
        }
    }
    interp.interrupt();
    interp.settle().await;
    print(interp.console().drain());
    Ok(())
}
