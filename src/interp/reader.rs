//! Multi-step reader: a chain of prompts answered one line at a time.
//!
//! Each step is issued only after the previous answer is captured. The last
//! step may be a body read, collecting lines until one equal to the end
//! marker. All answers are delivered together once the chain finishes.

use std::collections::VecDeque;

use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// One line of input.
    Line { prompt: String },
    /// Lines until one that is exactly `marker` (surrounding blanks ignored).
    /// `banner` is shown once when the step begins.
    UntilMarker {
        banner: String,
        prompt: String,
        marker: String,
    },
}

impl Step {
    pub fn line(prompt: &str) -> Self {
        Step::Line {
            prompt: prompt.to_string(),
        }
    }

    pub fn until(banner: &str, prompt: &str, marker: &str) -> Self {
        Step::UntilMarker {
            banner: banner.to_string(),
            prompt: prompt.to_string(),
            marker: marker.to_string(),
        }
    }

    fn prompt(&self) -> &str {
        match self {
            Step::Line { prompt } | Step::UntilMarker { prompt, .. } => prompt,
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ReadError {
    #[error("input cancelled")]
    Cancelled,
    #[error("another prompt is already waiting for input")]
    Busy,
}

pub type ReadResult = Result<Vec<String>, ReadError>;

struct ActiveRead {
    current: Step,
    rest: VecDeque<Step>,
    answers: Vec<String>,
    body: Vec<String>,
    reply: oneshot::Sender<ReadResult>,
}

#[derive(Default)]
pub struct Reader {
    active: Option<ActiveRead>,
}

impl Reader {
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// The prompt of the step waiting for input.
    pub fn prompt(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.current.prompt())
    }

    /// Begins a chain. Returns the lines to show now and the receiver the
    /// answers arrive on.
    pub fn start(
        &mut self,
        steps: Vec<Step>,
    ) -> Result<(Vec<String>, oneshot::Receiver<ReadResult>), ReadError> {
        if self.is_active() {
            return Err(ReadError::Busy);
        }
        let (tx, rx) = oneshot::channel();
        let mut rest: VecDeque<Step> = steps.into();
        let Some(current) = rest.pop_front() else {
            let _ = tx.send(Ok(Vec::new()));
            return Ok((Vec::new(), rx));
        };
        debug!(steps = rest.len() + 1, "reader started");
        let echo = banner(&current);
        self.active = Some(ActiveRead {
            current,
            rest,
            answers: Vec::new(),
            body: Vec::new(),
            reply: tx,
        });
        Ok((echo, rx))
    }

    /// Feeds one line to the current step. Returns the lines to show now.
    pub fn answer(&mut self, line: &str) -> Vec<String> {
        let Some(active) = &mut self.active else {
            return Vec::new();
        };
        match &active.current {
            Step::Line { .. } => active.answers.push(line.to_string()),
            Step::UntilMarker { marker, .. } => {
                if line.trim() != marker {
                    active.body.push(line.to_string());
                    return Vec::new();
                }
                let body = std::mem::take(&mut active.body);
                active.answers.push(body.join("\n"));
            }
        }

        if let Some(next) = active.rest.pop_front() {
            let echo = banner(&next);
            active.current = next;
            return echo;
        }

        if let Some(done) = self.active.take() {
            debug!(answers = done.answers.len(), "reader finished");
            let _ = done.reply.send(Ok(done.answers));
        }
        Vec::new()
    }

    pub fn cancel(&mut self) {
        if let Some(active) = self.active.take() {
            debug!("reader cancelled");
            let _ = active.reply.send(Err(ReadError::Cancelled));
        }
    }
}

fn banner(step: &Step) -> Vec<String> {
    match step {
        Step::UntilMarker { banner, .. } if !banner.is_empty() => vec![banner.clone()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_arrive_in_order() {
        let mut reader = Reader::default();
        let (echo, mut rx) = reader
            .start(vec![Step::line("To: "), Step::line("Subject: ")])
            .unwrap();
        assert!(echo.is_empty());
        assert_eq!(reader.prompt(), Some("To: "));

        reader.answer("bob@example.org");
        assert_eq!(reader.prompt(), Some("Subject: "));
        assert!(rx.try_recv().is_err());

        reader.answer("hello");
        assert!(!reader.is_active());
        assert_eq!(
            rx.try_recv().unwrap(),
            Ok(vec!["bob@example.org".to_string(), "hello".to_string()])
        );
    }

    #[test]
    fn body_reads_until_marker() {
        let mut reader = Reader::default();
        let (_, mut rx) = reader
            .start(vec![Step::line("Subject: "), Step::until("Message:", "> ", ".")])
            .unwrap();
        assert_eq!(reader.answer("hi"), vec!["Message:"]);
        assert_eq!(reader.prompt(), Some("> "));
        reader.answer("first");
        reader.answer("second .");
        reader.answer(" . ");
        assert_eq!(
            rx.try_recv().unwrap(),
            Ok(vec!["hi".to_string(), "first\nsecond .".to_string()])
        );
    }

    #[test]
    fn second_chain_is_busy_and_cancel_reports() {
        let mut reader = Reader::default();
        let (_, mut rx) = reader.start(vec![Step::line("a: ")]).unwrap();
        assert_eq!(
            reader.start(vec![Step::line("b: ")]).map(|_| ()),
            Err(ReadError::Busy)
        );
        reader.cancel();
        assert!(!reader.is_active());
        assert_eq!(rx.try_recv().unwrap(), Err(ReadError::Cancelled));
    }

    #[test]
    fn empty_chain_resolves_immediately() {
        let mut reader = Reader::default();
        let (_, mut rx) = reader.start(Vec::new()).unwrap();
        assert!(!reader.is_active());
        assert_eq!(rx.try_recv().unwrap(), Ok(Vec::new()));
    }
}
