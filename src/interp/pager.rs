//! Screenful-at-a-time output.
//!
//! While a pager is active every submitted line is a keystroke for the pager:
//! the cancel key drops the rest of the buffer, anything else shows the next
//! screenful. Output paged while active is appended to the buffer.

use tracing::debug;

pub const CANCEL_KEY: &str = "q";
pub const MORE_PROMPT: &str = "-- more --";

#[derive(Debug)]
struct PagerState {
    buffer: Vec<String>,
    cursor: usize,
}

#[derive(Debug)]
pub struct Pager {
    rows: usize,
    enabled: bool,
    state: Option<PagerState>,
}

impl Pager {
    pub fn new(rows: usize, enabled: bool) -> Self {
        Self {
            rows: rows.max(1),
            enabled,
            state: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Turning paging off does not flush an active buffer; the user still
    /// pages through what is already held.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Returns the lines to show now.
    pub fn page(&mut self, lines: Vec<String>) -> Vec<String> {
        if let Some(state) = &mut self.state {
            state.buffer.extend(lines);
            return Vec::new();
        }
        if !self.enabled || lines.len() <= self.rows {
            return lines;
        }
        debug!(lines = lines.len(), rows = self.rows, "pager engaged");
        self.state = Some(PagerState {
            buffer: lines,
            cursor: 0,
        });
        self.next_screen()
    }

    /// Handles one keystroke while active. Returns the lines to show.
    pub fn key(&mut self, key: &str) -> Vec<String> {
        if !self.is_active() {
            return Vec::new();
        }
        if key.trim() == CANCEL_KEY {
            self.cancel();
            return Vec::new();
        }
        self.next_screen()
    }

    pub fn cancel(&mut self) {
        if self.state.take().is_some() {
            debug!("pager cancelled");
        }
    }

    fn next_screen(&mut self) -> Vec<String> {
        let Some(state) = &mut self.state else {
            return Vec::new();
        };
        let end = (state.cursor + self.rows).min(state.buffer.len());
        let screen = state.buffer[state.cursor..end].to_vec();
        state.cursor = end;
        if state.cursor >= state.buffer.len() {
            debug!("pager exhausted");
            self.state = None;
        }
        screen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("line {i}")).collect()
    }

    #[test]
    fn short_output_is_not_buffered() {
        let mut pager = Pager::new(30, true);
        assert_eq!(pager.page(lines(30)).len(), 30);
        assert!(!pager.is_active());
    }

    #[test]
    fn hundred_lines_take_three_keys() {
        let mut pager = Pager::new(30, true);
        let first = pager.page(lines(100));
        assert_eq!(first.len(), 30);
        assert_eq!(first[0], "line 0");

        let mut keys = 0;
        let mut shown = first.len();
        while pager.is_active() {
            shown += pager.key("").len();
            keys += 1;
        }
        assert_eq!(keys, 3);
        assert_eq!(shown, 100);
    }

    #[test]
    fn cancel_key_restores_immediately() {
        let mut pager = Pager::new(30, true);
        pager.page(lines(100));
        pager.key(" ");
        assert!(pager.is_active());
        assert!(pager.key("q").is_empty());
        assert!(!pager.is_active());
    }

    #[test]
    fn disabled_pager_emits_everything() {
        let mut pager = Pager::new(10, false);
        assert_eq!(pager.page(lines(100)).len(), 100);
        assert!(!pager.is_active());
    }

    #[test]
    fn output_while_active_is_appended() {
        let mut pager = Pager::new(2, true);
        assert_eq!(pager.page(lines(3)), vec!["line 0", "line 1"]);
        assert!(pager.page(vec!["late".into()]).is_empty());
        assert_eq!(pager.key(""), vec!["line 2", "late"]);
        assert!(!pager.is_active());
    }
}
