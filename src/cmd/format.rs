/*!
Output formatting for command handlers. Everything here returns strings or
lines; nothing prints directly, so output can be routed through the pager.

Style decision:
  - Color only when stdout is a terminal and NO_COLOR is unset.
  - Width from env COLUMNS (at least 40), else 80.

Public API Summary:
  - StyleOptions::detect() / StyleOptions::plain()
  - paint(role, text, &StyleOptions) -> String
  - table(headers, rows, &StyleOptions) -> Vec<String>   (listing tables)
  - columnize(rows, specs) -> Vec<String>                (ls-style fixed columns)
  - format_time(millis) -> String
*/

use std::borrow::Cow;
use std::io::IsTerminal;

use chrono::{Local, TimeZone};

/* ---- Style ---- */

pub const DEFAULT_WIDTH: usize = 80;
const MIN_WIDTH: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleOptions {
    pub use_color: bool,
    pub term_width: usize,
}

impl StyleOptions {
    pub fn detect() -> Self {
        let use_color = std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal();
        let term_width = std::env::var("COLUMNS")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .map_or(DEFAULT_WIDTH, |w| w.max(MIN_WIDTH));
        Self { use_color, term_width }
    }

    /// No escapes, default width.
    #[cfg(test)]
    pub fn plain() -> Self {
        Self {
            use_color: false,
            term_width: DEFAULT_WIDTH,
        }
    }
}

/// What a piece of output is, for coloring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Error,
    Heading,
    Rule,
}

impl Role {
    fn sgr(self) -> &'static str {
        match self {
            Role::Error => "31",
            Role::Heading => "1",
            Role::Rule => "2",
        }
    }
}

pub fn paint(role: Role, text: impl AsRef<str>, style: &StyleOptions) -> String {
    let text = text.as_ref();
    if style.use_color {
        format!("\x1b[{}m{text}\x1b[0m", role.sgr())
    } else {
        text.to_string()
    }
}

/* ---- Tables ---- */

const GUTTER: &str = "  ";
/// Narrowest a column is squeezed to when the table is too wide.
const FLOOR: usize = 3;

/// Header, dashed rule, then one line per row. Columns are sized to their
/// widest cell and squeezed (widest first) to fit the terminal; squeezed
/// cells end in `~`.
pub fn table(headers: &[&str], rows: &[Vec<String>], style: &StyleOptions) -> Vec<String> {
    let mut widths: Vec<usize> = headers.iter().map(|h| display_width(h)).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(display_width(cell));
        }
    }
    squeeze(&mut widths, style.term_width);

    let mut out = Vec::with_capacity(rows.len() + 2);
    out.push(paint(Role::Heading, render_row(&widths, headers), style));
    let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    out.push(paint(Role::Rule, rule.join(GUTTER), style));
    for row in rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        out.push(render_row(&widths, &cells));
    }
    out
}

fn render_row(widths: &[usize], cells: &[&str]) -> String {
    let line: Vec<String> = widths
        .iter()
        .enumerate()
        .map(|(i, &w)| fit(cells.get(i).copied().unwrap_or(""), w))
        .collect();
    line.join(GUTTER).trim_end().to_string()
}

/// Shrinks the widest column one step at a time until the row fits `limit`
/// or every column is at the floor.
fn squeeze(widths: &mut [usize], limit: usize) {
    let gutters = GUTTER.len() * widths.len().saturating_sub(1);
    let mut total: usize = widths.iter().sum::<usize>() + gutters;
    while total > limit {
        let Some(widest) = widths.iter_mut().filter(|w| **w > FLOOR).max_by_key(|w| **w) else {
            break;
        };
        *widest -= 1;
        total -= 1;
    }
}

/// Pads `cell` to `width`, or cuts it to `width` with a trailing `~`.
fn fit(cell: &str, width: usize) -> String {
    let plain = strip_ansi(cell);
    let len = plain.chars().count();
    if len <= width {
        return format!("{cell}{}", " ".repeat(width - len));
    }
    let mut cut: String = plain.chars().take(width.saturating_sub(1)).collect();
    cut.push('~');
    cut
}

/* ---- Fixed columns ---- */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Justify {
    Left,
    Right,
}

/// A column of `columnize`: cells longer than `max` are left as they are and
/// do not widen the column.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub justify: Justify,
    pub max: usize,
}

impl ColumnSpec {
    pub const fn left(max: usize) -> Self {
        Self {
            justify: Justify::Left,
            max,
        }
    }

    pub const fn right(max: usize) -> Self {
        Self {
            justify: Justify::Right,
            max,
        }
    }
}

/// Pads every cell to its column width and joins each row with single
/// spaces. Columns past the end of `specs` are left-justified without a cap.
pub fn columnize(rows: &[Vec<String>], specs: &[ColumnSpec]) -> Vec<String> {
    let cols = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0usize; cols];
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            let len = display_width(cell);
            let fits = specs.get(i).is_none_or(|s| len <= s.max);
            if fits {
                widths[i] = widths[i].max(len);
            }
        }
    }

    rows.iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(i, cell)| {
                    let len = display_width(cell);
                    if len >= widths[i] {
                        return cell.clone();
                    }
                    let pad = " ".repeat(widths[i] - len);
                    match specs.get(i).map(|s| s.justify) {
                        Some(Justify::Right) => format!("{pad}{cell}"),
                        _ => format!("{cell}{pad}"),
                    }
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

/* ---- Time ---- */

/// Local time for a millisecond timestamp, e.g. `Tue, Mar 05, 2024, 02:15:09 PM +01:00`.
pub fn format_time(millis: i64) -> String {
    match Local.timestamp_millis_opt(millis).single() {
        Some(t) => t.format("%a, %b %d, %Y, %I:%M:%S %p %:z").to_string(),
        None => String::new(),
    }
}

/* ---- Width ---- */

/// Removes CSI escape sequences (`ESC [ ... final-letter`).
pub fn strip_ansi(s: &str) -> Cow<'_, str> {
    let mut parts = s.split('\x1b');
    let Some(head) = parts.next() else {
        return Cow::Borrowed(s);
    };
    if head.len() == s.len() {
        return Cow::Borrowed(s);
    }
    let mut buf = head.to_string();
    for part in parts {
        match part.strip_prefix('[') {
            Some(seq) => {
                let end = seq.find(|c: char| c.is_ascii_alphabetic()).map_or(seq.len(), |i| i + 1);
                buf.push_str(&seq[end..]);
            }
            None => {
                buf.push('\x1b');
                buf.push_str(part);
            }
        }
    }
    Cow::Owned(buf)
}

pub fn display_width(s: &str) -> usize {
    strip_ansi(s).chars().count()
}
