/*
[INPUT]:  Buffer snapshot, search needle, selected match ordinal
[OUTPUT]: Per-line match styling and navigable search state
[POS]:    Search layer - highlighting recomputed from raw text on every render
[UPDATE]: When changing match semantics, styles, or match navigation
*/

use std::sync::Arc;

use crate::log_buffer::LogLine;

pub const MATCH_STYLE: &str = "\x1b[30;43m";
pub const SELECTED_MATCH_STYLE: &str = "\x1b[7m";
pub const RESET_STYLE: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Plain,
    Match,
    SelectedMatch,
}

/// A line ready for a text surface. The text is always the raw line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedLine {
    pub index: usize,
    pub text: Arc<str>,
    pub style: LineStyle,
}

impl RenderedLine {
    pub fn plain(line: &LogLine) -> Self {
        Self {
            index: line.index,
            text: line.text.clone(),
            style: LineStyle::Plain,
        }
    }

    /// Text wrapped in ANSI escapes for its style
    pub fn display(&self) -> String {
        match self.style {
            LineStyle::Plain => self.text.to_string(),
            LineStyle::Match => format!("{MATCH_STYLE}{}{RESET_STYLE}", self.text),
            LineStyle::SelectedMatch => format!("{SELECTED_MATCH_STYLE}{}{RESET_STYLE}", self.text),
        }
    }
}

/// Case-insensitive substring match against raw text
fn line_matches(text: &str, lowered_needle: &str) -> bool {
    text.to_lowercase().contains(lowered_needle)
}

/// Line indices containing `needle`, ascending. Empty needle matches nothing.
pub fn find_matches(lines: &[LogLine], needle: &str) -> Vec<usize> {
    if needle.is_empty() {
        return Vec::new();
    }
    let lowered = needle.to_lowercase();
    lines
        .iter()
        .filter(|line| line_matches(&line.text, &lowered))
        .map(|line| line.index)
        .collect()
}

/// Style every line of `lines` for `needle`; the match whose ordinal equals
/// `selected` is styled as the selected match.
pub fn highlight_lines(lines: &[LogLine], needle: &str, selected: usize) -> Vec<RenderedLine> {
    if needle.is_empty() {
        return lines.iter().map(RenderedLine::plain).collect();
    }
    let lowered = needle.to_lowercase();
    let mut ordinal = 0;
    lines
        .iter()
        .map(|line| {
            let style = if line_matches(&line.text, &lowered) {
                let style = if ordinal == selected {
                    LineStyle::SelectedMatch
                } else {
                    LineStyle::Match
                };
                ordinal += 1;
                style
            } else {
                LineStyle::Plain
            };
            RenderedLine {
                index: line.index,
                text: line.text.clone(),
                style,
            }
        })
        .collect()
}

/// Display strings for `lines`; identity on the text when `needle` is empty.
pub fn apply_highlight(lines: &[LogLine], needle: &str, selected: usize) -> Vec<String> {
    highlight_lines(lines, needle, selected)
        .iter()
        .map(RenderedLine::display)
        .collect()
}

/// Needle plus the matches it produced against the latest snapshot.
///
/// Owned by the render task only.
#[derive(Debug, Clone, Default)]
pub struct SearchState {
    needle: String,
    matches: Vec<usize>,
    current: usize,
}

impl SearchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn needle(&self) -> &str {
        &self.needle
    }

    pub fn is_active(&self) -> bool {
        !self.needle.is_empty()
    }

    pub fn matches(&self) -> &[usize] {
        &self.matches
    }

    /// Ordinal of the selected match
    pub fn current(&self) -> usize {
        self.current
    }

    pub fn set_needle(&mut self, needle: impl Into<String>) {
        self.needle = needle.into();
        self.matches.clear();
        self.current = 0;
    }

    pub fn clear(&mut self) {
        self.set_needle(String::new());
    }

    /// Forget matches after the buffer was replaced. The needle stays.
    pub fn reset_selection(&mut self) {
        self.matches.clear();
        self.current = 0;
    }

    /// Recompute matches for `snapshot`, keeping the selection in range.
    pub fn refresh(&mut self, snapshot: &[LogLine]) {
        self.matches = find_matches(snapshot, &self.needle);
        if self.current >= self.matches.len() {
            self.current = 0;
        }
    }

    pub fn next_match(&mut self) {
        if !self.matches.is_empty() {
            self.current = (self.current + 1) % self.matches.len();
        }
    }

    pub fn prev_match(&mut self) {
        if !self.matches.is_empty() {
            self.current = (self.current + self.matches.len() - 1) % self.matches.len();
        }
    }

    /// Line index of the selected match
    pub fn current_line(&self) -> Option<usize> {
        self.matches.get(self.current).copied()
    }

    /// Counter such as `"2/5"`, `"0/0"` while active with no matches
    pub fn status(&self) -> Option<String> {
        if !self.is_active() {
            return None;
        }
        if self.matches.is_empty() {
            return Some("0/0".to_string());
        }
        Some(format!("{}/{}", self.current + 1, self.matches.len()))
    }
}
