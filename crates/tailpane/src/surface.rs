/*
[INPUT]:  Rendered lines from the render scheduler, scroll/search requests from the UI
[OUTPUT]: TextSurface contract and the in-memory LogView surface with viewer navigation
[POS]:    Presentation layer - scroll origin, cursor, and autoscroll state
[UPDATE]: When changing scrolling rules or the surface contract
*/

use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use unicode_width::UnicodeWidthStr;

use crate::search::RenderedLine;

const FAST_SCROLL_FACTOR: usize = 10;

/// Text surface the render loop draws into.
///
/// Writes replace the whole content. Origin and cursor are `(x, y)`.
pub trait TextSurface: Send {
    fn clear(&mut self);
    /// Replace every line. The origin is kept unless autoscroll is on.
    fn replace_content(&mut self, lines: Vec<RenderedLine>);
    fn line_count(&self) -> usize;
    fn origin(&self) -> (usize, usize);
    fn set_origin(&mut self, x: usize, y: usize);
    fn cursor(&self) -> (usize, usize);
    fn set_cursor(&mut self, x: usize, y: usize);
    fn autoscroll(&self) -> bool;
    fn set_autoscroll(&mut self, enabled: bool);
    /// Scroll to the first line containing `needle` (case-insensitive).
    /// Returns whether a line was found.
    fn search(&mut self, needle: &str) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewOptions {
    pub wrap: bool,
    pub autoscroll: bool,
    pub scroll_height: usize,
    pub scroll_past_bottom: bool,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            wrap: true,
            autoscroll: true,
            scroll_height: 2,
            scroll_past_bottom: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogView {
    lines: Vec<RenderedLine>,
    origin: (usize, usize),
    cursor: (usize, usize),
    width: usize,
    height: usize,
    options: ViewOptions,
}

impl LogView {
    pub fn new(options: ViewOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn lines(&self) -> &[RenderedLine] {
        &self.lines
    }

    pub fn wrap(&self) -> bool {
        self.options.wrap
    }

    /// Lines from the origin down, at most one viewport high
    pub fn visible_lines(&self) -> &[RenderedLine] {
        let start = self.origin.1.min(self.lines.len());
        let end = if self.height == 0 {
            self.lines.len()
        } else {
            (start + self.height).min(self.lines.len())
        };
        &self.lines[start..end]
    }

    /// Record the drawable area; keeps the bottom in view while autoscrolling.
    pub fn set_viewport(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.follow_bottom();
    }

    pub fn scroll_up(&mut self) {
        self.options.autoscroll = false;
        self.origin.1 = self.origin.1.saturating_sub(self.options.scroll_height);
    }

    pub fn scroll_down(&mut self) {
        self.options.autoscroll = false;
        let reserved = if self.options.scroll_past_bottom {
            0
        } else {
            self.height
        };
        if self.origin.1 + reserved >= self.lines.len() {
            return;
        }
        self.origin.1 += self.options.scroll_height;
    }

    pub fn scroll_left(&mut self) {
        self.origin.0 = self.origin.0.saturating_sub(self.options.scroll_height);
    }

    pub fn scroll_right(&mut self) {
        let longest = self
            .lines
            .iter()
            .map(|line| line.text.width())
            .max()
            .unwrap_or(0);
        if self.origin.0 + self.width >= longest {
            return;
        }
        self.origin.0 += self.options.scroll_height;
    }

    pub fn scroll_up_fast(&mut self) {
        for _ in 0..FAST_SCROLL_FACTOR {
            self.scroll_up();
        }
    }

    pub fn scroll_down_fast(&mut self) {
        for _ in 0..FAST_SCROLL_FACTOR {
            self.scroll_down();
        }
    }

    pub fn scroll_left_fast(&mut self) {
        for _ in 0..FAST_SCROLL_FACTOR {
            self.scroll_left();
        }
    }

    pub fn scroll_right_fast(&mut self) {
        for _ in 0..FAST_SCROLL_FACTOR {
            self.scroll_right();
        }
    }

    pub fn jump_to_top(&mut self) {
        self.options.autoscroll = false;
        self.origin = (0, 0);
        self.cursor = (0, 0);
    }

    pub fn enable_autoscroll(&mut self) {
        self.options.autoscroll = true;
        self.follow_bottom();
    }

    fn bottom_origin(&self) -> usize {
        self.lines.len().saturating_sub(self.height.max(1))
    }

    fn follow_bottom(&mut self) {
        if self.options.autoscroll {
            self.origin.1 = self.bottom_origin();
        }
    }
}

impl TextSurface for LogView {
    fn clear(&mut self) {
        self.lines.clear();
        self.origin = (0, 0);
        self.cursor = (0, 0);
    }

    fn replace_content(&mut self, lines: Vec<RenderedLine>) {
        self.lines = lines;
        if self.options.autoscroll {
            self.follow_bottom();
        } else {
            self.origin.1 = self.origin.1.min(self.lines.len().saturating_sub(1));
        }
    }

    fn line_count(&self) -> usize {
        self.lines.len()
    }

    fn origin(&self) -> (usize, usize) {
        self.origin
    }

    fn set_origin(&mut self, x: usize, y: usize) {
        self.origin = (x, y.min(self.lines.len().saturating_sub(1)));
    }

    fn cursor(&self) -> (usize, usize) {
        self.cursor
    }

    fn set_cursor(&mut self, x: usize, y: usize) {
        self.cursor = (x, y);
    }

    fn autoscroll(&self) -> bool {
        self.options.autoscroll
    }

    fn set_autoscroll(&mut self, enabled: bool) {
        self.options.autoscroll = enabled;
        self.follow_bottom();
    }

    fn search(&mut self, needle: &str) -> bool {
        if needle.is_empty() {
            return false;
        }
        let lowered = needle.to_lowercase();
        let Some(row) = self
            .lines
            .iter()
            .position(|line| line.text.to_lowercase().contains(&lowered))
        else {
            return false;
        };
        self.options.autoscroll = false;
        self.origin.1 = row;
        self.cursor = (0, 0);
        true
    }
}

/// `LogView` shared between the render task and the drawing loop
#[derive(Debug, Clone, Default)]
pub struct SharedLogView {
    inner: Arc<StdMutex<LogView>>,
}

impl SharedLogView {
    pub fn new(view: LogView) -> Self {
        Self {
            inner: Arc::new(StdMutex::new(view)),
        }
    }

    /// Run `f` with the view locked
    pub fn with<R>(&self, f: impl FnOnce(&mut LogView) -> R) -> R {
        f(&mut self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, LogView> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TextSurface for SharedLogView {
    fn clear(&mut self) {
        self.lock().clear();
    }

    fn replace_content(&mut self, lines: Vec<RenderedLine>) {
        self.lock().replace_content(lines);
    }

    fn line_count(&self) -> usize {
        self.lock().line_count()
    }

    fn origin(&self) -> (usize, usize) {
        self.lock().origin()
    }

    fn set_origin(&mut self, x: usize, y: usize) {
        self.lock().set_origin(x, y);
    }

    fn cursor(&self) -> (usize, usize) {
        self.lock().cursor()
    }

    fn set_cursor(&mut self, x: usize, y: usize) {
        self.lock().set_cursor(x, y);
    }

    fn autoscroll(&self) -> bool {
        self.lock().autoscroll()
    }

    fn set_autoscroll(&mut self, enabled: bool) {
        self.lock().set_autoscroll(enabled);
    }

    fn search(&mut self, needle: &str) -> bool {
        self.lock().search(needle)
    }
}
