/*
[INPUT]:  Current LineBuffer (watch), search commands (mpsc), lifetime token
[OUTPUT]: Full-content rewrites of a TextSurface on a fixed interval; search status (watch)
[POS]:    Presentation layer - the only owner of search state
[UPDATE]: When changing redraw cadence, scroll preservation, or search delegation
*/

use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::config::SearchMode;
use crate::log_buffer::{LineBuffer, LogLine};
use crate::search::{RenderedLine, SearchState, highlight_lines};
use crate::surface::TextSurface;

/// Search input from the UI. Applied by the render task only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCommand {
    SetNeedle(String),
    Next,
    Prev,
    Clear,
}

/// What the footer shows about the active search
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchStatus {
    pub needle: String,
    /// `"2/5"` style counter, `None` while no search is active
    pub counter: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderExit {
    Cancelled,
    /// The buffer publisher went away: the session terminated
    SourceTerminated,
}

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub interval: Duration,
    pub line_numbers: bool,
    pub search_mode: SearchMode,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(200),
            line_numbers: false,
            search_mode: SearchMode::Highlight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    None,
    Needle,
    Selection,
}

/// Prefix each line with its buffer index
pub fn number_lines(lines: Vec<RenderedLine>) -> Vec<RenderedLine> {
    lines
        .into_iter()
        .map(|line| RenderedLine {
            text: format!("[{}] ┃ {}", line.index, line.text).into(),
            ..line
        })
        .collect()
}

/// Redraws a surface from the current buffer on a fixed interval.
pub struct RenderScheduler<S> {
    surface: S,
    buffers: watch::Receiver<LineBuffer>,
    commands: mpsc::Receiver<SearchCommand>,
    status_tx: watch::Sender<SearchStatus>,
    search: SearchState,
    options: RenderOptions,
    focus: Focus,
}

impl<S: TextSurface> RenderScheduler<S> {
    pub fn new(
        surface: S,
        buffers: watch::Receiver<LineBuffer>,
        commands: mpsc::Receiver<SearchCommand>,
        options: RenderOptions,
    ) -> Self {
        let (status_tx, _) = watch::channel(SearchStatus::default());
        Self {
            surface,
            buffers,
            commands,
            status_tx,
            search: SearchState::new(),
            options,
            focus: Focus::None,
        }
    }

    pub fn status(&self) -> watch::Receiver<SearchStatus> {
        self.status_tx.subscribe()
    }

    /// Clear the surface, then redraw every interval until cancelled or the
    /// buffer publisher is dropped. Completion is signalled on `done`.
    pub async fn run(
        mut self,
        cancel: CancellationToken,
        done: oneshot::Sender<RenderExit>,
    ) -> RenderExit {
        self.surface.clear();

        let mut ticker = tokio::time::interval(self.options.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut commands_open = true;

        let exit = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break RenderExit::Cancelled,
                changed = self.buffers.changed() => {
                    if changed.is_err() {
                        // Show what the last session left behind.
                        self.render();
                        break RenderExit::SourceTerminated;
                    }
                    debug!("buffer replaced, resetting search selection");
                    self.search.reset_selection();
                    self.render();
                }
                command = self.commands.recv(), if commands_open => match command {
                    Some(command) => {
                        self.apply(command);
                        self.render();
                    }
                    None => commands_open = false,
                },
                _ = ticker.tick() => self.render(),
            }
        };

        debug!(?exit, "render scheduler stopped");
        let _ = done.send(exit);
        exit
    }

    fn apply(&mut self, command: SearchCommand) {
        trace!(?command, "search command");
        match command {
            SearchCommand::SetNeedle(needle) => {
                self.search.set_needle(needle);
                self.focus = Focus::Needle;
            }
            SearchCommand::Next => {
                self.search.next_match();
                self.focus = Focus::Selection;
            }
            SearchCommand::Prev => {
                self.search.prev_match();
                self.focus = Focus::Selection;
            }
            SearchCommand::Clear => {
                self.search.clear();
                self.focus = Focus::None;
            }
        }
    }

    fn render(&mut self) {
        let buffer = self.buffers.borrow_and_update().clone();
        let snapshot = buffer.snapshot();
        self.search.refresh(&snapshot);

        let mut lines = match self.options.search_mode {
            SearchMode::Highlight => {
                highlight_lines(&snapshot, self.search.needle(), self.search.current())
            }
            SearchMode::Surface => snapshot.iter().map(RenderedLine::plain).collect(),
        };
        if self.options.line_numbers {
            lines = number_lines(lines);
        }

        // One call: the surface keeps its own origin unless autoscrolling.
        self.surface.replace_content(lines);
        self.apply_focus(&snapshot);

        trace!(lines = snapshot.len(), "surface redrawn");
        self.status_tx.send_if_modified(|status| {
            let next = SearchStatus {
                needle: self.search.needle().to_string(),
                counter: self.search.status(),
            };
            if *status == next {
                return false;
            }
            *status = next;
            true
        });
    }

    fn apply_focus(&mut self, snapshot: &[LogLine]) {
        let focus = std::mem::replace(&mut self.focus, Focus::None);
        if !self.search.is_active() {
            return;
        }
        match (focus, self.options.search_mode) {
            (Focus::None, _) => {}
            // Numbered text would let the needle match the prefix.
            (Focus::Needle, SearchMode::Surface) if !self.options.line_numbers => {
                self.surface.search(self.search.needle());
            }
            (Focus::Needle | Focus::Selection, _) => {
                let row = self
                    .search
                    .current_line()
                    .and_then(|index| snapshot.iter().position(|line| line.index == index));
                if let Some(row) = row {
                    self.surface.set_autoscroll(false);
                    self.surface.set_origin(0, row);
                }
            }
        }
    }
}
