/*
[INPUT]:  Shared log view, session state and search status channels, search command sender
[OUTPUT]: AppState consumed by key handling and drawing
[POS]:    TUI app state
[UPDATE]: When adding viewer modes or footer data
*/

use tailpane::render::{SearchCommand, SearchStatus};
use tailpane::{SessionState, SharedLogView};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::warn;
use tui_input::Input;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Mode {
    Normal,
    /// Typing a needle into the search prompt
    Search,
}

pub(super) struct AppState {
    pub(super) source: String,
    pub(super) view: SharedLogView,
    pub(super) mode: Mode,
    pub(super) input: Input,
    pub(super) status_message: String,
    search_tx: mpsc::Sender<SearchCommand>,
    states: watch::Receiver<SessionState>,
    search_status: watch::Receiver<SearchStatus>,
}

impl AppState {
    pub(super) fn new(
        source: impl Into<String>,
        view: SharedLogView,
        search_tx: mpsc::Sender<SearchCommand>,
        states: watch::Receiver<SessionState>,
        search_status: watch::Receiver<SearchStatus>,
    ) -> Self {
        Self {
            source: source.into(),
            view,
            mode: Mode::Normal,
            input: Input::default(),
            status_message: String::new(),
            search_tx,
            states,
            search_status,
        }
    }

    pub(super) fn session_state(&self) -> SessionState {
        *self.states.borrow()
    }

    pub(super) fn search_status(&self) -> SearchStatus {
        self.search_status.borrow().clone()
    }

    /// Queue a search command for the render task
    pub(super) fn send_search(&mut self, command: SearchCommand) {
        match self.search_tx.try_send(command) {
            Ok(()) => {}
            Err(TrySendError::Full(command)) => {
                warn!(?command, "search queue full, dropping command");
                self.status_message = "search busy, try again".to_string();
            }
            Err(TrySendError::Closed(_)) => {
                self.status_message = "session ended".to_string();
            }
        }
    }
}
