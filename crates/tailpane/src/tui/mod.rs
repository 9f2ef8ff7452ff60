/*
[INPUT]:  RuntimeClient, source id, AppConfig, shutdown token
[OUTPUT]: Ratatui log viewer driving one LogSession
[POS]:    TUI module for the tailpane binary
[UPDATE]: When changing the draw loop or session wiring
*/

mod app;
mod events;
mod terminal;
mod ui;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::Event as CrosstermEvent;
use ratatui::layout::{Constraint, Direction, Layout};
use tailpane::{AppConfig, LogSession, LogView, SharedLogView};
use tailpane_runtime::RuntimeClient;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use app::AppState;
use events::handle_key_event;
use terminal::TerminalGuard;
use ui::{draw_footer, draw_logs};

const UI_TICK_INTERVAL: Duration = Duration::from_millis(100);
const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(100);

enum UiEvent {
    Input(CrosstermEvent),
}

/// Show the logs of `source` until the user quits or `shutdown` fires.
pub(crate) async fn run(
    client: Arc<dyn RuntimeClient>,
    source: &str,
    config: &AppConfig,
    shutdown: CancellationToken,
) -> Result<()> {
    let mut terminal = TerminalGuard::new()?;
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let input_shutdown = CancellationToken::new();
    let input_shutdown_clone = input_shutdown.clone();

    tokio::task::spawn_blocking(move || {
        while !input_shutdown_clone.is_cancelled() {
            if crossterm::event::poll(INPUT_POLL_INTERVAL).unwrap_or(false) {
                if let Ok(event) = crossterm::event::read() {
                    let _ = event_tx.send(UiEvent::Input(event));
                }
            }
        }
    });

    let view = SharedLogView::new(LogView::new(config.view_options()));
    let session = LogSession::start(client, source, config, view.clone());
    let mut app = AppState::new(
        source,
        view,
        session.search(),
        session.states(),
        session.search_status(),
    );

    let mut tick = tokio::time::interval(UI_TICK_INTERVAL);
    let mut should_quit = false;
    let result = loop {
        if let Err(err) = terminal.draw(|frame| draw_ui(frame, &app)) {
            break Err(err);
        }
        if should_quit {
            break Ok(());
        }

        tokio::select! {
            _ = shutdown.cancelled() => should_quit = true,
            _ = tick.tick() => {}
            maybe_event = event_rx.recv() => {
                if let Some(UiEvent::Input(CrosstermEvent::Key(key))) = maybe_event {
                    should_quit = handle_key_event(&mut app, key);
                }
            }
        }
    };

    input_shutdown.cancel();
    let termination = session.stop().await;
    info!(?termination, "viewer closed");
    result
}

fn draw_ui(frame: &mut ratatui::Frame, app: &AppState) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(4)])
        .split(frame.area());

    let title = format!("Logs: {}", app.source);
    draw_logs(frame, layout[0], &app.view, &title);
    draw_footer(frame, layout[1], app);
}
