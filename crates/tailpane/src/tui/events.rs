/*
[INPUT]:  Crossterm key events
[OUTPUT]: Viewer navigation, search prompt editing, and search commands
[POS]:    TUI key handling
[UPDATE]: When changing keybindings
*/

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tailpane::render::SearchCommand;
use tui_input::InputRequest;

use super::app::{AppState, Mode};

/// Handles key events for the TUI.
///
/// Returns `true` if quit is requested, `false` otherwise.
pub(super) fn handle_key_event(app: &mut AppState, key: KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return true;
    }
    match app.mode {
        Mode::Normal => handle_normal_key(app, key.code),
        Mode::Search => {
            handle_search_key(app, key.code);
            false
        }
    }
}

fn handle_normal_key(app: &mut AppState, key: KeyCode) -> bool {
    match key {
        KeyCode::Char('q') => return true,
        KeyCode::Char('j') | KeyCode::Down => app.view.with(|view| view.scroll_down()),
        KeyCode::Char('k') | KeyCode::Up => app.view.with(|view| view.scroll_up()),
        KeyCode::PageDown => app.view.with(|view| view.scroll_down_fast()),
        KeyCode::PageUp => app.view.with(|view| view.scroll_up_fast()),
        KeyCode::Char('h') | KeyCode::Left => app.view.with(|view| view.scroll_left()),
        KeyCode::Char('l') | KeyCode::Right => app.view.with(|view| view.scroll_right()),
        KeyCode::Char('H') => app.view.with(|view| view.scroll_left_fast()),
        KeyCode::Char('L') => app.view.with(|view| view.scroll_right_fast()),
        KeyCode::Char('g') | KeyCode::Home => app.view.with(|view| view.jump_to_top()),
        KeyCode::Char('G') | KeyCode::End => app.view.with(|view| view.enable_autoscroll()),
        KeyCode::Char('/') => {
            app.input.reset();
            app.mode = Mode::Search;
        }
        KeyCode::Char('n') => app.send_search(SearchCommand::Next),
        KeyCode::Char('N') => app.send_search(SearchCommand::Prev),
        KeyCode::Esc => app.send_search(SearchCommand::Clear),
        _ => {}
    }
    false
}

fn handle_search_key(app: &mut AppState, key: KeyCode) {
    let request = match key {
        KeyCode::Enter => {
            let needle = app.input.value().to_string();
            app.mode = Mode::Normal;
            if needle.is_empty() {
                app.send_search(SearchCommand::Clear);
            } else {
                app.send_search(SearchCommand::SetNeedle(needle));
            }
            return;
        }
        KeyCode::Esc => {
            app.input.reset();
            app.mode = Mode::Normal;
            app.send_search(SearchCommand::Clear);
            return;
        }
        KeyCode::Char(c) => InputRequest::InsertChar(c),
        KeyCode::Backspace => InputRequest::DeletePrevChar,
        KeyCode::Delete => InputRequest::DeleteNextChar,
        KeyCode::Left => InputRequest::GoToPrevChar,
        KeyCode::Right => InputRequest::GoToNextChar,
        KeyCode::Home => InputRequest::GoToStart,
        KeyCode::End => InputRequest::GoToEnd,
        _ => return,
    };
    app.input.handle(request);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tailpane::render::SearchStatus;
    use tailpane::search::{LineStyle, RenderedLine};
    use tailpane::surface::{LogView, SharedLogView, TextSurface, ViewOptions};
    use tailpane::SessionState;
    use tokio::sync::{mpsc, watch};

    fn app() -> (AppState, mpsc::Receiver<SearchCommand>) {
        let view = SharedLogView::new(LogView::new(ViewOptions::default()));
        view.with(|view| {
            view.set_viewport(20, 5);
            view.replace_content(
                (0..30)
                    .map(|index| RenderedLine {
                        index,
                        text: format!("line {index}").into(),
                        style: LineStyle::Plain,
                    })
                    .collect(),
            );
        });
        let (search_tx, search_rx) = mpsc::channel(8);
        let (_, states) = watch::channel(SessionState::Streaming);
        let (_, status) = watch::channel(SearchStatus::default());
        (AppState::new("web", view, search_tx, states, status), search_rx)
    }

    fn press(app: &mut AppState, code: KeyCode) -> bool {
        handle_key_event(app, KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn test_quit_keys() {
        let (mut app, _rx) = app();
        assert!(press(&mut app, KeyCode::Char('q')));
        assert!(handle_key_event(
            &mut app,
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)
        ));
    }

    #[test]
    fn test_navigation_keys_drive_the_view() {
        let (mut app, _rx) = app();
        assert_eq!(app.view.origin(), (0, 25));

        press(&mut app, KeyCode::Char('k'));
        assert_eq!(app.view.origin(), (0, 23));
        assert!(!app.view.autoscroll());

        press(&mut app, KeyCode::Char('g'));
        assert_eq!(app.view.origin(), (0, 0));

        press(&mut app, KeyCode::Char('G'));
        assert!(app.view.autoscroll());
        assert_eq!(app.view.origin(), (0, 25));
    }

    #[test]
    fn test_search_prompt_sends_needle() {
        let (mut app, mut rx) = app();
        press(&mut app, KeyCode::Char('/'));
        assert_eq!(app.mode, Mode::Search);
        for c in "errx".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        press(&mut app, KeyCode::Backspace);
        // 'q' is text while the prompt is open
        assert!(!press(&mut app, KeyCode::Char('q')));
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.mode, Mode::Normal);
        assert_eq!(
            rx.try_recv().unwrap(),
            SearchCommand::SetNeedle("errq".to_string())
        );

        press(&mut app, KeyCode::Char('n'));
        press(&mut app, KeyCode::Char('N'));
        press(&mut app, KeyCode::Esc);
        assert_eq!(rx.try_recv().unwrap(), SearchCommand::Next);
        assert_eq!(rx.try_recv().unwrap(), SearchCommand::Prev);
        assert_eq!(rx.try_recv().unwrap(), SearchCommand::Clear);
    }

    #[test]
    fn test_empty_prompt_clears_search() {
        let (mut app, mut rx) = app();
        press(&mut app, KeyCode::Char('/'));
        press(&mut app, KeyCode::Enter);
        assert_eq!(rx.try_recv().unwrap(), SearchCommand::Clear);
    }
}
