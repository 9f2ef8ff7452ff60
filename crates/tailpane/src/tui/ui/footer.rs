/*
[INPUT]:  AppState (mode, prompt input, session state, search status)
[OUTPUT]: Footer with hotkeys and status, or the search prompt
[POS]:    TUI UI footer rendering
[UPDATE]: When changing hotkeys or status fields
*/

use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::tui::app::{AppState, Mode};

use super::{border_style, key_style};

pub(in crate::tui) fn draw_footer(
    frame: &mut ratatui::Frame,
    area: ratatui::layout::Rect,
    app: &AppState,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style());

    if app.mode == Mode::Search {
        let prompt = Paragraph::new(format!("/{}", app.input.value())).block(block.title("Search"));
        frame.render_widget(prompt, area);
        let cursor_x = area.x + 2 + app.input.visual_cursor() as u16;
        frame.set_cursor_position((cursor_x.min(area.right().saturating_sub(2)), area.y + 1));
        return;
    }

    let key_style = key_style();
    let hotkeys = Line::from(vec![
        Span::styled("[j/k]", key_style),
        Span::raw(" Scroll  "),
        Span::styled("[h/l]", key_style),
        Span::raw(" Pan  "),
        Span::styled("[g/G]", key_style),
        Span::raw(" Top/Follow  "),
        Span::styled("[/]", key_style),
        Span::raw(" Search  "),
        Span::styled("[n/N]", key_style),
        Span::raw(" Next/Prev  "),
        Span::styled("[Esc]", key_style),
        Span::raw(" Clear  "),
        Span::styled("[q]", key_style),
        Span::raw(" Quit"),
    ]);

    let search = app.search_status();
    let mut status = format!("{} | {}", app.source, app.session_state().label());
    if let Some(counter) = search.counter {
        status.push_str(&format!(" | /{} {}", search.needle, counter));
    }
    if !app.status_message.is_empty() {
        status.push_str(&format!(" | {}", app.status_message));
    }

    let text = Text::from(vec![hotkeys, Line::from(Span::raw(status))]);
    frame.render_widget(Paragraph::new(text).block(block.title("tailpane")), area);
}
