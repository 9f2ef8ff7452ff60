/*
[INPUT]:  TUI app state
[OUTPUT]: Panel render functions and shared styles
[POS]:    TUI UI module root
[UPDATE]: When adding panels or changing the palette
*/

mod footer;
mod logs;

use ratatui::style::{Color, Modifier, Style};

pub(in crate::tui) use footer::draw_footer;
pub(in crate::tui) use logs::draw_logs;

pub(crate) fn border_style() -> Style {
    Style::default().fg(Color::Magenta)
}

pub(crate) fn key_style() -> Style {
    Style::default()
        .fg(Color::Black)
        .bg(Color::Yellow)
        .add_modifier(Modifier::BOLD)
}

/// Black on yellow, as `ESC[30;43m`
pub(crate) fn match_style() -> Style {
    Style::default().fg(Color::Black).bg(Color::Yellow)
}

/// Reversed, as `ESC[7m`
pub(crate) fn selected_match_style() -> Style {
    Style::default().add_modifier(Modifier::REVERSED)
}
