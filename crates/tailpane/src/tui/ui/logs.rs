/*
[INPUT]:  SharedLogView written by the render scheduler
[OUTPUT]: Log panel rendered into Ratatui frame
[POS]:    TUI UI logs panel rendering
[UPDATE]: When changing how styled lines or scrolling are drawn
*/

use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use tailpane::search::{LineStyle, RenderedLine};
use tailpane::surface::{SharedLogView, TextSurface};

use super::{border_style, match_style, selected_match_style};

fn line_style(line: &RenderedLine) -> Style {
    match line.style {
        LineStyle::Plain => Style::default(),
        LineStyle::Match => match_style(),
        LineStyle::SelectedMatch => selected_match_style(),
    }
}

pub(in crate::tui) fn draw_logs(
    frame: &mut ratatui::Frame,
    area: ratatui::layout::Rect,
    view: &SharedLogView,
    title: &str,
) {
    let width = area.width.saturating_sub(2) as usize;
    let height = area.height.saturating_sub(2) as usize;
    let (text, wrap, scroll_x) = view.with(|view| {
        view.set_viewport(width, height);
        let text = view
            .visible_lines()
            .iter()
            .map(|line| Line::from(Span::styled(line.text.to_string(), line_style(line))))
            .collect::<Vec<_>>();
        (text, view.wrap(), view.origin().0)
    });

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style())
        .title(title.to_string());
    let mut widget = Paragraph::new(text).block(block);
    if wrap {
        widget = widget.wrap(Wrap { trim: false });
    } else {
        let scroll_x = u16::try_from(scroll_x).unwrap_or(u16::MAX);
        widget = widget.scroll((0, scroll_x));
    }
    frame.render_widget(widget, area);
}
