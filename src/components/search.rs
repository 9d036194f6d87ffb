use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Widget},
};

use crate::app::SearchState;

/// Search input line.
pub struct SearchBarWidget<'a> {
    state: &'a SearchState,
    focused: bool,
}

impl<'a> SearchBarWidget<'a> {
    pub fn new(state: &'a SearchState, focused: bool) -> Self {
        Self { state, focused }
    }
}

impl<'a> Widget for SearchBarWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }

        let prompt_style = Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD);

        if !self.focused && self.state.query.is_empty() {
            let line = Line::from(vec![
                Span::styled("/ ", prompt_style),
                Span::styled("search", Style::default().fg(Color::DarkGray)),
            ]);
            buf.set_line(area.x, area.y, &line, area.width);
            return;
        }

        let query = &self.state.query;
        let cursor_pos = self.state.cursor_position.min(query.len());
        let (before, rest) = query.split_at(cursor_pos);
        let (cursor_char, after) = match rest.chars().next() {
            Some(c) => rest.split_at(c.len_utf8()),
            None => (" ", ""),
        };

        let input_style = Style::default().fg(Color::White);
        let cursor_style = if self.focused {
            Style::default()
                .bg(Color::White)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD)
        } else {
            input_style
        };

        let line = Line::from(vec![
            Span::styled("> ", prompt_style),
            Span::styled(before, input_style),
            Span::styled(cursor_char, cursor_style),
            Span::styled(after, input_style),
        ]);
        buf.set_line(area.x, area.y, &line, area.width);
    }
}

/// Ranked results of the current query.
pub struct SearchResultsWidget<'a> {
    state: &'a SearchState,
    block: Option<Block<'a>>,
}

impl<'a> SearchResultsWidget<'a> {
    pub fn new(state: &'a SearchState) -> Self {
        Self { state, block: None }
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }

    fn summary(&self) -> String {
        if let Some(error) = &self.state.error {
            return format!("search failed: {}", error);
        }
        match &self.state.results {
            None => "searching…".to_string(),
            Some(results) => format!(
                "{} result{}",
                results.len(),
                if results.len() == 1 { "" } else { "s" }
            ),
        }
    }
}

impl<'a> Widget for SearchResultsWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let inner = if let Some(block) = &self.block {
            let inner = block.inner(area);
            block.clone().render(area, buf);
            inner
        } else {
            area
        };
        if inner.height == 0 || inner.width == 0 {
            return;
        }

        let summary_style = if self.state.error.is_some() {
            Style::default().fg(Color::Red)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let summary = Line::from(Span::styled(format!("─── {} ", self.summary()), summary_style));
        buf.set_line(inner.x, inner.y, &summary, inner.width);

        let Some(results) = &self.state.results else {
            return;
        };

        let visible = inner.height.saturating_sub(1) as usize;
        let scroll = if self.state.selected_index >= visible {
            self.state.selected_index + 1 - visible
        } else {
            0
        };

        for (i, result) in results.iter().skip(scroll).take(visible).enumerate() {
            let row = inner.y + 1 + i as u16;
            let is_selected = i + scroll == self.state.selected_index;

            let marker = if is_selected {
                Span::styled(
                    "▸ ",
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                )
            } else {
                Span::raw("  ")
            };
            let title_style = match (is_selected, result.draggable) {
                (true, _) => Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
                (false, true) => Style::default().fg(Color::Green),
                (false, false) => Style::default().fg(Color::Gray),
            };

            let line = Line::from(vec![
                marker,
                Span::styled(result.title.as_str(), title_style),
                Span::raw("  "),
                Span::styled(result.label.as_str(), Style::default().fg(Color::DarkGray)),
                Span::styled(
                    format!("  [{}]", result.source),
                    Style::default()
                        .fg(Color::DarkGray)
                        .add_modifier(Modifier::DIM),
                ),
            ]);
            buf.set_line(inner.x, row, &line, inner.width);
        }
    }
}
