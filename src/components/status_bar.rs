use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Widget,
};

/// Status bar widget that displays the selected node, key hints, or a status message.
pub struct StatusBarWidget<'a> {
    node_id: &'a str,
    node_info: &'a str,
    status_message: Option<&'a str>,
    is_error: bool,
}

impl<'a> StatusBarWidget<'a> {
    pub fn new(node_id: &'a str, node_info: &'a str) -> Self {
        Self {
            node_id,
            node_info,
            status_message: None,
            is_error: false,
        }
    }

    pub fn status_message(mut self, msg: &'a str, is_error: bool) -> Self {
        self.status_message = Some(msg);
        self.is_error = is_error;
        self
    }
}

/// Truncate to at most `width` characters.
fn clip(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}

impl<'a> Widget for StatusBarWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }

        let width = area.width as usize;

        if let Some(msg) = self.status_message {
            let style = if self.is_error {
                Style::default().bg(Color::Red).fg(Color::White)
            } else {
                Style::default().fg(Color::Green)
            };
            let display = format!("{:<width$}", clip(msg, width), width = width);
            let line = Line::from(Span::styled(display, style));
            buf.set_line(area.x, area.y, &line, area.width);
            return;
        }

        // Normal bar: [node id] [node info] [key hints]
        let key_hints = " ⏎:open  /:search  q:quit ";
        let hints_len = key_hints.chars().count();
        let remaining = width.saturating_sub(hints_len);

        let info = clip(self.node_info, remaining);
        let id_budget = remaining
            .saturating_sub(info.chars().count())
            .saturating_sub(1);
        let id_len = self.node_id.chars().count();
        let id_display = if id_len > id_budget && id_budget > 3 {
            let tail: String = self.node_id.chars().skip(id_len - (id_budget - 3)).collect();
            format!("...{}", tail)
        } else {
            clip(self.node_id, id_budget)
        };

        let gap = remaining
            .saturating_sub(id_display.chars().count())
            .saturating_sub(info.chars().count());

        let line = Line::from(vec![
            Span::styled(id_display, Style::default().fg(Color::White)),
            Span::raw(" ".repeat(gap)),
            Span::styled(info, Style::default().fg(Color::Cyan)),
            Span::styled(
                key_hints,
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::DIM),
            ),
        ]);
        buf.set_line(area.x, area.y, &line, area.width);
    }
}
