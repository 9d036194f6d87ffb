use ratatui::{
    layout::{Constraint, Direction, Layout},
    widgets::{Block, Borders},
    Frame,
};

use crate::app::{App, Focus};
use crate::components::search::{SearchBarWidget, SearchResultsWidget};
use crate::components::status_bar::StatusBarWidget;
use crate::components::tree::TreeWidget;

/// Render the application UI: search bar, tree or results, status bar.
pub fn render(app: &mut App, frame: &mut Frame) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(frame.area());

    frame.render_widget(
        SearchBarWidget::new(&app.search, app.focus == Focus::Search),
        chunks[0],
    );

    if app.search.is_active() {
        let block = Block::default().title(" Search ").borders(Borders::ALL);
        frame.render_widget(SearchResultsWidget::new(&app.search).block(block), chunks[1]);
    } else {
        // account for border
        let visible_height = chunks[1].height.saturating_sub(2) as usize;
        app.update_scroll(visible_height);

        let block = Block::default().title(" Navigator ").borders(Borders::ALL);
        let tree_widget = TreeWidget::new(&app.tree, &app.rows)
            .selected(app.selected_index, app.scroll_offset)
            .block(block);
        frame.render_widget(tree_widget, chunks[1]);
    }

    app.clear_expired_status();
    let (node_id, node_info) = match app.selected_node() {
        Some(node) => (node.id().to_string(), node.kind.label().to_string()),
        None => (String::new(), String::new()),
    };
    let mut status = StatusBarWidget::new(&node_id, &node_info);
    if let Some((msg, is_error, _)) = &app.status_message {
        status = status.status_message(msg, *is_error);
    }
    frame.render_widget(status, chunks[2]);
}
