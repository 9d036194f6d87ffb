use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Widget},
};

use crate::nav::coordinator::NavTree;
use crate::nav::model::{TreeNode, VisibleRow};
use crate::nav::node::{NodeData, NodeKind};
use crate::sources::ConnectionState;

/// Tree widget that renders the navigation tree with box-drawing characters.
pub struct TreeWidget<'a> {
    tree: &'a NavTree,
    rows: &'a [VisibleRow],
    selected: usize,
    scroll: usize,
    block: Option<Block<'a>>,
}

impl<'a> TreeWidget<'a> {
    pub fn new(tree: &'a NavTree, rows: &'a [VisibleRow]) -> Self {
        Self {
            tree,
            rows,
            selected: 0,
            scroll: 0,
            block: None,
        }
    }

    pub fn selected(mut self, selected: usize, scroll: usize) -> Self {
        self.selected = selected;
        self.scroll = scroll;
        self
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = block.into();
        self
    }

    /// Build the prefix string for tree indentation using box-drawing characters.
    ///
    /// We need to know the ancestor chain to draw continuation lines correctly.
    fn build_prefix(row: &VisibleRow, rows: &[VisibleRow], row_index: usize) -> String {
        if row.depth == 0 {
            return String::new();
        }

        let mut parts: Vec<&str> = Vec::new();

        // Roots are drawn flush left, so continuation lines start at depth 1
        for d in 1..row.depth {
            let mut ancestor_is_last = false;
            for j in (0..row_index).rev() {
                if rows[j].depth == d {
                    ancestor_is_last = rows[j].is_last_sibling;
                    break;
                }
                if rows[j].depth < d {
                    break;
                }
            }
            if ancestor_is_last {
                parts.push("   ");
            } else {
                parts.push("│  ");
            }
        }

        if row.is_last_sibling {
            parts.push("└──");
        } else {
            parts.push("├──");
        }

        parts.join("")
    }

    /// Kind indicator, with open/closed state for expandable nodes.
    fn indicator(node: &TreeNode<NodeData>) -> &'static str {
        match node.kind {
            NodeKind::Source if node.is_expanded => "▾ ",
            NodeKind::Source => "▸ ",
            NodeKind::Project => "[P] ",
            NodeKind::Folder if node.is_expanded => "[-] ",
            NodeKind::Folder => "[+] ",
            NodeKind::File => "[F] ",
            NodeKind::App => "[A] ",
        }
    }

    /// Loading, error and connection markers appended after the label.
    fn suffix(node: &TreeNode<NodeData>) -> String {
        let mut suffix = String::new();
        if let NodeData::Source(Some(source)) = &node.data {
            match source.status {
                ConnectionState::Connected => {}
                ConnectionState::Connecting => suffix.push_str(" (connecting)"),
                ConnectionState::Disconnected => suffix.push_str(" (offline)"),
            }
        }
        if node.loading {
            suffix.push_str(" …");
        }
        if node.error.is_some() {
            suffix.push_str(" !");
        }
        suffix
    }

    fn style(node: &TreeNode<NodeData>, is_selected: bool) -> Style {
        if is_selected {
            return Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD);
        }
        if node.error.is_some() {
            return Style::default().fg(Color::Red);
        }
        match node.kind {
            NodeKind::Source => Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            NodeKind::Project | NodeKind::Folder => Style::default()
                .fg(Color::Blue)
                .add_modifier(Modifier::BOLD),
            NodeKind::App => Style::default().fg(Color::Green),
            NodeKind::File => Style::default().fg(Color::Gray),
        }
    }
}

impl<'a> Widget for TreeWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let inner_area = if let Some(block) = &self.block {
            let inner = block.inner(area);
            block.clone().render(area, buf);
            inner
        } else {
            area
        };

        let visible_height = inner_area.height as usize;
        if self.rows.is_empty() || visible_height == 0 {
            return;
        }

        let visible_rows = self
            .rows
            .iter()
            .enumerate()
            .skip(self.scroll)
            .take(visible_height);

        for (i, (idx, row)) in visible_rows.enumerate() {
            let Some(node) = self.tree.find(&row.id) else {
                continue;
            };
            let y = inner_area.y + i as u16;

            let prefix = Self::build_prefix(row, self.rows, idx);
            let line_content = format!(
                "{}{}{}{}",
                prefix,
                Self::indicator(node),
                node.label,
                Self::suffix(node)
            );
            let style = Self::style(node, idx == self.selected);
            let line = Line::from(Span::styled(line_content, style));
            buf.set_line(inner_area.x, y, &line, inner_area.width);
        }
    }
}
