use std::time::Instant;

use crate::nav::collaborators::open_target;
use crate::nav::coordinator::NavTree;
use crate::nav::model::{TreeNode, VisibleRow};
use crate::nav::node::NodeData;
use crate::nav::search::{SearchResult, SearchUpdate};

/// Which panel receives key input.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    #[default]
    Tree,
    Search,
}

/// Something the event loop must hand to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Toggle { id: String, expanded: bool },
    Open(String),
    Search(String),
}

/// State of the search box and its result list.
#[derive(Debug, Default)]
pub struct SearchState {
    pub query: String,
    pub cursor_position: usize,
    /// `None` while a query is pending or in flight.
    pub results: Option<Vec<SearchResult>>,
    pub selected_index: usize,
    pub error: Option<String>,
}

impl SearchState {
    /// Whether the results panel replaces the tree.
    pub fn is_active(&self) -> bool {
        !self.query.trim().is_empty()
    }
}

/// Main application state.
pub struct App {
    pub tree: NavTree,
    pub rows: Vec<VisibleRow>,
    pub selected_index: usize,
    pub scroll_offset: usize,
    pub focus: Focus,
    pub search: SearchState,
    pub should_quit: bool,
    /// Message, whether it is an error, and when it was set.
    pub status_message: Option<(String, bool, Instant)>,
}

impl App {
    pub fn new(tree: NavTree) -> Self {
        let mut app = Self {
            tree,
            rows: Vec::new(),
            selected_index: 0,
            scroll_offset: 0,
            focus: Focus::Tree,
            search: SearchState::default(),
            should_quit: false,
            status_message: None,
        };
        app.refresh_rows();
        app
    }

    /// Re-flatten the tree after a mutation, keeping the selected node selected.
    pub fn refresh_rows(&mut self) {
        let selected_id = self.rows.get(self.selected_index).map(|r| r.id.clone());
        self.rows = self.tree.visible_rows();
        if let Some(id) = selected_id {
            if let Some(index) = self.rows.iter().position(|r| r.id == id) {
                self.selected_index = index;
                return;
            }
        }
        self.selected_index = self.selected_index.min(self.rows.len().saturating_sub(1));
    }

    pub fn selected_node(&self) -> Option<&TreeNode<NodeData>> {
        self.rows
            .get(self.selected_index)
            .and_then(|row| self.tree.find(&row.id))
    }

    /// Quit the application.
    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    /// Move selection down by one item.
    pub fn select_next(&mut self) {
        match self.focus {
            Focus::Tree => {
                if self.selected_index + 1 < self.rows.len() {
                    self.selected_index += 1;
                }
            }
            Focus::Search => {
                let len = self.search.results.as_ref().map_or(0, Vec::len);
                if self.search.selected_index + 1 < len {
                    self.search.selected_index += 1;
                }
            }
        }
    }

    /// Move selection up by one item.
    pub fn select_previous(&mut self) {
        match self.focus {
            Focus::Tree => self.selected_index = self.selected_index.saturating_sub(1),
            Focus::Search => {
                self.search.selected_index = self.search.selected_index.saturating_sub(1)
            }
        }
    }

    pub fn select_first(&mut self) {
        self.selected_index = 0;
    }

    pub fn select_last(&mut self) {
        self.selected_index = self.rows.len().saturating_sub(1);
    }

    /// Keep the selected row inside a viewport of `visible_height` rows.
    pub fn update_scroll(&mut self, visible_height: usize) {
        if visible_height == 0 {
            return;
        }
        if self.selected_index < self.scroll_offset {
            self.scroll_offset = self.selected_index;
        } else if self.selected_index >= self.scroll_offset + visible_height {
            self.scroll_offset = self.selected_index + 1 - visible_height;
        }
    }

    /// Toggle the selected node, or open it if it is a leaf.
    pub fn activate_selected(&self) -> Option<Action> {
        let node = self.selected_node()?;
        if node.is_expandable {
            return Some(Action::Toggle {
                id: node.id().to_string(),
                expanded: !node.is_expanded,
            });
        }
        open_target(node).map(Action::Open)
    }

    /// Expand the selected node if it is collapsed.
    pub fn expand_selected(&self) -> Option<Action> {
        let node = self.selected_node()?;
        if !node.is_expandable || node.is_expanded {
            return None;
        }
        Some(Action::Toggle {
            id: node.id().to_string(),
            expanded: true,
        })
    }

    /// Collapse the selected node, or jump to its parent if it is not expanded.
    pub fn collapse_selected(&mut self) -> Option<Action> {
        let node = self.selected_node()?;
        if node.is_expandable && node.is_expanded {
            return Some(Action::Toggle {
                id: node.id().to_string(),
                expanded: false,
            });
        }
        let parent = node.parent()?.to_string();
        if let Some(index) = self.rows.iter().position(|r| r.id == parent) {
            self.selected_index = index;
        }
        None
    }

    // ── Search input ────────────────────────────────────────────────────────

    pub fn focus_search(&mut self) {
        self.focus = Focus::Search;
        self.search.cursor_position = self.search.query.len();
    }

    /// Leave the search box, clearing the query and its results.
    pub fn leave_search(&mut self) -> Action {
        self.focus = Focus::Tree;
        self.search = SearchState::default();
        Action::Search(String::new())
    }

    /// Insert a character at the cursor and emit the new query.
    pub fn search_input_char(&mut self, c: char) -> Action {
        self.search.query.insert(self.search.cursor_position, c);
        self.search.cursor_position += c.len_utf8();
        Action::Search(self.search.query.clone())
    }

    /// Delete the character before the cursor (backspace).
    pub fn search_delete_char(&mut self) -> Option<Action> {
        let prev_char = self.search.query[..self.search.cursor_position]
            .chars()
            .next_back()?;
        self.search.cursor_position -= prev_char.len_utf8();
        self.search.query.remove(self.search.cursor_position);
        Some(Action::Search(self.search.query.clone()))
    }

    pub fn search_cursor_left(&mut self) {
        if let Some(c) = self.search.query[..self.search.cursor_position]
            .chars()
            .next_back()
        {
            self.search.cursor_position -= c.len_utf8();
        }
    }

    pub fn search_cursor_right(&mut self) {
        if let Some(c) = self.search.query[self.search.cursor_position..].chars().next() {
            self.search.cursor_position += c.len_utf8();
        }
    }

    /// Open the selected search result.
    pub fn open_selected_result(&self) -> Option<Action> {
        let results = self.search.results.as_ref()?;
        let result = results.get(self.search.selected_index)?;
        Some(Action::Open(result.id.clone()))
    }

    pub fn apply_search_update(&mut self, update: SearchUpdate) {
        match update {
            SearchUpdate::Cleared => {
                self.search.results = None;
                self.search.error = None;
                self.search.selected_index = 0;
            }
            SearchUpdate::Results { results, .. } => {
                self.search.results = Some(results);
                self.search.error = None;
                self.search.selected_index = 0;
            }
            SearchUpdate::Failed { message, .. } => {
                self.search.results = None;
                self.search.error = Some(message);
            }
        }
    }

    // ── Status bar ──────────────────────────────────────────────────────────

    pub fn set_status_message(&mut self, msg: String, is_error: bool) {
        self.status_message = Some((msg, is_error, Instant::now()));
    }

    /// Clear the status message if it has been displayed for more than 3 seconds.
    pub fn clear_expired_status(&mut self) {
        if let Some((_, _, ref created)) = self.status_message {
            if created.elapsed().as_secs() > 3 {
                self.status_message = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::listing::{build_children, source_nodes, ExpandedIds, Listing};
    use crate::nav::node::{NodeKind, LOCAL_SOURCE_ID};
    use crate::sources::FilesystemEntry;

    fn setup_app() -> App {
        let expanded: ExpandedIds = [LOCAL_SOURCE_ID, "/w"].iter().map(|s| s.to_string()).collect();
        let mut tree = NavTree::new();
        tree.initialize(source_nodes("Local Files", Vec::new(), &expanded));
        tree.replace_children(
            LOCAL_SOURCE_ID,
            build_children(LOCAL_SOURCE_ID, Listing::LocalRoot(vec!["/w".into()]), &expanded),
            |_| {},
        );
        tree.replace_children(
            "/w",
            build_children(
                "/w",
                Listing::Folder(vec![
                    FilesystemEntry::directory("/w/sub"),
                    FilesystemEntry::file("/w/a.cwl", None),
                ]),
                &expanded,
            ),
            |_| {},
        );
        App::new(tree)
    }

    fn result(id: &str) -> SearchResult {
        SearchResult {
            id: id.into(),
            title: id.into(),
            label: String::new(),
            relevance: 1.0,
            source: "local".into(),
            draggable: false,
        }
    }

    #[test]
    fn rows_follow_expanded_nodes() {
        let app = setup_app();
        let ids: Vec<&str> = app.rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["local", "/w", "/w/sub", "/w/a.cwl"]);
    }

    #[test]
    fn select_next_clamps_at_end() {
        let mut app = setup_app();
        app.select_last();
        app.select_next();
        assert_eq!(app.selected_index, 3);
        app.select_first();
        app.select_previous();
        assert_eq!(app.selected_index, 0);
    }

    #[test]
    fn activate_toggles_folders_and_opens_files() {
        let mut app = setup_app();
        app.selected_index = 1;
        assert_eq!(
            app.activate_selected(),
            Some(Action::Toggle {
                id: "/w".into(),
                expanded: false
            })
        );
        app.selected_index = 3;
        assert_eq!(app.activate_selected(), Some(Action::Open("/w/a.cwl".into())));
    }

    #[test]
    fn expand_selected_only_for_collapsed_folders() {
        let mut app = setup_app();
        app.selected_index = 2;
        assert_eq!(
            app.expand_selected(),
            Some(Action::Toggle {
                id: "/w/sub".into(),
                expanded: true
            })
        );
        app.selected_index = 1;
        assert_eq!(app.expand_selected(), None);
    }

    #[test]
    fn collapse_on_leaf_jumps_to_parent() {
        let mut app = setup_app();
        app.selected_index = 3;
        assert_eq!(app.collapse_selected(), None);
        assert_eq!(app.selected_index, 1);
    }

    #[test]
    fn refresh_keeps_selected_node() {
        let mut app = setup_app();
        app.selected_index = 3; // /w/a.cwl
        app.tree.modify("/w/sub", |n| n.is_expanded = true);
        let child = TreeNode::new(
            "/w/sub/x",
            "x",
            NodeKind::File,
            NodeData::Entry(FilesystemEntry::file("/w/sub/x", None)),
        );
        app.tree.replace_children("/w/sub", vec![child], |_| {});
        app.refresh_rows();
        assert_eq!(app.rows[app.selected_index].id, "/w/a.cwl");
    }

    #[test]
    fn refresh_clamps_when_selection_disappears() {
        let mut app = setup_app();
        app.selected_index = 3;
        app.tree.modify(LOCAL_SOURCE_ID, |n| n.is_expanded = false);
        app.refresh_rows();
        assert_eq!(app.selected_index, 0);
    }

    #[test]
    fn update_scroll_follows_selection() {
        let mut app = setup_app();
        app.selected_index = 3;
        app.update_scroll(2);
        assert_eq!(app.scroll_offset, 2);
        app.selected_index = 0;
        app.update_scroll(2);
        assert_eq!(app.scroll_offset, 0);
    }

    #[test]
    fn typing_emits_search_actions() {
        let mut app = setup_app();
        app.focus_search();
        assert_eq!(app.search_input_char('b'), Action::Search("b".into()));
        assert_eq!(app.search_input_char('w'), Action::Search("bw".into()));
        assert_eq!(app.search_delete_char(), Some(Action::Search("b".into())));
        app.search_cursor_left();
        assert_eq!(app.search.cursor_position, 0);
        assert_eq!(app.search_delete_char(), None);
        app.search_cursor_right();
        assert_eq!(app.search.cursor_position, 1);
    }

    #[test]
    fn leave_search_resets_state() {
        let mut app = setup_app();
        app.focus_search();
        app.search_input_char('x');
        assert_eq!(app.leave_search(), Action::Search(String::new()));
        assert_eq!(app.focus, Focus::Tree);
        assert!(app.search.query.is_empty());
    }

    #[test]
    fn search_updates_replace_results() {
        let mut app = setup_app();
        app.apply_search_update(SearchUpdate::Results {
            term: "a".into(),
            results: vec![result("/w/a.cwl"), result("sbg/ana/demo/bwa")],
        });
        app.focus = Focus::Search;
        app.select_next();
        assert_eq!(
            app.open_selected_result(),
            Some(Action::Open("sbg/ana/demo/bwa".into()))
        );

        app.apply_search_update(SearchUpdate::Cleared);
        assert!(app.search.results.is_none());
        assert_eq!(app.search.selected_index, 0);

        app.apply_search_update(SearchUpdate::Failed {
            term: "a".into(),
            message: "down".into(),
        });
        assert_eq!(app.search.error.as_deref(), Some("down"));
    }

    #[test]
    fn quit_sets_flag() {
        let mut app = setup_app();
        assert!(!app.should_quit);
        app.quit();
        assert!(app.should_quit);
    }

    #[test]
    fn clear_expired_status_removes_old() {
        let mut app = setup_app();
        app.set_status_message("fresh".to_string(), false);
        app.clear_expired_status();
        assert!(app.status_message.is_some());

        app.status_message = Some((
            "old".to_string(),
            true,
            Instant::now() - std::time::Duration::from_secs(5),
        ));
        app.clear_expired_status();
        assert!(app.status_message.is_none());
    }
}
