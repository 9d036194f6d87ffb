use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

use crate::app::{Action, App, Focus};

/// Handle a key event, returning the engine action it triggers, if any.
pub fn handle_key_event(app: &mut App, key: KeyEvent) -> Option<Action> {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.quit();
        return None;
    }
    match app.focus {
        Focus::Tree => handle_tree_key(app, key),
        Focus::Search => handle_search_key(app, key),
    }
}

fn handle_tree_key(app: &mut App, key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Char('q') => {
            app.quit();
            None
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.select_next();
            None
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.select_previous();
            None
        }
        KeyCode::Home | KeyCode::Char('g') => {
            app.select_first();
            None
        }
        KeyCode::End | KeyCode::Char('G') => {
            app.select_last();
            None
        }
        KeyCode::Enter | KeyCode::Char(' ') => app.activate_selected(),
        KeyCode::Right | KeyCode::Char('l') => app
            .expand_selected()
            .or_else(|| app.activate_selected().filter(|a| matches!(a, Action::Open(_)))),
        KeyCode::Left | KeyCode::Char('h') => app.collapse_selected(),
        KeyCode::Char('/') => {
            app.focus_search();
            None
        }
        _ => None,
    }
}

fn handle_search_key(app: &mut App, key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Esc => Some(app.leave_search()),
        KeyCode::Enter => app.open_selected_result(),
        KeyCode::Down => {
            app.select_next();
            None
        }
        KeyCode::Up => {
            app.select_previous();
            None
        }
        KeyCode::Left => {
            app.search_cursor_left();
            None
        }
        KeyCode::Right => {
            app.search_cursor_right();
            None
        }
        KeyCode::Backspace => app.search_delete_char(),
        KeyCode::Char(c) => Some(app.search_input_char(c)),
        _ => None,
    }
}

/// Scroll wheel moves the selection.
pub fn handle_mouse_event(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollDown => app.select_next(),
        MouseEventKind::ScrollUp => app.select_previous(),
        _ => {}
    }
}
