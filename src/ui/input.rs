//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};

use crate::app::{App, AppState, Focus};
use crate::models::Category;

/// Handle keyboard input. Returns true if the app should quit.
pub fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    // Handle help overlay
    if matches!(app.state, AppState::ShowingHelp) {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
            app.state = AppState::Normal;
        }
        return Ok(false);
    }

    // Handle quit confirmation
    if matches!(app.state, AppState::ConfirmingQuit) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                app.state = AppState::Quitting;
                return Ok(true);
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                app.state = AppState::Normal;
            }
            _ => {}
        }
        return Ok(false);
    }

    // Global keys
    match key.code {
        KeyCode::Char('q') => {
            app.state = AppState::ConfirmingQuit;
        }
        KeyCode::Char('?') => {
            app.state = AppState::ShowingHelp;
        }
        KeyCode::Tab | KeyCode::BackTab => {
            app.focus = app.focus.toggle();
        }
        KeyCode::Char(c @ '1'..='4') => {
            let index = c as usize - '1' as usize;
            if let Some(category) = Category::from_index(index) {
                app.set_category(category);
            }
        }
        KeyCode::Char('a') => app.select_all(),
        KeyCode::Char('c') => app.clear_all(),
        KeyCode::Char('r') => app.reload_directory(),
        KeyCode::Esc => {
            app.status_message = None;
        }
        _ => match app.focus {
            Focus::Regions => handle_regions_input(app, key),
            Focus::Categories => handle_categories_input(app, key),
        },
    }

    Ok(false)
}

fn handle_regions_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Left | KeyCode::Char('h') => app.move_region_cursor(-1, 0),
        KeyCode::Right | KeyCode::Char('l') => app.move_region_cursor(1, 0),
        KeyCode::Up | KeyCode::Char('k') => app.move_region_cursor(0, -1),
        KeyCode::Down | KeyCode::Char('j') => app.move_region_cursor(0, 1),
        KeyCode::Home => app.region_cursor = 0,
        KeyCode::End => app.region_cursor = app.regions.len().saturating_sub(1),
        KeyCode::Char(' ') | KeyCode::Enter => app.toggle_region_at_cursor(),
        _ => {}
    }
}

fn handle_categories_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Left | KeyCode::Char('h') | KeyCode::Up | KeyCode::Char('k') => {
            app.category_cursor = app.category_cursor.prev();
        }
        KeyCode::Right | KeyCode::Char('l') | KeyCode::Down | KeyCode::Char('j') => {
            app.category_cursor = app.category_cursor.next();
        }
        KeyCode::Char(' ') | KeyCode::Enter => {
            let category = app.category_cursor;
            app.set_category(category);
        }
        _ => {}
    }
}
