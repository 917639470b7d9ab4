use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::app::{App, NoticeLevel, View, EXPORT_FILE};

/// Poll for events with a timeout
pub fn poll_event(timeout: Duration) -> Result<Option<Event>> {
    if event::poll(timeout)? {
        Ok(Some(event::read()?))
    } else {
        Ok(None)
    }
}

/// Handle a key event
pub fn handle_key_event(app: &mut App, key: KeyEvent) {
    if key.kind == KeyEventKind::Release {
        return;
    }

    // Ctrl-C always quits
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.quit();
        return;
    }

    // If help is shown, any key closes it
    if app.show_help {
        app.show_help = false;
        return;
    }

    if app.show_reports {
        handle_reports_key(app, key);
        return;
    }

    match key.code {
        KeyCode::Char('q') => app.quit(),

        // View switching
        KeyCode::Tab => {
            if key.modifiers.contains(KeyModifiers::SHIFT) {
                app.prev_view();
            } else {
                app.next_view();
            }
        }
        KeyCode::BackTab => app.prev_view(),
        KeyCode::Left => app.prev_view(),
        KeyCode::Right => app.next_view(),
        KeyCode::Char('1') => app.set_view(View::Overview),
        KeyCode::Char('2') => app.set_view(View::Processes),
        KeyCode::Char('3') => app.set_view(View::Storage),

        KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),

        // Session control
        KeyCode::Char('s') => app.start_session(),
        KeyCode::Char('x') => app.stop_session(),

        KeyCode::Char('R') => app.toggle_reports(),
        KeyCode::Char('c') => app.clear_charts(),
        KeyCode::Char('?') => app.toggle_help(),

        KeyCode::Esc => {
            app.close_overlay();
        }

        KeyCode::Char('e') => {
            let export_path = PathBuf::from(EXPORT_FILE);
            match app.export_state(&export_path) {
                Ok(()) => app.notify(
                    NoticeLevel::Success,
                    format!("Exported to {}", export_path.display()),
                ),
                Err(e) => app.notify(NoticeLevel::Error, format!("Export failed: {}", e)),
            }
        }

        _ => {}
    }
}

/// Keys while the reports overlay is open
fn handle_reports_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('R') => {
            app.close_overlay();
        }
        KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::Enter => app.download_selected_report(),
        KeyCode::Char('r') => app.refresh_reports(),
        _ => {}
    }
}
