//! Keyboard and mouse input handling

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use csvdash_core::state::{InputMode, StatusLevel};

use crate::app::{App, AppResult};

/// Handle a key event
pub async fn handle_key(app: &mut App, key: KeyEvent) -> AppResult {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return AppResult::Quit;
    }

    let Some(dashboard) = app.dashboard.as_ref() else {
        return handle_login_mode(app, key).await;
    };

    let mode = dashboard.state.input_mode.clone();
    match mode {
        InputMode::Normal => handle_normal_mode(app, key).await,
        InputMode::Upload => handle_upload_mode(app, key).await,
        InputMode::Confirm(_) => handle_confirm_mode(app, key).await,
    }
}

/// Scroll wheel moves the file cursor
pub fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let Some(dashboard) = app.dashboard.as_mut() else {
        return;
    };

    match mouse.kind {
        MouseEventKind::ScrollDown => dashboard.state.cursor_down(),
        MouseEventKind::ScrollUp => dashboard.state.cursor_up(),
        _ => {}
    }
}

/// Handle keys on the login screen
async fn handle_login_mode(app: &mut App, key: KeyEvent) -> AppResult {
    match key.code {
        KeyCode::Esc => return AppResult::Quit,
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
            app.login.toggle_focus();
        }
        KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.login.toggle_mode();
        }
        KeyCode::Enter => {
            app.submit_login().await;
        }
        KeyCode::Backspace => {
            app.login.pop();
        }
        KeyCode::Char(c) => {
            app.login.push(c);
        }
        _ => {}
    }

    AppResult::Continue
}

/// Handle keys in normal mode (file list navigation and actions)
async fn handle_normal_mode(app: &mut App, key: KeyEvent) -> AppResult {
    let is_admin = app.is_admin();
    let Some(dashboard) = app.dashboard.as_mut() else {
        return AppResult::Continue;
    };

    match key.code {
        KeyCode::Char('q') => return AppResult::Quit,

        // Navigation
        KeyCode::Char('j') | KeyCode::Down => {
            dashboard.state.cursor_down();
        }
        KeyCode::Char('k') | KeyCode::Up => {
            dashboard.state.cursor_up();
        }
        KeyCode::Char('g') | KeyCode::Home => {
            dashboard.state.cursor_top();
        }
        KeyCode::Char('G') | KeyCode::End => {
            dashboard.state.cursor_bottom();
        }

        // Actions
        KeyCode::Enter | KeyCode::Char('v') => {
            dashboard.view_current().await;
        }
        KeyCode::Char('d') => {
            dashboard.request_delete_current();
        }
        KeyCode::Char('u') => {
            if is_admin {
                dashboard.state.enter_upload_mode();
            } else {
                dashboard
                    .state
                    .set_status("Only admins can upload files", StatusLevel::Warning);
            }
        }
        KeyCode::Char('r') => {
            if dashboard.refresh().await {
                dashboard.state.set_status("File list refreshed", StatusLevel::Info);
            } else {
                dashboard
                    .state
                    .set_status("Could not refresh file list", StatusLevel::Error);
            }
        }
        KeyCode::Char('c') | KeyCode::Esc => {
            dashboard.close_content();
            dashboard.state.clear_status();
        }
        KeyCode::Char('L') => {
            app.logout().await;
        }

        // Help
        KeyCode::Char('?') => {
            dashboard.state.set_status(
                "j/k:move enter:view d:delete u:upload r:refresh c:close L:logout q:quit",
                StatusLevel::Info,
            );
        }

        _ => {}
    }

    AppResult::Continue
}

/// Handle keys while typing an upload path
async fn handle_upload_mode(app: &mut App, key: KeyEvent) -> AppResult {
    match key.code {
        KeyCode::Enter => {
            app.submit_upload().await;
        }
        code => {
            let Some(dashboard) = app.dashboard.as_mut() else {
                return AppResult::Continue;
            };
            match code {
                KeyCode::Esc => dashboard.state.exit_input_mode(),
                KeyCode::Backspace => {
                    dashboard.state.upload_path.pop();
                }
                KeyCode::Char(c) => dashboard.state.upload_path.push(c),
                _ => {}
            }
        }
    }

    AppResult::Continue
}

/// Handle keys in confirmation mode
async fn handle_confirm_mode(app: &mut App, key: KeyEvent) -> AppResult {
    let Some(dashboard) = app.dashboard.as_mut() else {
        return AppResult::Continue;
    };

    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
            dashboard.confirm().await;
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            dashboard.cancel();
        }
        _ => {}
    }

    AppResult::Continue
}
