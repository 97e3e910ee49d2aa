//! Terminal UI rendering with ratatui

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Row, Table, TableState},
};

use csvdash_core::{
    ChannelState, HttpApi,
    dashboard::Dashboard,
    state::{ContentTable, ContentView, InputMode, StatusLevel},
};

use crate::app::{App, LoginField};

/// Main draw function
pub fn draw(f: &mut Frame, app: &App) {
    match app.dashboard.as_ref() {
        Some(dashboard) => draw_dashboard(f, app, dashboard),
        None => draw_login(f, app),
    }
}

/// Draw the login / signup form
fn draw_login(f: &mut Frame, app: &App) {
    let form = &app.login;
    let area = centered(f.area(), 50, 9);
    let title = if form.signup { " Sign Up " } else { " Login " };

    let field_style = |field: LoginField| {
        if form.focus == field {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        }
    };

    let masked = "*".repeat(form.password.chars().count());
    let lines = vec![
        Line::from(vec![
            Span::styled("Username: ", field_style(LoginField::Username)),
            Span::raw(form.username.as_str()),
        ]),
        Line::from(vec![
            Span::styled("Password: ", field_style(LoginField::Password)),
            Span::raw(masked.as_str()),
        ]),
        Line::raw(""),
        match &form.error {
            Some(error) => Line::styled(error.as_str(), Style::default().fg(Color::Red)),
            None => Line::raw(""),
        },
        Line::raw(""),
        Line::styled(
            if form.signup {
                "Enter: create account │ Ctrl-S: back to login │ Esc: quit"
            } else {
                "Enter: log in │ Ctrl-S: new user? sign up │ Esc: quit"
            },
            Style::default().fg(Color::DarkGray),
        ),
    ];

    let panel = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(panel, area);

    // Cursor at the end of the focused field
    let (row, len) = match form.focus {
        LoginField::Username => (0, form.username.chars().count()),
        LoginField::Password => (1, masked.chars().count()),
    };
    f.set_cursor_position((area.x + 1 + 10 + len as u16, area.y + 1 + row));
}

/// Draw the dashboard screen
fn draw_dashboard(f: &mut Frame, app: &App, dashboard: &Dashboard<HttpApi>) {
    let state = &dashboard.state;
    let show_content = state.content != ContentView::Hidden || state.loading_content;

    let mut constraints = vec![Constraint::Length(1), Constraint::Min(5)];
    if show_content {
        constraints.push(Constraint::Percentage(50));
    }
    constraints.push(Constraint::Length(1)); // Status bar
    constraints.push(Constraint::Length(1)); // Input line

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(f.area());

    draw_title_bar(f, app, chunks[0]);
    draw_file_table(f, dashboard, chunks[1]);
    if show_content {
        draw_content(f, dashboard, chunks[2]);
    }
    let n = chunks.len();
    draw_status_bar(f, app, dashboard, chunks[n - 2]);
    draw_input_line(f, dashboard, chunks[n - 1]);
}

/// Draw the title bar with user, role and live connection state
fn draw_title_bar(f: &mut Frame, app: &App, area: Rect) {
    let session = app.session.session();
    let welcome = format!(
        " CSV Dashboard │ Welcome, {} ({}) ",
        session.subject().unwrap_or("?"),
        session.role().map(|r| r.as_str()).unwrap_or("?"),
    );

    let (indicator, color) = match app.live_state() {
        Some(ChannelState::Open) => (" [Live]", Color::Green),
        Some(ChannelState::Connecting) => (" [Connecting]", Color::Yellow),
        Some(ChannelState::ClosedPendingRetry) => (" [Reconnecting]", Color::Yellow),
        Some(ChannelState::Stopped) | None => (" [Offline]", Color::Red),
    };

    let title_bar = Paragraph::new(Line::from(vec![
        Span::styled(welcome, Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
        Span::styled(indicator, Style::default().fg(color)),
    ]))
    .style(Style::default().bg(Color::DarkGray));

    f.render_widget(title_bar, area);
}

/// Draw the file list
fn draw_file_table(f: &mut Frame, dashboard: &Dashboard<HttpApi>, area: Rect) {
    let state = &dashboard.state;
    let block = Block::default().borders(Borders::ALL).title(" Available Files ");

    if state.files.is_empty() {
        let empty = Paragraph::new(Line::styled("No files found", Style::default().fg(Color::DarkGray)))
            .centered()
            .block(block);
        f.render_widget(empty, area);
        return;
    }

    let rows = state.files.iter().map(|file| {
        Row::new(vec![
            file.filename.clone(),
            file.size_bytes.to_string(),
            file.uploaded_by.clone(),
            file.upload_date.format("%Y-%m-%d %H:%M").to_string(),
        ])
    });

    let table = Table::new(
        rows,
        [
            Constraint::Fill(3),
            Constraint::Length(14),
            Constraint::Fill(1),
            Constraint::Length(16),
        ],
    )
    .header(header_row(["FILENAME", "SIZE (BYTES)", "UPLOADED BY", "UPLOADED"]))
    .row_highlight_style(
        Style::default()
            .bg(Color::Blue)
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    )
    .block(block);

    let mut table_state = TableState::default()
        .with_offset(state.scroll_offset)
        .with_selected(Some(state.cursor));
    f.render_stateful_widget(table, area, &mut table_state);
}

/// Draw the content pane for the viewed file
fn draw_content(f: &mut Frame, dashboard: &Dashboard<HttpApi>, area: Rect) {
    let state = &dashboard.state;
    let title = state
        .content
        .file_id()
        .and_then(|id| state.files.iter().find(|file| file.id == id))
        .map(|file| format!(" File Content: {} ", file.filename))
        .unwrap_or_else(|| " File Content ".to_string());
    let block = Block::default().borders(Borders::ALL).title(title);

    match &state.content {
        _ if state.loading_content => {
            let loading = Paragraph::new("Loading...").centered().block(block);
            f.render_widget(loading, area);
        }
        ContentView::Table(table) => draw_content_table(f, table, block, area),
        ContentView::Empty { .. } | ContentView::Hidden => {
            let empty = Paragraph::new(Line::styled(
                "No data to display",
                Style::default().fg(Color::DarkGray),
            ))
            .centered()
            .block(block);
            f.render_widget(empty, area);
        }
    }
}

fn draw_content_table(f: &mut Frame, content: &ContentTable, block: Block, area: Rect) {
    let rows = content.rows.iter().map(|cells| Row::new(cells.clone()));
    let widths = vec![Constraint::Fill(1); content.columns.len()];

    let table = Table::new(rows, widths)
        .header(header_row(content.columns.iter().map(|c| c.to_uppercase())))
        .block(block);

    f.render_widget(table, area);
}

/// Draw the status bar
fn draw_status_bar(f: &mut Frame, app: &App, dashboard: &Dashboard<HttpApi>, area: Rect) {
    let state = &dashboard.state;
    let (text, style) = if let Some((ref msg, ref level)) = state.status_message {
        let color = match level {
            StatusLevel::Info => Color::Blue,
            StatusLevel::Success => Color::Green,
            StatusLevel::Warning => Color::Yellow,
            StatusLevel::Error => Color::Red,
        };
        (msg.clone(), Style::default().fg(color))
    } else {
        // Default hints based on mode
        let hints = match state.input_mode {
            InputMode::Normal if app.is_admin() => {
                "j↓ k↑ │ Enter:view u:upload d:delete r:refresh c:close │ L:logout ?:help q:quit"
            }
            InputMode::Normal => "j↓ k↑ │ Enter:view r:refresh c:close │ L:logout ?:help q:quit",
            InputMode::Upload => "Type path of a CSV file │ Enter:upload │ Esc:cancel",
            InputMode::Confirm(_) => "y:yes n:no │ Enter:confirm │ Esc:cancel",
        };
        (hints.to_string(), Style::default().fg(Color::DarkGray))
    };

    let status_bar = Paragraph::new(text).style(style);
    f.render_widget(status_bar, area);
}

/// Draw the input line (upload prompt)
fn draw_input_line(f: &mut Frame, dashboard: &Dashboard<HttpApi>, area: Rect) {
    let state = &dashboard.state;
    if state.input_mode != InputMode::Upload {
        return;
    }

    let prefix = "Upload: ";
    let input_line = Paragraph::new(format!("{}{}", prefix, state.upload_path))
        .style(Style::default().fg(Color::White));
    f.render_widget(input_line, area);

    let x = area.x + (prefix.len() + state.upload_path.chars().count()) as u16;
    f.set_cursor_position((x, area.y));
}

fn header_row<I, S>(names: I) -> Row<'static>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Row::new(names.into_iter().map(|n| n.into()).collect::<Vec<String>>())
        .style(Style::default().add_modifier(Modifier::BOLD).fg(Color::Cyan))
}

/// Rect of at most `width` x `height`, centered in `area`
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_rect() {
        let area = Rect::new(0, 0, 100, 40);
        let inner = centered(area, 50, 10);
        assert_eq!(inner, Rect::new(25, 15, 50, 10));

        let small = centered(Rect::new(0, 0, 20, 5), 50, 10);
        assert_eq!(small, Rect::new(0, 0, 20, 5));
    }
}
