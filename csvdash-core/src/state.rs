//! Dashboard view state
//!
//! Plain data behind the dashboard screen:
//! - The cached file list, only ever replaced wholesale
//! - Cursor and scrolling over that list
//! - The content pane for the file being viewed
//! - Input mode (upload prompt, delete confirmation) and the status line

use serde_json::Value;

use crate::api::{FileRecord, Row};

/// Status message severity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// UI input mode
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum InputMode {
    #[default]
    Normal,
    /// Typing the path of a file to upload
    Upload,
    /// Confirmation prompt
    Confirm(ConfirmAction),
}

/// Actions requiring confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmAction {
    Delete { id: i64, filename: String },
}

/// Rows of one file, laid out for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTable {
    pub file_id: i64,
    /// Key order of the first row
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ContentTable {
    pub fn from_rows(file_id: i64, rows: &[Row]) -> Self {
        let columns: Vec<String> = rows
            .first()
            .map(|first| first.keys().cloned().collect())
            .unwrap_or_default();

        let rows = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|col| row.get(col).map(cell_text).unwrap_or_default())
                    .collect()
            })
            .collect();

        Self {
            file_id,
            columns,
            rows,
        }
    }
}

/// Content pane
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ContentView {
    #[default]
    Hidden,
    /// The file has no rows
    Empty { file_id: i64 },
    Table(ContentTable),
}

impl ContentView {
    pub fn for_rows(file_id: i64, rows: &[Row]) -> Self {
        if rows.is_empty() {
            ContentView::Empty { file_id }
        } else {
            ContentView::Table(ContentTable::from_rows(file_id, rows))
        }
    }

    /// File shown in the pane, if any
    pub fn file_id(&self) -> Option<i64> {
        match self {
            ContentView::Hidden => None,
            ContentView::Empty { file_id } => Some(*file_id),
            ContentView::Table(table) => Some(table.file_id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashboardState {
    // File list
    pub files: Vec<FileRecord>,
    pub cursor: usize,
    pub scroll_offset: usize,
    pub visible_rows: usize,

    // Content pane
    pub content: ContentView,
    pub loading_content: bool,

    // UI state
    pub input_mode: InputMode,
    pub upload_path: String,
    pub status_message: Option<(String, StatusLevel)>,

    /// The server refused the credential; the session should end
    pub session_rejected: bool,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            cursor: 0,
            scroll_offset: 0,
            visible_rows: 20,

            content: ContentView::Hidden,
            loading_content: false,

            input_mode: InputMode::Normal,
            upload_path: String::new(),
            status_message: None,

            session_rejected: false,
        }
    }
}

impl DashboardState {
    /// Swap in a freshly fetched list, keeping the cursor in range
    pub fn replace_files(&mut self, files: Vec<FileRecord>) {
        self.files = files;
        if self.files.is_empty() {
            self.cursor = 0;
            self.scroll_offset = 0;
        } else if self.cursor >= self.files.len() {
            self.cursor = self.files.len() - 1;
        }
        self.ensure_cursor_visible();
    }

    /// Move cursor down
    pub fn cursor_down(&mut self) {
        if self.cursor + 1 < self.files.len() {
            self.cursor += 1;
            self.ensure_cursor_visible();
        }
    }

    /// Move cursor up
    pub fn cursor_up(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            self.ensure_cursor_visible();
        }
    }

    /// Jump to first entry
    pub fn cursor_top(&mut self) {
        self.cursor = 0;
        self.scroll_offset = 0;
    }

    /// Jump to last entry
    pub fn cursor_bottom(&mut self) {
        if self.files.is_empty() {
            return;
        }
        self.cursor = self.files.len() - 1;
        self.ensure_cursor_visible();
    }

    /// File under the cursor
    pub fn current_file(&self) -> Option<&FileRecord> {
        self.files.get(self.cursor)
    }

    pub fn enter_upload_mode(&mut self) {
        self.input_mode = InputMode::Upload;
        self.upload_path.clear();
    }

    /// Exit current input mode
    pub fn exit_input_mode(&mut self) {
        self.input_mode = InputMode::Normal;
    }

    /// Set status message
    pub fn set_status(&mut self, message: impl Into<String>, level: StatusLevel) {
        self.status_message = Some((message.into(), level));
    }

    /// Clear status message
    pub fn clear_status(&mut self) {
        self.status_message = None;
    }

    fn ensure_cursor_visible(&mut self) {
        if self.cursor < self.scroll_offset {
            self.scroll_offset = self.cursor;
        } else if self.cursor >= self.scroll_offset + self.visible_rows {
            self.scroll_offset = self.cursor + 1 - self.visible_rows;
        }
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    pub(crate) fn record(id: i64, filename: &str, size_bytes: u64) -> FileRecord {
        FileRecord {
            id,
            filename: filename.to_string(),
            size_bytes,
            uploaded_by: "admin".to_string(),
            upload_date: NaiveDateTime::parse_from_str("2024-05-01T10:00:00", "%Y-%m-%dT%H:%M:%S")
                .unwrap(),
        }
    }

    fn sample_files(n: i64) -> Vec<FileRecord> {
        (0..n).map(|i| record(i, &format!("file{}.csv", i), 100)).collect()
    }

    fn rows(json: &str) -> Vec<Row> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_cursor_movement() {
        let mut state = DashboardState::default();
        state.replace_files(sample_files(10));

        state.cursor_down();
        assert_eq!(state.cursor, 1);

        state.cursor_down();
        state.cursor_down();
        assert_eq!(state.cursor, 3);

        state.cursor_up();
        assert_eq!(state.cursor, 2);

        state.cursor_bottom();
        assert_eq!(state.current_file().unwrap().id, 9);
        state.cursor_down();
        assert_eq!(state.cursor, 9);
    }

    #[test]
    fn test_scrolling_follows_cursor() {
        let mut state = DashboardState {
            visible_rows: 3,
            ..Default::default()
        };
        state.replace_files(sample_files(10));

        for _ in 0..4 {
            state.cursor_down();
        }
        assert_eq!(state.cursor, 4);
        assert_eq!(state.scroll_offset, 2);

        state.cursor_top();
        assert_eq!(state.scroll_offset, 0);
    }

    #[test]
    fn test_replace_clamps_cursor() {
        let mut state = DashboardState::default();
        state.replace_files(sample_files(5));
        state.cursor_bottom();

        state.replace_files(sample_files(2));
        assert_eq!(state.cursor, 1);

        state.replace_files(Vec::new());
        assert_eq!(state.cursor, 0);
        assert!(state.current_file().is_none());
        state.cursor_down();
        state.cursor_bottom();
        assert_eq!(state.cursor, 0);
    }

    #[test]
    fn test_content_table_uses_first_row_order() {
        let data = rows(r#"[
            {"name": "a", "qty": 3, "price": 1.5},
            {"name": "b", "price": null, "qty": 4}
        ]"#);

        let table = ContentTable::from_rows(7, &data);
        assert_eq!(table.columns, vec!["name", "qty", "price"]);
        assert_eq!(table.rows[0], vec!["a", "3", "1.5"]);
        assert_eq!(table.rows[1], vec!["b", "4", ""]);
    }

    #[test]
    fn test_empty_content_is_no_data() {
        let view = ContentView::for_rows(3, &[]);
        assert_eq!(view, ContentView::Empty { file_id: 3 });
        assert_eq!(view.file_id(), Some(3));
        assert_eq!(ContentView::Hidden.file_id(), None);
    }
}
