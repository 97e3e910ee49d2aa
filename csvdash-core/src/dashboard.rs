//! Dashboard synchronizer
//!
//! Keeps the cached file list in step with the server and carries out the
//! user's file actions. The cache is never patched locally: uploads and
//! deletes only reach it through the `file_uploaded` / `file_deleted`
//! broadcast that triggers a full `refresh`.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::api::{ApiError, FileApi};
use crate::events::LiveEvent;
use crate::state::{ConfirmAction, ContentView, DashboardState, InputMode, StatusLevel};

pub struct Dashboard<A: FileApi> {
    api: A,
    pub state: DashboardState,
}

impl<A: FileApi> Dashboard<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            state: DashboardState::default(),
        }
    }

    /// Re-fetch the whole file list and replace the cache
    ///
    /// Runs in the background, so failures are only logged and the last
    /// good list stays on screen.
    pub async fn refresh(&mut self) -> bool {
        match self.api.list_files().await {
            Ok(files) => {
                debug!("Loaded {} file(s)", files.len());
                self.state.replace_files(files);
                true
            }
            Err(e) => {
                warn!("Failed to load files: {}", e);
                self.note_rejection(&e);
                false
            }
        }
    }

    /// React to a live update payload; returns whether it triggered a refresh
    pub async fn handle_event(&mut self, raw: &str) -> bool {
        let event = LiveEvent::parse(raw);
        if !event.is_mutation() {
            debug!("Ignoring live update {:?}", raw);
            return false;
        }

        info!("Update received: {}", event);
        self.refresh().await;
        true
    }

    /// Send a local file to the server
    ///
    /// The list is not touched here; it grows when the server's broadcast
    /// comes back through the live channel.
    pub async fn upload(&mut self, path: &Path) {
        match self.try_upload(path).await {
            Ok(filename) => {
                info!("Uploaded {}", filename);
                self.state
                    .set_status(format!("Uploaded {}", filename), StatusLevel::Success);
            }
            Err(e) => {
                warn!("Upload of {} failed: {}", path.display(), e);
                self.note_rejection(&e);
                self.state
                    .set_status(format!("Upload failed! ({})", e.detail()), StatusLevel::Error);
            }
        }
    }

    /// Ask for confirmation before deleting `id`
    pub fn request_delete(&mut self, id: i64) -> bool {
        let Some(file) = self.state.files.iter().find(|f| f.id == id) else {
            return false;
        };

        let filename = file.filename.clone();
        self.state.set_status(
            format!("Delete {}? (y/n)", filename),
            StatusLevel::Warning,
        );
        self.state.input_mode = InputMode::Confirm(ConfirmAction::Delete { id, filename });
        true
    }

    /// Ask for confirmation before deleting the file under the cursor
    pub fn request_delete_current(&mut self) -> bool {
        match self.state.current_file().map(|f| f.id) {
            Some(id) => self.request_delete(id),
            None => false,
        }
    }

    /// Carry out the action awaiting confirmation
    pub async fn confirm(&mut self) {
        let InputMode::Confirm(action) = self.state.input_mode.clone() else {
            return;
        };
        self.state.exit_input_mode();

        match action {
            ConfirmAction::Delete { id, filename } => self.delete(id, &filename).await,
        }
    }

    /// Drop the action awaiting confirmation
    pub fn cancel(&mut self) {
        if matches!(self.state.input_mode, InputMode::Confirm(_)) {
            self.state.clear_status();
        }
        self.state.exit_input_mode();
    }

    /// Load one file's rows into the content pane
    ///
    /// On failure the pane keeps whatever it showed before.
    pub async fn view_content(&mut self, id: i64) {
        self.state.loading_content = true;
        let result = self.api.content(id).await;
        self.state.loading_content = false;

        match result {
            Ok(rows) => {
                debug!("Loaded {} row(s) of file {}", rows.len(), id);
                self.state.content = ContentView::for_rows(id, &rows);
            }
            Err(e) => {
                warn!("Failed to load content of file {}: {}", id, e);
                self.note_rejection(&e);
                self.state
                    .set_status("Could not load file content", StatusLevel::Error);
            }
        }
    }

    pub async fn view_current(&mut self) {
        if let Some(id) = self.state.current_file().map(|f| f.id) {
            self.view_content(id).await;
        }
    }

    pub fn close_content(&mut self) {
        self.state.content = ContentView::Hidden;
    }

    // Private helpers

    async fn try_upload(&self, path: &Path) -> Result<String, ApiError> {
        let content = tokio::fs::read(path).await.map_err(|source| ApiError::LocalFile {
            path: path.display().to_string(),
            source,
        })?;

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.csv".to_string());

        self.api.upload(&filename, content).await?;
        Ok(filename)
    }

    async fn delete(&mut self, id: i64, filename: &str) {
        match self.api.delete(id).await {
            Ok(()) => {
                info!("Deleted {} ({})", filename, id);
                if self.state.content.file_id() == Some(id) {
                    self.close_content();
                }
                self.state
                    .set_status(format!("Deleted {}", filename), StatusLevel::Success);
            }
            Err(e) => {
                warn!("Delete of {} failed: {}", id, e);
                self.note_rejection(&e);
                let message = match e {
                    ApiError::Forbidden(_) => "Delete failed! (Are you an admin?)".to_string(),
                    other => format!("Delete failed! ({})", other.detail()),
                };
                self.state.set_status(message, StatusLevel::Error);
            }
        }
    }

    fn note_rejection(&mut self, err: &ApiError) {
        if matches!(err, ApiError::Unauthorized(_)) {
            self.state.session_rejected = true;
        }
    }
}
