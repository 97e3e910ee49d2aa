//! Application state and logic

use csvdash_core::{
    AuthApi, ChannelHandle, ChannelState, Config, Dashboard, FileCredentialStore, HttpApi,
    SessionStore, WsConnector, api::ApiError, channel,
    state::StatusLevel,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Application result for main loop
pub enum AppResult {
    Continue,
    Quit,
}

/// Field with keyboard focus on the login screen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoginField {
    #[default]
    Username,
    Password,
}

/// Login / signup form
#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub focus: LoginField,
    /// Create the account before logging in
    pub signup: bool,
    pub error: Option<String>,
}

impl LoginForm {
    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            LoginField::Username => LoginField::Password,
            LoginField::Password => LoginField::Username,
        };
    }

    pub fn toggle_mode(&mut self) {
        self.signup = !self.signup;
        self.error = None;
    }

    pub fn push(&mut self, c: char) {
        self.focused_mut().push(c);
    }

    pub fn pop(&mut self) {
        self.focused_mut().pop();
    }

    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }

    fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            LoginField::Username => &mut self.username,
            LoginField::Password => &mut self.password,
        }
    }
}

/// Running live update channel plus the queue its handler feeds
struct LiveLink {
    handle: ChannelHandle,
    events: mpsc::UnboundedReceiver<String>,
}

/// Main application struct
pub struct App {
    /// Configuration
    pub config: Config,

    /// Current session
    pub session: SessionStore<FileCredentialStore>,

    /// Login screen state
    pub login: LoginForm,

    /// Present while logged in
    pub dashboard: Option<Dashboard<HttpApi>>,

    api: HttpApi,
    live: Option<LiveLink>,
}

impl App {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let api = HttpApi::new(&config.server.api_url);
        let mut session = SessionStore::new(config.credential_store()?);

        // Every request carries whatever credential the session holds
        let bearer = api.bearer();
        session.subscribe(move |s| bearer.set(s.credential()));

        Ok(Self {
            config,
            session,
            login: LoginForm::default(),
            dashboard: None,
            api,
            live: None,
        })
    }

    /// Restore a saved session and open the dashboard if there is one
    pub async fn start(&mut self) {
        if !self.session.initialize().is_logged_in() {
            return;
        }

        // The server may have dropped the account since the credential was saved
        match self.api.me().await {
            Ok(user) => info!("Server confirmed {} ({})", user.username, user.role),
            Err(ApiError::Unauthorized(detail)) => {
                warn!("Saved credential refused by server: {}", detail);
                self.session.logout();
                self.login.error = Some("Session is no longer valid, please log in again".to_string());
                return;
            }
            Err(e) => warn!("Could not verify saved credential: {}", e),
        }

        self.open_dashboard().await;
    }

    /// Live channel state, while the dashboard is open
    pub fn live_state(&self) -> Option<ChannelState> {
        self.live.as_ref().map(|l| l.handle.state())
    }

    pub fn is_admin(&self) -> bool {
        self.session.session().is_admin()
    }

    /// Submit the login form (creating the account first in signup mode)
    pub async fn submit_login(&mut self) {
        if !self.login.is_complete() {
            self.login.error = Some("Username and password are required".to_string());
            return;
        }
        self.login.error = None;

        let username = self.login.username.clone();
        let password = self.login.password.clone();

        if self.login.signup {
            if let Err(e) = self.api.signup(&username, &password).await {
                warn!("Signup failed for {}: {}", username, e);
                self.login.error = Some(e.detail());
                return;
            }
            info!("Created account {}", username);
        }

        let token = match self.api.login(&username, &password).await {
            Ok(token) => token,
            Err(e) => {
                warn!("Login failed for {}: {}", username, e);
                self.login.error = Some(e.detail());
                return;
            }
        };

        if let Err(e) = self.session.login(&token.access_token) {
            self.login.error = Some(format!("Server issued an unusable credential: {}", e));
            return;
        }

        self.login = LoginForm {
            username,
            ..LoginForm::default()
        };
        self.open_dashboard().await;
    }

    /// End the session and return to the login screen
    pub async fn logout(&mut self) {
        self.close_dashboard().await;
        self.session.logout();
    }

    /// Process async operations
    pub async fn tick(&mut self) {
        if self.session.check_expiry() {
            self.close_dashboard().await;
            self.login.error = Some("Session expired, please log in again".to_string());
            return;
        }

        if let (Some(live), Some(dashboard)) = (self.live.as_mut(), self.dashboard.as_mut()) {
            while let Ok(raw) = live.events.try_recv() {
                dashboard.handle_event(&raw).await;
            }
        }

        if self.dashboard.as_ref().is_some_and(|d| d.state.session_rejected) {
            warn!("Server rejected the session credential");
            self.logout().await;
            self.login.error = Some("Session is no longer valid, please log in again".to_string());
        }
    }

    /// Tear down the live channel before exit
    pub async fn shutdown(&mut self) {
        self.close_dashboard().await;
    }

    /// Handle the upload prompt's Enter
    pub async fn submit_upload(&mut self) {
        let Some(dashboard) = self.dashboard.as_mut() else {
            return;
        };

        let path = dashboard.state.upload_path.trim().to_string();
        dashboard.state.exit_input_mode();
        if path.is_empty() {
            return;
        }

        dashboard
            .state
            .set_status(format!("Uploading {}...", path), StatusLevel::Info);
        dashboard.upload(std::path::Path::new(&expand_home(&path))).await;
    }

    // Private helpers

    async fn open_dashboard(&mut self) {
        let mut dashboard = Dashboard::new(self.api.clone());
        dashboard.refresh().await;
        self.dashboard = Some(dashboard);

        let (tx, events) = mpsc::unbounded_channel();
        let handle = channel::spawn(
            WsConnector::new(&self.config.server.ws_url),
            self.config.live.retry_policy(),
            move |raw| {
                let _ = tx.send(raw);
            },
        );
        self.live = Some(LiveLink { handle, events });
    }

    async fn close_dashboard(&mut self) {
        if let Some(live) = self.live.take() {
            live.handle.shutdown().await;
        }
        self.dashboard = None;
    }
}

/// Expand a leading `~/` to the home directory
fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest).display().to_string(),
        _ => path.to_string(),
    }
}
