//! csvdash-core: Shared library for the CSV dashboard client
//!
//! This crate provides:
//! - Credential decoding and the session store
//! - Dashboard REST client
//! - Live update channel (reconnecting WebSocket)
//! - Dashboard state and synchronizer

pub mod api;
pub mod channel;
pub mod config;
pub mod credential;
pub mod dashboard;
pub mod events;
pub mod session;
pub mod state;
pub mod storage;

pub use api::{AuthApi, FileApi, FileRecord, HttpApi};
pub use channel::{ChannelHandle, ChannelState, RetryPolicy, WsConnector};
pub use config::Config;
pub use credential::{Claims, Role};
pub use dashboard::Dashboard;
pub use events::LiveEvent;
pub use session::{Session, SessionStore};
pub use storage::{CredentialStore, FileCredentialStore};

/// Default dashboard API base URL
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";

/// Default notification endpoint
pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8000/ws";
