//! Dashboard REST API client
//!
//! The dashboard server exposes credential issuance and file operations
//! over plain HTTP. Every file endpoint expects the session credential as a
//! bearer token. The token is read from a `BearerSlot` at request time, so
//! a session change is picked up by the next request without rebuilding
//! the client.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, multipart};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::credential::Role;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Not authenticated: {0}")]
    Unauthorized(String),

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Failed to read {path}: {source}")]
    LocalFile {
        path: String,
        source: std::io::Error,
    },
}

impl ApiError {
    /// Human-readable reason, without the error category prefix
    pub fn detail(&self) -> String {
        match self {
            ApiError::Unauthorized(d)
            | ApiError::Forbidden(d)
            | ApiError::NotFound(d)
            | ApiError::Rejected(d)
            | ApiError::Server(d) => d.clone(),
            other => other.to_string(),
        }
    }
}

/// Metadata for one uploaded file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: i64,
    pub filename: String,
    pub size_bytes: u64,
    pub uploaded_by: String,
    #[serde(with = "upload_timestamp")]
    pub upload_date: NaiveDateTime,
}

/// One CSV row: column name to cell, in file column order
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Credential issued by `POST /token`
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// Account as returned by signup and `/users/me`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

/// Server acknowledgement of an upload
#[derive(Debug, Clone, Deserialize)]
pub struct UploadReceipt {
    #[serde(default)]
    pub info: Option<String>,
    pub id: Option<i64>,
}

/// Credential issuance endpoints
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<TokenResponse, ApiError>;
    async fn signup(&self, username: &str, password: &str) -> Result<User, ApiError>;
    async fn me(&self) -> Result<User, ApiError>;
}

/// File endpoints used by the dashboard
#[async_trait]
pub trait FileApi: Send + Sync {
    async fn list_files(&self) -> Result<Vec<FileRecord>, ApiError>;
    async fn upload(&self, filename: &str, content: Vec<u8>) -> Result<UploadReceipt, ApiError>;
    async fn delete(&self, id: i64) -> Result<(), ApiError>;
    async fn content(&self, id: i64) -> Result<Vec<Row>, ApiError>;
}

/// Shared cell holding the credential attached to requests
#[derive(Debug, Clone, Default)]
pub struct BearerSlot(Arc<RwLock<Option<String>>>);

impl BearerSlot {
    pub fn set(&self, token: Option<&str>) {
        *self.0.write().unwrap_or_else(|e| e.into_inner()) = token.map(String::from);
    }

    pub fn get(&self) -> Option<String> {
        self.0.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// HTTP implementation of the dashboard API
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    base_url: String,
    bearer: BearerSlot,
}

impl HttpApi {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer: BearerSlot::default(),
        }
    }

    /// Handle for keeping the bearer token in step with the session
    pub fn bearer(&self) -> BearerSlot {
        self.bearer.clone()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // Private helpers

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed_request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self.client.request(method, self.url(path));

        match self.bearer.get() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

#[async_trait]
impl AuthApi for HttpApi {
    async fn login(&self, username: &str, password: &str) -> Result<TokenResponse, ApiError> {
        let resp = self
            .client
            .post(self.url("/token"))
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;

        let resp = check_status(resp, "/token").await?;
        Ok(resp.json().await?)
    }

    async fn signup(&self, username: &str, password: &str) -> Result<User, ApiError> {
        #[derive(Serialize)]
        struct SignupRequest<'a> {
            username: &'a str,
            password: &'a str,
        }

        let resp = self
            .client
            .post(self.url("/signup"))
            .json(&SignupRequest { username, password })
            .send()
            .await?;

        let resp = check_status(resp, "/signup").await?;
        Ok(resp.json().await?)
    }

    async fn me(&self) -> Result<User, ApiError> {
        let resp = self.authed_request(Method::GET, "/users/me").send().await?;
        let resp = check_status(resp, "/users/me").await?;
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl FileApi for HttpApi {
    async fn list_files(&self) -> Result<Vec<FileRecord>, ApiError> {
        let resp = self.authed_request(Method::GET, "/files").send().await?;
        let resp = check_status(resp, "/files").await?;
        Ok(resp.json().await?)
    }

    async fn upload(&self, filename: &str, content: Vec<u8>) -> Result<UploadReceipt, ApiError> {
        debug!("Uploading {} ({} bytes)", filename, content.len());

        let part = multipart::Part::bytes(content)
            .file_name(filename.to_string())
            .mime_str("text/csv")?;
        let form = multipart::Form::new().part("file", part);

        let resp = self
            .authed_request(Method::POST, "/upload")
            .multipart(form)
            .send()
            .await?;

        let resp = check_status(resp, "/upload").await?;
        Ok(resp.json().await?)
    }

    async fn delete(&self, id: i64) -> Result<(), ApiError> {
        let path = format!("/files/{}", id);
        let resp = self.authed_request(Method::DELETE, &path).send().await?;
        check_status(resp, &path).await?;
        Ok(())
    }

    async fn content(&self, id: i64) -> Result<Vec<Row>, ApiError> {
        let path = format!("/files/{}/content", id);
        let resp = self.authed_request(Method::GET, &path).send().await?;
        let resp = check_status(resp, &path).await?;
        Ok(resp.json().await?)
    }
}

/// Map a non-success response onto `ApiError`, keeping the server's detail
async fn check_status(resp: Response, path: &str) -> Result<Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let detail = error_detail(&body).unwrap_or_else(|| format!("HTTP {}: {}", status.as_u16(), path));

    Err(match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized(detail),
        StatusCode::FORBIDDEN => ApiError::Forbidden(detail),
        StatusCode::NOT_FOUND => ApiError::NotFound(detail),
        s if s.is_client_error() => ApiError::Rejected(detail),
        _ => ApiError::Server(detail),
    })
}

/// Pull `detail` out of an error body like `{"detail": "..."}`
fn error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Upload timestamps arrive either naive (`2024-05-01T10:00:00.123456`)
/// or with an offset; both are kept as naive UTC
mod upload_timestamp {
    use chrono::{DateTime, NaiveDateTime};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

    pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, FORMAT)
            .or_else(|_| DateTime::parse_from_rfc3339(&s).map(|dt| dt.naive_utc()))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let api = HttpApi::new("http://127.0.0.1:8000");
        assert_eq!(api.base_url(), "http://127.0.0.1:8000");
    }

    #[test]
    fn test_url_normalization() {
        let api = HttpApi::new("http://127.0.0.1:8000/");
        assert_eq!(api.url("/files"), "http://127.0.0.1:8000/files");
    }

    #[test]
    fn test_bearer_slot_shared_between_clones() {
        let api = HttpApi::new("http://localhost");
        let slot = api.bearer();
        let cloned = api.clone();

        slot.set(Some("abc"));
        assert_eq!(cloned.bearer().get().as_deref(), Some("abc"));

        slot.set(None);
        assert_eq!(api.bearer().get(), None);
    }

    #[test]
    fn test_file_record_from_server_json() {
        let json = r#"[
            {"id": 7, "filename": "report.csv", "filepath": "uploads/x_report.csv",
             "size_bytes": 200, "uploaded_by": "admin",
             "upload_date": "2024-05-01T10:00:00.123456"},
            {"id": 8, "filename": "b.csv", "filepath": "uploads/b.csv",
             "size_bytes": 3, "uploaded_by": "admin",
             "upload_date": "2024-05-01T10:00:00Z"}
        ]"#;

        let files: Vec<FileRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].filename, "report.csv");
        assert_eq!(files[0].size_bytes, 200);
        assert_eq!(files[1].upload_date.to_string(), "2024-05-01 10:00:00");
    }

    #[test]
    fn test_rows_keep_column_order() {
        let rows: Vec<Row> = serde_json::from_str(r#"[{"zeta": 1, "alpha": "x", "mid": null}]"#).unwrap();
        let columns: Vec<&str> = rows[0].keys().map(String::as_str).collect();
        assert_eq!(columns, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_error_detail() {
        assert_eq!(
            error_detail(r#"{"detail": "Incorrect username or password"}"#).as_deref(),
            Some("Incorrect username or password")
        );
        assert!(error_detail("<html>").is_none());
        assert!(error_detail(r#"{"other": 1}"#).is_none());
        assert!(error_detail(r#"{"detail": [{"loc": ["body"]}]}"#).unwrap().contains("loc"));
    }

    #[test]
    fn test_user_role_parses() {
        let user: User = serde_json::from_str(r#"{"id": 1, "username": "a", "role": "admin"}"#).unwrap();
        assert_eq!(user.role, Role::Admin);
    }
}
