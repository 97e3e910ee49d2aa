//! Notification payloads pushed over the live update channel
//!
//! The server broadcasts bare strings, one per mutation. Only two are
//! meaningful to the dashboard; anything else is carried through as
//! `Other` so newer servers can add signals without breaking older clients.

use std::fmt;

pub const FILE_UPLOADED: &str = "file_uploaded";
pub const FILE_DELETED: &str = "file_deleted";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEvent {
    FileUploaded,
    FileDeleted,
    Other(String),
}

impl LiveEvent {
    pub fn parse(raw: &str) -> Self {
        match raw {
            FILE_UPLOADED => LiveEvent::FileUploaded,
            FILE_DELETED => LiveEvent::FileDeleted,
            other => LiveEvent::Other(other.to_string()),
        }
    }

    /// Whether the file list on the server changed
    pub fn is_mutation(&self) -> bool {
        matches!(self, LiveEvent::FileUploaded | LiveEvent::FileDeleted)
    }
}

impl fmt::Display for LiveEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiveEvent::FileUploaded => f.write_str(FILE_UPLOADED),
            LiveEvent::FileDeleted => f.write_str(FILE_DELETED),
            LiveEvent::Other(raw) => f.write_str(raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognized_events() {
        assert_eq!(LiveEvent::parse("file_uploaded"), LiveEvent::FileUploaded);
        assert_eq!(LiveEvent::parse("file_deleted"), LiveEvent::FileDeleted);
        assert!(LiveEvent::parse("file_deleted").is_mutation());
    }

    #[test]
    fn test_unknown_events_pass_through() {
        for raw in ["", "FILE_UPLOADED", "file_uploaded ", "{\"type\":\"ping\"}"] {
            let event = LiveEvent::parse(raw);
            assert!(!event.is_mutation(), "{raw:?}");
            assert_eq!(event.to_string(), raw);
        }
    }
}
