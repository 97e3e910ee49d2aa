//! Session store
//!
//! Owns the one live session of the client. All changes go through
//! `initialize`, `login`, `logout` and `check_expiry`. Every transition
//! updates persisted storage first and then runs the subscribers, in
//! subscription order, before the call returns.

use tracing::{debug, info, warn};

use crate::credential::{self, Claims, CredentialError, Role};
use crate::storage::CredentialStore;

/// Current authenticated identity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Session {
    #[default]
    LoggedOut,
    LoggedIn {
        credential: String,
        subject: String,
        role: Role,
        expires_at: u64,
    },
}

impl Session {
    fn from_claims(credential: &str, claims: Claims) -> Self {
        Session::LoggedIn {
            credential: credential.to_string(),
            subject: claims.sub,
            role: claims.role,
            expires_at: claims.exp,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        matches!(self, Session::LoggedIn { .. })
    }

    pub fn credential(&self) -> Option<&str> {
        match self {
            Session::LoggedIn { credential, .. } => Some(credential),
            Session::LoggedOut => None,
        }
    }

    pub fn subject(&self) -> Option<&str> {
        match self {
            Session::LoggedIn { subject, .. } => Some(subject),
            Session::LoggedOut => None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            Session::LoggedIn { role, .. } => Some(*role),
            Session::LoggedOut => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role().is_some_and(Role::is_admin)
    }
}

pub type SubscriberId = u64;

type Subscriber = Box<dyn FnMut(&Session) + Send>;

pub struct SessionStore<S: CredentialStore> {
    store: S,
    session: Session,
    subscribers: Vec<(SubscriberId, Subscriber)>,
    next_subscriber: SubscriberId,
}

impl<S: CredentialStore> SessionStore<S> {
    /// Create a logged-out store; call `initialize` to restore a saved session
    pub fn new(store: S) -> Self {
        Self {
            store,
            session: Session::LoggedOut,
            subscribers: Vec::new(),
            next_subscriber: 0,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Credential to attach to outbound requests
    pub fn bearer(&self) -> Option<&str> {
        self.session.credential()
    }

    /// Restore the persisted session, if any
    pub fn initialize(&mut self) -> &Session {
        let saved = match self.store.load() {
            Ok(saved) => saved,
            Err(e) => {
                warn!("Failed to read saved credential: {}", e);
                None
            }
        };

        match saved.map(|token| credential::decode(&token).map(|claims| (token, claims))) {
            Some(Ok((token, claims))) => {
                info!("Restored session for {} ({})", claims.sub, claims.role);
                self.session = Session::from_claims(&token, claims);
            }
            Some(Err(e)) => {
                log_rejected(&e);
                self.clear_storage();
                self.session = Session::LoggedOut;
            }
            None => {
                debug!("No saved credential");
                self.clear_storage();
                self.session = Session::LoggedOut;
            }
        }

        self.notify();
        &self.session
    }

    /// Adopt a credential issued by the auth endpoint
    ///
    /// A credential that does not decode leaves the store logged out.
    pub fn login(&mut self, token: &str) -> Result<&Session, CredentialError> {
        match credential::decode(token) {
            Ok(claims) => {
                if let Err(e) = self.store.save(token) {
                    warn!("Failed to persist credential: {}", e);
                }
                info!("Logged in as {} ({})", claims.sub, claims.role);
                self.session = Session::from_claims(token, claims);
                self.notify();
                Ok(&self.session)
            }
            Err(e) => {
                log_rejected(&e);
                self.force_logout();
                Err(e)
            }
        }
    }

    /// Log out; a no-op when already logged out
    pub fn logout(&mut self) {
        if !self.session.is_logged_in() {
            return;
        }
        info!("Logged out");
        self.force_logout();
    }

    /// Log out if the live credential has expired
    pub fn check_expiry(&mut self) -> bool {
        self.check_expiry_at(credential::now_secs())
    }

    pub fn check_expiry_at(&mut self, now: u64) -> bool {
        match self.session {
            Session::LoggedIn { expires_at, .. } if expires_at <= now => {
                log_rejected(&CredentialError::Expired {
                    expired_at: expires_at,
                });
                self.force_logout();
                true
            }
            _ => false,
        }
    }

    /// Register a callback run after every transition
    pub fn subscribe(&mut self, subscriber: impl FnMut(&Session) + Send + 'static) -> SubscriberId {
        let id = self.next_subscriber;
        self.next_subscriber += 1;
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    // Private helpers

    fn force_logout(&mut self) {
        self.clear_storage();
        self.session = Session::LoggedOut;
        self.notify();
    }

    fn clear_storage(&mut self) {
        if let Err(e) = self.store.clear() {
            warn!("Failed to clear saved credential: {}", e);
        }
    }

    fn notify(&mut self) {
        let session = &self.session;
        for (_, subscriber) in self.subscribers.iter_mut() {
            subscriber(session);
        }
    }
}

fn log_rejected(err: &CredentialError) {
    match err {
        CredentialError::Malformed(reason) => warn!("Rejected malformed credential: {}", reason),
        CredentialError::Expired { expired_at } => {
            warn!("Rejected credential that expired at {}", expired_at)
        }
    }
}
