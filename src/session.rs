//! Session state: one explicit object owning the auth token and profile.
//!
//! The token lives in the OS keyring; the in-memory cache sits behind a
//! mutex inside this manager and is handed to collaborators by cloning
//! the manager, never through module-level globals.

use keyring::{Entry, Error as KeyringError};
use std::sync::{Arc, Mutex};

use taskboard_api::AuthSession;

const KEYRING_ACCOUNT: &str = "session";
const KEYRING_SERVICE: &str = "io.taskboard.sync";

enum Backend {
    Keyring { service: String },
    /// Cache-only sessions: nothing outlives the process. Used when the
    /// user declines to be remembered, and by tests.
    Memory,
}

#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    backend: Backend,
    cache: Mutex<Option<AuthSession>>,
}

impl SessionManager {
    /// Creates a manager backed by the OS keyring and primes the cache
    /// from any previously stored session.
    pub fn new() -> Result<Self, String> {
        Self::with_service(KEYRING_SERVICE)
    }

    pub fn with_service(service: &str) -> Result<Self, String> {
        let manager = SessionManager {
            inner: Arc::new(SessionInner {
                backend: Backend::Keyring {
                    service: service.to_string(),
                },
                cache: Mutex::new(None),
            }),
        };
        let session = manager.load_from_store()?;
        *manager.inner.cache.lock().unwrap() = session;
        Ok(manager)
    }

    /// Creates a manager that never touches durable storage.
    pub fn in_memory() -> Self {
        SessionManager {
            inner: Arc::new(SessionInner {
                backend: Backend::Memory,
                cache: Mutex::new(None),
            }),
        }
    }

    /// Stores a freshly authenticated session.
    pub fn save(&self, session: &AuthSession) -> Result<(), String> {
        if session.token.trim().is_empty() {
            return Err("Access token must not be empty".into());
        }
        self.persist(Some(session))?;
        *self.inner.cache.lock().unwrap() = Some(session.clone());
        Ok(())
    }

    /// Current session, if any.
    pub fn current(&self) -> Option<AuthSession> {
        self.inner.cache.lock().unwrap().clone()
    }

    /// Id of the signed-in user, used to scope push messages.
    pub fn user_id(&self) -> Option<i64> {
        self.current().map(|session| session.user.id)
    }

    /// Discards the session everywhere: keyring and cache.
    pub fn clear(&self) -> Result<(), String> {
        self.persist(None)?;
        *self.inner.cache.lock().unwrap() = None;
        Ok(())
    }

    fn load_from_store(&self) -> Result<Option<AuthSession>, String> {
        let Some(entry) = self.entry()? else {
            return Ok(None);
        };
        match entry.get_password() {
            Ok(secret) => {
                let session = serde_json::from_str(&secret)
                    .map_err(|err| format!("Failed to decode stored session: {err}"))?;
                Ok(Some(session))
            }
            Err(KeyringError::NoEntry) => Ok(None),
            Err(err) => Err(format!("Failed to read session from keyring: {err}")),
        }
    }

    fn persist(&self, session: Option<&AuthSession>) -> Result<(), String> {
        let Some(entry) = self.entry()? else {
            return Ok(());
        };
        match session {
            Some(data) => {
                let payload = serde_json::to_string(data)
                    .map_err(|err| format!("Failed to serialize session: {err}"))?;
                entry
                    .set_password(&payload)
                    .map_err(|err| format!("Failed to store session in keyring: {err}"))
            }
            None => match entry.delete_credential() {
                Ok(()) | Err(KeyringError::NoEntry) => Ok(()),
                Err(err) => Err(format!("Failed to delete session from keyring: {err}")),
            },
        }
    }

    fn entry(&self) -> Result<Option<Entry>, String> {
        match &self.inner.backend {
            Backend::Memory => Ok(None),
            Backend::Keyring { service } => Entry::new(service, KEYRING_ACCOUNT)
                .map(Some)
                .map_err(|err| format!("Failed to open keyring entry: {err}")),
        }
    }
}
